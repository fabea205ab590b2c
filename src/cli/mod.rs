pub mod orchestration;

pub use orchestration::{run_from_config, run_watch, WatchContext, WatchOutcome};
