pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod patch;
pub mod registry;
pub mod store;

pub use error::{Result, WatchError};
