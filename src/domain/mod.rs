//! Domain logic - pure release rules independent of registries and files

pub mod manifest;
pub mod release;
pub mod tag;

pub use manifest::{ReleaseManifest, Service};
pub use release::{next_release_version, week_prefix};
pub use tag::{compare_tags, parse_tolerant, select_latest};
