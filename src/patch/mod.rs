//! Release document patching
//!
//! When a service moves to a new tag, the release document (e.g. a Flux
//! `HelmRelease` list) has the service's image tag rewritten. Implementations:
//!
//! - [yaml::YamlFieldPatcher]: in-process editor preserving comments and layout
//! - [command::CommandPatcher]: runs an external editor such as `yq`
//! - [mock::MockPatcher]: records calls for testing
//!
//! Every patch failure is fatal to the run.

pub mod command;
pub mod mock;
pub mod yaml;

pub use command::CommandPatcher;
pub use mock::MockPatcher;
pub use yaml::YamlFieldPatcher;

use crate::config::{PatchConfig, PatchMode};
use crate::error::Result;

/// What a successful patch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The field was set in this many documents
    Updated(usize),
    /// No document is selected by the service name; nothing was written
    NoMatchingDocument,
    /// An external program ran successfully; it does not report what changed
    Delegated,
}

/// Updates the release document for one service.
pub trait ConfigPatcher {
    /// Set the tag recorded for `service` to `tag`.
    ///
    /// # Returns
    /// * `Ok(PatchOutcome)` - The document is consistent with `tag` (or has no entry for `service`)
    /// * `Err` - The document may be partially updated; the run must stop
    fn apply(&self, service: &str, tag: &str) -> Result<PatchOutcome>;
}

/// Build the patcher selected by `config.mode`.
pub fn from_config(config: &PatchConfig) -> Box<dyn ConfigPatcher> {
    match config.mode {
        PatchMode::Builtin => Box::new(YamlFieldPatcher::from_config(config)),
        PatchMode::Command => Box::new(CommandPatcher::from_config(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_boxed_builtin_patcher_from_config() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("release.yaml");
        std::fs::write(
            &file,
            "metadata:\n  name: api\nspec:\n  values:\n    image:\n      tag: v1\n",
        )
        .unwrap();

        let patcher = from_config(&PatchConfig {
            file: file.clone(),
            ..PatchConfig::default()
        });
        assert_eq!(patcher.apply("api", "v2").unwrap(), PatchOutcome::Updated(1));
        assert!(std::fs::read_to_string(&file).unwrap().contains("tag: v2"));
    }
}
