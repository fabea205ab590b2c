use std::fmt;

/// Per-service issues that do not stop the run.
/// They are logged as they happen and returned with the run outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchWarning {
    /// Listing tags for the service's image failed
    RegistryUnavailable {
        service: String,
        image: String,
        reason: String,
    },
    /// The image has no tags starting with `v`
    NoVersionTags { service: String, image: String },
    /// The service moved to a new tag but no release document entry matched it
    NoPatchTarget { service: String, tag: String },
}

impl fmt::Display for WatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchWarning::RegistryUnavailable {
                service,
                image,
                reason,
            } => {
                write!(
                    f,
                    "Failed to get tags for '{}' ({}): {}",
                    service, image, reason
                )
            }
            WatchWarning::NoVersionTags { service, image } => {
                write!(f, "No version tags found for '{}' ({})", service, image)
            }
            WatchWarning::NoPatchTarget { service, tag } => {
                write!(
                    f,
                    "No release document entry for '{}'; {} recorded in the manifest only",
                    service, tag
                )
            }
        }
    }
}
