use serde::{Deserialize, Serialize};

/// A container image tracked by the release manifest.
///
/// `version` is the last tag recorded for `image`; `name` identifies the
/// service in the patched configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub version: String,
    pub image: String,
}

impl Service {
    pub fn new(name: impl Into<String>, version: impl Into<String>, image: impl Into<String>) -> Self {
        Service {
            name: name.into(),
            version: version.into(),
            image: image.into(),
        }
    }
}

/// Release manifest: the aggregate release version plus every tracked service
/// in a fixed order. Field order here is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub release_version: String,
    pub services: Vec<Service>,
}

impl ReleaseManifest {
    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|svc| svc.name == name)
    }
}
