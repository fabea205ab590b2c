//! Container registry abstraction layer
//!
//! The [Registry] trait lists the tags published for an image. Implementations:
//!
//! - [oci::OciRegistry]: OCI Distribution API client over blocking HTTP
//! - [mock::MockRegistry]: canned tag listings and failures for testing
//!
//! [credentials::DockerKeychain] supplies `docker login` credentials to the
//! OCI client.
//!
//! Orchestration code depends on the trait only.

pub mod credentials;
pub mod mock;
pub mod oci;

pub use credentials::{Credentials, DockerKeychain};
pub use mock::MockRegistry;
pub use oci::OciRegistry;

use std::fmt;

use crate::error::{Result, WatchError};

/// Registry host used for references without an explicit registry.
pub const DOCKER_HUB_REGISTRY: &str = "registry-1.docker.io";

/// Lists tags for container images.
///
/// Errors are reported as [WatchError::Registry](crate::error::WatchError::Registry),
/// which the orchestrator treats as scoped to the one service being checked.
pub trait Registry {
    /// Return every tag currently published for `image`, in no particular order.
    ///
    /// # Arguments
    /// * `image` - Image reference such as `ghcr.io/acme/api` or `nginx`
    fn list_tags(&self, image: &str) -> Result<Vec<String>>;
}

/// A parsed `[registry/]repository[:tag|@digest]` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
}

impl ImageReference {
    /// Split an image reference into registry host and repository path.
    ///
    /// Any tag or digest is dropped since tags are listed per repository.
    /// References without a registry host resolve to Docker Hub, where
    /// single-component names live under `library/`.
    pub fn parse(image: &str) -> Result<Self> {
        let image = image.trim();
        if image.is_empty() {
            return Err(WatchError::registry("empty image reference"));
        }

        let without_digest = image.split('@').next().unwrap_or(image);

        let (first, rest) = match without_digest.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (Some(first), rest),
            _ => (None, without_digest),
        };

        // A ':' after the last '/' starts a tag, one before it belongs to a host port.
        let repository = match rest.rfind(':') {
            Some(idx) if !rest[idx..].contains('/') => &rest[..idx],
            _ => rest,
        };

        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(WatchError::registry(format!(
                "invalid image reference '{}'",
                image
            )));
        }

        let registry = match first {
            None | Some("docker.io") | Some("index.docker.io") => DOCKER_HUB_REGISTRY,
            Some(host) => host,
        };

        let repository = if registry == DOCKER_HUB_REGISTRY && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository.to_string()
        };

        Ok(ImageReference {
            registry: registry.to_string(),
            repository,
        })
    }

    /// `http` for local registries, `https` everywhere else.
    pub fn scheme(&self) -> &'static str {
        let host = self.registry.split(':').next().unwrap_or(&self.registry);
        if host == "localhost" || host == "127.0.0.1" || host.ends_with(".local") {
            "http"
        } else {
            "https"
        }
    }

    /// URL of the first page of the repository's tag listing.
    pub fn tags_url(&self) -> String {
        format!(
            "{}://{}/v2/{}/tags/list",
            self.scheme(),
            self.registry,
            self.repository
        )
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}
