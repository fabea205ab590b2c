//! Main watch workflow orchestration logic
//!
//! One pass over the manifest: check every service against its registry,
//! patch the release document for each service that moved, then bump the
//! release version, persist the manifest and publish CI outputs. Nothing is
//! retried; registry failures skip one service, every other failure aborts.

use chrono::{DateTime, Utc};

use crate::boundary::WatchWarning;
use crate::config::Config;
use crate::domain::{next_release_version, select_latest, Service};
use crate::error::Result;
use crate::output::{GithubOutput, OutputSink};
use crate::patch::{self, ConfigPatcher, PatchOutcome};
use crate::registry::{OciRegistry, Registry};
use crate::store::{JsonManifestStore, ManifestStore};

/// Collaborators used by a watch run
pub struct WatchContext<'a> {
    pub registry: &'a dyn Registry,
    pub patcher: &'a dyn ConfigPatcher,
    pub store: &'a dyn ManifestStore,
    pub output: &'a dyn OutputSink,
}

/// A service that moved to a newer tag during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub name: String,
    pub previous: String,
    pub latest: String,
}

/// Result of checking a single service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceCheck {
    pub update: Option<ServiceUpdate>,
    pub warning: Option<WatchWarning>,
}

/// Result of a completed watch run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatchOutcome {
    /// Whether any service changed (and so the manifest was written)
    pub updated: bool,

    /// The new release version, set only when `updated`
    pub release_tag: Option<String>,

    pub updates: Vec<ServiceUpdate>,

    pub warnings: Vec<WatchWarning>,
}

impl WatchOutcome {
    fn absorb(&mut self, check: ServiceCheck) {
        if let Some(update) = check.update {
            self.updated = true;
            self.updates.push(update);
        }
        self.warnings.extend(check.warning);
    }
}

/// Check one service and, if a newer tag exists, record it and patch the
/// release document.
///
/// Registry failures come back as a warning; a patch failure is returned as
/// an error after `service.version` has already been updated in memory.
pub fn check_service(
    registry: &dyn Registry,
    patcher: &dyn ConfigPatcher,
    service: &mut Service,
) -> Result<ServiceCheck> {
    tracing::info!(service = %service.name, image = %service.image, "checking");

    let tags = match registry.list_tags(&service.image) {
        Ok(tags) => tags,
        Err(e) => {
            let warning = WatchWarning::RegistryUnavailable {
                service: service.name.clone(),
                image: service.image.clone(),
                reason: e.to_string(),
            };
            tracing::warn!("{}", warning);
            return Ok(ServiceCheck {
                update: None,
                warning: Some(warning),
            });
        }
    };

    let Some(latest) = select_latest(&tags) else {
        tracing::info!(service = %service.name, "no version tags, up to date");
        return Ok(ServiceCheck {
            update: None,
            warning: Some(WatchWarning::NoVersionTags {
                service: service.name.clone(),
                image: service.image.clone(),
            }),
        });
    };

    if latest == service.version {
        tracing::info!(service = %service.name, version = %latest, "up to date");
        return Ok(ServiceCheck::default());
    }

    tracing::info!(
        service = %service.name,
        previous = %service.version,
        latest = %latest,
        "found new version"
    );
    let previous = std::mem::replace(&mut service.version, latest.clone());

    let warning = match patcher.apply(&service.name, &latest)? {
        PatchOutcome::NoMatchingDocument => {
            let warning = WatchWarning::NoPatchTarget {
                service: service.name.clone(),
                tag: latest.clone(),
            };
            tracing::warn!("{}", warning);
            Some(warning)
        }
        PatchOutcome::Updated(_) | PatchOutcome::Delegated => None,
    };

    Ok(ServiceCheck {
        update: Some(ServiceUpdate {
            name: service.name.clone(),
            previous,
            latest,
        }),
        warning,
    })
}

/// Main watch workflow
///
/// # Arguments
///
/// * `ctx` - Registry, patcher, manifest store and output sink
/// * `clock` - Source of the current time for the release version
///
/// # Returns
///
/// The folded run outcome, or the first fatal error. On error no CI output
/// is emitted and the manifest is left as it was.
pub fn run_watch(ctx: &WatchContext<'_>, clock: impl Fn() -> DateTime<Utc>) -> Result<WatchOutcome> {
    let mut manifest = ctx.store.load()?;
    tracing::info!(
        services = manifest.services.len(),
        release = %manifest.release_version,
        "loaded manifest"
    );

    let mut outcome = WatchOutcome::default();
    for service in manifest.services.iter_mut() {
        let check = check_service(ctx.registry, ctx.patcher, service)?;
        outcome.absorb(check);
    }

    if !outcome.updated {
        tracing::info!("all services up to date");
        ctx.output.emit("update", "false");
        return Ok(outcome);
    }

    let release = next_release_version(&manifest.release_version, clock());
    tracing::info!(
        previous = %manifest.release_version,
        release = %release,
        "generating new release version"
    );
    manifest.release_version = release.clone();
    ctx.store.save(&manifest)?;

    ctx.output.emit("update", "true");
    ctx.output.emit("release_tag", &release);
    outcome.release_tag = Some(release);

    Ok(outcome)
}

/// Run against the real registry, release document, manifest file and CI
/// output described by `config`.
pub fn run_from_config(config: &Config) -> Result<WatchOutcome> {
    let registry = OciRegistry::new(config.registry.timeout());
    let patcher = patch::from_config(&config.patch);
    let store = JsonManifestStore::new(&config.manifest_path);
    let output = GithubOutput::from_env(&config.output_env);

    let ctx = WatchContext {
        registry: &registry,
        patcher: patcher.as_ref(),
        store: &store,
        output: &output,
    };
    run_watch(&ctx, Utc::now)
}
