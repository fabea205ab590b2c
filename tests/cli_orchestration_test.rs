use chrono::{DateTime, TimeZone, Utc};
use registry_watch::boundary::WatchWarning;
use registry_watch::cli::orchestration::{run_watch, ServiceUpdate, WatchContext};
use registry_watch::domain::{ReleaseManifest, Service};
use registry_watch::output::MemoryOutput;
use registry_watch::patch::{MockPatcher, YamlFieldPatcher};
use registry_watch::registry::MockRegistry;
use registry_watch::store::{JsonManifestStore, ManifestStore, MemoryManifestStore};
use registry_watch::WatchError;
use std::fs;
use tempfile::TempDir;

/// Wednesday of ISO week 2026-W02
fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 7, 9, 30, 0).unwrap()
}

fn manifest(release: &str, services: Vec<Service>) -> ReleaseManifest {
    ReleaseManifest {
        release_version: release.to_string(),
        services,
    }
}

fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_single_service_update_end_to_end() {
    let registry =
        MockRegistry::new().with_tags("ghcr.io/acme/api", ["v1.0.0", "v1.2.0", "latest"]);
    let patcher = MockPatcher::new();
    let store = MemoryManifestStore::new(manifest(
        "v202601.3.0",
        vec![Service::new("api", "v1.0.0", "ghcr.io/acme/api")],
    ));
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let outcome = run_watch(&ctx, clock).unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.release_tag.as_deref(), Some("v202602.0.0"));
    assert_eq!(
        outcome.updates,
        vec![ServiceUpdate {
            name: "api".to_string(),
            previous: "v1.0.0".to_string(),
            latest: "v1.2.0".to_string(),
        }]
    );

    assert_eq!(patcher.calls(), pairs(&[("api", "v1.2.0")]));

    let saves = store.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].release_version, "v202602.0.0");
    assert_eq!(saves[0].services[0].version, "v1.2.0");

    assert_eq!(
        output.entries(),
        pairs(&[("update", "true"), ("release_tag", "v202602.0.0")])
    );
}

#[test]
fn test_no_newer_tags_is_a_no_op() {
    let registry = MockRegistry::new()
        .with_tags("ghcr.io/acme/api", ["v1.0.0", "v0.9.0"])
        .with_tags("ghcr.io/acme/web", ["latest"]);
    let patcher = MockPatcher::new();
    let store = MemoryManifestStore::new(manifest(
        "v202602.0.0",
        vec![
            Service::new("api", "v1.0.0", "ghcr.io/acme/api"),
            Service::new("web", "v3.0.0", "ghcr.io/acme/web"),
        ],
    ));
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let outcome = run_watch(&ctx, clock).unwrap();

    assert!(!outcome.updated);
    assert_eq!(outcome.release_tag, None);
    assert!(patcher.calls().is_empty());
    assert!(store.saves().is_empty());
    assert_eq!(output.entries(), pairs(&[("update", "false")]));
}

#[test]
fn test_registry_failure_does_not_block_other_services() {
    let registry = MockRegistry::new()
        .with_failure("ghcr.io/acme/api", "HTTP 503")
        .with_tags("ghcr.io/acme/web", ["v2.0.0", "v2.1.0"]);
    let patcher = MockPatcher::new();
    let store = MemoryManifestStore::new(manifest(
        "v202602.1.0",
        vec![
            Service::new("api", "v1.0.0", "ghcr.io/acme/api"),
            Service::new("web", "v2.0.0", "ghcr.io/acme/web"),
        ],
    ));
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let outcome = run_watch(&ctx, clock).unwrap();

    assert_eq!(
        registry.queried(),
        vec!["ghcr.io/acme/api".to_string(), "ghcr.io/acme/web".to_string()]
    );
    assert_eq!(patcher.calls(), pairs(&[("web", "v2.1.0")]));
    assert_eq!(outcome.release_tag.as_deref(), Some("v202602.2.0"));
    assert!(matches!(
        outcome.warnings.as_slice(),
        [WatchWarning::RegistryUnavailable { service, .. }] if service == "api"
    ));

    let saved = store.current();
    assert_eq!(saved.services[0].version, "v1.0.0");
    assert_eq!(saved.services[1].version, "v2.1.0");
}

#[test]
fn test_patch_failure_aborts_without_persisting() {
    let registry = MockRegistry::new()
        .with_tags("ghcr.io/acme/api", ["v1.1.0"])
        .with_tags("ghcr.io/acme/web", ["v2.1.0"]);
    let patcher = MockPatcher::failing("yq: exit status 1");
    let original = manifest(
        "v202602.0.0",
        vec![
            Service::new("api", "v1.0.0", "ghcr.io/acme/api"),
            Service::new("web", "v2.0.0", "ghcr.io/acme/web"),
        ],
    );
    let store = MemoryManifestStore::new(original.clone());
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let err = run_watch(&ctx, clock).unwrap_err();

    assert!(matches!(err, WatchError::Patch(_)));
    assert_eq!(registry.queried(), vec!["ghcr.io/acme/api".to_string()]);
    assert!(store.saves().is_empty());
    assert_eq!(store.current(), original);
    assert!(output.entries().is_empty());
}

#[test]
fn test_save_failure_is_fatal_and_emits_nothing() {
    let registry = MockRegistry::new().with_tags("ghcr.io/acme/api", ["v1.1.0"]);
    let patcher = MockPatcher::new();
    let store = MemoryManifestStore::new(manifest(
        "v202602.0.0",
        vec![Service::new("api", "v1.0.0", "ghcr.io/acme/api")],
    ))
    .failing_saves();
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let err = run_watch(&ctx, clock).unwrap_err();

    assert!(matches!(err, WatchError::ManifestWrite { .. }));
    assert!(output.entries().is_empty());
}

#[test]
fn test_load_failure_stops_before_any_check() {
    let dir = TempDir::new().unwrap();
    let registry = MockRegistry::new();
    let patcher = MockPatcher::new();
    let store = JsonManifestStore::new(dir.path().join("release_manifest.json"));
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let err = run_watch(&ctx, clock).unwrap_err();

    assert!(matches!(err, WatchError::ManifestRead { .. }));
    assert!(registry.queried().is_empty());
    assert!(output.entries().is_empty());
}

#[test]
fn test_multiple_updates_bump_release_once() {
    let registry = MockRegistry::new()
        .with_tags("a", ["v1.0.1"])
        .with_tags("b", ["v2.0.1"]);
    let patcher = MockPatcher::new();
    let store = MemoryManifestStore::new(manifest(
        "seed",
        vec![Service::new("a", "v1.0.0", "a"), Service::new("b", "v2.0.0", "b")],
    ));
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };
    let outcome = run_watch(&ctx, clock).unwrap();

    assert_eq!(outcome.updates.len(), 2);
    assert_eq!(outcome.release_tag.as_deref(), Some("v202602.0.0"));
    assert_eq!(store.saves().len(), 1);
}

#[test]
fn test_file_backed_run_and_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let manifest_path = dir.path().join("release_manifest.json");
    let release_path = dir.path().join("release.yaml");

    fs::write(
        &manifest_path,
        r#"{
    "release_version": "v202602.0.0",
    "services": [
        {"name": "api", "version": "v1.0.0", "image": "ghcr.io/acme/api"},
        {"name": "web", "version": "v2.0.0", "image": "ghcr.io/acme/web"}
    ]
}"#,
    )
    .unwrap();
    let release_yaml = "\
# managed by automation
metadata:
  name: api
spec:
  values:
    image:
      tag: v1.0.0 # api
---
metadata:
  name: web
spec:
  values:
    image:
      tag: v2.0.0 # web
";
    fs::write(&release_path, release_yaml).unwrap();

    let registry = MockRegistry::new()
        .with_tags("ghcr.io/acme/api", ["v1.0.0", "v1.10.0", "v1.9.0"])
        .with_tags("ghcr.io/acme/web", ["v2.0.0"]);
    let patcher = YamlFieldPatcher::new(
        &release_path,
        vec!["metadata".to_string(), "name".to_string()],
        vec![
            "spec".to_string(),
            "values".to_string(),
            "image".to_string(),
            "tag".to_string(),
        ],
    );
    let store = JsonManifestStore::new(&manifest_path);
    let output = MemoryOutput::new();

    let ctx = WatchContext {
        registry: &registry,
        patcher: &patcher,
        store: &store,
        output: &output,
    };

    let outcome = run_watch(&ctx, clock).unwrap();
    assert_eq!(outcome.release_tag.as_deref(), Some("v202602.1.0"));

    let saved = store.load().unwrap();
    assert_eq!(saved.release_version, "v202602.1.0");
    assert_eq!(saved.services[0].version, "v1.10.0");
    assert_eq!(saved.services[1].version, "v2.0.0");
    assert_eq!(
        fs::read_to_string(&release_path).unwrap(),
        release_yaml.replace("tag: v1.0.0 # api", "tag: v1.10.0 # api")
    );

    let manifest_text = fs::read_to_string(&manifest_path).unwrap();
    assert!(manifest_text.starts_with("{\n    \"release_version\": \"v202602.1.0\","));

    let second = MemoryOutput::new();
    let ctx = WatchContext {
        output: &second,
        ..ctx
    };
    let rerun = run_watch(&ctx, clock).unwrap();
    assert!(!rerun.updated);
    assert_eq!(fs::read_to_string(&manifest_path).unwrap(), manifest_text);
    assert_eq!(second.entries(), pairs(&[("update", "false")]));
}
