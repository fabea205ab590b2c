// tests/config_test.rs
use registry_watch::config::{load_config, Config, PatchMode, CONFIG_FILE_NAME};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_from_working_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"
manifest_path = "release/manifest.json"
output_env = "CI_OUTPUT"

[registry]
timeout_secs = 10

[patch]
mode = "command"
program = "/usr/local/bin/yq"
"#,
    )
    .unwrap();

    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.manifest_path, PathBuf::from("release/manifest.json"));
    assert_eq!(config.output_env, "CI_OUTPUT");
    assert_eq!(config.registry.timeout_secs, 10);
    assert_eq!(config.patch.mode, PatchMode::Command);
    assert_eq!(config.patch.program, "/usr/local/bin/yq");
    assert_eq!(config.patch.file, PathBuf::from("clusters/dev/release.yaml"));
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "manifest_path = [").unwrap();

    let err = load_config(dir.path()).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains(CONFIG_FILE_NAME));
}

#[test]
fn test_custom_field_paths() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"
[patch]
file = "apps.yaml"
selector = ["name"]
field = ["image", "tag"]
"#,
    )
    .unwrap();

    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.patch.selector, vec!["name"]);
    assert_eq!(config.patch.field, vec!["image", "tag"]);
    assert_eq!(config.patch.mode, PatchMode::Builtin);
    assert_ne!(config, Config::default());
}
