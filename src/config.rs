use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, WatchError};

/// File name looked up in the working directory and the user config directory.
pub const CONFIG_FILE_NAME: &str = "registry-watch.toml";

/// Represents the complete configuration for registry-watch.
///
/// Every field has a default, so an absent file or an empty one yields the
/// layout the automation job expects.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    #[serde(default = "default_output_env")]
    pub output_env: String,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub patch: PatchConfig,
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("release_manifest.json")
}

fn default_output_env() -> String {
    "GITHUB_OUTPUT".to_string()
}

/// Registry client settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_registry_timeout_secs() -> u64 {
    30
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            timeout_secs: default_registry_timeout_secs(),
        }
    }
}

/// Which config patcher implementation to use.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// In-process YAML field editor
    #[default]
    Builtin,
    /// External program such as `yq`
    Command,
}

/// Settings for updating the release document when a service changes.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PatchConfig {
    #[serde(default)]
    pub mode: PatchMode,

    #[serde(default = "default_patch_file")]
    pub file: PathBuf,

    /// Key path whose value must equal the service name
    #[serde(default = "default_selector")]
    pub selector: Vec<String>,

    /// Key path that receives the new tag
    #[serde(default = "default_field")]
    pub field: Vec<String>,

    #[serde(default = "default_program")]
    pub program: String,

    /// Argument template; `{name}`, `{tag}` and `{file}` are substituted
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    #[serde(default = "default_patch_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_patch_file() -> PathBuf {
    PathBuf::from("clusters/dev/release.yaml")
}

fn default_selector() -> Vec<String> {
    vec!["metadata".to_string(), "name".to_string()]
}

fn default_field() -> Vec<String> {
    vec![
        "spec".to_string(),
        "values".to_string(),
        "image".to_string(),
        "tag".to_string(),
    ]
}

fn default_program() -> String {
    "yq".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "-i".to_string(),
        r#"select(.metadata.name == "{name}").spec.values.image.tag = "{tag}""#.to_string(),
        "{file}".to_string(),
    ]
}

fn default_patch_timeout_secs() -> u64 {
    60
}

impl PatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        PatchConfig {
            mode: PatchMode::default(),
            file: default_patch_file(),
            selector: default_selector(),
            field: default_field(),
            program: default_program(),
            args: default_args(),
            timeout_secs: default_patch_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manifest_path: default_manifest_path(),
            output_env: default_output_env(),
            registry: RegistryConfig::default(),
            patch: PatchConfig::default(),
        }
    }
}

/// Parse configuration from TOML text.
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(text).map_err(|e| WatchError::config(format!("invalid TOML: {}", e)))?;

    if config.patch.field.is_empty() {
        return Err(WatchError::config("patch.field must name at least one key"));
    }
    if config.patch.selector.is_empty() {
        return Err(WatchError::config("patch.selector must name at least one key"));
    }

    Ok(config)
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. `registry-watch.toml` in `dir`
/// 2. `registry-watch.toml` in the user config directory
/// 3. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read or parsed
pub fn load_config(dir: &Path) -> Result<Config> {
    let local = dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_file(&local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join(CONFIG_FILE_NAME);
        if user.exists() {
            return load_config_file(&user);
        }
    }

    Ok(Config::default())
}

fn load_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .map_err(|e| WatchError::config(format!("cannot read {}: {}", path.display(), e)))?;
    parse_config(&text).map_err(|e| match e {
        WatchError::Config(msg) => WatchError::config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}
