//! Registry credentials from the Docker CLI config
//!
//! `docker login` stores credentials in `config.json` under `auths`, keyed by
//! registry host (sometimes written as a URL). Only inline `auth` or
//! `username`/`password` entries are read; credential helpers are not run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{Result, WatchError};
use crate::registry::DOCKER_HUB_REGISTRY;

/// Environment variable naming the Docker config directory.
pub const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

/// Hosts that all refer to Docker Hub in `auths` keys.
const DOCKER_HUB_ALIASES: [&str; 3] = ["index.docker.io", "docker.io", DOCKER_HUB_REGISTRY];

#[derive(Debug, Deserialize, Default)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct AuthEntry {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Username and password for one registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode a base64 `user:password` value as stored in `auths.*.auth`.
    pub fn from_auth(encoded: &str) -> Result<Self> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| WatchError::config(format!("invalid docker auth entry: {}", e)))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| WatchError::config("docker auth entry is not UTF-8"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| WatchError::config("docker auth entry has no ':' separator"))?;
        Ok(Credentials::new(username, password))
    }

    /// Value for an `Authorization: Basic ...` header.
    pub fn basic_header(&self) -> String {
        let pair = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(pair))
    }
}

/// Credentials keyed by normalised registry host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerKeychain {
    auths: HashMap<String, Credentials>,
}

impl DockerKeychain {
    /// Read the keychain from the default Docker config location.
    ///
    /// A missing file yields an empty keychain. An unreadable or invalid file
    /// is logged and also treated as empty, so every pull stays anonymous.
    pub fn load() -> Self {
        let Some(path) = docker_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::from_path(&path) {
            Ok(keychain) => {
                tracing::debug!(path = %path.display(), registries = keychain.auths.len(), "loaded docker credentials");
                keychain
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring docker config");
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| WatchError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parse the contents of a Docker `config.json`.
    ///
    /// Entries with neither `auth` nor both `username` and `password` are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let file: DockerConfigFile = serde_json::from_str(text)
            .map_err(|e| WatchError::config(format!("invalid docker config: {}", e)))?;

        let mut auths = HashMap::new();
        for (key, entry) in file.auths {
            let credentials = match (entry.auth, entry.username, entry.password) {
                (Some(auth), _, _) if !auth.is_empty() => Credentials::from_auth(&auth)?,
                (_, Some(username), Some(password)) => Credentials::new(username, password),
                _ => continue,
            };
            auths.insert(normalize_host(&key), credentials);
        }

        Ok(DockerKeychain { auths })
    }

    /// Credentials for `registry` (a host such as `ghcr.io` or `localhost:5000`).
    pub fn resolve(&self, registry: &str) -> Option<&Credentials> {
        let host = normalize_host(registry);
        if let Some(credentials) = self.auths.get(&host) {
            return Some(credentials);
        }
        if DOCKER_HUB_ALIASES.contains(&host.as_str()) {
            return DOCKER_HUB_ALIASES
                .iter()
                .find_map(|alias| self.auths.get(*alias));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.auths.is_empty()
    }
}

/// `$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`.
pub fn docker_config_path() -> Option<PathBuf> {
    match std::env::var_os(DOCKER_CONFIG_ENV).filter(|v| !v.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir).join("config.json")),
        None => dirs::home_dir().map(|home| home.join(".docker").join("config.json")),
    }
}

/// Reduce an `auths` key like `https://index.docker.io/v1/` to its host.
fn normalize_host(key: &str) -> String {
    let key = key.trim();
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key).to_ascii_lowercase()
}
