//! Manifest persistence
//!
//! [`ManifestStore`] loads and saves the release manifest. The file-backed
//! [`JsonManifestStore`] is used by the binary; [`MemoryManifestStore`] records
//! writes for tests.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::domain::ReleaseManifest;
use crate::error::{Result, WatchError};

/// Loads and persists the release manifest.
pub trait ManifestStore {
    /// Read the manifest. Any failure here aborts the run.
    fn load(&self) -> Result<ReleaseManifest>;

    /// Replace the stored manifest with `manifest`.
    fn save(&self, manifest: &ReleaseManifest) -> Result<()>;
}

/// Manifest stored as a JSON file.
pub struct JsonManifestStore {
    path: PathBuf,
}

impl JsonManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonManifestStore { path: path.into() }
    }
}

/// Render a manifest as 4-space indented JSON without a trailing newline.
pub fn to_pretty_json(manifest: &ReleaseManifest) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    manifest.serialize(&mut serializer)?;
    Ok(buf)
}

impl ManifestStore for JsonManifestStore {
    fn load(&self) -> Result<ReleaseManifest> {
        let data = fs::read(&self.path).map_err(|source| WatchError::ManifestRead {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| WatchError::ManifestParse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, manifest: &ReleaseManifest) -> Result<()> {
        let data = to_pretty_json(manifest)?;
        fs::write(&self.path, data).map_err(|source| WatchError::ManifestWrite {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-memory store for testing without touching the filesystem
pub struct MemoryManifestStore {
    manifest: RefCell<ReleaseManifest>,
    saves: RefCell<Vec<ReleaseManifest>>,
    fail_save: bool,
}

impl MemoryManifestStore {
    pub fn new(manifest: ReleaseManifest) -> Self {
        MemoryManifestStore {
            manifest: RefCell::new(manifest),
            saves: RefCell::new(Vec::new()),
            fail_save: false,
        }
    }

    /// Make every `save` fail with a write error
    pub fn failing_saves(mut self) -> Self {
        self.fail_save = true;
        self
    }

    /// Current stored manifest
    pub fn current(&self) -> ReleaseManifest {
        self.manifest.borrow().clone()
    }

    /// Every manifest passed to `save`, oldest first
    pub fn saves(&self) -> Vec<ReleaseManifest> {
        self.saves.borrow().clone()
    }
}

impl ManifestStore for MemoryManifestStore {
    fn load(&self) -> Result<ReleaseManifest> {
        Ok(self.manifest.borrow().clone())
    }

    fn save(&self, manifest: &ReleaseManifest) -> Result<()> {
        if self.fail_save {
            return Err(WatchError::ManifestWrite {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.saves.borrow_mut().push(manifest.clone());
        *self.manifest.borrow_mut() = manifest.clone();
        Ok(())
    }
}
