//! CI output variables
//!
//! The run result is published as `key=value` lines appended to the file
//! named by an environment variable (GitHub Actions' `GITHUB_OUTPUT`). Without
//! that file the legacy `::set-output` workflow command is printed instead.

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only sink for CI output variables.
pub trait OutputSink {
    /// Publish one variable. Never fails the run.
    fn emit(&self, key: &str, value: &str);
}

/// Format a variable in the legacy workflow command syntax.
pub fn legacy_set_output(key: &str, value: &str) -> String {
    format!("::set-output name={}::{}", key, value)
}

/// GitHub Actions style output file
pub struct GithubOutput {
    path: Option<PathBuf>,
}

impl GithubOutput {
    pub fn new(path: Option<PathBuf>) -> Self {
        GithubOutput { path }
    }

    /// Use the file named by environment variable `var`, if set and non-empty.
    pub fn from_env(var: &str) -> Self {
        let path = std::env::var_os(var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(path)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl OutputSink for GithubOutput {
    fn emit(&self, key: &str, value: &str) {
        let file = self.path.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    tracing::debug!(path = %path.display(), error = %e, "cannot open output file");
                })
                .ok()
        });

        let Some(mut file) = file else {
            println!("{}", legacy_set_output(key, value));
            return;
        };

        if let Err(e) = writeln!(file, "{}={}", key, value) {
            tracing::warn!(key, error = %e, "failed to write CI output");
        }
    }
}

/// Collects emitted variables in memory
#[derive(Default)]
pub struct MemoryOutput {
    entries: RefCell<Vec<(String, String)>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitted `(key, value)` pairs in order
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.borrow().clone()
    }

    /// Last value emitted for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .borrow()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

impl OutputSink for MemoryOutput {
    fn emit(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .push((key.to_string(), value.to_string()));
    }
}
