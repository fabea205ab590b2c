use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Result, WatchError};
use crate::registry::Registry;

/// Mock registry for testing without network access
pub struct MockRegistry {
    tags: HashMap<String, Vec<String>>,
    failures: HashMap<String, String>,
    queried: RefCell<Vec<String>>,
}

impl MockRegistry {
    /// Create a new empty mock registry
    pub fn new() -> Self {
        MockRegistry {
            tags: HashMap::new(),
            failures: HashMap::new(),
            queried: RefCell::new(Vec::new()),
        }
    }

    /// Publish tags for an image
    pub fn with_tags<I, S>(mut self, image: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(image.into(), tags.into_iter().map(Into::into).collect());
        self
    }

    /// Make listing tags for an image fail
    pub fn with_failure(mut self, image: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(image.into(), reason.into());
        self
    }

    /// Images queried so far, in call order
    pub fn queried(&self) -> Vec<String> {
        self.queried.borrow().clone()
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for MockRegistry {
    fn list_tags(&self, image: &str) -> Result<Vec<String>> {
        self.queried.borrow_mut().push(image.to_string());

        if let Some(reason) = self.failures.get(image) {
            return Err(WatchError::registry(reason.clone()));
        }

        self.tags
            .get(image)
            .cloned()
            .ok_or_else(|| WatchError::registry(format!("repository not found: {}", image)))
    }
}
