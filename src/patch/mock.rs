use std::cell::RefCell;

use crate::error::{Result, WatchError};
use crate::patch::{ConfigPatcher, PatchOutcome};

/// Mock patcher for testing without touching files
pub struct MockPatcher {
    calls: RefCell<Vec<(String, String)>>,
    failure: Option<String>,
}

impl MockPatcher {
    /// Create a patcher that accepts every call
    pub fn new() -> Self {
        MockPatcher {
            calls: RefCell::new(Vec::new()),
            failure: None,
        }
    }

    /// Create a patcher that fails every call with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        MockPatcher {
            calls: RefCell::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    /// `(service, tag)` pairs received so far, in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }
}

impl Default for MockPatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPatcher for MockPatcher {
    fn apply(&self, service: &str, tag: &str) -> Result<PatchOutcome> {
        self.calls
            .borrow_mut()
            .push((service.to_string(), tag.to_string()));

        match &self.failure {
            Some(reason) => Err(WatchError::patch(reason.clone())),
            None => Ok(PatchOutcome::Updated(1)),
        }
    }
}
