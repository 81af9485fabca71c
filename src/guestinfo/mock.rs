//! In-memory guest-info for testing
//!
//! Provides a configurable guest-info store that can be used in unit and
//! integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{GuestInfo, normalize_value};
use crate::ProvisionError;

/// In-memory guest-info store
///
/// # Example
/// ```
/// use lb_provision::guestinfo::mock::MockGuestInfo;
///
/// let mock = MockGuestInfo::new()
///     .with_ovf_env("<Environment/>")
///     .with_property("network.hostname", "lb-01");
/// ```
pub struct MockGuestInfo {
    ovf_env: String,
    properties: HashMap<String, String>,
    variables: Mutex<HashMap<String, String>>,
    set_error: Option<String>,
}

impl MockGuestInfo {
    /// Create an empty store (no OVF environment, no keys)
    pub fn new() -> Self {
        Self {
            ovf_env: String::new(),
            properties: HashMap::new(),
            variables: Mutex::new(HashMap::new()),
            set_error: None,
        }
    }

    /// Set the raw OVF environment
    pub fn with_ovf_env(mut self, env: &str) -> Self {
        self.ovf_env = env.to_string();
        self
    }

    /// Set one OVF property
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Set several OVF properties
    pub fn with_properties<'a>(
        mut self,
        props: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        for (key, value) in props {
            self.properties.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Pre-populate a guestinfo variable
    pub fn with_variable(self, key: &str, value: &str) -> Self {
        self.lock().insert(key.to_string(), value.to_string());
        self
    }

    /// Configure `set` to fail
    pub fn with_set_error(mut self, error: &str) -> Self {
        self.set_error = Some(error.to_string());
        self
    }

    /// Raw value of a guestinfo variable as last written
    pub fn variable(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Drop all guestinfo variables, as a power cycle does
    pub fn clear_variables(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.variables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockGuestInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuestInfo for MockGuestInfo {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn ovf_env(&self) -> Result<String, ProvisionError> {
        Ok(self.ovf_env.clone())
    }

    async fn ovf_property(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        Ok(self.properties.get(key).and_then(|v| normalize_value(v)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        Ok(self.lock().get(key).and_then(|v| normalize_value(v)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ProvisionError> {
        if let Some(error) = &self.set_error {
            return Err(ProvisionError::GuestInfo(error.clone()));
        }
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
