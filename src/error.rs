//! Error types for lb-provision

use thiserror::Error;

/// Main error type for provisioning and CA generation
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required configuration: {}", keys.join(", "))]
    MissingRequired { keys: Vec<String> },

    #[error("Guestinfo error: {0}")]
    GuestInfo(String),

    #[error("No network interface backed by PCI device {0}")]
    NoInterfaceForPci(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ProvisionError {
    /// Create a step error
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Whether the first-boot run should still exit with status 0.
    ///
    /// A missing required key aborts provisioning before anything is
    /// written; the next boot cycle is the only retry.
    pub fn exits_cleanly(&self) -> bool {
        matches!(self, Self::MissingRequired { .. })
    }
}
