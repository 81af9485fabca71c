//! `ovf-rpctool` backed guest-info
//!
//! Subcommands used:
//! - `get.ovf` - dump the OVF environment
//! - `get.ovf <key>` - read one OVF property
//! - `get <key>` / `set <key> <value>` - guestinfo variables

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{GuestInfo, normalize_value};
use crate::ProvisionError;

/// Default tool name, resolved through `PATH`
pub const DEFAULT_RPCTOOL: &str = "ovf-rpctool";

/// Guest-info access through the `ovf-rpctool` binary
pub struct RpcTool {
    program: String,
}

impl RpcTool {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_RPCTOOL)
    }

    /// Use a specific tool binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run a query subcommand. A non-zero exit with no output means the key
    /// is not set; anything else on a failed exit is an error.
    async fn query(&self, args: &[&str]) -> Result<Option<String>, ProvisionError> {
        debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| ProvisionError::Command(format!("{}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            if stdout.trim().is_empty() {
                debug!("{} {:?}: no value", self.program, args);
                return Ok(None);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::GuestInfo(format!(
                "{} {:?} exited with {}: {}",
                self.program,
                args,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(normalize_value(&stdout))
    }
}

impl Default for RpcTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuestInfo for RpcTool {
    fn name(&self) -> &'static str {
        "ovf-rpctool"
    }

    async fn ovf_env(&self) -> Result<String, ProvisionError> {
        Ok(self.query(&["get.ovf"]).await?.unwrap_or_default())
    }

    async fn ovf_property(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        self.query(&["get.ovf", key]).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        self.query(&["get", key]).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ProvisionError> {
        debug!("Setting guestinfo key {} ({} bytes)", key, value.len());

        let output = Command::new(&self.program)
            .args(["set", key, value])
            .output()
            .await
            .map_err(|e| ProvisionError::Command(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::GuestInfo(format!(
                "Failed to set {}: {}",
                key,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_is_command_error() {
        let tool = RpcTool::with_program("/nonexistent/ovf-rpctool");
        let err = tool.get("guestinfo.userdata").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Command(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_query_without_output_is_unset() {
        // `false` ignores its arguments and exits 1 with no output
        let tool = RpcTool::with_program("false");
        assert_eq!(tool.get("guestinfo.metadata").await.unwrap(), None);
        assert_eq!(tool.ovf_env().await.unwrap(), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_output_is_normalized() {
        // `echo get network.hostname` -> "get network.hostname\n"
        let tool = RpcTool::with_program("echo");
        assert_eq!(
            tool.get("network.hostname").await.unwrap(),
            Some("get network.hostname".to_string())
        );
    }
}
