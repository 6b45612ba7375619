//! Tool invoker — validates calls and enforces the deadline.
//!
//! Tool names come straight from model output, so they are checked for shell
//! metacharacters before a host ever sees them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use toolstep_core::config::CatalogFormat;

use super::base::ToolHost;
use crate::error::ToolError;

/// Characters a tool name may never contain.
const SHELL_METACHARS: &[char] = &[';', '&', '|', '<', '>', '$', '\\', '"', '\'', '`'];

/// Reject empty names and names carrying shell metacharacters.
pub fn validate_tool_name(name: &str) -> Result<&str, ToolError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(SHELL_METACHARS) {
        warn!(tool = %name, "tool name rejected by safety guard");
        return Err(ToolError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(trimmed)
}

/// Drop blank arguments and trim the rest.
pub fn clean_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

// ─────────────────────────────────────────────
// ToolInvoker
// ─────────────────────────────────────────────

/// Guarded front door to a [`ToolHost`].
#[derive(Clone)]
pub struct ToolInvoker {
    host: Arc<dyn ToolHost>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(host: Arc<dyn ToolHost>, timeout: Duration) -> Self {
        Self { host, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call a tool under the deadline.
    ///
    /// Output is trimmed; an empty result is `Ok("")`, not an error.
    pub async fn call(&self, name: &str, args: &[String]) -> Result<String, ToolError> {
        let name = validate_tool_name(name)?;
        let args = clean_args(args);

        info!(tool = %name, args = ?args, "invoking tool");
        let result = tokio::time::timeout(self.timeout, self.host.call_tool(name, &args)).await;

        match result {
            Ok(Ok(output)) => Ok(output.trim().to_string()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(tool = %name, timeout = ?self.timeout, "tool call timed out");
                Err(ToolError::Timeout {
                    tool: name.to_string(),
                    after: self.timeout,
                })
            }
        }
    }

    /// Fetch the tool catalog under the same deadline.
    pub async fn catalog(&self, format: CatalogFormat) -> Result<String, ToolError> {
        match tokio::time::timeout(self.timeout, self.host.list_tools(format)).await {
            Ok(listing) => listing.map(|text| text.trim().to_string()),
            Err(_) => Err(ToolError::Timeout {
                tool: "list".to_string(),
                after: self.timeout,
            }),
        }
    }
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
