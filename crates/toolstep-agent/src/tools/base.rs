//! ToolHost trait — the external service that lists and runs tools.
//!
//! The loop never talks to a host directly; it goes through
//! [`super::invoker::ToolInvoker`], which validates names and enforces the
//! deadline before anything reaches the host.

use async_trait::async_trait;
use toolstep_core::config::CatalogFormat;

use crate::error::ToolError;

// ─────────────────────────────────────────────
// ToolHost trait
// ─────────────────────────────────────────────

/// A tool catalog and execution service.
///
/// [`super::process::ProcessToolHost`] shells out to an external command;
/// tests substitute in-memory hosts.
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Textual catalog of available tools. Empty means "no tools".
    async fn list_tools(&self, format: CatalogFormat) -> Result<String, ToolError>;

    /// Run one tool with already-validated `key=value` arguments.
    ///
    /// Returns raw stdout. Non-zero exits are [`ToolError::Failed`].
    async fn call_tool(&self, name: &str, args: &[String]) -> Result<String, ToolError>;
}
