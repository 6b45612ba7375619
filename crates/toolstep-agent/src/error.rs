//! Error types for the agent crate.
//!
//! Only [`AgentError`] ever leaves [`crate::AgentLoop::run`]; parse and tool
//! failures are recovered inside the loop and fed back to the model.

use std::time::Duration;

use thiserror::Error;
use toolstep_providers::ProviderError;

/// A model turn that could not be decoded into a [`crate::step::Step`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model response is empty")]
    Empty,

    #[error("no JSON object found in model response")]
    NoJson,

    #[error("invalid step JSON: {0}")]
    InvalidJson(String),

    #[error("response has no <call> block")]
    MissingCallBlock,
}

/// Failure of a single tool invocation or catalog query.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool name '{name}': contains shell metacharacters or is empty")]
    InvalidName { name: String },

    #[error("tool '{tool}' timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("tool '{tool}' exited with {}: {stderr}", exit_label(.code))]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn tool host for '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "signal".to_string(),
    }
}

impl ToolError {
    /// Whether this is a deadline expiry rather than a tool-side failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

/// Fatal errors returned by the agent loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model channel failed; the run cannot continue.
    #[error("model channel error: {0}")]
    Channel(#[from] ProviderError),

    /// The tool catalog could not be read.
    #[error("tool catalog unavailable: {0}")]
    Catalog(#[source] ToolError),
}
