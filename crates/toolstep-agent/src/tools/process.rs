//! Process tool host — runs the external tool command in a subprocess.
//!
//! Catalog: `<command> [args..] list [-q|-m|-x|-j]`
//! Call:    `<command> [args..] call [-j|-x] <tool> [key=value..]`

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use toolstep_core::config::{CatalogFormat, ToolOutputFormat, ToolsConfig};
use toolstep_core::utils::expand_home;

use super::base::ToolHost;
use crate::error::ToolError;

/// Maximum stderr kept in a failure message (characters).
const MAX_STDERR_LEN: usize = 2_000;

// ─────────────────────────────────────────────
// ProcessToolHost
// ─────────────────────────────────────────────

/// Tool host backed by an external command.
#[derive(Clone, Debug)]
pub struct ProcessToolHost {
    /// Executable to run.
    program: PathBuf,
    /// Arguments placed before the `list`/`call` subcommand.
    base_args: Vec<String>,
    /// Output format requested for tool calls.
    output_format: ToolOutputFormat,
}

impl ProcessToolHost {
    pub fn new(
        program: impl Into<PathBuf>,
        base_args: Vec<String>,
        output_format: ToolOutputFormat,
    ) -> Self {
        Self {
            program: program.into(),
            base_args,
            output_format,
        }
    }

    /// Build from the `tools` config section (`~` in the command is expanded).
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(
            expand_home(&config.command),
            config.args.clone(),
            config.output_format,
        )
    }

    fn catalog_flag(format: CatalogFormat) -> Option<&'static str> {
        match format {
            CatalogFormat::Quiet => Some("-q"),
            CatalogFormat::Simple => None,
            CatalogFormat::Markdown => Some("-m"),
            CatalogFormat::Xml => Some("-x"),
            CatalogFormat::Json => Some("-j"),
        }
    }

    fn output_flag(&self) -> Option<&'static str> {
        match self.output_format {
            ToolOutputFormat::Text => None,
            ToolOutputFormat::Json => Some("-j"),
            ToolOutputFormat::Xml => Some("-x"),
        }
    }

    /// Spawn the command and collect stdout.
    ///
    /// The child is killed if the returned future is dropped, so an outer
    /// deadline or cancellation never leaves it running.
    async fn run(&self, label: &str, args: Vec<String>) -> Result<String, ToolError> {
        debug!(program = %self.program.display(), args = ?args, "spawning tool host");

        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: label.to_string(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ToolError::Spawn {
                tool: label.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            stderr = stdout.trim().to_string();
        }
        if stderr.chars().count() > MAX_STDERR_LEN {
            stderr = toolstep_core::utils::truncate_string(&stderr, MAX_STDERR_LEN);
        }
        warn!(tool = label, code = ?output.status.code(), "tool host exited with failure");
        Err(ToolError::Failed {
            tool: label.to_string(),
            code: output.status.code(),
            stderr,
        })
    }
}

#[async_trait]
impl ToolHost for ProcessToolHost {
    async fn list_tools(&self, format: CatalogFormat) -> Result<String, ToolError> {
        let mut args = vec!["list".to_string()];
        args.extend(Self::catalog_flag(format).map(String::from));
        self.run("list", args).await
    }

    async fn call_tool(&self, name: &str, args: &[String]) -> Result<String, ToolError> {
        let mut full = vec!["call".to_string()];
        full.extend(self.output_flag().map(String::from));
        full.push(name.to_string());
        full.extend(args.iter().cloned());
        self.run(name, full).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
