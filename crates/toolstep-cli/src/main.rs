//! Toolstep CLI — entry point.
//!
//! # Commands
//!
//! - `toolstep agent [-m MESSAGE] [-d DISPLAY] [--logs]` — single-shot or REPL
//! - `toolstep tools [--format FORMAT]` — print the tool catalog
//! - `toolstep call <TOOL> [KEY=VALUE..]` — invoke one tool through the guarded invoker
//! - `toolstep status` — show configuration and provider status

mod display;
mod helpers;
mod repl;
mod status;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use toolstep_agent::{AgentError, AgentEvent, AgentLoop, AgentSettings, ProcessToolHost, ToolInvoker};
use toolstep_core::config::{load_config, CatalogFormat, Config, Verbosity};
use toolstep_core::types::Message;
use toolstep_providers::create_provider;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Toolstep — plan/act/observe agent over an external tool host
#[derive(Parser)]
#[command(name = "toolstep", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent (single-shot or interactive REPL)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// What to show while the loop runs (verbose, plan, progress, reason, quiet)
        #[arg(short, long)]
        display: Option<Verbosity>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Print the tool catalog
    Tools {
        /// Catalog format (quiet, simple, markdown, xml, json)
        #[arg(short, long)]
        format: Option<CatalogFormat>,
    },

    /// Invoke a single tool
    Call {
        /// Tool name
        tool: String,

        /// Parameters as key=value
        args: Vec<String>,
    },

    /// Show configuration and provider status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent {
            message,
            display,
            logs,
        } => {
            init_logging(logs);
            run_agent(message, display).await
        }
        Commands::Tools { format } => {
            init_logging(false);
            run_tools(format).await
        }
        Commands::Call { tool, args } => {
            init_logging(false);
            run_call(&tool, &args).await
        }
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Agent command
// ─────────────────────────────────────────────

async fn run_agent(message: Option<String>, display: Option<Verbosity>) -> Result<()> {
    let config = load_config(None);
    let display = display.unwrap_or(config.agent.display);
    let (tx, mut events) = mpsc::unbounded_channel();
    let agent = build_agent_loop(&config)?.with_events(tx);

    match message {
        Some(msg) => {
            info!("processing single message");
            let answer = respond(&agent, &mut events, display, &msg, &[])
                .await
                .context("agent run failed")?;
            helpers::print_response(&answer);
        }
        None => {
            repl::run(agent, events, display).await?;
        }
    }

    Ok(())
}

/// Run the loop on `input`, then ask the model for the final answer.
///
/// An unreadable tool catalog is not fatal here: the request is answered
/// without tools.
pub async fn respond(
    agent: &AgentLoop,
    events: &mut mpsc::UnboundedReceiver<AgentEvent>,
    display: Verbosity,
    input: &str,
    history: &[Message],
) -> Result<String> {
    let augmented = match display::run_displayed(agent, events, display, input, history).await {
        Ok(outcome) => {
            info!(
                steps = outcome.steps,
                termination = outcome.termination.describe(),
                "loop finished, requesting final answer"
            );
            outcome.text
        }
        Err(AgentError::Catalog(e)) => {
            warn!(error = %e, "tool catalog unavailable, answering without tools");
            helpers::print_warning(&format!("tools unavailable ({e}); answering directly"));
            input.to_string()
        }
        Err(e) => return Err(e.into()),
    };

    helpers::print_thinking();
    let answer = agent.answer(&augmented, history).await;
    helpers::clear_thinking();
    Ok(answer?)
}

/// Build an `AgentLoop` from the loaded configuration.
pub fn build_agent_loop(config: &Config) -> Result<AgentLoop> {
    let providers_map = config.providers.to_map();
    let provider = create_provider(&config.agent.model, &providers_map).map_err(|e| anyhow::anyhow!(e))?;
    let host = ProcessToolHost::from_config(&config.tools);

    Ok(AgentLoop::new(
        Arc::new(provider),
        Arc::new(host),
        AgentSettings::from_config(config),
    ))
}

fn build_invoker(config: &Config) -> ToolInvoker {
    let host = ProcessToolHost::from_config(&config.tools);
    ToolInvoker::new(Arc::new(host), Duration::from_secs(config.tools.timeout.max(1)))
}

// ─────────────────────────────────────────────
// Tool commands
// ─────────────────────────────────────────────

async fn run_tools(format: Option<CatalogFormat>) -> Result<()> {
    let config = load_config(None);
    let format = format.unwrap_or(config.tools.catalog_format);
    let catalog = build_invoker(&config)
        .catalog(format)
        .await
        .with_context(|| format!("failed to list tools via '{}'", config.tools.command))?;

    if catalog.is_empty() {
        helpers::print_warning("the tool host reported no tools");
    } else {
        println!("{catalog}");
    }
    Ok(())
}

async fn run_call(tool: &str, args: &[String]) -> Result<()> {
    let config = load_config(None);
    let output = build_invoker(&config)
        .call(tool, args)
        .await
        .with_context(|| format!("tool '{tool}' failed"))?;

    if output.is_empty() {
        helpers::print_warning("(no output)");
    } else {
        println!("{output}");
    }
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("toolstep=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agent_flags() {
        let cli = Cli::try_parse_from(["toolstep", "agent", "-m", "hi", "-d", "verbose"]).unwrap();
        match cli.command {
            Commands::Agent { message, display, logs } => {
                assert_eq!(message.as_deref(), Some("hi"));
                assert_eq!(display, Some(Verbosity::Verbose));
                assert!(!logs);
            }
            _ => panic!("expected agent command"),
        }
    }

    #[test]
    fn parses_call_args() {
        let cli = Cli::try_parse_from(["toolstep", "call", "read_file", "path=a.txt", "lines=10"]).unwrap();
        match cli.command {
            Commands::Call { tool, args } => {
                assert_eq!(tool, "read_file");
                assert_eq!(args, vec!["path=a.txt", "lines=10"]);
            }
            _ => panic!("expected call command"),
        }
    }

    #[test]
    fn rejects_unknown_catalog_format() {
        assert!(Cli::try_parse_from(["toolstep", "tools", "--format", "yaml"]).is_err());
        let cli = Cli::try_parse_from(["toolstep", "tools", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tools { format: Some(CatalogFormat::Json) }
        ));
    }
}
