//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent input history.
//! The conversation itself lives in memory for the session only.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use toolstep_agent::{AgentEvent, AgentLoop};
use toolstep_core::config::Verbosity;
use toolstep_core::types::Message;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    ListTools,
    Clear,
    Request(&'a str),
}

fn classify(input: &str) -> Option<Command<'_>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if EXIT_COMMANDS.contains(&lower.as_str()) {
        return Some(Command::Exit);
    }
    Some(match lower.as_str() {
        "/tools" => Command::ListTools,
        "/clear" => Command::Clear,
        _ => Command::Request(trimmed),
    })
}

/// Run the interactive REPL loop.
pub async fn run(
    agent: AgentLoop,
    mut events: UnboundedReceiver<AgentEvent>,
    display: Verbosity,
) -> Result<()> {
    helpers::print_banner();

    let mut editor = create_editor()?;
    let mut history: Vec<Message> = Vec::new();

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let Some(command) = classify(&input) else {
            continue;
        };
        let _ = editor.add_history_entry(input.trim());

        match command {
            Command::Exit => {
                println!("\nGoodbye!");
                break;
            }
            Command::ListTools => match agent.catalog().await {
                Ok(catalog) if catalog.is_empty() => helpers::print_warning("no tools available"),
                Ok(catalog) => println!("{catalog}\n"),
                Err(e) => helpers::print_warning(&format!("could not list tools: {e}")),
            },
            Command::Clear => {
                history.clear();
                println!("Conversation cleared.\n");
            }
            Command::Request(request) => {
                debug!(input = request, history = history.len(), "processing input");
                let result = tokio::select! {
                    result = crate::respond(&agent, &mut events, display, request, &history) => Some(result),
                    _ = tokio::signal::ctrl_c() => None,
                };

                match result {
                    Some(Ok(answer)) => {
                        helpers::print_response(&answer);
                        history.push(Message::user(request));
                        history.push(Message::assistant(answer));
                    }
                    Some(Err(e)) => eprintln!("\nError: {e:#}\n"),
                    None => {
                        helpers::clear_thinking();
                        // Drop events from the cancelled run.
                        while events.try_recv().is_ok() {}
                        helpers::print_warning("\ncancelled\n");
                    }
                }
            }
        }
    }

    save_history(&mut editor);
    Ok(())
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn history_path() -> std::path::PathBuf {
    toolstep_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
