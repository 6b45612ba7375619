//! Prints agent events while a run is in flight, filtered by verbosity.

use colored::Colorize;
use tokio::sync::mpsc::UnboundedReceiver;

use toolstep_agent::{AgentError, AgentEvent, AgentLoop, RunOutcome};
use toolstep_core::config::Verbosity;
use toolstep_core::types::Message;
use toolstep_core::utils::truncate_string;

/// Tool output longer than this is cut in verbose mode (characters).
const MAX_RESULT_PREVIEW: usize = 500;

/// Drive `agent.run` and print its events as they arrive.
pub async fn run_displayed(
    agent: &AgentLoop,
    events: &mut UnboundedReceiver<AgentEvent>,
    display: Verbosity,
    input: &str,
    history: &[Message],
) -> Result<RunOutcome, AgentError> {
    let run = agent.run(input, history);
    tokio::pin!(run);

    loop {
        tokio::select! {
            outcome = &mut run => {
                while let Ok(event) = events.try_recv() {
                    print_event(&event, display);
                }
                return outcome;
            }
            Some(event) = events.recv() => print_event(&event, display),
        }
    }
}

fn print_event(event: &AgentEvent, display: Verbosity) {
    let Some(line) = describe(event, display) else {
        return;
    };
    match event {
        AgentEvent::Warning(_) | AgentEvent::ToolFailed { .. } => eprintln!("{}", line.yellow()),
        AgentEvent::ToolResult { .. } | AgentEvent::Reasoning(_) => eprintln!("{}", line.dimmed()),
        _ => eprintln!("{line}"),
    }
}

/// Plain-text rendering of an event, or `None` when `display` hides it.
pub fn describe(event: &AgentEvent, display: Verbosity) -> Option<String> {
    use Verbosity::*;

    match event {
        AgentEvent::Plan { steps, current } if matches!(display, Verbose | Plan) => {
            let lines: Vec<String> = steps
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let marker = if i == *current { ">" } else { " " };
                    format!("  {marker} {}. {s}", i + 1)
                })
                .collect();
            Some(format!("plan:\n{}", lines.join("\n")))
        }
        AgentEvent::Progress(text) if matches!(display, Verbose | Plan | Progress) => {
            Some(format!("» {text}"))
        }
        AgentEvent::Reasoning(text) if matches!(display, Verbose | Reason) => {
            Some(format!("  {text}"))
        }
        AgentEvent::ToolCall { tool, args } if display == Verbose => {
            Some(format!("→ {tool} {}", args.join(" ")).trim_end().to_string())
        }
        AgentEvent::ToolResult { tool, output } if display == Verbose => {
            let body = if output.is_empty() {
                "(no output)".to_string()
            } else {
                truncate_string(output, MAX_RESULT_PREVIEW)
            };
            Some(format!("← {tool}: {body}"))
        }
        AgentEvent::ToolFailed { tool, error } if display != Quiet && display != Reason => {
            Some(format!("✗ {tool}: {error}"))
        }
        AgentEvent::Warning(text) => Some(format!("! {text}")),
        AgentEvent::Finished(termination) if display == Verbose => {
            Some(format!("done: {}", termination.describe()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolstep_agent::Termination;

    #[test]
    fn warnings_always_shown() {
        let warning = AgentEvent::Warning("stuck".into());
        for display in [
            Verbosity::Verbose,
            Verbosity::Plan,
            Verbosity::Progress,
            Verbosity::Reason,
            Verbosity::Quiet,
        ] {
            assert_eq!(describe(&warning, display).as_deref(), Some("! stuck"));
        }
    }

    #[test]
    fn quiet_hides_progress_and_tools() {
        assert!(describe(&AgentEvent::Progress("p".into()), Verbosity::Quiet).is_none());
        let call = AgentEvent::ToolCall {
            tool: "ls".into(),
            args: vec![],
        };
        assert!(describe(&call, Verbosity::Quiet).is_none());
        assert!(describe(&call, Verbosity::Progress).is_none());
        assert_eq!(describe(&call, Verbosity::Verbose).as_deref(), Some("→ ls"));
    }

    #[test]
    fn reason_mode_shows_reasoning_only() {
        assert!(describe(&AgentEvent::Reasoning("why".into()), Verbosity::Reason).is_some());
        assert!(describe(&AgentEvent::Progress("p".into()), Verbosity::Reason).is_none());
        assert!(describe(&AgentEvent::Reasoning("why".into()), Verbosity::Progress).is_none());
    }

    #[test]
    fn plan_marks_current_step() {
        let plan = AgentEvent::Plan {
            steps: vec!["find".into(), "read".into()],
            current: 1,
        };
        let text = describe(&plan, Verbosity::Plan).unwrap();
        assert_eq!(text, "plan:\n    1. find\n  > 2. read");
        assert!(describe(&plan, Verbosity::Progress).is_none());
    }

    #[test]
    fn empty_result_labelled() {
        let result = AgentEvent::ToolResult {
            tool: "grep".into(),
            output: String::new(),
        };
        assert_eq!(
            describe(&result, Verbosity::Verbose).as_deref(),
            Some("← grep: (no output)")
        );
    }

    #[test]
    fn finished_only_in_verbose() {
        let done = AgentEvent::Finished(Termination::StepLimit);
        assert_eq!(
            describe(&done, Verbosity::Verbose).as_deref(),
            Some("done: step limit reached")
        );
        assert!(describe(&done, Verbosity::Plan).is_none());
    }
}
