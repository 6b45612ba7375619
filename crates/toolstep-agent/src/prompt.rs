//! Prompt builder — assembles the message list for each model call.
//!
//! System message: reasoning-level prefix, working rules, output-format
//! instructions, date, custom instructions. Then the conversation history.
//! Then a user message with the request, tool catalog, current plan, the
//! accumulated context (or the raw call transcript in history mode), and any
//! reminders queued by the loop's guards.

use toolstep_core::config::{ContextMode, ReasoningLevel};
use toolstep_core::types::Message;
use toolstep_core::utils::today_date;
use tracing::debug;

use crate::state::LoopState;

const RULES: &str = "\
## How to work
- Use only tools listed under \"Available tools\", one tool call per reply.
- Pass tool parameters exactly as the catalog names them.
- Keep your plan and update it when results change what is needed.
- Report progress with the step you are on, e.g. \"Step 2 of 4: read the config\".
- Do not repeat a call that already returned the information you need.
- When the context already answers the request, finish with action Done.";

/// Instruction prefix for a reasoning level.
pub fn reasoning_prefix(level: ReasoningLevel) -> &'static str {
    match level {
        ReasoningLevel::Low => {
            "You are a fast, pragmatic agent. Keep the plan short (one to three steps), \
             pick the most direct tool, and finish as soon as the request is answered."
        }
        ReasoningLevel::Medium => {
            "You are a methodical agent. Break the request into clear steps, use tools \
             to gather facts instead of guessing, and check each result before moving on."
        }
        ReasoningLevel::High => {
            "You are a meticulous agent. Build a thorough plan, verify every result, \
             cross-check important facts with a second source when one is available, \
             and revise the plan whenever the evidence contradicts it."
        }
    }
}

// ─────────────────────────────────────────────
// PromptBuilder
// ─────────────────────────────────────────────

/// Builds model requests for one agent run.
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    system: String,
    context_mode: ContextMode,
}

impl PromptBuilder {
    /// Create a builder; the system message is fixed for the whole run.
    pub fn new(
        level: ReasoningLevel,
        format_instructions: &str,
        custom_instructions: Option<&str>,
        context_mode: ContextMode,
    ) -> Self {
        let mut parts = vec![
            reasoning_prefix(level).to_string(),
            RULES.to_string(),
            format!("## Output format\n{format_instructions}"),
            format!("Today's date: {}", today_date()),
        ];
        if let Some(extra) = custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(format!("## Additional instructions\n{extra}"));
        }
        Self {
            system: parts.join("\n\n"),
            context_mode,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    /// Messages for the next model call.
    pub fn build(
        &self,
        request: &str,
        history: &[Message],
        catalog: &str,
        state: &LoopState,
        reminders: &[String],
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + state.chat_history.len() + 3);
        messages.push(Message::system(self.system.clone()));
        messages.extend(history.iter().cloned());

        let mut sections = vec![
            format!("## Request\n{}", request.trim()),
            format!("## Available tools\n{}", catalog.trim()),
        ];
        if !state.current_plan.is_empty() {
            sections.push(format!(
                "## Current plan\n{}",
                render_plan(&state.current_plan, state.current_step)
            ));
        }

        match self.context_mode {
            ContextMode::Synthesized => {
                let context = if state.context.trim().is_empty() {
                    "(nothing gathered yet)"
                } else {
                    state.context.as_str()
                };
                sections.push(format!("## Context\n{context}"));
                if !reminders.is_empty() {
                    sections.push(render_reminders(reminders));
                }
                messages.push(Message::user(sections.join("\n\n")));
            }
            ContextMode::History => {
                messages.push(Message::user(sections.join("\n\n")));
                messages.extend(state.chat_history.iter().cloned());
                if !reminders.is_empty() {
                    messages.push(Message::user(render_reminders(reminders)));
                }
            }
        }

        debug!(
            messages = messages.len(),
            chars = messages.iter().map(|m| m.content().len()).sum::<usize>(),
            reminders = reminders.len(),
            "built prompt"
        );
        messages
    }
}

/// Numbered plan with the active step marked.
fn render_plan(plan: &[String], current: usize) -> String {
    plan.iter()
        .enumerate()
        .map(|(i, step)| {
            let marker = if i == current { "  <- current" } else { "" };
            format!("{}. {step}{marker}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_reminders(reminders: &[String]) -> String {
    let lines: Vec<String> = reminders.iter().map(|r| format!("- {r}")).collect();
    format!("## Reminders\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(mode: ContextMode) -> PromptBuilder {
        PromptBuilder::new(ReasoningLevel::Medium, "FORMAT-RULES", Some("Answer in French."), mode)
    }

    #[test]
    fn test_system_prompt_parts() {
        let b = builder(ContextMode::Synthesized);
        let system = b.system_prompt();
        assert!(system.starts_with(reasoning_prefix(ReasoningLevel::Medium)));
        assert!(system.contains("FORMAT-RULES"));
        assert!(system.contains(&today_date()));
        assert!(system.contains("## Additional instructions\nAnswer in French."));
    }

    #[test]
    fn test_blank_custom_instructions_omitted() {
        let b = PromptBuilder::new(ReasoningLevel::Low, "F", Some("  "), ContextMode::Synthesized);
        assert!(!b.system_prompt().contains("Additional instructions"));
    }

    #[test]
    fn test_reasoning_prefixes_differ() {
        let low = reasoning_prefix(ReasoningLevel::Low);
        let high = reasoning_prefix(ReasoningLevel::High);
        assert_ne!(low, high);
        assert!(high.contains("meticulous"));
    }

    #[test]
    fn test_synthesized_layout() {
        let b = builder(ContextMode::Synthesized);
        let mut state = LoopState::new();
        state.current_plan = vec!["find file".into(), "read file".into()];
        state.current_step = 1;
        state.append_context("<tool_output step=\"1\" tool=\"find\">a.txt</tool_output>");

        let history = vec![Message::user("earlier"), Message::assistant("reply")];
        let messages = b.build("read a.txt", &history, "find: find files", &state, &["be brief".into()]);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role(), "system");
        assert_eq!(messages[1].content(), "earlier");
        let user = messages[3].content();
        assert!(user.contains("## Request\nread a.txt"));
        assert!(user.contains("## Available tools\nfind: find files"));
        assert!(user.contains("1. find file\n2. read file  <- current"));
        assert!(user.contains("## Context\n<tool_output"));
        assert!(user.contains("## Reminders\n- be brief"));
    }

    #[test]
    fn test_empty_context_placeholder() {
        let b = builder(ContextMode::Synthesized);
        let messages = b.build("hi", &[], "t", &LoopState::new(), &[]);
        let user = messages[1].content();
        assert!(user.contains("(nothing gathered yet)"));
        assert!(!user.contains("## Current plan"));
        assert!(!user.contains("## Reminders"));
    }

    #[test]
    fn test_history_mode_uses_transcript() {
        let b = builder(ContextMode::History);
        let mut state = LoopState::new();
        state.append_context("should not appear");
        state.chat_history.push(Message::assistant("call ls path=/"));
        state.chat_history.push(Message::user("bin\netc"));

        let messages = b.build("list root", &[], "ls", &state, &["move on".into()]);
        assert_eq!(messages.len(), 5);
        assert!(!messages[1].content().contains("should not appear"));
        assert_eq!(messages[2].content(), "call ls path=/");
        assert_eq!(messages[3].content(), "bin\netc");
        assert!(messages[4].content().contains("- move on"));
    }
}
