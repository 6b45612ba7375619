//! LoopState — everything one agent run accumulates.
//!
//! Created fresh by [`crate::AgentLoop::run`], mutated only by it, and dropped
//! when the run returns (or is cancelled).

use toolstep_core::types::Message;

/// Per-run state of the agent loop.
#[derive(Clone, Debug, Default)]
pub struct LoopState {
    /// Model calls attempted so far.
    pub step_count: u32,
    /// Append-only tool output, reasoning and pagination hints.
    pub context: String,
    /// Append-only call/result transcript, for history context mode.
    pub chat_history: Vec<Message>,
    /// Last plan the model reported.
    pub current_plan: Vec<String>,
    /// Zero-based index of the active plan step.
    pub current_step: usize,
    /// Most recent progress note.
    pub last_progress: String,

    pub last_tool_name: Option<String>,
    pub repeat_count: u32,

    pub last_step_number: Option<usize>,
    pub step_stuck_count: u32,

    pub last_progress_text: Option<String>,
    pub progress_repeat_count: u32,

    /// Consecutive tool calls that returned nothing.
    pub no_result_count: u32,

    /// Token from the latest pagination hint, if more pages are pending.
    pub page_token: Option<String>,

    /// Directives for the next prompt only.
    reminders: Vec<String>,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool call; returns the consecutive-repeat count.
    ///
    /// A call that continues pagination keeps the count unchanged.
    pub fn record_tool(&mut self, name: &str, continues_pagination: bool) -> u32 {
        if self.last_tool_name.as_deref() == Some(name) {
            if !continues_pagination {
                self.repeat_count += 1;
            }
        } else {
            self.last_tool_name = Some(name.to_string());
            self.repeat_count = 1;
        }
        self.repeat_count
    }

    /// Record the reported step number; returns how many consecutive turns
    /// have reported it (1 on a change).
    pub fn record_step_number(&mut self, number: usize) -> u32 {
        if self.last_step_number == Some(number) {
            self.step_stuck_count += 1;
        } else {
            self.last_step_number = Some(number);
            self.step_stuck_count = 1;
        }
        self.step_stuck_count
    }

    /// Record the progress note; returns how many consecutive turns have
    /// repeated it verbatim (1 on a change).
    pub fn record_progress(&mut self, progress: &str) -> u32 {
        let progress = progress.trim();
        if self.last_progress_text.as_deref() == Some(progress) {
            self.progress_repeat_count += 1;
        } else {
            self.last_progress_text = Some(progress.to_string());
            self.progress_repeat_count = 1;
        }
        self.progress_repeat_count
    }

    /// Count an empty tool result; returns the consecutive count.
    pub fn record_empty_result(&mut self) -> u32 {
        self.no_result_count += 1;
        self.no_result_count
    }

    pub fn reset_empty_results(&mut self) {
        self.no_result_count = 0;
    }

    /// Append a block to the context, separated by a blank line.
    pub fn append_context(&mut self, block: &str) {
        let block = block.trim();
        if block.is_empty() {
            return;
        }
        if !self.context.is_empty() {
            self.context.push_str("\n\n");
        }
        self.context.push_str(block);
    }

    /// Queue a directive for the next prompt.
    pub fn remind(&mut self, directive: impl Into<String>) {
        self.reminders.push(directive.into());
    }

    /// Take the queued directives, leaving none.
    pub fn take_reminders(&mut self) -> Vec<String> {
        std::mem::take(&mut self.reminders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_count_resets_on_new_tool() {
        let mut state = LoopState::new();
        assert_eq!(state.record_tool("ls", false), 1);
        assert_eq!(state.record_tool("ls", false), 2);
        assert_eq!(state.record_tool("cat", false), 1);
        assert_eq!(state.last_tool_name.as_deref(), Some("cat"));
    }

    #[test]
    fn test_pagination_does_not_count() {
        let mut state = LoopState::new();
        state.record_tool("list", false);
        assert_eq!(state.record_tool("list", true), 1);
        assert_eq!(state.record_tool("list", true), 1);
        assert_eq!(state.record_tool("list", false), 2);
    }

    #[test]
    fn test_step_stuck_count() {
        let mut state = LoopState::new();
        assert_eq!(state.record_step_number(1), 1);
        assert_eq!(state.record_step_number(1), 2);
        assert_eq!(state.record_step_number(1), 3);
        assert_eq!(state.record_step_number(2), 1);
    }

    #[test]
    fn test_progress_repeat_ignores_surrounding_whitespace() {
        let mut state = LoopState::new();
        assert_eq!(state.record_progress("reading file"), 1);
        assert_eq!(state.record_progress(" reading file\n"), 2);
        assert_eq!(state.record_progress("read file"), 1);
    }

    #[test]
    fn test_empty_results() {
        let mut state = LoopState::new();
        assert_eq!(state.record_empty_result(), 1);
        assert_eq!(state.record_empty_result(), 2);
        state.reset_empty_results();
        assert_eq!(state.record_empty_result(), 1);
    }

    #[test]
    fn test_context_append_only() {
        let mut state = LoopState::new();
        state.append_context("first");
        state.append_context("   ");
        state.append_context("second");
        assert_eq!(state.context, "first\n\nsecond");
    }

    #[test]
    fn test_reminders_taken_once() {
        let mut state = LoopState::new();
        state.remind("try again");
        assert_eq!(state.take_reminders(), vec!["try again"]);
        assert!(state.take_reminders().is_empty());
    }
}
