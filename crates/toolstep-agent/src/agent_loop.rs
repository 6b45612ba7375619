//! Agent loop — plan, call a tool, observe, repeat.
//!
//! Each iteration builds a prompt, asks the model for one [`Step`], runs at most
//! one tool, and folds the result into the run's context. Guards stop the loop
//! when the model stalls: a step ceiling, consecutive identical tool calls, an
//! unchanged step number, verbatim-repeated progress notes, and runs of empty
//! tool output.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use toolstep_core::config::{CatalogFormat, Config, ContextMode, OutputContract, ReasoningLevel};
use toolstep_core::types::Message;
use toolstep_providers::{LlmProvider, LlmRequestConfig};

use crate::error::{AgentError, ToolError};
use crate::extract::{detect_pagination, extract_step_number};
use crate::parser::{self, ResponseParser};
use crate::prompt::PromptBuilder;
use crate::state::LoopState;
use crate::step::{Action, Step};
use crate::tools::{ToolHost, ToolInvoker};

// ─────────────────────────────────────────────
// Directives
// ─────────────────────────────────────────────

const EMPTY_RETRY: &str = "returned no output. Try a different approach: other parameters, \
     another tool, or the next step of the plan.";
const EMPTY_STOP: &str = "Stop adapting: several tool calls in a row returned nothing. \
     Answer from what you already have and finish with action Done.";
const PROGRESS_REPEAT: &str = "Your progress note has not changed";
const STUCK_STEP: &str = "You have reported step";
const FINAL_ANSWER_SYSTEM: &str = "Answer the user's request. The message below contains the \
     request followed by context gathered with tools; rely on it and say plainly if something \
     could not be found.";

// ─────────────────────────────────────────────
// Settings / outcome / events
// ─────────────────────────────────────────────

/// Everything the loop reads from configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub model: String,
    pub request: LlmRequestConfig,
    pub reasoning: ReasoningLevel,
    pub output_contract: OutputContract,
    pub context_mode: ContextMode,
    pub catalog_format: CatalogFormat,
    pub custom_instructions: Option<String>,
    /// Deadline for each tool call.
    pub tool_timeout: Duration,
    /// Ceiling on model calls per run.
    pub max_steps: u32,
    /// Consecutive identical tool calls before the run ends.
    pub max_repeats: u32,
    /// Turns on one step number before a "move on" directive; twice this ends the run.
    pub max_stuck: u32,
    /// Identical progress notes before a "go deeper" directive.
    pub max_progress_repeats: u32,
    /// Empty results tolerated before the "answer now" directive.
    pub max_empty_results: u32,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        let agent = &config.agent;
        Self {
            model: agent.model.clone(),
            request: LlmRequestConfig {
                max_tokens: agent.max_tokens,
                temperature: agent.temperature,
            },
            reasoning: agent.reasoning,
            output_contract: agent.output_contract,
            context_mode: agent.context_mode,
            catalog_format: config.tools.catalog_format,
            custom_instructions: agent.custom_instructions.clone(),
            tool_timeout: Duration::from_secs(config.tools.timeout.max(1)),
            max_steps: agent.effective_max_steps().max(1),
            max_repeats: agent.max_repeats.max(1),
            max_stuck: agent.max_stuck.max(1),
            max_progress_repeats: agent.max_progress_repeats.max(1),
            max_empty_results: agent.max_empty_results,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The model reported the request as answered.
    Completed,
    /// The tool catalog was empty; the input is returned unchanged.
    NoTools,
    StepLimit,
    RepeatLimit,
    StuckLimit,
}

impl Termination {
    /// Guard trips end the run early but still return the gathered context.
    pub fn is_guard_trip(self) -> bool {
        matches!(
            self,
            Termination::StepLimit | Termination::RepeatLimit | Termination::StuckLimit
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Termination::Completed => "completed",
            Termination::NoTools => "no tools available",
            Termination::StepLimit => "step limit reached",
            Termination::RepeatLimit => "same tool called too many times in a row",
            Termination::StuckLimit => "plan stopped advancing",
        }
    }
}

/// Result of [`AgentLoop::run`].
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// The input followed by the gathered context and final progress note.
    pub text: String,
    pub termination: Termination,
    /// Model calls made.
    pub steps: u32,
}

/// Progress notifications for a display layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    Plan { steps: Vec<String>, current: usize },
    Progress(String),
    Reasoning(String),
    ToolCall { tool: String, args: Vec<String> },
    ToolResult { tool: String, output: String },
    ToolFailed { tool: String, error: String },
    Warning(String),
    Finished(Termination),
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

/// The plan/act/observe controller.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    invoker: ToolInvoker,
    parser: Box<dyn ResponseParser>,
    settings: AgentSettings,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolHost>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            invoker: ToolInvoker::new(tools, settings.tool_timeout),
            parser: parser::for_contract(settings.output_contract),
            settings,
            events: None,
        }
    }

    /// Send [`AgentEvent`]s to `tx` while running.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// The tool catalog in the configured format.
    pub async fn catalog(&self) -> Result<String, AgentError> {
        self.invoker
            .catalog(self.settings.catalog_format)
            .await
            .map_err(AgentError::Catalog)
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    /// Run the loop for one request.
    ///
    /// Returns the input augmented with everything the tools produced. Only a
    /// model-channel failure (or an unreadable catalog) is an error; guard trips
    /// end the run with whatever context was gathered.
    pub async fn run(&self, input: &str, history: &[Message]) -> Result<RunOutcome, AgentError> {
        let catalog = self.catalog().await?;
        if catalog.is_empty() {
            info!("tool catalog is empty, skipping agent loop");
            self.emit(AgentEvent::Finished(Termination::NoTools));
            return Ok(RunOutcome {
                text: input.to_string(),
                termination: Termination::NoTools,
                steps: 0,
            });
        }

        let prompts = PromptBuilder::new(
            self.settings.reasoning,
            self.parser.format_instructions(),
            self.settings.custom_instructions.as_deref(),
            self.settings.context_mode,
        );
        let schema = self.parser.response_schema();
        let mut state = LoopState::new();

        info!(
            model = %self.settings.model,
            max_steps = self.settings.max_steps,
            "agent run started"
        );

        let termination = loop {
            state.step_count += 1;
            if state.step_count > self.settings.max_steps {
                warn!(max_steps = self.settings.max_steps, "step limit reached");
                break Termination::StepLimit;
            }

            let reminders = state.take_reminders();
            let messages = prompts.build(input, history, &catalog, &state, &reminders);

            debug!(iteration = state.step_count, "calling model");
            let reply = self
                .provider
                .chat(&messages, schema.as_ref(), &self.settings.model, &self.settings.request)
                .await?;

            let step = match self.parser.parse(&reply) {
                Ok(step) => step,
                Err(e) => {
                    warn!(iteration = state.step_count, error = %e, "unparseable model response");
                    self.emit(AgentEvent::Warning(format!("could not parse reply: {e}")));
                    state.remind(format!(
                        "Your previous reply could not be parsed ({e}). \
                         Reply again using exactly the required output format."
                    ));
                    continue;
                }
            };

            self.observe(&mut state, &step);
            let step_number = extract_step_number(&step.progress).unwrap_or(step.current_step.saturating_add(1));
            let stuck = state.record_step_number(step_number);
            let progress_repeats = state.record_progress(&step.progress);

            if let Some(done) = self.act(&mut state, &step).await {
                break done;
            }
            if let Some(tripped) = self.check_stalls(&mut state, step_number, stuck, progress_repeats) {
                break tripped;
            }
        };

        if termination.is_guard_trip() {
            self.emit(AgentEvent::Warning(format!(
                "stopping early: {}",
                termination.describe()
            )));
        }
        self.emit(AgentEvent::Finished(termination));
        info!(
            steps = state.step_count.min(self.settings.max_steps),
            termination = termination.describe(),
            "agent run finished"
        );
        Ok(self.finish(input, state, termination))
    }

    /// Carry the plan forward and report what the model said.
    fn observe(&self, state: &mut LoopState, step: &Step) {
        if !step.plan.is_empty() {
            state.current_plan = step.plan.clone();
        }
        state.current_step = step.current_step;
        state.last_progress = step.progress.clone();

        if !step.plan.is_empty() {
            self.emit(AgentEvent::Plan {
                steps: step.plan.clone(),
                current: step.current_step,
            });
        }
        if !step.progress.is_empty() {
            self.emit(AgentEvent::Progress(step.progress.clone()));
        }
        if !step.reasoning.is_empty() {
            self.emit(AgentEvent::Reasoning(step.reasoning.clone()));
        }
    }

    /// Act on one step. Returns a termination when the run should end.
    async fn act(&self, state: &mut LoopState, step: &Step) -> Option<Termination> {
        let wants_tool = step.tool_required && step.tool.is_some();

        if step.action == Action::Error {
            let note = if step.next_step.is_empty() {
                &step.progress
            } else {
                &step.next_step
            };
            warn!(iteration = state.step_count, note = %note, "model reported an error");
            state.append_context(&format!("Error noted at step {}: {note}", state.step_count));
            self.emit(AgentEvent::Warning(format!("model reported an error: {note}")));
            return None;
        }

        // No tool plus a terminal action (or no tool wanted at all) ends the run.
        if step.tool.is_none() && (step.action.is_terminal() || !step.tool_required) {
            state.append_context(&step.reasoning);
            return Some(Termination::Completed);
        }

        let call = if wants_tool { step.tool_call() } else { None };
        let Some((tool, args)) = call else {
            if !step.reasoning.is_empty() {
                state.append_context(&format!(
                    "Reasoning (step {}): {}",
                    state.step_count, step.reasoning
                ));
            }
            return None;
        };

        let continues_pagination = state
            .page_token
            .as_ref()
            .is_some_and(|token| step.tool_params.values().any(|v| v == token));
        let repeats = state.record_tool(tool, continues_pagination);

        self.emit(AgentEvent::ToolCall {
            tool: tool.to_string(),
            args: args.clone(),
        });
        let call_line = format!("call {tool} {}", args.join(" "));

        match self.invoker.call(tool, &args).await {
            Err(e) => {
                self.emit(AgentEvent::ToolFailed {
                    tool: tool.to_string(),
                    error: e.to_string(),
                });
                let block = format!(
                    "<tool_error step=\"{}\" tool=\"{tool}\">\n{e}\n</tool_error>",
                    state.step_count
                );
                state.append_context(&block);
                state.chat_history.push(Message::assistant(call_line.trim_end()));
                state.chat_history.push(Message::user(block));
                state.remind(failure_guidance(&e));
            }
            Ok(output) if output.is_empty() => {
                let empties = state.record_empty_result();
                debug!(tool = %tool, empties, "tool returned no output");
                self.emit(AgentEvent::ToolResult {
                    tool: tool.to_string(),
                    output: String::new(),
                });
                state.append_context(&format!(
                    "Step {}: {tool} returned no output.",
                    state.step_count
                ));
                if empties > self.settings.max_empty_results {
                    warn!(empties, "repeated empty tool results, asking for an answer");
                    state.remind(EMPTY_STOP);
                } else {
                    state.remind(format!("{tool} {EMPTY_RETRY}"));
                }
            }
            Ok(output) => {
                state.reset_empty_results();
                state.page_token = None;

                let block = format!(
                    "<tool_output step=\"{}\" tool=\"{tool}\">\nReasoning: {}\nOutput:\n{output}\n</tool_output>",
                    state.step_count, step.reasoning
                );
                state.append_context(&block);
                state.chat_history.push(Message::assistant(call_line.trim_end()));
                state.chat_history.push(Message::user(block));

                if let Some(page) = detect_pagination(&output) {
                    debug!(tool = %tool, pages_left = page.pages_left, "pagination hint found");
                    state.append_context(&page.continuation_tag(tool));
                    state.page_token = Some(page.token);
                }
                self.emit(AgentEvent::ToolResult {
                    tool: tool.to_string(),
                    output,
                });
            }
        }

        let max = self.settings.max_repeats;
        if repeats >= max {
            warn!(tool = %tool, repeats, "repeat limit reached");
            return Some(Termination::RepeatLimit);
        }
        if repeats >= 2 && repeats + 1 == max {
            state.remind(format!(
                "Final warning: {tool} has been called {repeats} times in a row. \
                 One more identical call ends the run; use the results you have or change approach."
            ));
            self.emit(AgentEvent::Warning(format!("{tool} called {repeats} times in a row")));
        } else if repeats >= max.saturating_sub(2).max(2) {
            state.remind(format!(
                "{tool} has been called {repeats} times in a row. Avoid repeating the same call."
            ));
        }
        None
    }

    /// Stuck-step and progress-repetition guards.
    fn check_stalls(
        &self,
        state: &mut LoopState,
        step_number: usize,
        stuck: u32,
        progress_repeats: u32,
    ) -> Option<Termination> {
        let max_stuck = self.settings.max_stuck;
        if stuck >= max_stuck.saturating_mul(2) {
            warn!(step = step_number, turns = stuck, "plan stopped advancing");
            return Some(Termination::StuckLimit);
        }
        if stuck >= max_stuck {
            warn!(step = step_number, turns = stuck, "step number unchanged");
            state.remind(format!(
                "{STUCK_STEP} {step_number} for {stuck} turns. Finish it and move to the next \
                 step, or revise the plan if it cannot be completed."
            ));
            self.emit(AgentEvent::Warning(format!(
                "stuck on step {step_number} for {stuck} turns"
            )));
        }

        if progress_repeats >= self.settings.max_progress_repeats {
            warn!(turns = progress_repeats, "progress note repeated");
            state.remind(format!(
                "{PROGRESS_REPEAT} for {progress_repeats} turns. Go deeper: use a different tool \
                 or different parameters, or change approach."
            ));
        }
        None
    }

    /// Input + gathered context + final progress note.
    fn finish(&self, input: &str, state: LoopState, termination: Termination) -> RunOutcome {
        let mut text = input.to_string();
        if !state.context.trim().is_empty() {
            text.push_str("\n\n## Context\n");
            text.push_str(state.context.trim());
        }

        let mut progress = state.last_progress.trim().to_string();
        if termination.is_guard_trip() {
            if !progress.is_empty() {
                progress.push('\n');
            }
            progress.push_str(&format!(
                "Stopped early ({}); answer from the context gathered so far.",
                termination.describe()
            ));
        }
        if !progress.is_empty() {
            text.push_str("\n\n## Progress\n");
            text.push_str(&progress);
        }

        RunOutcome {
            text,
            termination,
            steps: state.step_count.min(self.settings.max_steps),
        }
    }

    /// Ask the model for the final natural-language answer to an augmented input.
    pub async fn answer(&self, augmented: &str, history: &[Message]) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(FINAL_ANSWER_SYSTEM));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(augmented));

        let reply = self
            .provider
            .chat(&messages, None, &self.settings.model, &self.settings.request)
            .await?;
        Ok(reply)
    }
}

/// Corrective guidance after a failed tool call.
fn failure_guidance(error: &ToolError) -> String {
    match error {
        ToolError::InvalidName { name } => format!(
            "'{name}' is not a valid tool name. Use a name exactly as listed under Available tools."
        ),
        ToolError::Timeout { tool, after } => format!(
            "{tool} timed out after {after:?}. Narrow the request (smaller scope, fewer results) \
             or use a different tool."
        ),
        ToolError::Failed { tool, .. } => format!(
            "{tool} failed. Check the parameter names and values against the catalog, \
             or try a different tool."
        ),
        ToolError::Spawn { .. } => {
            "The tool host could not be started. Answer from the context you have.".to_string()
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
