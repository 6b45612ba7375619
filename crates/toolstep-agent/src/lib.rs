//! Toolstep Agent — the plan/act/observe loop and everything it drives.
//!
//! This crate contains:
//! - **step** / **parser**: the per-turn `Step` record and the two reply contracts
//! - **tools**: catalog listing and guarded tool invocation
//! - **prompt**: message list construction for each model call
//! - **agent_loop**: the controller and its stall guards

pub mod agent_loop;
pub mod error;
pub mod extract;
pub mod parser;
pub mod prompt;
pub mod state;
pub mod step;
pub mod tools;

pub use agent_loop::{AgentEvent, AgentLoop, AgentSettings, RunOutcome, Termination};
pub use error::{AgentError, ParseError, ToolError};
pub use parser::{ResponseParser, SchemaParser, TaggedParser};
pub use prompt::PromptBuilder;
pub use state::LoopState;
pub use step::{Action, Step};
pub use tools::{ProcessToolHost, ToolHost, ToolInvoker};
