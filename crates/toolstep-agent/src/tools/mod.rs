//! Tool access for the agent loop: catalog listing and guarded invocation.

pub mod base;
pub mod invoker;
pub mod process;

pub use base::ToolHost;
pub use invoker::{clean_args, validate_tool_name, ToolInvoker};
pub use process::ProcessToolHost;
