//! Model channel for Toolstep.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait every model channel implements
//! - [`registry`] — static specs for the supported endpoints + matching logic
//! - [`http_provider::HttpProvider`] — generic OpenAI-compatible HTTP client
//! - [`http_provider::create_provider`] — convenience builder from model name + config

pub mod http_provider;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ProviderConfig, ProviderSpec, StructuredOutput, PROVIDERS};
pub use traits::{LlmProvider, LlmRequestConfig, ProviderError};
