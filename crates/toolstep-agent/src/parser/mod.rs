//! Response parsers — turn raw model text into a [`Step`].
//!
//! Two output contracts share one interface and one controller:
//! - [`SchemaParser`] — a single JSON object (fenced or bare)
//! - [`TaggedParser`] — `<plan>`, `<reasoning>` and `<call>` blocks

pub mod schema;
pub mod tagged;

use serde_json::Value;
use toolstep_core::config::OutputContract;

use crate::error::ParseError;
use crate::step::Step;

pub use schema::SchemaParser;
pub use tagged::TaggedParser;

/// Decodes one model turn.
pub trait ResponseParser: Send + Sync {
    /// Parse the model's reply into a normalised step.
    fn parse(&self, text: &str) -> Result<Step, ParseError>;

    /// JSON Schema the model channel should enforce, if any.
    fn response_schema(&self) -> Option<Value> {
        None
    }

    /// Output-format instructions placed in the system prompt.
    fn format_instructions(&self) -> &'static str;
}

/// The parser for a configured output contract.
pub fn for_contract(contract: OutputContract) -> Box<dyn ResponseParser> {
    match contract {
        OutputContract::Schema => Box::new(SchemaParser),
        OutputContract::Tagged => Box::new(TaggedParser),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_contract_schema_publishes_schema() {
        let parser = for_contract(OutputContract::Schema);
        assert!(parser.response_schema().is_some());
        assert!(parser.format_instructions().contains("JSON"));
    }

    #[test]
    fn test_for_contract_tagged_has_no_schema() {
        let parser = for_contract(OutputContract::Tagged);
        assert!(parser.response_schema().is_none());
        assert!(parser.format_instructions().contains("<call>"));
    }

    #[test]
    fn test_both_contracts_yield_same_step() {
        let json = r#"{"plan": ["find file"], "current_step": 0, "progress": "Step 1 of 1",
            "reasoning": "need it", "action": "Iterate", "tool_required": true,
            "tool": "find", "tool_params": {"name": "a.txt"}}"#;
        let tagged = "<plan>\n1. find file\n</plan>\n<reasoning>need it</reasoning>\n<call>\n\
            action: Iterate\ncurrent_step: 0\nprogress: Step 1 of 1\ntool_required: true\n\
            tool: find\nname: a.txt\n</call>";

        let a = for_contract(OutputContract::Schema).parse(json).unwrap();
        let b = for_contract(OutputContract::Tagged).parse(tagged).unwrap();
        assert_eq!(a, b);
    }
}
