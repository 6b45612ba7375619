//! Schema parser — a single JSON object per turn.
//!
//! The object is located by, in order: a fenced ```json block, a fenced block
//! starting with `{`, then the first balanced `{...}` span. Vendor preambles
//! (`<think>` blocks, `<|...|>` tokens) are stripped first.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::ResponseParser;
use crate::error::ParseError;
use crate::extract::{compiled, strip_vendor_tokens};
use crate::step::Step;

const INSTRUCTIONS: &str = r#"Reply with exactly one JSON object and nothing else:
{
  "plan": ["first step", "second step"],
  "current_step": 0,
  "progress": "what has been achieved so far, e.g. \"Step 1 of 2: located the file\"",
  "reasoning": "why the next action is the right one",
  "next_step": "what happens after this turn",
  "action": "Iterate",
  "tool_required": true,
  "tool": "tool_name",
  "tool_params": [{"key": "param", "value": "value"}]
}
action is one of Done, Solve, Iterate, Think, Error.
Use Iterate with a tool to make progress, Think to reason without a tool,
Error to report a problem you can recover from, and Done or Solve when the
request is answered (leave tool empty and set tool_required to false)."#;

/// Parser for the JSON output contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaParser;

impl SchemaParser {
    /// Locate the JSON payload inside raw model text.
    pub fn locate_json(text: &str) -> Option<&str> {
        static FENCED_JSON: OnceLock<Option<Regex>> = OnceLock::new();
        static FENCED_BRACE: OnceLock<Option<Regex>> = OnceLock::new();

        let fenced = [
            compiled(&FENCED_JSON, r"(?is)```\s*json\s*(.*?)```"),
            compiled(&FENCED_BRACE, r"(?s)```\s*(\{.*?)```"),
        ];
        for re in fenced.into_iter().flatten() {
            if let Some(body) = re.captures(text).and_then(|c| c.get(1)) {
                let body = body.as_str().trim();
                return Some(balanced_object(body).unwrap_or(body));
            }
        }

        balanced_object(text)
    }
}

/// First balanced `{...}` span, ignoring braces inside JSON strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

impl ResponseParser for SchemaParser {
    fn parse(&self, text: &str) -> Result<Step, ParseError> {
        let cleaned = strip_vendor_tokens(text);
        if cleaned.is_empty() {
            return Err(ParseError::Empty);
        }

        let payload = Self::locate_json(&cleaned).ok_or(ParseError::NoJson)?;
        let value: Value =
            serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(ParseError::InvalidJson("expected a JSON object".into()));
        }

        let step = Step::from_json(value).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        debug!(
            action = %step.action,
            tool = step.tool.as_deref().unwrap_or(""),
            plan_len = step.plan.len(),
            "parsed JSON step"
        );
        Ok(step)
    }

    fn response_schema(&self) -> Option<Value> {
        Some(Step::json_schema())
    }

    fn format_instructions(&self) -> &'static str {
        INSTRUCTIONS
    }
}
