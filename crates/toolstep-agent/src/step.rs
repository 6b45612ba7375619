//! Step — the decoded form of one model turn.
//!
//! Both response parsers produce a [`Step`]. Provider dialects disagree on how
//! `tool_params` is encoded (object vs. array of `{key, value}` pairs) and on
//! scalar types, so decoding goes through a lenient wire struct and is
//! normalised here before the controller ever sees it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::extract::plan_lines;

// ─────────────────────────────────────────────
// Action
// ─────────────────────────────────────────────

/// Continuation signal emitted by the model each turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Action {
    Done,
    Solve,
    Iterate,
    Think,
    Error,
    /// Empty or unknown label. The controller treats it like `Done`.
    #[default]
    Unrecognized,
}

impl Action {
    /// Case-insensitive parse; anything outside the vocabulary is `Unrecognized`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "done" => Action::Done,
            "solve" => Action::Solve,
            "iterate" => Action::Iterate,
            "think" => Action::Think,
            "error" => Action::Error,
            _ => Action::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Done => "Done",
            Action::Solve => "Solve",
            Action::Iterate => "Iterate",
            Action::Think => "Think",
            Action::Error => "Error",
            Action::Unrecognized => "",
        }
    }

    /// Actions that end the loop when no tool call accompanies them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Done | Action::Solve | Action::Unrecognized)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// Step
// ─────────────────────────────────────────────

/// One parsed model turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Plan step descriptions, in the model's order.
    pub plan: Vec<String>,
    /// Zero-based index of the active plan step.
    pub current_step: usize,
    pub progress: String,
    pub reasoning: String,
    pub next_step: String,
    pub action: Action,
    pub tool_required: bool,
    /// Tool to call this turn; never `Some("")`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub tool_params: BTreeMap<String, String>,
}

impl Step {
    /// Decode a JSON object in any supported dialect.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let wire: StepWire = serde_json::from_value(value)?;
        Ok(wire.into_step())
    }

    /// Fill derived fields so downstream stall checks always have values.
    ///
    /// Empty progress is synthesised from reasoning, then from next-step text.
    /// A blank tool name becomes `None`.
    pub fn normalize(mut self) -> Self {
        if self.progress.trim().is_empty() {
            self.progress = if !self.reasoning.trim().is_empty() {
                self.reasoning.trim().to_string()
            } else {
                self.next_step.trim().to_string()
            };
        }
        self.tool = self
            .tool
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// Tool name and `key=value` arguments, when this turn calls a tool.
    pub fn tool_call(&self) -> Option<(&str, Vec<String>)> {
        let tool = self.tool.as_deref()?;
        let args = self
            .tool_params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        Some((tool, args))
    }

    /// JSON Schema describing a step, for endpoints that support `response_format`.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "plan": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ordered plan steps; keep earlier steps unless revising the plan"
                },
                "current_step": {
                    "type": "integer",
                    "description": "Zero-based index of the step being worked on"
                },
                "progress": { "type": "string", "description": "What has been achieved so far" },
                "reasoning": { "type": "string", "description": "Why this action is next" },
                "next_step": { "type": "string", "description": "What happens after this turn" },
                "action": {
                    "type": "string",
                    "enum": ["Done", "Solve", "Iterate", "Think", "Error"]
                },
                "tool_required": { "type": "boolean" },
                "tool": { "type": "string", "description": "Tool name, empty when no tool is needed" },
                "tool_params": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "key": { "type": "string" },
                            "value": { "type": "string" }
                        },
                        "required": ["key", "value"]
                    }
                }
            },
            "required": ["plan", "current_step", "progress", "reasoning", "action", "tool_required"]
        })
    }
}

// ─────────────────────────────────────────────
// Wire form
// ─────────────────────────────────────────────

/// `tool_params` as providers send it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ToolParams {
    Object(Map<String, Value>),
    Pairs(Vec<ParamPair>),
    /// A JSON object serialised into a string.
    Encoded(String),
}

#[derive(Debug, Deserialize)]
pub struct ParamPair {
    #[serde(alias = "name")]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl ToolParams {
    /// Canonical key → value mapping. Later duplicates win.
    pub fn into_map(self) -> BTreeMap<String, String> {
        match self {
            ToolParams::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, value_to_string(v)))
                .collect(),
            ToolParams::Pairs(pairs) => pairs
                .into_iter()
                .filter(|p| !p.key.trim().is_empty())
                .map(|p| (p.key.trim().to_string(), value_to_string(p.value)))
                .collect(),
            ToolParams::Encoded(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => ToolParams::Object(map).into_map(),
                Ok(Value::Array(items)) => serde_json::from_value::<Vec<ParamPair>>(Value::Array(items))
                    .map(|pairs| ToolParams::Pairs(pairs).into_map())
                    .unwrap_or_default(),
                _ => BTreeMap::new(),
            },
        }
    }
}

/// Render a JSON value as a parameter string: strings verbatim, scalars via
/// `to_string`, structures as compact JSON.
pub fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StepWire {
    plan: Value,
    #[serde(alias = "step")]
    current_step: Value,
    progress: Option<String>,
    reasoning: Option<String>,
    #[serde(alias = "next")]
    next_step: Option<String>,
    action: Option<String>,
    #[serde(alias = "requires_tool")]
    tool_required: Value,
    #[serde(alias = "tool_name")]
    tool: Option<String>,
    #[serde(alias = "params", alias = "arguments")]
    tool_params: Option<ToolParams>,
}

impl StepWire {
    fn into_step(self) -> Step {
        let tool = self.tool.filter(|t| !t.trim().is_empty());
        let tool_required = match self.tool_required {
            Value::Null => tool.is_some(),
            v => truthy(&v),
        };
        Step {
            plan: plan_from_value(self.plan),
            current_step: index_from_value(&self.current_step),
            progress: self.progress.unwrap_or_default(),
            reasoning: self.reasoning.unwrap_or_default(),
            next_step: self.next_step.unwrap_or_default(),
            action: Action::from_label(self.action.as_deref().unwrap_or_default()),
            tool_required,
            tool,
            tool_params: self.tool_params.map(ToolParams::into_map).unwrap_or_default(),
        }
        .normalize()
    }
}

fn plan_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .map(|s| crate::extract::strip_plan_marker(&s).to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => plan_lines(&s),
        _ => Vec::new(),
    }
}

fn index_from_value(value: &Value) -> usize {
    match value {
        Value::Number(n) => n.as_u64().map_or(0, |n| n as usize),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Lenient boolean: `true`, `"true"`, `"yes"`, `"1"`, non-zero numbers.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => parse_flag(s),
        _ => false,
    }
}

/// Lenient boolean from text.
pub fn parse_flag(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1"
    )
}
