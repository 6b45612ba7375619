//! Tagged-text parser — `<plan>`, `<reasoning>` and `<call>` blocks.
//!
//! The call block holds one `key=value` or `key: value` assignment per line.
//! A legacy single-line shorthand, `toolname param=value param2=value2`, is
//! also accepted. Unknown keys become tool parameters.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::ResponseParser;
use crate::error::ParseError;
use crate::extract::{compiled, plan_lines, strip_vendor_tokens};
use crate::step::{parse_flag, value_to_string, Action, Step};

const INSTRUCTIONS: &str = r#"Reply using exactly these blocks:
<plan>
1. first step
2. second step
</plan>
<reasoning>why the next action is the right one</reasoning>
<call>
action: Iterate
current_step: 0
progress: what has been achieved so far, e.g. Step 1 of 2: located the file
next_step: what happens after this call
tool_required: true
tool: tool_name
param_name: value
</call>
action is one of Done, Solve, Iterate, Think, Error. Every reply has exactly one
<call> block. Add one line per tool parameter. When the request is answered, use
action: Done, leave tool empty and set tool_required: false."#;

/// Parser for the tagged-text output contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaggedParser;

/// Content of `<tag>...</tag>`, case-insensitive. A call block cut off before
/// its closing tag runs to the end of the text.
fn section<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    static PLAN: OnceLock<Option<Regex>> = OnceLock::new();
    static REASONING: OnceLock<Option<Regex>> = OnceLock::new();
    static CALL: OnceLock<Option<Regex>> = OnceLock::new();

    let re = match tag {
        "plan" => compiled(&PLAN, r"(?is)<plan>(.*?)</plan>"),
        "reasoning" => compiled(&REASONING, r"(?is)<reasoning>(.*?)</reasoning>"),
        "call" => compiled(&CALL, r"(?is)<call>(.*?)(?:</call>|\z)"),
        _ => None,
    }?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// `key = value` or `key: value`.
fn assignment(line: &str) -> Option<(&str, &str)> {
    static ASSIGN: OnceLock<Option<Regex>> = OnceLock::new();

    let caps = compiled(&ASSIGN, r"^\s*([A-Za-z_][\w-]*)\s*[=:]\s*(.*)$")?.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str().trim()))
}

/// Strip one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    let v = value.trim();
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

/// Split on whitespace outside of quotes.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                current.push(ch);
            }
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `k=v k2="v 2"` words into parameters; words without `=` are dropped.
fn shorthand_params(words: &[String], params: &mut BTreeMap<String, String>) {
    for word in words {
        match word.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                params.insert(k.trim().to_string(), unquote(v).to_string());
            }
            _ => debug!(word = %word, "ignoring positional word in call shorthand"),
        }
    }
}

/// `toolname k=v ..`: a bare first word followed by at least one assignment.
fn looks_like_shorthand(line: &str) -> bool {
    let words = split_words(line);
    match words.split_first() {
        Some((first, rest)) => !first.contains('=') && rest.iter().any(|w| w.contains('=')),
        None => false,
    }
}

/// Which free-text field a continuation line belongs to.
#[derive(Clone, Copy)]
enum TextField {
    Progress,
    Reasoning,
    NextStep,
}

/// Accumulates call-block assignments.
#[derive(Default)]
struct CallBlock {
    action: Option<String>,
    current_step: usize,
    progress: String,
    reasoning: String,
    next_step: String,
    tool_required: Option<bool>,
    tool: Option<String>,
    plan: Vec<String>,
    params: BTreeMap<String, String>,
}

impl CallBlock {
    fn parse(block: &str) -> Self {
        let mut call = CallBlock::default();
        let mut last_text: Option<TextField> = None;

        for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match assignment(line) {
                Some((key, value)) => last_text = call.assign(key, value),
                None => match last_text {
                    _ if call.tool.is_none() && looks_like_shorthand(line) => call.shorthand(line),
                    Some(field) => call.append(field, line),
                    None if call.tool.is_none() && call.params.is_empty() => call.shorthand(line),
                    None => debug!(line = %line, "ignoring unrecognised call line"),
                },
            }
        }
        call
    }

    /// Apply one assignment; returns the text field it set, for continuation lines.
    fn assign(&mut self, key: &str, raw: &str) -> Option<TextField> {
        let value = unquote(raw);
        match key.to_ascii_lowercase().replace('-', "_").as_str() {
            "tool" | "tool_name" => {
                let words = split_words(value);
                if words.len() > 1 && words[1..].iter().any(|w| w.contains('=')) {
                    self.shorthand_words(&words);
                } else if !value.is_empty() {
                    self.tool = Some(value.to_string());
                }
            }
            "action" => self.action = Some(value.to_string()),
            "tool_required" | "requires_tool" => self.tool_required = Some(parse_flag(value)),
            "current_step" | "step" => self.current_step = value.parse().unwrap_or(0),
            "progress" => {
                self.progress = value.to_string();
                return Some(TextField::Progress);
            }
            "reasoning" => {
                self.reasoning = value.to_string();
                return Some(TextField::Reasoning);
            }
            "next_step" | "next" => {
                self.next_step = value.to_string();
                return Some(TextField::NextStep);
            }
            "plan" => self.plan = value.split(';').flat_map(plan_lines).collect(),
            "params" | "tool_params" => self.merge_params(raw.trim()),
            _ => {
                self.params.insert(key.to_string(), value.to_string());
            }
        }
        None
    }

    /// A JSON object line is merged; anything else is read as shorthand pairs.
    fn merge_params(&mut self, raw: &str) {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                for (k, v) in map {
                    self.params.insert(k, value_to_string(v));
                }
            }
            _ => shorthand_params(&split_words(raw), &mut self.params),
        }
    }

    /// `toolname k=v k2=v2` on one line.
    fn shorthand(&mut self, line: &str) {
        let words = split_words(line);
        self.shorthand_words(&words);
    }

    fn shorthand_words(&mut self, words: &[String]) {
        let Some((name, rest)) = words.split_first() else {
            return;
        };
        if name.contains('=') {
            shorthand_params(words, &mut self.params);
            return;
        }
        self.tool = Some(unquote(name).to_string());
        shorthand_params(rest, &mut self.params);
    }

    fn append(&mut self, field: TextField, line: &str) {
        let target = match field {
            TextField::Progress => &mut self.progress,
            TextField::Reasoning => &mut self.reasoning,
            TextField::NextStep => &mut self.next_step,
        };
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(line);
    }
}

impl ResponseParser for TaggedParser {
    fn parse(&self, text: &str) -> Result<Step, ParseError> {
        let cleaned = strip_vendor_tokens(text);
        if cleaned.is_empty() {
            return Err(ParseError::Empty);
        }

        let call_block = section(&cleaned, "call").ok_or(ParseError::MissingCallBlock)?;
        let call = CallBlock::parse(call_block);

        let plan = match section(&cleaned, "plan") {
            Some(block) => plan_lines(block),
            None => call.plan,
        };
        let reasoning = match section(&cleaned, "reasoning") {
            Some(block) if !block.is_empty() => block.to_string(),
            _ => call.reasoning,
        };
        let tool = call.tool.filter(|t| !t.trim().is_empty());

        let step = Step {
            plan,
            current_step: call.current_step,
            progress: call.progress,
            reasoning,
            next_step: call.next_step,
            action: Action::from_label(call.action.as_deref().unwrap_or_default()),
            tool_required: call.tool_required.unwrap_or(tool.is_some()),
            tool,
            tool_params: call.params,
        }
        .normalize();

        debug!(
            action = %step.action,
            tool = step.tool.as_deref().unwrap_or(""),
            params = step.tool_params.len(),
            "parsed tagged step"
        );
        Ok(step)
    }

    fn format_instructions(&self) -> &'static str {
        INSTRUCTIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Step {
        TaggedParser.parse(text).unwrap()
    }

    #[test]
    fn test_full_response() {
        let step = parse(
            "<plan>\n1. find file\n2. read file\n3. summarize\n</plan>\n\
             <reasoning>The file must be located first.</reasoning>\n\
             <call>\naction: Iterate\ncurrent_step: 0\nprogress: Step 1 of 3\n\
             tool_required: true\ntool: find_file\nname = notes.txt\n</call>",
        );
        assert_eq!(step.plan, vec!["find file", "read file", "summarize"]);
        assert_eq!(step.reasoning, "The file must be located first.");
        assert_eq!(step.action, Action::Iterate);
        assert_eq!(step.progress, "Step 1 of 3");
        assert!(step.tool_required);
        assert_eq!(step.tool.as_deref(), Some("find_file"));
        assert_eq!(step.tool_params["name"], "notes.txt");
    }

    #[test]
    fn test_tags_case_insensitive() {
        let step = parse("<PLAN>- a</PLAN><Call>ACTION: done</Call>");
        assert_eq!(step.plan, vec!["a"]);
        assert_eq!(step.action, Action::Done);
    }

    #[test]
    fn test_missing_call_block_is_error() {
        let err = TaggedParser
            .parse("<plan>1. read</plan><reasoning>thinking</reasoning>")
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingCallBlock));
    }

    #[test]
    fn test_unterminated_call_block() {
        let step = parse("<call>\ntool: ls\npath: /tmp");
        assert_eq!(step.tool.as_deref(), Some("ls"));
        assert_eq!(step.tool_params["path"], "/tmp");
    }

    #[test]
    fn test_legacy_shorthand() {
        let step = parse("<call>\nread_file path=\"/tmp/my notes.txt\" lines=20\naction: Iterate\n</call>");
        assert_eq!(step.tool.as_deref(), Some("read_file"));
        assert_eq!(step.tool_params["path"], "/tmp/my notes.txt");
        assert_eq!(step.tool_params["lines"], "20");
        assert!(step.tool_required);
    }

    #[test]
    fn test_tool_assignment_with_inline_params() {
        let step = parse("<call>tool=search query=rust limit=5</call>");
        assert_eq!(step.tool.as_deref(), Some("search"));
        assert_eq!(step.tool_params["query"], "rust");
        assert_eq!(step.tool_params["limit"], "5");
    }

    #[test]
    fn test_json_params_line_merged() {
        let step = parse("<call>\ntool: fetch\nparams: {\"url\": \"https://a.b\", \"retries\": 2}\n</call>");
        assert_eq!(step.tool_params["url"], "https://a.b");
        assert_eq!(step.tool_params["retries"], "2");
    }

    #[test]
    fn test_unknown_keys_fold_into_params() {
        let step = parse("<call>\ntool: grep\nfuture_attribute: xyz\n</call>");
        assert_eq!(step.tool_params["future_attribute"], "xyz");
    }

    #[test]
    fn test_key_aliases_and_quotes() {
        let step = parse(
            "<call>\ntool_name: 'list_dir'\nrequires-tool: yes\nstep: 2\nnext: read it\n</call>",
        );
        assert_eq!(step.tool.as_deref(), Some("list_dir"));
        assert!(step.tool_required);
        assert_eq!(step.current_step, 2);
        assert_eq!(step.next_step, "read it");
    }

    #[test]
    fn test_continuation_lines_extend_text() {
        let step = parse("<call>\nprogress: read the file\nand found two errors\naction: Done\n</call>");
        assert_eq!(step.progress, "read the file and found two errors");
    }

    #[test]
    fn test_shorthand_after_text_field() {
        let step = parse("<call>\nprogress: Step 1 of 2\nread_file path=a.txt\n</call>");
        assert_eq!(step.progress, "Step 1 of 2");
        assert_eq!(step.tool.as_deref(), Some("read_file"));
        assert_eq!(step.tool_params["path"], "a.txt");
        assert!(step.tool_required);
    }

    #[test]
    fn test_done_without_tool() {
        let step = parse("<reasoning>all answered</reasoning><call>action: Done\ntool_required: false</call>");
        assert_eq!(step.action, Action::Done);
        assert!(!step.tool_required);
        assert!(step.tool.is_none());
        assert_eq!(step.progress, "all answered");
    }

    #[test]
    fn test_plan_from_call_when_no_plan_tag() {
        let step = parse("<call>plan: 1. a; 2. b\naction: Think</call>");
        assert_eq!(step.plan, vec!["a", "b"]);
    }

    #[test]
    fn test_split_words_respects_quotes() {
        assert_eq!(
            split_words(r#"cmd a="x y" b='z w' c"#),
            vec!["cmd", r#"a="x y""#, "b='z w'", "c"]
        );
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(TaggedParser.parse(""), Err(ParseError::Empty)));
    }
}
