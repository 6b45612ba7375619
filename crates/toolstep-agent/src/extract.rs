//! Text extraction helpers.
//!
//! Small pure functions over model and tool text. The loop only ever sees the
//! value they return (a step number, a pagination hint, a cleaned string).

use std::sync::OnceLock;

use regex::Regex;

/// Compile `pattern` once into `cell`. Patterns are literals, so `None` only
/// means the helper degrades to "no match".
pub(crate) fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

// ─────────────────────────────────────────────
// Vendor tokens
// ─────────────────────────────────────────────

/// Remove `<think>…</think>` blocks and `<|…|>` special tokens.
pub fn strip_vendor_tokens(text: &str) -> String {
    static THINK: OnceLock<Option<Regex>> = OnceLock::new();
    static SPECIAL: OnceLock<Option<Regex>> = OnceLock::new();

    let mut out = text.to_string();
    if let Some(re) = compiled(&THINK, r"(?is)<think>.*?</think>") {
        out = re.replace_all(&out, "").into_owned();
    }
    if let Some(re) = compiled(&SPECIAL, r"<\|[^|>]*\|>") {
        out = re.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

// ─────────────────────────────────────────────
// Plan lines
// ─────────────────────────────────────────────

/// Strip a leading list marker (`1.`, `2)`, `-`, `*`, `•`) from a plan line.
pub fn strip_plan_marker(line: &str) -> &str {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();

    let line = line.trim();
    match compiled(&MARKER, r"^(?:\d+[.)]|[-*•])\s*").and_then(|re| re.find(line)) {
        Some(m) => line[m.end()..].trim(),
        None => line,
    }
}

/// Split a block of text into de-prefixed, non-empty plan lines.
pub fn plan_lines(block: &str) -> Vec<String> {
    block
        .lines()
        .map(strip_plan_marker)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

// ─────────────────────────────────────────────
// Step numbers
// ─────────────────────────────────────────────

/// Extract the step number a progress note reports.
///
/// Recognises "Step 3 of 5", "step 3/5", "completed step 3" and a bare "step 3",
/// in that order of preference.
pub fn extract_step_number(text: &str) -> Option<usize> {
    static OF_TOTAL: OnceLock<Option<Regex>> = OnceLock::new();
    static COMPLETED: OnceLock<Option<Regex>> = OnceLock::new();
    static BARE: OnceLock<Option<Regex>> = OnceLock::new();

    let patterns = [
        compiled(&OF_TOTAL, r"(?i)\bstep\s+(\d+)\s*(?:of|/)\s*\d+"),
        compiled(&COMPLETED, r"(?i)\bcompleted\s+step\s+(\d+)"),
        compiled(&BARE, r"(?i)\bstep\s+(\d+)\b"),
    ];

    patterns.into_iter().flatten().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

// ─────────────────────────────────────────────
// Pagination
// ─────────────────────────────────────────────

/// A "more pages available" hint found in tool output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub pages_left: u64,
    pub token: String,
}

impl Pagination {
    /// Tag appended to the context so the model can ask for the next page.
    pub fn continuation_tag(&self, tool: &str) -> String {
        format!(
            "<continuation tool=\"{tool}\" pages_left=\"{}\" next_page_token=\"{}\"/>\n\
             More results are available. Call {tool} again with next_page_token={} to read the next page.",
            self.pages_left, self.token, self.token
        )
    }
}

/// Detect `Pages left: N … next_page_token: T` in tool output.
///
/// Accepts plain-text and JSON spellings. Returns `None` when no pages remain.
pub fn detect_pagination(output: &str) -> Option<Pagination> {
    static PAGES: OnceLock<Option<Regex>> = OnceLock::new();
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();

    let pages_left: u64 = compiled(&PAGES, r#"(?i)pages?[ _]left"?\s*[:=]\s*(\d+)"#)?
        .captures(output)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    if pages_left == 0 {
        return None;
    }

    let token = compiled(&TOKEN, r#"(?i)next_page_token"?\s*[:=]\s*"?([A-Za-z0-9_\-+/=.]+)"#)?
        .captures(output)?
        .get(1)?
        .as_str()
        .to_string();

    Some(Pagination { pages_left, token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_think_block() {
        let text = "<think>let me plan\nthis out</think>\n{\"action\": \"Done\"}";
        assert_eq!(strip_vendor_tokens(text), "{\"action\": \"Done\"}");
    }

    #[test]
    fn test_strip_special_tokens() {
        let text = "<|channel|>final<|message|>{\"a\": 1}<|end|>";
        assert_eq!(strip_vendor_tokens(text), "final{\"a\": 1}");
    }

    #[test]
    fn test_strip_plan_marker() {
        assert_eq!(strip_plan_marker("1. find file"), "find file");
        assert_eq!(strip_plan_marker("  2) read file"), "read file");
        assert_eq!(strip_plan_marker("- summarize"), "summarize");
        assert_eq!(strip_plan_marker("* check"), "check");
        assert_eq!(strip_plan_marker("plain step"), "plain step");
    }

    #[test]
    fn test_plan_lines_skips_blank() {
        let lines = plan_lines("1. find file\n\n2. read file\n   \n3. summarize\n");
        assert_eq!(lines, vec!["find file", "read file", "summarize"]);
    }

    #[test]
    fn test_extract_step_number_forms() {
        assert_eq!(extract_step_number("Step 3 of 5: reading"), Some(3));
        assert_eq!(extract_step_number("now on step 2/4"), Some(2));
        assert_eq!(extract_step_number("Completed step 4, moving on"), Some(4));
        assert_eq!(extract_step_number("working on step 7"), Some(7));
        assert_eq!(extract_step_number("no number here"), None);
        assert_eq!(extract_step_number("stepping 3"), None);
    }

    #[test]
    fn test_extract_prefers_of_total() {
        assert_eq!(
            extract_step_number("finished step 1, now Step 2 of 3"),
            Some(2)
        );
    }

    #[test]
    fn test_detect_pagination_text() {
        let out = "item a\nitem b\nPages left: 3, next_page_token: abc123";
        let p = detect_pagination(out).unwrap();
        assert_eq!(p.pages_left, 3);
        assert_eq!(p.token, "abc123");
    }

    #[test]
    fn test_detect_pagination_json() {
        let out = r#"{"items": [], "pages_left": 2, "next_page_token": "tok_9"}"#;
        let p = detect_pagination(out).unwrap();
        assert_eq!(p.pages_left, 2);
        assert_eq!(p.token, "tok_9");
    }

    #[test]
    fn test_detect_pagination_last_page() {
        assert!(detect_pagination("Pages left: 0 next_page_token: x").is_none());
        assert!(detect_pagination("just output").is_none());
        assert!(detect_pagination("Pages left: 2").is_none());
    }

    #[test]
    fn test_continuation_tag_mentions_token() {
        let p = Pagination {
            pages_left: 1,
            token: "abc".into(),
        };
        let tag = p.continuation_tag("list_files");
        assert!(tag.contains("next_page_token=\"abc\""));
        assert!(tag.contains("list_files"));
    }
}
