//! Section parsing for model responses.
//!
//! The response grammar is three labeled sections in order:
//! - `---REASONING---` up to `---COMMANDS---`
//! - `---COMMANDS---` up to `---EXPECTED_OUTCOME---`
//! - `---EXPECTED_OUTCOME---` to end of text
//!
//! A section whose delimiters are missing falls back to a placeholder.

use regex::Regex;
use std::sync::LazyLock;

pub const REASONING_MARKER: &str = "---REASONING---";
pub const COMMANDS_MARKER: &str = "---COMMANDS---";
pub const EXPECTED_OUTCOME_MARKER: &str = "---EXPECTED_OUTCOME---";

pub const REASONING_PLACEHOLDER: &str = "Reasoning not parsed";
pub const OUTCOME_PLACEHOLDER: &str = "Outcome not parsed";

static REASONING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)---REASONING---(.*?)---COMMANDS---").unwrap());

static COMMANDS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)---COMMANDS---(.*?)---EXPECTED_OUTCOME---").unwrap());

static OUTCOME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)---EXPECTED_OUTCOME---(.*)").unwrap());

/// Structured view of a model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub reasoning: Option<String>,
    pub commands: Vec<String>,
    pub expected_outcome: Option<String>,
}

impl ParsedResponse {
    pub fn reasoning_or_placeholder(&self) -> String {
        self.reasoning
            .clone()
            .unwrap_or_else(|| REASONING_PLACEHOLDER.to_string())
    }

    pub fn expected_outcome_or_placeholder(&self) -> String {
        self.expected_outcome
            .clone()
            .unwrap_or_else(|| OUTCOME_PLACEHOLDER.to_string())
    }
}

/// Parse a raw model response. Never fails.
pub fn parse_response(text: &str) -> ParsedResponse {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let commands = capture(&COMMANDS_REGEX)
        .map(|section| extract_commands(&section))
        .unwrap_or_default();

    ParsedResponse {
        reasoning: capture(&REASONING_REGEX),
        commands,
        expected_outcome: capture(&OUTCOME_REGEX),
    }
}

/// Non-empty, non-comment, non-fence lines of a command section, in order.
pub fn extract_commands(section: &str) -> Vec<String> {
    section
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !line.starts_with("```"))
        .map(str::to_string)
        .collect()
}
