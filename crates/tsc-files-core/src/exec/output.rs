//! Parser for compiler output in `--pretty false` format.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One compiler diagnostic. `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

static DIAGNOSTIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\):\s+(?P<severity>error|warning)\s+(?P<code>[A-Za-z0-9]+):\s*(?P<message>.*)$",
    )
    .expect("valid regex")
});

static DIAGNOSTIC_HINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\berror\s+TS\d+|^error:|\berror\[").expect("valid regex"));

/// Extract every `file(line,col): severity CODE: message` line from `raw`.
/// Other lines are ignored.
pub fn parse_output(raw: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();
    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        let Some(caps) = DIAGNOSTIC_RE.captures(line) else {
            continue;
        };
        let (Ok(line_no), Ok(column)) = (caps["line"].parse(), caps["col"].parse()) else {
            continue;
        };
        let severity = if &caps["severity"] == "error" {
            Severity::Error
        } else {
            Severity::Warning
        };
        let diagnostic = Diagnostic {
            file: caps["file"].trim().to_string(),
            line: line_no,
            column,
            severity,
            code: caps["code"].to_string(),
            message: caps["message"].trim_end().to_string(),
        };
        match severity {
            Severity::Error => parsed.errors.push(diagnostic),
            Severity::Warning => parsed.warnings.push(diagnostic),
        }
    }
    parsed
}

/// Whether unparsed output still looks like it was meant to carry
/// diagnostics, as opposed to a crash trace or empty output.
pub fn looks_like_diagnostics(raw: &str) -> bool {
    DIAGNOSTIC_HINT_RE.is_match(raw)
}
