//! Extraction of module specifiers from TypeScript/JavaScript source text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `import x from '…'`, `import { x } from '…'`
    Static,
    /// `import type { X } from '…'`, `export type { X } from '…'`
    TypeOnly,
    /// `import '…'`
    SideEffect,
    /// `export * from '…'`, `export { x } from '…'`
    ReExport,
    /// `import('…')`
    Dynamic,
    /// `require('…')`, `import x = require('…')`
    Require,
    /// `/// <reference path="…" />`
    Reference,
}

impl ImportKind {
    /// Edges the compiler itself follows when building a program from TypeScript roots.
    pub fn followed_by_compiler(self) -> bool {
        !matches!(self, ImportKind::Require)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    pub kind: ImportKind,
}

static STATIC_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(type\s+)?[\w$*{}\s,]+?\s*\bfrom\s*["']([^"'\n]+)["']"#)
        .expect("valid regex")
});
static SIDE_EFFECT_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*["']([^"'\n]+)["']"#).expect("valid regex"));
static EXPORT_FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\bexport\s+(type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*["']([^"'\n]+)["']"#,
    )
    .expect("valid regex")
});
static DYNAMIC_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*\(\s*["']([^"'\n]+)["']"#).expect("valid regex"));
static REQUIRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#).expect("valid regex"));
static REFERENCE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^///\s*<reference\s+path\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

/// Collect every module specifier referenced by `source`.
///
/// Comments are stripped first so commented-out imports are ignored, and
/// matches that start inside a string, template or regex literal are
/// dropped. The result may contain the same specifier more than once with
/// different kinds.
pub fn scan_imports(source: &str) -> Vec<ImportRef> {
    let mut imports = Vec::new();

    for line in source.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("///") {
            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }
            break;
        }
        if let Some(caps) = REFERENCE_PATH_RE.captures(trimmed) {
            imports.push(ImportRef {
                specifier: caps[1].to_string(),
                kind: ImportKind::Reference,
            });
        }
    }

    let masked = mask_source(source);
    let masked = &masked;
    let code = masked.code.as_str();
    let matches = move |re: &'static Regex| {
        re.captures_iter(code)
            .filter(move |caps| masked.starts_in_code(caps))
    };

    for caps in matches(&*STATIC_IMPORT_RE) {
        let kind = if caps.get(1).is_some() {
            ImportKind::TypeOnly
        } else {
            ImportKind::Static
        };
        imports.push(ImportRef {
            specifier: caps[2].to_string(),
            kind,
        });
    }
    for caps in matches(&*SIDE_EFFECT_IMPORT_RE) {
        imports.push(ImportRef {
            specifier: caps[1].to_string(),
            kind: ImportKind::SideEffect,
        });
    }
    for caps in matches(&*EXPORT_FROM_RE) {
        let kind = if caps.get(1).is_some() {
            ImportKind::TypeOnly
        } else {
            ImportKind::ReExport
        };
        imports.push(ImportRef {
            specifier: caps[2].to_string(),
            kind,
        });
    }
    for caps in matches(&*DYNAMIC_IMPORT_RE) {
        imports.push(ImportRef {
            specifier: caps[1].to_string(),
            kind: ImportKind::Dynamic,
        });
    }
    for caps in matches(&*REQUIRE_RE) {
        imports.push(ImportRef {
            specifier: caps[1].to_string(),
            kind: ImportKind::Require,
        });
    }

    imports
}

/// Source text with comments removed, plus the byte ranges of the string,
/// template and regex literals left in it.
#[derive(Debug, Default)]
struct MaskedSource {
    code: String,
    literals: Vec<Range<usize>>,
}

impl MaskedSource {
    fn starts_in_code(&self, caps: &Captures<'_>) -> bool {
        let Some(whole) = caps.get(0) else {
            return false;
        };
        let offset = whole.start();
        let index = self.literals.partition_point(|range| range.end <= offset);
        !self
            .literals
            .get(index)
            .is_some_and(|range| range.start <= offset)
    }
}

fn mask_source(input: &str) -> MaskedSource {
    let chars: Vec<char> = input.chars().collect();
    let mut masked = MaskedSource {
        code: String::with_capacity(input.len()),
        literals: Vec::new(),
    };
    // last two non-whitespace characters outside comments, and the identifier
    // ending at `prev`
    let mut prev: Option<char> = None;
    let mut prev2: Option<char> = None;
    let mut word = String::new();
    let mut last_raw = '\n';
    let mut i = 0;

    while let Some(&ch) = chars.get(i) {
        let literal_end = match ch {
            '"' | '\'' | '`' => Some(string_end(&chars, i)),
            '/' if chars.get(i + 1) == Some(&'/') => {
                while chars.get(i).is_some_and(|&next| next != '\n') {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while let Some(&next) = chars.get(i) {
                    i += 1;
                    if next == '\n' {
                        masked.code.push('\n');
                    } else if next == '*' && chars.get(i) == Some(&'/') {
                        i += 1;
                        break;
                    }
                }
                masked.code.push(' ');
                last_raw = ' ';
                continue;
            }
            '/' if regex_allowed(prev, prev2, &word) => regex_end(&chars, i),
            _ => None,
        };

        if let Some(end) = literal_end {
            let start = masked.code.len();
            masked.code.extend(&chars[i..end]);
            masked.literals.push(start..masked.code.len());
            prev2 = prev;
            prev = Some(ch);
            word.clear();
            last_raw = ch;
            i = end;
            continue;
        }

        masked.code.push(ch);
        if is_ident_char(ch) {
            if !is_ident_char(last_raw) {
                word.clear();
            }
            word.push(ch);
        } else if !ch.is_whitespace() {
            word.clear();
        }
        if !ch.is_whitespace() {
            prev2 = prev;
            prev = Some(ch);
        }
        last_raw = ch;
        i += 1;
    }

    masked
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Whether a `/` following `prev` starts a regex literal rather than a
/// division.
fn regex_allowed(prev: Option<char>, prev2: Option<char>, word: &str) -> bool {
    match prev {
        None => true,
        Some(ch) if is_ident_char(ch) => matches!(
            word,
            "return"
                | "typeof"
                | "instanceof"
                | "in"
                | "of"
                | "new"
                | "delete"
                | "void"
                | "throw"
                | "case"
                | "do"
                | "else"
                | "yield"
                | "await"
        ),
        // `=>` but not a JSX closing tag
        Some('>') => prev2 == Some('='),
        Some(ch) => "(,=:[!&|?{};+-*%~^".contains(ch),
    }
}

/// Index just past the string or template literal opening at `start`.
/// Quoted strings end at an unescaped newline.
fn string_end(chars: &[char], start: usize) -> usize {
    let open = chars[start];
    let mut i = start + 1;
    while let Some(&ch) = chars.get(i) {
        i += 1;
        match ch {
            '\\' => i += 1,
            '\n' if open != '`' => return i - 1,
            _ if ch == open => return i,
            _ => {}
        }
    }
    chars.len()
}

/// Index just past the regex literal (with flags) opening at `start`, or
/// `None` when no closing `/` appears on the line.
fn regex_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut in_class = false;
    while let Some(&ch) = chars.get(i) {
        match ch {
            '\n' => return None,
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                i += 1;
                while chars.get(i).is_some_and(|flag| flag.is_ascii_alphabetic()) {
                    i += 1;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}
