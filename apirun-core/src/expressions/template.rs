use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+)\}\}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Trimmed expression text between `{{` and `}}`.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// The expression when the whole input is exactly one placeholder.
    pub fn single_expr(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Expr(e)] => Some(e.as_str()),
            _ => None,
        }
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Expr(_)))
    }
}

/// Split `input` into literal text and `{{ expr }}` placeholders.
///
/// Braces that do not form a placeholder (unclosed `{{`, JSON objects inside a
/// string) stay literal.
pub fn parse_template(input: &str) -> Template {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(input) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(input[last..whole.start()].to_string()));
        }
        segments.push(Segment::Expr(inner.as_str().trim().to_string()));
        last = whole.end();
    }
    if last < input.len() {
        segments.push(Segment::Literal(input[last..].to_string()));
    }
    Template { segments }
}
