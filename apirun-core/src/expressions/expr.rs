use std::sync::LazyLock;

use regex::Regex;

static JSONPATH_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^jsonpath\((?:'(?P<sq>.+)'|"(?P<dq>.+)")\)$"#).expect("valid regex")
});

/// Root namespace an expression starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprRoot {
    Variables,
    Env,
    Row,
    Secret,
    /// A previous suite step, addressed by alias.
    Prev(String),
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    JsonPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub root: ExprRoot,
    pub path: Vec<PathSegment>,
}

/// Parse `root.seg1.seg2` into an [`Expr`].
///
/// Returns `None` when the expression can never resolve to anything
/// (empty text, or `prev` without an alias). Unknown roots are treated as a
/// `variables` lookup of the full dotted path.
pub fn parse_expr(input: &str) -> Option<Expr> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut parts = split_segments(input).into_iter();
    let head = parts.next()?;
    let rest: Vec<String> = parts.collect();

    let (root, rest) = match head.as_str() {
        "variables" => (ExprRoot::Variables, rest),
        "env" => (ExprRoot::Env, rest),
        "row" => (ExprRoot::Row, rest),
        "secret" => (ExprRoot::Secret, rest),
        "response" => (ExprRoot::Response, rest),
        "prev" => {
            let mut rest = rest.into_iter();
            let alias = rest.next()?;
            (ExprRoot::Prev(alias), rest.collect())
        }
        _ => {
            let mut all = Vec::with_capacity(rest.len() + 1);
            all.push(head);
            all.extend(rest);
            (ExprRoot::Variables, all)
        }
    };

    Some(Expr {
        root,
        path: rest.into_iter().map(|s| classify_segment(&s)).collect(),
    })
}

fn classify_segment(segment: &str) -> PathSegment {
    if let Some(caps) = JSONPATH_CALL_RE.captures(segment) {
        if let Some(m) = caps.name("sq").or_else(|| caps.name("dq")) {
            return PathSegment::JsonPath(m.as_str().to_string());
        }
    }
    PathSegment::Key(segment.to_string())
}

/// Split on `.` outside of quotes and parentheses so that
/// `jsonpath('$.items[0].id')` stays one segment.
fn split_segments(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                '.' if depth == 0 => {
                    out.push(std::mem::take(&mut current).trim().to_string());
                }
                _ => current.push(ch),
            },
        }
    }
    out.push(current.trim().to_string());
    out
}
