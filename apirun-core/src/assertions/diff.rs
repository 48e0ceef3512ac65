use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::compare::json_eq;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

const VALUE_PREVIEW_CHARS: usize = 160;
const TRUNCATION_MARKER: &str = "\n… diff truncated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffChange {
    Added,
    Removed,
    Changed,
    Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    pub change: DiffChange,
    pub expected: JsonValue,
    pub actual: JsonValue,
}

impl DiffEntry {
    fn new(path: &str, change: DiffChange, expected: &JsonValue, actual: &JsonValue) -> Self {
        Self {
            path: path.to_string(),
            change,
            expected: expected.clone(),
            actual: actual.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    pub max_depth: usize,
    pub max_entries: usize,
    pub max_characters: usize,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_entries: 250,
            max_characters: 8000,
        }
    }
}

pub fn diff_json(expected: &JsonValue, actual: &JsonValue) -> Vec<DiffEntry> {
    diff_json_with(expected, actual, &DiffOptions::default())
}

/// Structural diff of `actual` against `expected`.
///
/// Object keys are visited in sorted order: removed keys, then added keys,
/// then shared keys. Below `max_depth` a differing subtree is reported as one
/// `changed` entry. Once `max_entries - 1` entries exist, the next difference
/// collapses into a single `changed` entry for the node where it was found
/// and the walk stops, so at most `max_entries` entries are produced.
pub fn diff_json_with(expected: &JsonValue, actual: &JsonValue, opts: &DiffOptions) -> Vec<DiffEntry> {
    let mut walker = Walker {
        opts,
        entries: Vec::new(),
        halted: false,
        collapsed: false,
    };
    walker.walk(expected, actual, "$", 0);
    walker.entries
}

struct Walker<'o> {
    opts: &'o DiffOptions,
    entries: Vec<DiffEntry>,
    halted: bool,
    collapsed: bool,
}

impl Walker<'_> {
    fn push(&mut self, entry: DiffEntry) -> bool {
        if self.halted {
            return false;
        }
        if self.entries.len() + 1 < self.opts.max_entries {
            self.entries.push(entry);
            true
        } else {
            self.halted = true;
            false
        }
    }

    fn collapse(&mut self, path: &str, expected: &JsonValue, actual: &JsonValue) -> bool {
        if !self.collapsed {
            self.collapsed = true;
            self.entries
                .push(DiffEntry::new(path, DiffChange::Changed, expected, actual));
        }
        false
    }

    /// Returns `false` once the walk has stopped.
    fn walk(&mut self, expected: &JsonValue, actual: &JsonValue, path: &str, depth: usize) -> bool {
        if depth >= self.opts.max_depth {
            if !json_eq(expected, actual)
                && !self.push(DiffEntry::new(path, DiffChange::Changed, expected, actual))
            {
                return self.collapse(path, expected, actual);
            }
            return true;
        }

        if type_name(expected) != type_name(actual) {
            if !self.push(DiffEntry::new(path, DiffChange::Type, expected, actual)) {
                return self.collapse(path, expected, actual);
            }
            return true;
        }

        match (expected, actual) {
            (JsonValue::Object(e), JsonValue::Object(a)) => {
                if !self.walk_object(e, a, path, depth) {
                    return self.collapse(path, expected, actual);
                }
                true
            }
            (JsonValue::Array(e), JsonValue::Array(a)) => {
                if !self.walk_array(e, a, path, depth) {
                    return self.collapse(path, expected, actual);
                }
                true
            }
            _ => {
                if !json_eq(expected, actual)
                    && !self.push(DiffEntry::new(path, DiffChange::Changed, expected, actual))
                {
                    return self.collapse(path, expected, actual);
                }
                true
            }
        }
    }

    fn walk_object(
        &mut self,
        expected: &Map<String, JsonValue>,
        actual: &Map<String, JsonValue>,
        path: &str,
        depth: usize,
    ) -> bool {
        let e_keys: BTreeSet<&String> = expected.keys().collect();
        let a_keys: BTreeSet<&String> = actual.keys().collect();

        for key in e_keys.difference(&a_keys) {
            let entry = DiffEntry::new(&extend_path(path, key), DiffChange::Removed, &expected[*key], &JsonValue::Null);
            if !self.push(entry) {
                return false;
            }
        }
        for key in a_keys.difference(&e_keys) {
            let entry = DiffEntry::new(&extend_path(path, key), DiffChange::Added, &JsonValue::Null, &actual[*key]);
            if !self.push(entry) {
                return false;
            }
        }
        for key in e_keys.intersection(&a_keys) {
            if !self.walk(&expected[*key], &actual[*key], &extend_path(path, key), depth + 1) {
                return false;
            }
        }
        true
    }

    fn walk_array(&mut self, expected: &[JsonValue], actual: &[JsonValue], path: &str, depth: usize) -> bool {
        let common = expected.len().min(actual.len());
        for i in 0..common {
            if !self.walk(&expected[i], &actual[i], &format!("{path}[{i}]"), depth + 1) {
                return false;
            }
        }
        for (i, item) in expected.iter().enumerate().skip(common) {
            let entry = DiffEntry::new(&format!("{path}[{i}]"), DiffChange::Removed, item, &JsonValue::Null);
            if !self.push(entry) {
                return false;
            }
        }
        for (i, item) in actual.iter().enumerate().skip(common) {
            let entry = DiffEntry::new(&format!("{path}[{i}]"), DiffChange::Added, &JsonValue::Null, item);
            if !self.push(entry) {
                return false;
            }
        }
        true
    }
}

fn extend_path(base: &str, key: &str) -> String {
    if key.is_empty() {
        return format!("{base}[\"\"]");
    }
    if IDENTIFIER_RE.is_match(key) {
        return format!("{base}.{key}");
    }
    format!("{base}['{}']", key.replace('\'', "\\'"))
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

pub fn format_diff(entries: &[DiffEntry]) -> Option<String> {
    format_diff_with(entries, DiffOptions::default().max_characters)
}

/// Unified-diff-like text: an `@@ <path>` header per entry followed by
/// `-`/`+` lines. Output beyond `max_characters` is cut and marked.
pub fn format_diff_with(entries: &[DiffEntry], max_characters: usize) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut lines = Vec::with_capacity(entries.len() * 3);
    for entry in entries {
        lines.push(format!("@@ {}", entry.path));
        match entry.change {
            DiffChange::Added => lines.push(format!("+ {}", preview(&entry.actual))),
            DiffChange::Removed => lines.push(format!("- {}", preview(&entry.expected))),
            DiffChange::Type => {
                lines.push(format!("- type: {}", type_name(&entry.expected)));
                lines.push(format!("+ type: {}", type_name(&entry.actual)));
            }
            DiffChange::Changed => {
                lines.push(format!("- expected: {}", preview(&entry.expected)));
                lines.push(format!("+ actual: {}", preview(&entry.actual)));
            }
        }
    }
    let text = lines.join("\n");
    if text.chars().count() > max_characters {
        let mut cut: String = text.chars().take(max_characters).collect();
        cut.push_str(TRUNCATION_MARKER);
        return Some(cut);
    }
    Some(text)
}

fn preview(value: &JsonValue) -> String {
    let text = match value {
        JsonValue::String(s) if !s.contains('\n') && s.chars().count() <= VALUE_PREVIEW_CHARS => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= VALUE_PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(VALUE_PREVIEW_CHARS - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn quoted_keys() {
        assert_eq!(extend_path("$", "a-b"), "$['a-b']");
        assert_eq!(extend_path("$", "it's"), "$['it\\'s']");
        assert_eq!(extend_path("$.x", "ok_1"), "$.x.ok_1");
        assert_eq!(extend_path("$", "1st"), "$['1st']");
    }

    #[test]
    fn preview_truncates_long_values() {
        let long = "x".repeat(400);
        let p = preview(&json!(long));
        assert_eq!(p.chars().count(), VALUE_PREVIEW_CHARS);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn depth_bound_collapses_subtree() {
        let opts = DiffOptions {
            max_depth: 1,
            ..DiffOptions::default()
        };
        let entries = diff_json_with(&json!({"a": {"b": 1}}), &json!({"a": {"b": 2}}), &opts);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "$.a");
        assert_eq!(entries[0].change, DiffChange::Changed);
    }
}
