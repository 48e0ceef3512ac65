mod compare;
mod diff;
mod engine;

pub use compare::{as_number, contains, json_eq, length_of};
pub use diff::{diff_json, diff_json_with, format_diff, format_diff_with, DiffChange, DiffEntry, DiffOptions};
pub use engine::AssertionEngine;
