mod expr;
mod jsonpath;
mod render;
mod template;

pub use expr::{parse_expr, Expr, ExprRoot, PathSegment};
pub use jsonpath::{collapse_matches, query_jsonpath};
pub use render::{render_str, render_value, resolve_expression, value_to_string};
pub use template::{parse_template, Segment, Template};
