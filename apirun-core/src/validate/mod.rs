mod validator;

use serde_json::Value as JsonValue;

use crate::error::ValidationError;
use crate::types::{TestCase, TestSuite};
use validator::Validator;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for TestCase {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();
        v.validate_assertions("assertions", &self.assertions);
        v.finish()
    }
}

impl Validate for TestSuite {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();
        for (i, step) in self.steps.iter().enumerate() {
            v.validate_assertions(&format!("steps[{i}].assertions"), &step.assertions);
            if let Some(case) = &step.case {
                v.validate_assertions(&format!("steps[{i}].case.assertions"), &case.assertions);
            }
        }
        v.finish()
    }
}

/// Check raw assertion definitions, reporting every violation at once.
pub fn validate_assertions(raw: &JsonValue) -> Result<(), ValidationError> {
    let mut v = Validator::new();
    v.validate_assertions("assertions", raw);
    v.finish()
}
