use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::ParseError;
use crate::types::{Environment, ExecutionPolicySnapshot, TestCase, TestSuite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument<T> {
    pub document: T,
    pub format: DocumentFormat,
}

pub fn parse_document_str<T: DeserializeOwned>(
    input: &str,
    format: DocumentFormat,
) -> Result<ParsedDocument<T>, ParseError> {
    match format {
        DocumentFormat::Json => Ok(ParsedDocument {
            document: serde_json::from_str::<T>(input)?,
            format,
        }),
        DocumentFormat::Yaml => Ok(ParsedDocument {
            document: serde_yaml::from_str::<T>(input)?,
            format,
        }),
        DocumentFormat::Auto => parse_document_auto(input),
    }
}

fn parse_document_auto<T: DeserializeOwned>(input: &str) -> Result<ParsedDocument<T>, ParseError> {
    // JSON always starts with `{` or `[` after trimming.
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<T>(input) {
            Ok(document) => Ok(ParsedDocument {
                document,
                format: DocumentFormat::Json,
            }),
            Err(e) => match serde_yaml::from_str::<T>(input) {
                Ok(document) => Ok(ParsedDocument {
                    document,
                    format: DocumentFormat::Yaml,
                }),
                Err(_) => Err(ParseError::Json(e)),
            },
        };
    }

    match serde_yaml::from_str::<T>(input) {
        Ok(document) => Ok(ParsedDocument {
            document,
            format: DocumentFormat::Yaml,
        }),
        Err(e) => {
            if let Ok(document) = serde_json::from_str::<T>(input) {
                return Ok(ParsedDocument {
                    document,
                    format: DocumentFormat::Json,
                });
            }
            Err(ParseError::Yaml(e))
        }
    }
}

pub fn parse_test_case_str(input: &str) -> Result<TestCase, ParseError> {
    Ok(parse_document_str(input, DocumentFormat::Auto)?.document)
}

pub fn parse_suite_str(input: &str) -> Result<TestSuite, ParseError> {
    Ok(parse_document_str(input, DocumentFormat::Auto)?.document)
}

pub fn parse_environment_str(input: &str) -> Result<Environment, ParseError> {
    Ok(parse_document_str(input, DocumentFormat::Auto)?.document)
}

/// Policies are normalized after parsing, so out-of-range values are
/// clamped rather than rejected.
pub fn parse_policy_str(input: &str) -> Result<ExecutionPolicySnapshot, ParseError> {
    let raw: ParsedDocument<JsonValue> = parse_document_str(input, DocumentFormat::Auto)?;
    Ok(ExecutionPolicySnapshot::from_value(&raw.document))
}
