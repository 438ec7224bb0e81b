//! Request-body validation for the chat endpoint.
//!
//! The body is checked in full before any external call is made: shape
//! first (serde), then the documented bounds. A failure maps to a 400 and
//! no generation is attempted.

use std::fmt;

use serde_json::Value;

use crate::api::ChatRequestBody;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Malformed(String),
    EmptyField(&'static str),
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Malformed(detail) => write!(f, "invalid body: {detail}"),
            ValidationError::EmptyField(field) => {
                write!(f, "invalid body: '{field}' must be non-empty")
            }
            ValidationError::OutOfRange { field, min, max } => {
                write!(f, "invalid body: '{field}' must be within {min}..={max}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

fn check_unit_range(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
        }),
        _ => Ok(()),
    }
}

pub fn parse_chat_request(value: Value) -> Result<ChatRequestBody, ValidationError> {
    let body: ChatRequestBody =
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    if body.id.trim().is_empty() {
        return Err(ValidationError::EmptyField("id"));
    }
    if body.model.trim().is_empty() {
        return Err(ValidationError::EmptyField("model"));
    }
    check_unit_range("temperature", Some(body.temperature))?;
    check_unit_range("topP", body.top_p)?;
    check_unit_range("topK", body.top_k)?;
    // maxOutputTokens >= 0 is enforced by the unsigned type: a negative
    // value fails shape validation above.

    Ok(body)
}
