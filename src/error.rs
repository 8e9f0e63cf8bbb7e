//! Error taxonomy shared by every stream stage.

use std::io;
use thiserror::Error;

/// Errors that can occur while building or pulling a feature stream.
#[derive(Error, Debug)]
pub enum FeatureError {
    /// A requested field is absent, duplicated, or schemas are incompatible.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A split or concatenation produced the wrong number of values.
    #[error("Arity error: expected {expected} values, got {found}")]
    Arity { expected: usize, found: usize },

    /// An aggregation or comparison was applied to incompatible value types.
    #[error("Aggregation type error on field '{field}': {message}")]
    AggregationType { field: String, message: String },

    /// Input was not coordinate-ordered (only reported when validation is on).
    #[error("Order violation at record {record}: {message}")]
    OrderViolation { record: usize, message: String },

    /// The stream has no replay descriptor.
    #[error("Stream cannot be reset: it was derived by an operator and has no source")]
    NotResettable,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl FeatureError {
    pub(crate) fn missing_field(field: &str, available: &[String]) -> Self {
        FeatureError::Schema(format!(
            "field '{}' not found (available: {})",
            field,
            available.join(", ")
        ))
    }

    pub(crate) fn type_error(field: &str, message: impl Into<String>) -> Self {
        FeatureError::AggregationType {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeatureError>;
