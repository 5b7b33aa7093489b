//! Error types shared by the encoder and the prediction client.

use reqwest::StatusCode;
use thiserror::Error;

/// A single field that failed validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("{field} is missing")]
    Missing { field: &'static str },
    #[error("{field} below minimum {min}")]
    BelowMinimum { field: &'static str, min: f64 },
    #[error("{field} above maximum {max}")]
    AboveMaximum { field: &'static str, max: f64 },
    #[error("{field} must be a whole number, got {value}")]
    NotWhole { field: &'static str, value: f64 },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} has no category with code {code}")]
    UnknownCode { field: &'static str, code: i64 },
    #[error("{field} has no category named {token:?}")]
    UnknownToken { field: &'static str, token: String },
}

impl FieldError {
    /// Request-body name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing { field }
            | FieldError::BelowMinimum { field, .. }
            | FieldError::AboveMaximum { field, .. }
            | FieldError::NotWhole { field, .. }
            | FieldError::NotFinite { field }
            | FieldError::UnknownCode { field, .. }
            | FieldError::UnknownToken { field, .. } => field,
        }
    }
}

/// Every field-level problem found in one submission.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", joined(.errors))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub(crate) fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Names of the offending fields, in check order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(FieldError::field).collect()
    }

    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field() == field)
    }
}

/// Why `predictions[0][0]` could not be used.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Row 0 has no columns.
    #[error("first prediction row is empty")]
    EmptyRow,
    /// The value is exactly zero. A real 0% risk is a valid outcome, so this is
    /// a known defect kept for compatibility; see `ZeroPolicy`.
    #[error("prediction is zero")]
    ZeroProbability,
}

/// Coarse failure classes a presentation layer may distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Schema,
    Extraction,
}

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference service returned {0}")]
    Status(StatusCode),
    #[error("inference response is not JSON: {0}")]
    InvalidBody(#[source] serde_json::Error),
    #[error("inference response has an unexpected shape: {0}")]
    Schema(String),
    #[error("no usable prediction: {0}")]
    Extraction(ExtractionFailure),
    #[error("prediction cancelled")]
    Cancelled,
}

impl PredictError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PredictError::Transport(_)
            | PredictError::Status(_)
            | PredictError::InvalidBody(_)
            | PredictError::Cancelled => FailureKind::Transport,
            PredictError::Schema(_) => FailureKind::Schema,
            PredictError::Extraction(_) => FailureKind::Extraction,
        }
    }
}

/// Failure of the whole encode-then-predict pipeline.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("invalid patient record: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Prediction(#[from] PredictError),
}
