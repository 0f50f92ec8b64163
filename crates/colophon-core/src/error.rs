use thiserror::Error;

/// Input-shape validation errors.
///
/// Downstream confidence math assumes well-formed input, so malformed
/// shapes fail loudly here instead of being silently coerced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("search query must populate at least one criterion")]
    EmptyCriteria,

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("confidence must be within [0, 1], got {value}")]
    ConfidenceOutOfRange { value: f64 },

    #[error("reliability must be within [0, 1], got {value}")]
    ReliabilityOutOfRange { value: f64 },

    #[error("publication year {year} is outside the supported range")]
    YearOutOfRange { year: i32 },

    #[error("month must be within 1..=12, got {month}")]
    InvalidMonth { month: u8 },

    #[error("day {day} is not valid for {year}-{month:02}")]
    InvalidDay { year: i32, month: u8, day: u8 },

    #[error("unknown provider id '{value}'")]
    UnknownProvider { value: String },

    #[error("unknown selection strategy '{value}'")]
    UnknownStrategy { value: String },
}
