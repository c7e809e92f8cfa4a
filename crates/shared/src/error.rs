//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict (e.g., concurrent write to the same period row).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage temporarily unavailable; the operation may be replayed.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Unavailable(_) => 503,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound(String::new()), 404, "NOT_FOUND")]
    #[case(AppError::Validation(String::new()), 400, "VALIDATION_ERROR")]
    #[case(AppError::Conflict(String::new()), 409, "CONFLICT")]
    #[case(AppError::Unavailable(String::new()), 503, "SERVICE_UNAVAILABLE")]
    #[case(AppError::Database(String::new()), 500, "DATABASE_ERROR")]
    #[case(AppError::Internal(String::new()), 500, "INTERNAL_ERROR")]
    fn test_status_and_code(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::NotFound("msg".into()).to_string(),
            "Not found: msg"
        );
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(
            AppError::Conflict("msg".into()).to_string(),
            "Conflict: msg"
        );
        assert_eq!(
            AppError::Unavailable("msg".into()).to_string(),
            "Service unavailable: msg"
        );
        assert_eq!(
            AppError::Database("msg".into()).to_string(),
            "Database error: msg"
        );
        assert_eq!(
            AppError::Internal("msg".into()).to_string(),
            "Internal error: msg"
        );
    }
}
