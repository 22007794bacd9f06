//! Caller-facing error taxonomy.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::models::ValidationError;

/// Errors surfaced by handlers and the FFI object.
///
/// `Internal` never carries storage details: those are logged where the error
/// is converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, uniffi::Error)]
pub enum HealthHubError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Reserved for rate limiting at the transport boundary.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl HealthHubError {
    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            HealthHubError::Validation(_) => "VALIDATION_ERROR",
            HealthHubError::NotFound(_) => "NOT_FOUND",
            HealthHubError::Unauthorized(_) => "UNAUTHORIZED",
            HealthHubError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            HealthHubError::Internal(_) => "INTERNAL_ERROR",
            HealthHubError::Cancelled => "CANCELLED",
        }
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        HealthHubError::NotFound(format!("{} {} does not exist", entity, id))
    }

    /// Log the full error and hand back a generic message.
    fn internal(source: &dyn std::error::Error) -> Self {
        tracing::error!(error = %source, "internal error");
        HealthHubError::Internal("An unexpected error occurred".to_string())
    }
}

pub type HealthHubResult<T> = Result<T, HealthHubError>;

impl From<DbError> for HealthHubError {
    fn from(e: DbError) -> Self {
        HealthHubError::internal(&e)
    }
}

impl From<ValidationError> for HealthHubError {
    fn from(e: ValidationError) -> Self {
        HealthHubError::Validation(e.to_string())
    }
}

/// A bad startup environment is an operator fault, not a caller one.
impl From<ConfigError> for HealthHubError {
    fn from(e: ConfigError) -> Self {
        tracing::error!(error = %e, "invalid configuration");
        HealthHubError::Internal(format!("configuration: {}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for HealthHubError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        tracing::error!(error = %e, "lock poisoned");
        HealthHubError::Internal("An unexpected error occurred".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(HealthHubError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(HealthHubError::not_found("Patient", 1).code(), "NOT_FOUND");
        assert_eq!(HealthHubError::Unauthorized("x".into()).code(), "UNAUTHORIZED");
        assert_eq!(HealthHubError::RateLimited("x".into()).code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(HealthHubError::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let err: HealthHubError = DbError::InvalidData("secret table detail".into()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_validation_keeps_field() {
        let err: HealthHubError = ValidationError::new("firstName", "cannot be empty").into();
        assert_eq!(err, HealthHubError::Validation("firstName: cannot be empty".into()));
    }

    #[test]
    fn test_config_errors_are_internal() {
        let err: HealthHubError = ConfigError::InvalidValue {
            key: "HEALTHHUB_CACHE_TTL_SECS",
            message: "must be between 1 and 3600".into(),
        }
        .into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
