/// Error types for Blog Service
///
/// Every store operation reports one of these outcomes instead of a raw
/// storage error. Storage errors are classified once, at the store boundary,
/// and anything unrecognised travels on as a `TransientFailure`.
use crate::validation::FieldErrors;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::time::Duration;
use thiserror::Error;

/// Result type for blog-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of the backing store itself. Never retried by the service.
#[derive(Debug, Error)]
pub enum TransientFailure {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store operation cancelled by caller")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Target row absent, or absent within the required scope
    #[error("record not found")]
    NotFound,

    /// Presented version no longer matches the stored one
    #[error("edit conflict")]
    EditConflict,

    /// Row exists but the caller does not own it
    #[error("user is not authorized to perform this action")]
    Unauthorized,

    /// Uniqueness violation on tag name or post/tag pair
    #[error("duplicate entry")]
    DuplicateEntry,

    /// Field-level input rejection
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Missing or invalid bearer token
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// Malformed request body
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] TransientFailure),
}

impl AppError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Store(_))
    }

    /// Label used for the `outcome` dimension of store metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::EditConflict => "edit_conflict",
            AppError::Unauthorized => "unauthorized",
            AppError::DuplicateEntry => "duplicate_entry",
            AppError::Validation(_) => "validation",
            AppError::AuthenticationRequired(_) => "unauthenticated",
            AppError::BadRequest(_) => "bad_request",
            AppError::Store(TransientFailure::Timeout(_)) => "timeout",
            AppError::Store(TransientFailure::Cancelled) => "cancelled",
            AppError::Store(TransientFailure::Database(_)) => "store_failure",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateEntry
            }
            // Parent post or tag vanished between validation and write
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound
            }
            other => AppError::Store(TransientFailure::Database(other)),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::EditConflict | AppError::DuplicateEntry => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AppError::Validation(errors) => serde_json::json!({ "error": errors }),
            AppError::NotFound => {
                serde_json::json!({ "error": "the requested resource could not be found" })
            }
            AppError::EditConflict => serde_json::json!({
                "error": "unable to update the record due to an edit conflict, please try again"
            }),
            AppError::Store(failure) => {
                tracing::error!(error = %failure, "store operation failed");
                serde_json::json!({
                    "error": "the server encountered a problem and could not process your request"
                })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct FakeDbError(ErrorKind);

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error")
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            None
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError(kind)))
    }

    #[test]
    fn unique_violation_becomes_duplicate_entry() {
        let err = AppError::from(db_error(ErrorKind::UniqueViolation));
        assert!(matches!(err, AppError::DuplicateEntry));
    }

    #[test]
    fn foreign_key_violation_becomes_not_found() {
        let err = AppError::from(db_error(ErrorKind::ForeignKeyViolation));
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn unrecognised_errors_stay_transient() {
        assert!(AppError::from(db_error(ErrorKind::Other)).is_transient());
        assert!(AppError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(matches!(
            AppError::from(sqlx::Error::RowNotFound),
            AppError::NotFound
        ));
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::EditConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::DuplicateEntry.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Store(TransientFailure::Cancelled).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Store(TransientFailure::Timeout(Duration::from_secs(3))).outcome_label(),
            "timeout"
        );
    }
}
