//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Every variant has a stable `code()`
//! that is sent to callers; internal details are only logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::conversions::{UNIQUE_VIOLATION, sqlx_error_kind};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::password::PasswordHashError;
use thiserror::Error;

use crate::domain::services::TokenError;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Unique constraint guarding `users.email`
const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input (never retried)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid TOTP code")]
    InvalidTotp,

    /// Inactive or suspended account
    #[error("Account is not active")]
    AccountNotActive,

    /// The acting user's role does not allow the operation
    #[error("Insufficient privilege")]
    InsufficientPrivilege,

    /// A required permission is missing from the caller's role
    #[error("Forbidden")]
    Forbidden,

    /// Refresh token unknown, expired, revoked or already rotated
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredResetToken,

    #[error("Email already registered")]
    DuplicateEmail,

    /// Forgot-password lookup miss. This leaks account existence.
    #[error("Email not found")]
    EmailNotFound,

    #[error("User not found")]
    UserNotFound,

    /// Store or blocking pool did not answer in time (retryable)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::InvalidOrExpiredResetToken => {
                ErrorKind::BadRequest
            }
            AuthError::InvalidCredentials
            | AuthError::InvalidTotp
            | AuthError::InvalidRefreshToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired => ErrorKind::Unauthorized,
            AuthError::AccountNotActive
            | AuthError::InsufficientPrivilege
            | AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::DuplicateEmail => ErrorKind::Conflict,
            AuthError::EmailNotFound | AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::Unavailable(_) => ErrorKind::ServiceUnavailable,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidTotp => "INVALID_TOTP",
            AuthError::AccountNotActive => "ACCOUNT_NOT_ACTIVE",
            AuthError::InsufficientPrivilege => "INSUFFICIENT_PRIVILEGE",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidOrExpiredResetToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::EmailNotFound => "EMAIL_NOT_FOUND",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::Unavailable(_) => "UNAVAILABLE",
            AuthError::Database(_) | AuthError::Internal(_) => "INTERNAL",
        }
    }

    /// Safe to retry with backoff
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Session-class failures: the caller must authenticate again
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidRefreshToken | AuthError::InvalidToken | AuthError::TokenExpired
        )
    }

    /// Convert to AppError
    ///
    /// Server-side variants are replaced by a generic message.
    pub fn to_app_error(&self) -> AppError {
        let message = match self {
            AuthError::Database(_) | AuthError::Internal(_) => "Internal server error".to_string(),
            AuthError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        let err = AppError::new(self.kind(), message).with_code(self.code());
        match self {
            AuthError::Unavailable(_) => err.with_action("Retry the request later"),
            AuthError::InvalidRefreshToken | AuthError::TokenExpired => {
                err.with_action("Please sign in again")
            }
            AuthError::AccountNotActive => err.with_action("Contact an administrator"),
            _ => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Unavailable(what) => {
                tracing::warn!(dependency = %what, "Auth dependency unavailable");
            }
            AuthError::InvalidCredentials | AuthError::InvalidTotp => {
                tracing::warn!(code = self.code(), "Rejected login attempt");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match sqlx_error_kind(&err) {
            ErrorKind::ServiceUnavailable => AuthError::Unavailable(format!("database: {err}")),
            ErrorKind::Conflict if is_email_conflict(&err) => AuthError::DuplicateEmail,
            _ => AuthError::Database(err),
        }
    }
}

fn is_email_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(USERS_EMAIL_CONSTRAINT)
        }
        _ => false,
    }
}

impl From<PasswordHashError> for AuthError {
    fn from(err: PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::SignatureInvalid
            | TokenError::AlgorithmMismatch
            | TokenError::Malformed
            | TokenError::ClaimsRejected(_) => AuthError::InvalidToken,
            TokenError::KeyNotInitialized(_) | TokenError::Signing(_) => {
                AuthError::Internal(err.to_string())
            }
        }
    }
}
