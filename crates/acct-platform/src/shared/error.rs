//! Platform Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use utoipa::ToSchema;

/// Reason the OAuth login flow was rejected.
///
/// Every state of the code-exchange flow can fail into one of these;
/// all of them surface as HTTP 400 to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthRejection {
    #[error("No authorization code provided")]
    MissingCode,

    #[error("Failed to obtain an identity token from the provider")]
    ExchangeFailed,

    #[error("Identity token failed verification")]
    InvalidIdentityToken,
}

impl OAuthRejection {
    fn code(&self) -> &'static str {
        match self {
            OAuthRejection::MissingCode => "MISSING_CODE",
            OAuthRejection::ExchangeFailed => "EXCHANGE_FAILED",
            OAuthRejection::InvalidIdentityToken => "INVALID_IDENTITY_TOKEN",
        }
    }
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {entity}: {field} already in use")]
    Duplicate { entity: String, field: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("OAuth login rejected: {0}")]
    OAuthRejected(OAuthRejection),

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AccountError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Duplicate {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccountError::NotFound { .. } => StatusCode::NOT_FOUND,
            AccountError::Duplicate { .. } => StatusCode::CONFLICT,
            AccountError::Validation { .. } => StatusCode::BAD_REQUEST,
            AccountError::OAuthRejected(_) => StatusCode::BAD_REQUEST,
            AccountError::Unauthorized { .. }
            | AccountError::InvalidCredentials
            | AccountError::TokenExpired
            | AccountError::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            AccountError::Connection { .. }
            | AccountError::Query { .. }
            | AccountError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("external") => "externalId",
                    _ => "email",
                };
                return AccountError::duplicate("Account", field);
            }
            return AccountError::query(db_err.to_string());
        }

        match err {
            sqlx::Error::RowNotFound => AccountError::not_found("Row", "<unknown>"),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => AccountError::connection(err.to_string()),
            other => AccountError::query(other.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for AccountError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        match *err.kind {
            // 11000 = duplicate key
            ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == 11000 => {
                let field = if we.message.contains("externalId") {
                    "externalId"
                } else {
                    "email"
                };
                AccountError::duplicate("Account", field)
            }
            ErrorKind::ServerSelection { ref message, .. } => {
                AccountError::connection(message.clone())
            }
            ErrorKind::Io(_) => AccountError::connection(err.to_string()),
            _ => AccountError::query(err.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_type, message) = match &self {
            AccountError::NotFound { .. } => ("NOT_FOUND", self.to_string()),
            AccountError::Duplicate { .. } => ("DUPLICATE", self.to_string()),
            AccountError::Validation { .. } => ("VALIDATION_ERROR", self.to_string()),
            AccountError::Unauthorized { .. } => ("UNAUTHORIZED", self.to_string()),
            AccountError::InvalidCredentials => ("INVALID_CREDENTIALS", self.to_string()),
            AccountError::TokenExpired => ("TOKEN_EXPIRED", self.to_string()),
            AccountError::InvalidToken { .. } => ("INVALID_TOKEN", self.to_string()),
            AccountError::OAuthRejected(r) => (r.code(), r.to_string()),
            // Server-side failures: log the cause, hand the client a
            // generic message so driver error text never leaks out.
            AccountError::Connection { .. }
            | AccountError::Query { .. }
            | AccountError::Internal { .. } => {
                tracing::error!(error = %self, "Internal error while handling request");
                ("INTERNAL_ERROR", "Internal server error".to_string())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AccountError::not_found("Account", "42").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AccountError::duplicate("Account", "email").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AccountError::validation("missing field").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AccountError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AccountError::TokenExpired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AccountError::OAuthRejected(OAuthRejection::MissingCode).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AccountError::query("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AccountError::connection("refused").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_oauth_rejection_codes() {
        assert_eq!(OAuthRejection::MissingCode.code(), "MISSING_CODE");
        assert_eq!(OAuthRejection::ExchangeFailed.code(), "EXCHANGE_FAILED");
        assert_eq!(
            OAuthRejection::InvalidIdentityToken.code(),
            "INVALID_IDENTITY_TOKEN"
        );
    }

    #[test]
    fn test_display() {
        let err = AccountError::not_found("Account", "abc");
        assert_eq!(err.to_string(), "Account not found: abc");

        let err = AccountError::duplicate("Account", "email");
        assert_eq!(err.to_string(), "Duplicate Account: email already in use");
    }
}
