//! API error taxonomy
//!
//! Every failure surfaced over the wire carries a stable numeric error code
//! and maps to one HTTP status. Handlers return `ApiError` and the dispatch
//! layer turns it into a serialized error body.

use std::collections::BTreeMap;

use hyper::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

/// Field name -> list of problems found for it.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

/// Errors produced while handling an API request
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid sort: {0}")]
    InvalidSort(String),

    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("field `{field}`: {message}")]
    Field { field: String, message: String },

    #[error("request body exceeds {limit} bytes")]
    RequestTooLarge { limit: u64 },

    #[error("authentication required")]
    Unauthorized,

    #[error("not authorized")]
    Forbidden,

    #[error("too many requests")]
    Throttled,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MultipleResults(String),

    /// Carries the pre-joined `Allow` header value.
    #[error("method not allowed")]
    MethodNotAllowed { allowed: String },

    #[error("no resource registered as `{0}`")]
    NotRegistered(String),

    #[error("not implemented")]
    NotImplemented,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a field conversion/hydration problem
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable numeric code included in every error body
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::BadRequest(_) => 1000,
            Self::UnsupportedFormat(_) => 1001,
            Self::InvalidFilter(_) => 1002,
            Self::InvalidSort(_) => 1003,
            Self::Validation(_) => 1004,
            Self::Field { .. } => 1005,
            Self::RequestTooLarge { .. } => 1006,
            Self::Unauthorized => 1100,
            Self::Forbidden => 1101,
            Self::Throttled => 1102,
            Self::NotFound(_) => 1200,
            Self::MultipleResults(_) => 1201,
            Self::MethodNotAllowed { .. } => 1202,
            Self::NotRegistered(_) => 1203,
            Self::NotImplemented => 1300,
            Self::Configuration(_) => 1301,
            Self::Store(_) => 1302,
            Self::Internal(_) => 1303,
        }
    }

    /// HTTP status the error maps to
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::UnsupportedFormat(_)
            | Self::InvalidFilter(_)
            | Self::InvalidSort(_)
            | Self::Validation(_)
            | Self::Field { .. } => StatusCode::BAD_REQUEST,
            Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Throttled => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) | Self::NotRegistered(_) => StatusCode::NOT_FOUND,
            Self::MultipleResults(_) => StatusCode::MULTIPLE_CHOICES,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Configuration(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to expose to clients
    ///
    /// Server-side failures (5xx) are reported with a generic sentence unless
    /// the api runs in debug mode.
    #[must_use]
    pub fn public_message(&self, debug: bool) -> String {
        if self.status().is_server_error() && !debug {
            "Sorry, this request could not be processed.".to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("nope".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Throttled.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::RequestTooLarge { limit: 1024 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::NotImplemented.status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ApiError::BadRequest(String::new()).error_code(), 1000);
        assert_eq!(ApiError::InvalidFilter(String::new()).error_code(), 1002);
        assert_eq!(ApiError::Throttled.error_code(), 1102);
        assert_eq!(ApiError::NotRegistered(String::new()).error_code(), 1203);
    }

    #[test]
    fn test_server_errors_are_masked_without_debug() {
        let err = ApiError::Internal("sqlite exploded".into());
        assert!(!err.public_message(false).contains("sqlite"));
        assert!(err.public_message(true).contains("sqlite"));

        // Client errors always pass through
        let err = ApiError::InvalidFilter("bad operator".into());
        assert!(err.public_message(false).contains("bad operator"));
    }
}
