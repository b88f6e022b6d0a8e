//! Authentication and authorization seams
//!
//! Both are per-resource plugins checked by dispatch: authentication answers
//! "who is this" (failures map to 401), authorization answers "may they do
//! this" (failures map to 403). Authentication also names the identifier the
//! throttle keys on.

use async_trait::async_trait;
use hyper::Method;
use subtle::ConstantTimeEq;

use crate::api::ApiRequest;
use crate::store::Document;

/// Decides whether a request is authenticated at all
#[async_trait]
pub trait Authentication: Send + Sync {
    async fn is_authenticated(&self, request: &ApiRequest) -> bool;

    /// Identifier used for throttling
    fn identifier(&self, request: &ApiRequest) -> String {
        request.default_identifier()
    }
}

/// Lets everything through; the default
pub struct NoAuthentication;

#[async_trait]
impl Authentication for NoAuthentication {
    async fn is_authenticated(&self, _request: &ApiRequest) -> bool {
        true
    }
}

/// Requires the embedding application to have attached a user
pub struct UserAuthentication;

#[async_trait]
impl Authentication for UserAuthentication {
    async fn is_authenticated(&self, request: &ApiRequest) -> bool {
        request.user.is_some()
    }

    fn identifier(&self, request: &ApiRequest) -> String {
        request
            .user
            .clone()
            .unwrap_or_else(|| request.default_identifier())
    }
}

/// Checks the `X-Api-Key` header against a configured key set
pub struct ApiKeyAuthentication {
    keys: Vec<String>,
}

impl ApiKeyAuthentication {
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl Authentication for ApiKeyAuthentication {
    async fn is_authenticated(&self, request: &ApiRequest) -> bool {
        let Some(candidate) = request.api_key.as_deref() else {
            return false;
        };
        // Constant-time comparison; ct_eq handles length mismatches itself
        self.keys
            .iter()
            .any(|key| key.as_bytes().ct_eq(candidate.as_bytes()).into())
    }
}

/// Decides whether an authenticated request may perform its operation
pub trait Authorization: Send + Sync {
    /// `document` is the target for detail operations, when already loaded
    fn is_authorized(&self, request: &ApiRequest, document: Option<&Document>) -> bool;
}

/// Allows every operation; the default
pub struct OpenAuthorization;

impl Authorization for OpenAuthorization {
    fn is_authorized(&self, _request: &ApiRequest, _document: Option<&Document>) -> bool {
        true
    }
}

/// Allows reads only
pub struct ReadOnlyAuthorization;

impl Authorization for ReadOnlyAuthorization {
    fn is_authorized(&self, request: &ApiRequest, _document: Option<&Document>) -> bool {
        matches!(
            request.method,
            Method::GET | Method::HEAD | Method::OPTIONS
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method) -> ApiRequest {
        ApiRequest::bare(method, "/api/v1/note/")
    }

    #[tokio::test]
    async fn test_no_authentication_always_passes() {
        assert!(NoAuthentication.is_authenticated(&request(Method::DELETE)).await);
    }

    #[tokio::test]
    async fn test_user_authentication() {
        let mut req = request(Method::GET);
        assert!(!UserAuthentication.is_authenticated(&req).await);

        req.user = Some("fred".to_string());
        assert!(UserAuthentication.is_authenticated(&req).await);
        assert_eq!(UserAuthentication.identifier(&req), "fred");
    }

    #[tokio::test]
    async fn test_api_key_authentication() {
        let auth = ApiKeyAuthentication::new(vec!["sesame".to_string()]);

        let mut req = request(Method::GET);
        assert!(!auth.is_authenticated(&req).await);

        req.api_key = Some("wrong".to_string());
        assert!(!auth.is_authenticated(&req).await);

        req.api_key = Some("sesame".to_string());
        assert!(auth.is_authenticated(&req).await);
    }

    #[test]
    fn test_read_only_authorization() {
        assert!(ReadOnlyAuthorization.is_authorized(&request(Method::GET), None));
        assert!(ReadOnlyAuthorization.is_authorized(&request(Method::OPTIONS), None));
        assert!(!ReadOnlyAuthorization.is_authorized(&request(Method::POST), None));
        assert!(!ReadOnlyAuthorization.is_authorized(&request(Method::DELETE), None));
        assert!(OpenAuthorization.is_authorized(&request(Method::DELETE), None));
    }
}
