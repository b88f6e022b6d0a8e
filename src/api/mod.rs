// API module entry
// Registry of document resources served under one `/{name}/{version}/`
// namespace, with the path router and error-to-response mapping.

pub mod request;
pub mod response;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::logger;
use crate::resource::{DocumentResource, RequestKind};
use crate::serializer::{build_content_type, Format, Serializer};
use crate::store::DocumentId;

pub use request::ApiRequest;

/// Request bodies above this many bytes are rejected unless configured
const DEFAULT_MAX_BODY_SIZE: u64 = 1_048_576;

/// A named, versioned collection of resources
///
/// Resources register before serving starts; the registry is read-only
/// afterwards, so an `Api` shares across connections behind a plain `Arc`.
pub struct Api {
    name: String,
    version: String,
    debug: bool,
    max_body_size: u64,
    resources: BTreeMap<String, Arc<DocumentResource>>,
    serializer: Serializer,
}

impl Api {
    #[must_use]
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            debug: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            resources: BTreeMap::new(),
            serializer: Serializer::default(),
        }
    }

    /// Debug mode exposes internal error messages in responses
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Cap on accepted request body size, in bytes
    #[must_use]
    pub const fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn register(&mut self, resource: DocumentResource) {
        self.resources
            .insert(resource.name().to_string(), Arc::new(resource));
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), ApiError> {
        self.resources
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotRegistered(name.to_string()))
    }

    pub fn resource(&self, name: &str) -> Result<&Arc<DocumentResource>, ApiError> {
        self.resources
            .get(name)
            .ok_or_else(|| ApiError::NotRegistered(name.to_string()))
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Path prefix all endpoints live under, e.g. `/api/v1`
    #[must_use]
    pub fn base_path(&self) -> String {
        format!("/{}/{}", self.name, self.version)
    }

    /// hyper entry point: collect the body, route, answer
    pub async fn handle<B>(
        &self,
        request: Request<B>,
        peer: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);

        let limit = usize::try_from(self.max_body_size).unwrap_or(usize::MAX);
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let error = if e.downcast_ref::<LengthLimitError>().is_some() {
                    ApiError::RequestTooLarge {
                        limit: self.max_body_size,
                    }
                } else {
                    logger::log_error(&format!("Failed to read request body: {e}"));
                    ApiError::BadRequest("could not read request body".to_string())
                };
                let request = ApiRequest::new(
                    parts.method,
                    &path_and_query,
                    &parts.headers,
                    Bytes::new(),
                    peer,
                );
                return self.error_response(&request, &error);
            }
        };

        let request = ApiRequest::new(parts.method, &path_and_query, &parts.headers, body, peer);
        self.handle_request(&request).await
    }

    /// Route an already-parsed request and log the outcome
    pub async fn handle_request(&self, request: &ApiRequest) -> Response<Full<Bytes>> {
        let mut response = match self.route(request).await {
            Ok(response) => response,
            Err(error) => self.error_response(request, &error),
        };

        // Some browsers cache XHR GETs aggressively
        if request.xhr {
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }

        logger::log_api_request(
            request.method.as_str(),
            &request.path,
            response.status().as_u16(),
        );
        response
    }

    async fn route(&self, request: &ApiRequest) -> Result<Response<Full<Bytes>>, ApiError> {
        let segments: Vec<&str> = request
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.len() < 2 || segments[0] != self.name || segments[1] != self.version {
            return Err(self.unknown_path(request));
        }

        match &segments[2..] {
            [] => {
                if request.method == Method::OPTIONS {
                    return Ok(response::options_response("GET,OPTIONS"));
                }
                if request.method != Method::GET {
                    return Err(ApiError::MethodNotAllowed {
                        allowed: "GET,OPTIONS".to_string(),
                    });
                }
                self.top_level(request)
            }
            [name] => {
                self.resource(name)?
                    .dispatch(self, RequestKind::List, request, None)
                    .await
            }
            [name, "schema"] => self.resource(name)?.dispatch_schema(request).await,
            [name, "set", ids] => {
                self.resource(name)?
                    .dispatch_multiple(self, request, ids)
                    .await
            }
            [name, id] => {
                let resource = self.resource(name)?;
                let id =
                    DocumentId::from_uri_or_id(id).ok_or_else(|| self.unknown_path(request))?;
                resource
                    .dispatch(self, RequestKind::Detail, request, Some(id))
                    .await
            }
            _ => Err(self.unknown_path(request)),
        }
    }

    /// `/{name}/{version}/`: a map of every resource's endpoints
    fn top_level(&self, request: &ApiRequest) -> Result<Response<Full<Bytes>>, ApiError> {
        let mut data = Map::new();
        for (name, resource) in &self.resources {
            let mut entry = Map::new();
            entry.insert(
                "list_endpoint".to_string(),
                Value::String(resource.list_uri(self)),
            );
            entry.insert(
                "schema".to_string(),
                Value::String(format!("{}schema/", resource.list_uri(self))),
            );
            data.insert(name.clone(), Value::Object(entry));
        }

        let (format, content_type) = self.negotiate(request);
        let body = self.serializer.serialize(&Value::Object(data), format)?;
        Ok(response::data_response(
            StatusCode::OK,
            &content_type,
            body,
            None,
        ))
    }

    /// Serialize an error in the request's format
    fn error_response(&self, request: &ApiRequest, error: &ApiError) -> Response<Full<Bytes>> {
        if error.status().is_server_error() {
            logger::log_error(&error.to_string());
        }

        let body_value = response::error_body(error, self.debug);
        let (format, content_type) = self.negotiate(request);
        let body = self
            .serializer
            .serialize(&body_value, format)
            .unwrap_or_else(|_| body_value.to_string());

        let mut response = response::data_response(error.status(), &content_type, body, None);
        if let ApiError::MethodNotAllowed { allowed } = error {
            if let Ok(value) = HeaderValue::from_str(allowed) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }

    fn negotiate(&self, request: &ApiRequest) -> (Format, String) {
        let mime = self.serializer.determine_format(
            request.format_param(),
            request.accept.as_deref(),
            "application/json",
        );
        let format = Format::from_mime(&mime).unwrap_or(Format::Json);
        (format, build_content_type(format.mime()))
    }

    fn unknown_path(&self, request: &ApiRequest) -> ApiError {
        ApiError::NotFound(format!("no api endpoint at `{}`", request.path))
    }
}
