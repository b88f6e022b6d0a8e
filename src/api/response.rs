// API response builders
// Constructs hyper responses without panicking: builder failures fall back
// to a plain response and get logged.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_TYPE, LOCATION};
use hyper::{Response, StatusCode};
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::logger;

/// Response carrying an already-serialized payload
pub fn data_response(
    status: StatusCode,
    content_type: &str,
    body: String,
    location: Option<&str>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type);
    if let Some(location) = location {
        builder = builder.header(LOCATION, location);
    }
    builder
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// Bodyless response, e.g. 204 after a delete
pub fn empty_response(status: StatusCode, location: Option<&str>) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    if let Some(location) = location {
        builder = builder.header(LOCATION, location);
    }
    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        logger::log_error(&format!("Failed to build response: {e}"));
        Response::new(Full::new(Bytes::new()))
    })
}

/// 200 answering an OPTIONS request, `Allow` listing the methods
pub fn options_response(allow: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(ALLOW, allow)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(Full::new(Bytes::new()))
        })
}

/// The serializable body for an error response
///
/// Always `error_code` and `error_message`; validation failures add an
/// `errors` object keyed by field path.
pub fn error_body(error: &ApiError, debug: bool) -> Value {
    let mut body = Map::new();
    body.insert("error_code".to_string(), Value::from(error.error_code()));
    body.insert(
        "error_message".to_string(),
        Value::String(error.public_message(debug)),
    );
    if let ApiError::Validation(errors) = error {
        let mut fields = Map::new();
        for (field, messages) in errors {
            fields.insert(
                field.clone(),
                Value::Array(
                    messages
                        .iter()
                        .map(|message| Value::String(message.clone()))
                        .collect(),
                ),
            );
        }
        body.insert("errors".to_string(), Value::Object(fields));
    }
    Value::Object(body)
}
