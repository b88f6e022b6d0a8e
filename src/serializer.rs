//! Serialization module
//!
//! Encodes response data and decodes request bodies, independent of the
//! resources using it. Format selection honors an explicit `?format=`
//! override first, then the `Accept` header (quality-aware, with wildcard
//! support), then the resource's default.

use serde_json::Value;

use crate::errors::ApiError;

/// A supported wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Html,
}

impl Format {
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Html => "text/html",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Lookup by short name, as used in `?format=`
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Self::Json),
            "html" => Some(Self::Html),
            _ => None,
        }
    }

    /// Lookup by mime type; content-type parameters are ignored
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match strip_params(mime) {
            "application/json" => Some(Self::Json),
            "text/html" => Some(Self::Html),
            _ => None,
        }
    }
}

fn strip_params(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Format encoder/decoder shared by the resources of an api
#[derive(Debug, Clone)]
pub struct Serializer {
    formats: Vec<Format>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self {
            formats: vec![Format::Json, Format::Html],
        }
    }
}

impl Serializer {
    #[must_use]
    pub fn new(formats: Vec<Format>) -> Self {
        Self { formats }
    }

    #[must_use]
    pub fn supports(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }

    /// Encode `value` in the given format
    ///
    /// JSON objects serialize with sorted keys, so output is stable.
    pub fn serialize(&self, value: &Value, format: Format) -> Result<String, ApiError> {
        if !self.supports(format) {
            return Err(ApiError::UnsupportedFormat(format.mime().to_string()));
        }
        match format {
            Format::Json => serde_json::to_string(value)
                .map_err(|e| ApiError::Internal(format!("serialization failed: {e}"))),
            Format::Html => {
                let pretty = serde_json::to_string_pretty(value)
                    .map_err(|e| ApiError::Internal(format!("serialization failed: {e}")))?;
                Ok(format!(
                    "<!DOCTYPE html>\n<html><head><title>API</title></head>\
                     <body><pre>{}</pre></body></html>",
                    escape_html(&pretty)
                ))
            }
        }
    }

    /// Decode a request body according to its content type
    pub fn deserialize(&self, body: &[u8], content_type: &str) -> Result<Value, ApiError> {
        match Format::from_mime(content_type) {
            Some(Format::Json) if self.supports(Format::Json) => serde_json::from_slice(body)
                .map_err(|e| {
                    ApiError::BadRequest(format!("request body is not valid JSON: {e}"))
                }),
            _ => Err(ApiError::UnsupportedFormat(
                strip_params(content_type).to_string(),
            )),
        }
    }

    /// Pick the response mime type for a request
    #[must_use]
    pub fn determine_format(
        &self,
        format_param: Option<&str>,
        accept: Option<&str>,
        default_format: &str,
    ) -> String {
        if let Some(name) = format_param {
            if let Some(format) = Format::from_name(name) {
                if self.supports(format) {
                    return format.mime().to_string();
                }
            }
        }
        if let Some(accept) = accept {
            if let Some(mime) = self.best_accept_match(accept) {
                return mime;
            }
        }
        default_format.to_string()
    }

    /// Best supported mime for an `Accept` header, or `None`
    fn best_accept_match(&self, accept: &str) -> Option<String> {
        let mut candidates: Vec<(f32, &str)> = Vec::new();
        for part in accept.split(',') {
            let mut pieces = part.split(';');
            let media = pieces.next().unwrap_or("").trim();
            if media.is_empty() {
                continue;
            }
            let mut quality = 1.0_f32;
            for param in pieces {
                if let Some(q) = param.trim().strip_prefix("q=") {
                    quality = q.trim().parse().unwrap_or(0.0);
                }
            }
            if quality > 0.0 {
                candidates.push((quality, media));
            }
        }
        // Stable sort keeps header order between equal qualities
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        for (_, media) in candidates {
            if media == "*/*" {
                return self.formats.first().map(|format| format.mime().to_string());
            }
            if let Some(main) = media.strip_suffix("/*") {
                if let Some(format) = self
                    .formats
                    .iter()
                    .find(|format| format.mime().starts_with(main))
                {
                    return Some(format.mime().to_string());
                }
            }
            if let Some(format) = Format::from_mime(media) {
                if self.supports(format) {
                    return Some(format.mime().to_string());
                }
            }
        }
        None
    }
}

/// Add the charset parameter when the mime type carries none
#[must_use]
pub fn build_content_type(mime: &str) -> String {
    if mime.contains("charset") {
        mime.to_string()
    } else {
        format!("{mime}; charset=utf-8")
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
