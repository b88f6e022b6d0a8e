//! Parsed API request
//!
//! A hyper request is flattened into this form before dispatch: method,
//! decoded query pairs, the few headers the toolkit cares about, the raw
//! body, and a request-scoped document cache used when dehydrating related
//! resources.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, ACCEPT, CONTENT_TYPE, HOST};
use hyper::Method;

use crate::store::{Document, DocumentId};

/// One in-flight API request
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Decoded query pairs, in order of appearance
    pub query: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub api_key: Option<String>,
    /// `X-Requested-With` was present (browser XHR)
    pub xhr: bool,
    pub host: Option<String>,
    pub peer: Option<SocketAddr>,
    /// Authenticated principal, when the embedding application sets one
    pub user: Option<String>,
    pub body: Bytes,
    cache: Mutex<HashMap<String, Document>>,
}

impl ApiRequest {
    /// Build a request from hyper parts plus the collected body
    #[must_use]
    pub fn new(
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
        peer: Option<SocketAddr>,
    ) -> Self {
        let (path, raw_query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        let header = |name: hyper::header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            method,
            path: path.to_string(),
            query: raw_query.map(parse_query).unwrap_or_default(),
            content_type: header(CONTENT_TYPE),
            accept: header(ACCEPT),
            api_key: headers
                .get("x-api-key")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            xhr: headers.contains_key("x-requested-with"),
            host: header(HOST),
            peer,
            user: None,
            body,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Bare request for tests and programmatic dispatch
    #[must_use]
    pub fn bare(method: Method, path: &str) -> Self {
        Self::new(method, path, &HeaderMap::new(), Bytes::new(), None)
    }

    /// Last value of a query parameter
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `?format=` override, when present
    #[must_use]
    pub fn format_param(&self) -> Option<&str> {
        self.query_value("format")
    }

    /// Identifier used for throttling when authentication offers nothing
    /// better: peer address plus host header.
    #[must_use]
    pub fn default_identifier(&self) -> String {
        let address = self
            .peer
            .map_or_else(|| "noaddr".to_string(), |peer| peer.ip().to_string());
        let host = self.host.as_deref().unwrap_or("nohost");
        format!("{address}_{host}")
    }

    /// Look up a related document cached earlier in this request
    #[must_use]
    pub fn cached_document(&self, collection: &str, id: &DocumentId) -> Option<Document> {
        let cache = self.cache.lock().unwrap();
        cache.get(&cache_key(collection, id)).cloned()
    }

    /// Cache a related document for the rest of this request
    pub fn cache_document(&self, collection: &str, document: Document) {
        if let Some(id) = crate::store::document_id(&document) {
            let mut cache = self.cache.lock().unwrap();
            cache.insert(cache_key(collection, &id), document);
        }
    }
}

fn cache_key(collection: &str, id: &DocumentId) -> String {
    format!("{collection}/{id}")
}

/// Decode an `application/x-www-form-urlencoded` query string
#[must_use]
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

/// Decode `%XX` escapes and `+` as space; malformed escapes pass through
#[must_use]
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                if let (Some(hi), Some(lo)) = (
                    bytes.get(i + 1).copied().and_then(hex_value),
                    bytes.get(i + 2).copied().and_then(hex_value),
                ) {
                    out.push(hi * 16 + lo);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
