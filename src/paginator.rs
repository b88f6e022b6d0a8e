//! Pagination module
//!
//! Resolves `limit`/`offset` query parameters against the resource's
//! defaults, and produces the `meta` block of list responses with
//! next/previous page links that preserve the remaining query parameters.

use serde_json::{Map, Value};

use crate::errors::ApiError;

/// Resolved paging window for one list request
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    limit: usize,
    offset: usize,
}

impl Paginator {
    /// Resolve the window from query parameters
    ///
    /// `limit=0` asks for the biggest allowed page; any limit is capped at
    /// `max_limit`. Negative or non-numeric values are rejected.
    pub fn from_query(
        query: &[(String, String)],
        default_limit: usize,
        max_limit: usize,
    ) -> Result<Self, ApiError> {
        let limit = match last_value(query, "limit") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) if value >= 0 => usize::try_from(value).unwrap_or(usize::MAX),
                _ => {
                    return Err(ApiError::BadRequest(format!(
                        "invalid limit `{raw}`: please provide a non-negative integer"
                    )))
                }
            },
            None => default_limit,
        };
        let limit = if limit == 0 { max_limit } else { limit.min(max_limit) };

        let offset = match last_value(query, "offset") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) if value >= 0 => usize::try_from(value).unwrap_or(usize::MAX),
                _ => {
                    return Err(ApiError::BadRequest(format!(
                        "invalid offset `{raw}`: please provide a non-negative integer"
                    )))
                }
            },
            None => 0,
        };

        Ok(Self { limit, offset })
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Window to hand to the store
    #[must_use]
    pub const fn slice(&self) -> (usize, Option<usize>) {
        (self.offset, Some(self.limit))
    }

    /// The `meta` block for a list response
    #[must_use]
    pub fn meta(
        &self,
        total_count: usize,
        list_uri: &str,
        query: &[(String, String)],
    ) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("limit".to_string(), Value::from(self.limit));
        meta.insert("offset".to_string(), Value::from(self.offset));
        meta.insert("total_count".to_string(), Value::from(total_count));

        let next = if self.offset + self.limit < total_count {
            Some(self.page_uri(list_uri, query, self.offset + self.limit))
        } else {
            None
        };
        let previous = if self.offset >= self.limit && self.offset > 0 {
            Some(self.page_uri(list_uri, query, self.offset - self.limit))
        } else {
            None
        };
        meta.insert("next".to_string(), next.map_or(Value::Null, Value::from));
        meta.insert(
            "previous".to_string(),
            previous.map_or(Value::Null, Value::from),
        );
        meta
    }

    fn page_uri(&self, list_uri: &str, query: &[(String, String)], offset: usize) -> String {
        let mut pairs: Vec<(String, String)> = query
            .iter()
            .filter(|(key, _)| key != "limit" && key != "offset")
            .cloned()
            .collect();
        pairs.push(("limit".to_string(), self.limit.to_string()));
        pairs.push(("offset".to_string(), offset.to_string()));

        let encoded: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
            .collect();
        format!("{list_uri}?{}", encoded.join("&"))
    }
}

fn last_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Percent-encode everything outside the query-safe set
fn encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
