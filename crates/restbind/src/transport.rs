//! # Transport Boundary
//!
//! The network layer is an external collaborator. This module only defines the shape
//! of a request, the query parameter map sent with it, and the [`Transport`] trait an
//! implementation must satisfy. The crate ships no HTTP client: tests use
//! [`MockTransport`](crate::mock::MockTransport) and the sample crate routes requests
//! to an in-process server actor.

use crate::error::TransportError;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Characters left untouched in query keys and values.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// HTTP-like verb of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters of a fetch-family request.
///
/// Keys are kept sorted so the serialized query string is stable regardless of
/// insertion order. Merging keeps the last assigned value per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Merges `other` into `self`; values from `other` override existing ones.
    pub fn merge(&mut self, other: &QueryParams) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes the parameters as `k1=v1&k2=v2`, percent-encoded.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_ENCODE),
                    utf8_percent_encode(v, QUERY_ENCODE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for QueryParams {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// A single request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>, query: QueryParams) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: QueryParams::new(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            query: QueryParams::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
        }
    }

    /// Path plus serialized query string, e.g. `/api/bikes?brand=trek`.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query.to_query_string())
        }
    }
}

/// Performs requests against the remote resource.
///
/// Implementations return the raw response payload on a 2xx answer and a
/// [`TransportError`] otherwise. A transport is shared by every collection and
/// record of a model type, so it must be `Send + Sync`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Value, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_sorted_and_encoded() {
        let params = QueryParams::new()
            .with("page", "2")
            .with("brand", "santa cruz")
            .with("tag", "a&b");
        assert_eq!(
            params.to_query_string(),
            "brand=santa%20cruz&page=2&tag=a%26b"
        );
    }

    #[test]
    fn merge_keeps_last_assigned_value() {
        let mut params = QueryParams::from([("brand", "trek"), ("size", "m")]);
        params.merge(&QueryParams::from([("brand", "giant")]));
        assert_eq!(params.get("brand"), Some("giant"));
        assert_eq!(params.get("size"), Some("m"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn url_omits_empty_query() {
        assert_eq!(Request::get("/api/bikes", QueryParams::new()).url(), "/api/bikes");
        assert_eq!(
            Request::get("/api/bikes", QueryParams::from([("brand", "trek")])).url(),
            "/api/bikes?brand=trek"
        );
        assert_eq!(Request::delete("/api/bikes/1").method.to_string(), "DELETE");
    }
}
