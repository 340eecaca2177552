//! Replayable response captures.
//!
//! A live HTTP body can be read once. Everything past the fetch client works
//! with [`ResponseSnapshot`] instead: the body is buffered into [`Bytes`], so
//! cloning a snapshot yields an independent copy that shares the allocation
//! and can be read as many times as needed.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a response came from relative to the application origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response exposed through CORS.
    Cors,
    /// Cross-origin response without CORS; status and headers are untrusted.
    Opaque,
    /// Synthetic error response.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(ResponseKind::Basic),
            "cors" => Some(ResponseKind::Cors),
            "opaque" => Some(ResponseKind::Opaque),
            "error" => Some(ResponseKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable capture of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    /// Final URL the response was served from.
    pub url: String,
    pub status: u16,
    pub kind: ResponseKind,
    /// Header pairs in arrival order; names are lowercase.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(url: impl Into<String>, status: u16, kind: ResponseKind) -> Self {
        Self { url: url.into(), status, kind, headers: Vec::new(), body: Bytes::new() }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in [ResponseKind::Basic, ResponseKind::Cors, ResponseKind::Opaque, ResponseKind::Error] {
            assert_eq!(ResponseKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResponseKind::parse("navigate"), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let snap = ResponseSnapshot::new("https://example.com/", 200, ResponseKind::Basic)
            .with_header("Content-Type", "text/html");
        assert_eq!(snap.content_type(), Some("text/html"));
        assert_eq!(snap.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(snap.header("etag"), None);
    }

    #[test]
    fn test_clones_are_independently_readable() {
        let original = ResponseSnapshot::new("https://example.com/app.js", 200, ResponseKind::Basic)
            .with_body("console.log('hi')");
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.text(), "console.log('hi')");
        assert_eq!(copy.text(), "console.log('hi')");
    }

    #[test]
    fn test_is_success() {
        assert!(ResponseSnapshot::new("u", 204, ResponseKind::Basic).is_success());
        assert!(!ResponseSnapshot::new("u", 404, ResponseKind::Basic).is_success());
    }
}
