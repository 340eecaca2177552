//! Intercepted request descriptors.

use reqwest::Method;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use snipcache_core::{Error, RequestKey};
use url::Url;

use crate::fetch::canonicalize;

/// An outbound request as the client issued it.
///
/// Immutable once built; strategies use it as both the cache lookup key and
/// the network input.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    navigate: bool,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), navigate: false }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a request from untrusted strings, canonicalizing the URL and
    /// resolving origin-relative paths against `origin`.
    pub fn parse(method: &str, url: &str, origin: &Url) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;
        let url = canonicalize(url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(method, url))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Mark as a top-level page load.
    pub fn navigation(mut self) -> Self {
        self.navigate = true;
        self
    }

    pub fn set_navigation(&mut self, navigate: bool) {
        self.navigate = navigate;
    }

    /// Insert a header from untrusted strings.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid header name: {name}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| Error::InvalidInput(format!("invalid value for header {name}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_navigation(&self) -> bool {
        self.navigate
    }

    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Cache key: method plus canonical URL.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }

    /// Whether the `Accept` header lists `mime`. A missing header accepts nothing.
    pub fn accepts(&self, mime: &str) -> bool {
        self.header(ACCEPT)
            .is_some_and(|accept| accept.to_ascii_lowercase().contains(mime))
    }

    /// `Cache-Control: no-cache`, the explicit bypass signal.
    pub fn wants_fresh(&self) -> bool {
        self.header(CACHE_CONTROL)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("no-cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_parse_resolves_relative_url() {
        let request = Request::parse("get", "/index.html#top", &origin()).unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.url().as_str(), "http://localhost:8080/index.html");
        assert_eq!(request.key(), RequestKey::get("http://localhost:8080/index.html"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(Request::parse("GET", "ftp://x/", &origin()), Err(Error::InvalidUrl(_))));
        assert!(matches!(Request::parse("BAD METHOD", "/", &origin()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_accepts() {
        let request = Request::parse("GET", "/", &origin())
            .unwrap()
            .with_header(ACCEPT, HeaderValue::from_static("Text/HTML,application/xhtml+xml"));
        assert!(request.accepts("text/html"));
        assert!(!request.accepts("application/json"));

        let bare = Request::parse("GET", "/", &origin()).unwrap();
        assert!(!bare.accepts("text/html"));
    }

    #[test]
    fn test_wants_fresh() {
        let mut request = Request::parse("GET", "/api/data", &origin()).unwrap();
        assert!(!request.wants_fresh());
        request.insert_header("Cache-Control", " No-Cache ").unwrap();
        assert!(request.wants_fresh());
        request.insert_header("cache-control", "no-cache, max-age=0").unwrap();
        assert!(!request.wants_fresh());
    }

    #[test]
    fn test_insert_header_rejects_invalid() {
        let mut request = Request::parse("GET", "/", &origin()).unwrap();
        assert!(request.insert_header("bad header", "x").is_err());
        assert!(request.insert_header("x-ok", "line\nbreak").is_err());
    }
}
