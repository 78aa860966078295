//! Request view consumed by extraction strategies
//!
//! [`VersionRequest`] carries only the parts of an HTTP request that can hold a
//! version: method, path, query parameters and headers. Hosts build it from an
//! `http::Request` or by hand.

use http::header::HeaderName;
use http::{HeaderMap, HeaderValue, Method};

/// Version-relevant view of an incoming request
#[derive(Debug, Clone)]
pub struct VersionRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
}

impl VersionRequest {
    /// Create a request view
    ///
    /// A `?query` suffix on `path` is split off and parsed.
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (path, Vec::new()),
        };

        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
        }
    }

    /// Create a GET request view
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request view
    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Build a view from an `http::Request`, ignoring the body
    pub fn from_http<B>(req: &http::Request<B>) -> Self {
        let uri = req.uri();
        Self {
            method: req.method().clone(),
            path: uri.path().to_string(),
            query: uri.query().map(parse_query).unwrap_or_default(),
            headers: req.headers().clone(),
        }
    }

    /// Add a header; invalid names or values are skipped
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Append a query parameter
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Replace the query parameters with the parsed form of `query`
    pub fn with_query_string(mut self, query: &str) -> Self {
        self.query = parse_query(query);
        self
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in request order
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter
    ///
    /// With `case_sensitive == false`, parameter names are compared ignoring
    /// ASCII case. The first matching occurrence wins.
    pub fn query_value(&self, name: &str, case_sensitive: bool) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| {
                if case_sensitive {
                    key == name
                } else {
                    key.eq_ignore_ascii_case(name)
                }
            })
            .map(|(_, value)| value.as_str())
    }

    /// Query parameters re-encoded as `k=v&k2=v2`, in request order
    ///
    /// Keys and values are percent-encoded again, so a decoded `&` or `=`
    /// cannot be confused with a separator.
    pub fn query_string(&self) -> String {
        serde_urlencoded::to_string(&self.query).unwrap_or_default()
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(query).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_split_from_path() {
        let req = VersionRequest::get("/users?version=2.0&page=1");
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query_value("version", true), Some("2.0"));
        assert_eq!(req.query_value("page", true), Some("1"));
        assert_eq!(req.query_string(), "version=2.0&page=1");
    }

    #[test]
    fn test_first_query_value_wins() {
        let req = VersionRequest::get("/").with_query_string("v=1&v=2");
        assert_eq!(req.query_value("v", true), Some("1"));
    }

    #[test]
    fn test_query_case_sensitivity() {
        let req = VersionRequest::get("/").query_param("Version", "3");
        assert_eq!(req.query_value("version", true), None);
        assert_eq!(req.query_value("version", false), Some("3"));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let req = VersionRequest::get("/").header("X-API-Version", "1.1");
        assert_eq!(req.header_str("x-api-version"), Some("1.1"));

        let req = req.header("bad header", "x");
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_from_http_request() {
        let http_req = http::Request::builder()
            .method(Method::PUT)
            .uri("/v2/items?api-version=2.1")
            .header("accept", "application/json")
            .body(())
            .unwrap();

        let req = VersionRequest::from_http(&http_req);
        assert_eq!(req.method(), &Method::PUT);
        assert_eq!(req.path(), "/v2/items");
        assert_eq!(req.query_value("api-version", true), Some("2.1"));
        assert_eq!(req.header_str("Accept"), Some("application/json"));
    }

    #[test]
    fn test_query_string_keeps_encoded_separators() {
        let encoded = VersionRequest::get("/users?foo=x%26version%3D2");
        let plain = VersionRequest::get("/users?foo=x&version=2");

        assert_eq!(encoded.query_value("version", true), None);
        assert_eq!(encoded.query_string(), "foo=x%26version%3D2");
        assert_eq!(plain.query_string(), "foo=x&version=2");
        assert_ne!(encoded.query_string(), plain.query_string());
    }

    #[test]
    fn test_percent_decoding() {
        let req = VersionRequest::get("/x?version=1.0.0%2Bbuild");
        assert_eq!(req.query_value("version", true), Some("1.0.0+build"));
    }
}
