//! Request and response model shared by the fetch pipeline and the cache.
//!
//! A [`Response`] body is consumed once: it is deliberately not `Clone`.
//! Code that needs to both store and return a response calls
//! [`Response::tee`] to get two independent handles.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Header list in arrival order. Names are kept as received.
pub type Headers = Vec<(String, String)>;

/// An outgoing request as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub headers: Headers,
}

impl Request {
    /// Create a request with an explicit method.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new() }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Request path, without query or fragment.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// A response with a fully buffered body.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    /// URL the response was served from.
    pub url: Url,
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers: Vec::new(), body: body.into() }
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Split the response into two independent handles.
    ///
    /// The body is reference counted, so this does not copy the payload.
    pub fn tee(self) -> (Response, Response) {
        let copy = Response {
            url: self.url.clone(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        };
        (self, copy)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_request_method_uppercased() {
        let req = Request::new("post", url("http://localhost:3000/api/posts"));
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
        assert!(Request::get(url("http://localhost:3000/")).is_get());
    }

    #[test]
    fn test_request_path_ignores_query() {
        let req = Request::get(url("http://localhost:3000/api/feed?page=2"));
        assert_eq!(req.path(), "/api/feed");
    }

    #[test]
    fn test_tee_yields_equal_handles() {
        let resp = Response::new(url("http://localhost:3000/index.html"), 200, "<html></html>")
            .with_header("Content-Type", "text/html");
        let (stored, returned) = resp.tee();
        assert_eq!(stored, returned);
        assert_eq!(returned.text(), "<html></html>");
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = Response::new(url("http://localhost:3000/"), 200, "").with_header("Content-Type", "text/html");
        assert_eq!(resp.content_type(), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }

    #[test]
    fn test_is_ok() {
        assert!(Response::new(url("http://localhost:3000/"), 204, "").is_ok());
        assert!(!Response::new(url("http://localhost:3000/"), 404, "").is_ok());
        assert!(!Response::new(url("http://localhost:3000/"), 304, "").is_ok());
    }
}
