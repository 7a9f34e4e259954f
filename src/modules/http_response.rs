//! HTTP Response Builder
//!
//! This module provides the response builder used by the ingestion handler and
//! encodes responses for HTTP/1.0 and HTTP/1.1 clients. Every response closes
//! the connection, since requests are served one connection at a time.

use super::http_version::HttpVersion;

/// HTTP response representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 400, 500)
    pub status_code: u16,
    /// HTTP status text (e.g., "OK", "Bad Request")
    pub status_text: String,
    /// HTTP headers, in the order they were first set
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a new HTTP response
    ///
    /// # Arguments
    /// * `status_code` - HTTP status code
    /// * `body` - Response body as bytes
    ///
    /// # Returns
    /// * `HttpResponse` - New response with the standard reason phrase for the code
    pub fn new(status_code: u16, body: Vec<u8>) -> Self {
        Self {
            status_code,
            status_text: reason_phrase(status_code).to_string(),
            headers: Vec::new(),
            body,
        }
    }

    /// Create a 200 OK response
    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(200, body)
    }

    /// Create a 200 OK `text/html` response
    pub fn html(body: String) -> Self {
        let mut response = Self::ok(body.into_bytes());
        response.set_content_type("text/html");
        response
    }

    /// Set a header, replacing any previous value with the same name
    ///
    /// # Arguments
    /// * `name` - Header name (compared case-insensitively)
    /// * `value` - Header value
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            existing.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    /// Look up a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set Content-Type header
    ///
    /// # Arguments
    /// * `content_type` - MIME type (e.g., "text/html")
    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_header("Content-Type", content_type);
    }

    /// Encode the response for a specific HTTP version
    ///
    /// Content-Length is always emitted from the current body, and HTTP/1.1
    /// responses carry `Connection: close` because the connection is not reused.
    ///
    /// # Arguments
    /// * `version` - HTTP version of the request being answered
    ///
    /// # Returns
    /// * `Vec<u8>` - Encoded response bytes
    pub fn encode(&self, version: &HttpVersion) -> Vec<u8> {
        let mut response = Vec::with_capacity(128 + self.body.len());

        let status_line = format!(
            "{} {} {}\r\n",
            version.status_line_prefix(),
            self.status_code,
            self.status_text
        );
        response.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("Connection") {
                continue;
            }
            response.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        response.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());

        // HTTP/1.0 closes by default, no header needed
        if version.supports_persistent_connections() {
            response.extend_from_slice(b"Connection: close\r\n");
        }

        response.extend_from_slice(b"\r\n");
        response.extend_from_slice(&self.body);

        response
    }
}

/// Standard reason phrase for the status codes this server produces
pub fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        405 => "Method Not Allowed",
        411 => "Length Required",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Escape text for inclusion in HTML element content or attribute values
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
