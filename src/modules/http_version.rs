//! HTTP Version Support
//!
//! This module parses the request line of an HTTP/1.x request into its
//! method, request target and protocol version.

use super::error::IngestError;

/// HTTP version enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.0 - Connection closes by default
    Http10,
    /// HTTP/1.1 - Persistent connections by default
    Http11,
}

impl HttpVersion {
    /// Parse the protocol token of a request line (e.g. "HTTP/1.1")
    ///
    /// # Returns
    /// * `Option<HttpVersion>` - None for anything other than HTTP/1.0 and HTTP/1.1
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "HTTP/1.1" => Some(HttpVersion::Http11),
            "HTTP/1.0" => Some(HttpVersion::Http10),
            _ => None,
        }
    }

    /// Get the status line prefix for this HTTP version
    pub fn status_line_prefix(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }

    /// Check if this version keeps connections open unless told otherwise
    pub fn supports_persistent_connections(&self) -> bool {
        matches!(self, HttpVersion::Http11)
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status_line_prefix())
    }
}

/// Request method. Only GET and POST are served; everything else is kept
/// verbatim so it can be reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    /// Methods are case-sensitive tokens, so "get" is not GET.
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other(token) => token,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed first line of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: HttpVersion,
}

impl RequestLine {
    /// Parse a request line such as "POST / HTTP/1.1"
    ///
    /// # Arguments
    /// * `line` - The first line of the request, without the trailing CRLF
    ///
    /// # Returns
    /// * `Result<RequestLine, IngestError>` - MalformedRequest unless the line has
    ///   exactly three tokens and a supported version
    pub fn parse(line: &str) -> Result<Self, IngestError> {
        let mut parts = line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version), None) => (method, target, version),
            _ => {
                return Err(IngestError::MalformedRequest(format!(
                    "invalid request line '{}'",
                    line
                )))
            }
        };

        let version = HttpVersion::from_token(version).ok_or_else(|| {
            IngestError::MalformedRequest(format!("unsupported protocol version '{}'", version))
        })?;

        Ok(Self {
            method: Method::from_token(method),
            target: target.to_string(),
            version,
        })
    }
}
