//! HTTP Request Reader
//!
//! Reads one HTTP/1.x request from a buffered stream: the request line, the
//! header block and exactly `Content-Length` body bytes. Both the head and
//! the body are bounded so a single client cannot exhaust memory.

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::error::{IngestError, Result};
use super::http_version::RequestLine;

/// Size limits applied while reading a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Maximum size of the request line plus headers, in bytes
    pub max_head_bytes: usize,
    /// Maximum accepted Content-Length, in bytes
    pub max_body_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_head_bytes: 16 * 1024,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// A fully read request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub line: RequestLine,
    /// Header names are lowercased; repeated headers are joined with ", "
    pub headers: HashMap<String, String>,
    /// None when the request carried no Content-Length header
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Look up a header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|value| value.as_str())
    }
}

/// Read a single request from `reader`
///
/// # Arguments
/// * `reader` - Buffered byte stream positioned at the start of a request
/// * `limits` - Head and body size limits
///
/// # Returns
/// * `Result<HttpRequest>` - The request, or the client/connection error that stopped it
pub async fn read_request<R>(reader: &mut R, limits: &RequestLimits) -> Result<HttpRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut head_used = 0;

    // Tolerate stray CRLFs before the request line
    let request_line = loop {
        match read_head_line(reader, limits.max_head_bytes, &mut head_used).await? {
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
            None => return Err(connection_closed("before the request line")),
        }
    };
    let line = RequestLine::parse(&request_line)?;

    let mut headers: HashMap<String, String> = HashMap::new();
    loop {
        let header_line = read_head_line(reader, limits.max_head_bytes, &mut head_used)
            .await?
            .ok_or_else(|| connection_closed("inside the header block"))?;
        if header_line.is_empty() {
            break;
        }

        let (name, value) = header_line
            .split_once(':')
            .ok_or_else(|| IngestError::MalformedRequest(format!("invalid header line '{}'", header_line)))?;
        if name.is_empty() || name.chars().any(|c| c.is_ascii_whitespace()) {
            return Err(IngestError::MalformedRequest(format!("invalid header name '{}'", name)));
        }

        let name = name.to_ascii_lowercase();
        let value = value.trim();
        match headers.get_mut(&name) {
            Some(existing) if name == "content-length" => {
                if existing.as_str() != value {
                    return Err(IngestError::MalformedRequest(
                        "conflicting Content-Length headers".to_string(),
                    ));
                }
            }
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                headers.insert(name, value.to_string());
            }
        }
    }

    if headers.contains_key("transfer-encoding") {
        // Chunked bodies are not framed by this server
        return Err(IngestError::LengthRequired);
    }

    let body = match headers.get("content-length") {
        Some(raw) => {
            let length: usize = raw
                .parse()
                .map_err(|_| IngestError::MalformedRequest(format!("invalid Content-Length '{}'", raw)))?;
            if length > limits.max_body_bytes {
                return Err(IngestError::PayloadTooLarge {
                    length,
                    limit: limits.max_body_bytes,
                });
            }

            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).await?;
            Some(body)
        }
        None => None,
    };

    Ok(HttpRequest { line, headers, body })
}

/// Read one CRLF (or bare LF) terminated line of the request head.
///
/// Returns Ok(None) on a clean end of stream before any byte of the line.
async fn read_head_line<R>(reader: &mut R, limit: usize, used: &mut usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let remaining = limit.saturating_sub(*used);
    if remaining == 0 {
        return Err(IngestError::HeadTooLarge { limit });
    }

    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(remaining as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    *used += read;

    if read == 0 {
        return Ok(None);
    }
    if !buf.ends_with(b"\n") {
        if *used >= limit {
            return Err(IngestError::HeadTooLarge { limit });
        }
        return Err(connection_closed("in the middle of a line"));
    }

    buf.pop();
    if buf.ends_with(b"\r") {
        buf.pop();
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| IngestError::MalformedRequest("request head is not valid UTF-8".to_string()))
}

fn connection_closed(context: &str) -> IngestError {
    IngestError::Connection(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("connection closed {}", context),
    ))
}
