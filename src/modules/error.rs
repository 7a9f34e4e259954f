use std::io;

use thiserror::Error;

use super::enhanced_error::EnhancedError;
use super::http_response::{html_escape, HttpResponse};

/// Everything that can stop a request from being served normally.
///
/// Client request errors map to 4xx, storage failures to 500. Connection
/// errors never produce a response: the peer is gone or stalled.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("Content-Length required")]
    LengthRequired,

    #[error("Request body of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { length: usize, limit: usize },

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("Request body is not valid UTF-8: {0}")]
    BodyNotUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed submission: {0}")]
    MalformedSubmission(#[from] serde_json::Error),

    #[error("Image is not valid base64: {0}")]
    InvalidImage(#[from] base64::DecodeError),

    #[error("Submitter id must not contain line breaks")]
    MultilineId,

    #[error("Storage error: {0}")]
    Storage(#[from] EnhancedError),

    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),
}

impl IngestError {
    pub fn status(&self) -> u16 {
        match self {
            IngestError::MalformedRequest(_)
            | IngestError::BodyNotUtf8(_)
            | IngestError::MalformedSubmission(_)
            | IngestError::InvalidImage(_)
            | IngestError::MultilineId => 400,
            IngestError::MethodNotAllowed(_) => 405,
            IngestError::LengthRequired => 411,
            IngestError::PayloadTooLarge { .. } => 413,
            IngestError::HeadTooLarge { .. } => 431,
            IngestError::Storage(_) => 500,
            IngestError::Connection(_) => 400,
        }
    }

    /// True for failures caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Render the error as a `text/html` response
    pub fn to_response(&self) -> HttpResponse {
        let status = self.status();
        let mut response = HttpResponse::new(status, Vec::new());

        // Storage details (paths, OS errors) stay in the server log
        let detail = match self {
            IngestError::Storage(_) => "The submission could not be stored.".to_string(),
            other => other.to_string(),
        };

        response.body = format!(
            "<html><body><h1>{} {}</h1><p>{}</p></body></html>",
            status,
            response.status_text,
            html_escape(&detail)
        )
        .into_bytes();
        response.set_content_type("text/html");

        if let IngestError::MethodNotAllowed(_) = self {
            response.set_header("Allow", "GET, POST");
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::enhanced_error::file_operation_error;

    #[test]
    fn test_client_errors_map_to_4xx() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(IngestError::MalformedSubmission(json_err).status(), 400);
        assert_eq!(IngestError::MultilineId.status(), 400);
        assert_eq!(IngestError::LengthRequired.status(), 411);
        assert_eq!(IngestError::PayloadTooLarge { length: 2, limit: 1 }.status(), 413);
        assert!(IngestError::MethodNotAllowed("PUT".into()).is_client_error());
    }

    #[test]
    fn test_storage_error_hides_details() {
        let err = IngestError::Storage(file_operation_error(
            "write",
            "/secret/images/x.png",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        ));
        assert_eq!(err.status(), 500);
        assert!(!err.is_client_error());

        let response = err.to_response();
        assert_eq!(response.status_code, 500);
        let body = String::from_utf8(response.body).unwrap();
        assert!(!body.contains("/secret"));
        assert!(body.contains("500 Internal Server Error"));
    }

    #[test]
    fn test_method_not_allowed_lists_allowed_methods() {
        let response = IngestError::MethodNotAllowed("PUT".into()).to_response();
        assert_eq!(response.status_code, 405);
        assert_eq!(response.header("Allow"), Some("GET, POST"));
        assert_eq!(response.header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn test_error_page_is_escaped() {
        let response = IngestError::MalformedRequest("<script>".into()).to_response();
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("&lt;script&gt;"));
        assert!(!body.contains("<script>"));
    }
}
