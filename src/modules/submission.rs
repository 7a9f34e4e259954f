//! Submission decoding
//!
//! A submission is the JSON object `{ "label": ..., "id": ..., "img": ... }`
//! sent by the drawing pad client, where `img` is a base64 encoded PNG.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use super::error::{IngestError, Result};

/// One client-provided (label, id, image) triple
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    /// Digit class name, "0" through "9" by convention
    pub label: String,
    /// Submitter identifier
    pub id: String,
    /// Base64 encoded image bytes
    pub img: String,
}

impl Submission {
    /// Decode a request body into a submission.
    ///
    /// The body must be UTF-8 JSON. Clients that serialize the object into a
    /// JSON string first are accepted too: a top-level string is decoded a
    /// second time as the object itself.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)?;

        let value = match serde_json::from_str::<Value>(text)? {
            Value::String(inner) => serde_json::from_str::<Value>(&inner)?,
            other => other,
        };
        let submission: Submission = serde_json::from_value(value)?;

        if submission.id.contains(['\r', '\n']) {
            return Err(IngestError::MultilineId);
        }

        Ok(submission)
    }

    /// Decode `img` into raw image bytes, ignoring line wrapping whitespace
    pub fn decode_image(&self) -> Result<Vec<u8>> {
        let compact: String = self
            .img
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(STANDARD.decode(compact)?)
    }
}
