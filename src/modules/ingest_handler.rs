//! Ingestion Handler
//!
//! GET on any path lists the recorded submitters; POST on any path stores one
//! submission. Routing does not look at the request target.

use log::{error, info, warn};

use super::error::{IngestError, Result};
use super::http_request::HttpRequest;
use super::http_response::{html_escape, HttpResponse};
use super::http_version::Method;
use super::storage::{ImageStore, UserLog};
use super::submission::Submission;

/// Request handler over an injected user log and image store
#[derive(Debug, Clone)]
pub struct IngestHandler<L, I> {
    user_log: L,
    images: I,
}

impl<L: UserLog, I: ImageStore> IngestHandler<L, I> {
    pub fn new(user_log: L, images: I) -> Self {
        Self { user_log, images }
    }

    pub fn user_log(&self) -> &L {
        &self.user_log
    }

    pub fn images(&self) -> &I {
        &self.images
    }

    /// Answer one request. Failures become error responses, never panics.
    pub fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let result = match &request.line.method {
            Method::Get => self.list_users(),
            Method::Post => self.submit(request.body.as_deref()),
            Method::Other(method) => Err(IngestError::MethodNotAllowed(method.clone())),
        };

        result.unwrap_or_else(|e| {
            if e.is_client_error() {
                warn!("Rejected {} {}: {}", request.line.method, request.line.target, e);
            } else {
                error!("Failed {} {}: {}", request.line.method, request.line.target, e);
            }
            e.to_response()
        })
    }

    /// Render the listing page for every id in the user log
    pub fn list_users(&self) -> Result<HttpResponse> {
        let ids = self.user_log.read_all()?;
        Ok(HttpResponse::html(render_user_list(&ids)))
    }

    /// Decode and persist one submission.
    ///
    /// The image is written before the id is logged. If logging fails the
    /// image is removed again, so log lines and image files stay one to one.
    pub fn submit(&self, body: Option<&[u8]>) -> Result<HttpResponse> {
        let body = body.ok_or(IngestError::LengthRequired)?;
        let submission = Submission::from_body(body)?;
        let image = submission.decode_image()?;

        let name = self.images.put(&submission.label, &submission.id, &image)?;

        if let Err(e) = self.user_log.append(&submission.id) {
            if let Err(cleanup) = self.images.remove(&name) {
                warn!("Could not remove orphaned image {}: {}", name, cleanup);
            }
            return Err(e.into());
        }

        info!(
            "Accepted label '{}' from '{}' as {} ({} bytes)",
            submission.label,
            submission.id,
            name,
            image.len()
        );
        Ok(HttpResponse::html(String::new()))
    }
}

/// `<html><body><h1>Current Users:</h1>{ids joined with <br>}</body></html>`
pub fn render_user_list(ids: &[String]) -> String {
    let entries: Vec<String> = ids.iter().map(|id| html_escape(id)).collect();
    format!(
        "<html><body><h1>Current Users:</h1>{}</body></html>",
        entries.join("<br>")
    )
}
