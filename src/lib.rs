//! digit-ingest
//!
//! A small HTTP endpoint that collects labelled hand-drawn digit images from
//! a drawing pad client. Accepted submissions are written to an `images`
//! directory and the submitter id is appended to `user_ids.txt`; a GET on any
//! path lists the submitters recorded so far.

pub mod modules;

pub use modules::config::ServerConfig;
pub use modules::server::Server;
