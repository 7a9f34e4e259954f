//! Modules for the digit-ingest server
//!
//! This module contains the components for reading HTTP requests, decoding
//! submissions, persisting them and answering listing requests.

pub mod config;
pub mod enhanced_error;
pub mod error;
pub mod http_request;
pub mod http_response;
pub mod http_version;
pub mod ingest_handler;
pub mod server;
pub mod server_logger;
pub mod storage;
pub mod submission;
