//! Enhanced error reporting module
//! Provides detailed error information for file operations and network operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;

/// Error type that records which operation failed and on what
#[derive(Debug)]
pub struct EnhancedError {
    pub operation: String,
    pub path: Option<String>,
    pub original_error: Box<dyn Error + Send + Sync>,
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{} failed for '{}': {}", self.operation, path, self.original_error)
        } else {
            write!(f, "{} failed: {}", self.operation, self.original_error)
        }
    }
}

impl Error for EnhancedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.original_error.as_ref())
    }
}

impl EnhancedError {
    /// The underlying I/O error kind, if the failure came from the OS
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        self.original_error
            .downcast_ref::<io::Error>()
            .map(|e| e.kind())
    }
}

/// Helper function to create enhanced error for file operations
pub fn file_operation_error<P: AsRef<Path>>(
    operation: &str,
    path: P,
    error: io::Error,
) -> EnhancedError {
    EnhancedError {
        operation: operation.to_string(),
        path: Some(path.as_ref().to_string_lossy().to_string()),
        original_error: Box::new(error),
    }
}

/// Helper function to create enhanced error for network operations
pub fn network_operation_error(
    operation: &str,
    address: &str,
    error: Box<dyn Error + Send + Sync>,
) -> EnhancedError {
    EnhancedError {
        operation: operation.to_string(),
        path: Some(address.to_string()),
        original_error: error,
    }
}

/// File operations with detailed error reporting
pub mod file_ops {
    use super::*;
    use std::fs::{self, File, OpenOptions};
    use std::io::Write;

    /// Enhanced version of std::fs::create_dir_all
    pub fn create_dir_all<P: AsRef<Path>>(path: P) -> Result<(), EnhancedError> {
        fs::create_dir_all(&path)
            .map_err(|e| file_operation_error("create_dir_all", &path, e))
    }

    /// Enhanced version of std::fs::read_to_string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String, EnhancedError> {
        fs::read_to_string(&path)
            .map_err(|e| file_operation_error("read_to_string", &path, e))
    }

    /// Write `contents` to a file that must not exist yet.
    /// A file that was created but could not be fully written is removed again.
    pub fn write_new<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<(), EnhancedError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| file_operation_error("create_new", &path, e))?;
        write_all_or_remove(file, path, contents)
    }

    pub(super) fn write_all_or_remove<W: Write, P: AsRef<Path>>(
        mut writer: W,
        path: P,
        contents: &[u8],
    ) -> Result<(), EnhancedError> {
        match writer.write_all(contents).and_then(|_| writer.flush()) {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(writer);
                let _ = fs::remove_file(&path);
                Err(file_operation_error("write", &path, e))
            }
        }
    }

    /// Open a file for appending, creating it if absent
    pub fn open_append<P: AsRef<Path>>(path: P) -> Result<File, EnhancedError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| file_operation_error("open_append", &path, e))
    }

    /// Enhanced version of std::fs::remove_file
    pub fn remove_file<P: AsRef<Path>>(path: P) -> Result<(), EnhancedError> {
        fs::remove_file(&path)
            .map_err(|e| file_operation_error("remove_file", &path, e))
    }
}

/// Network operations with detailed error reporting
pub mod network_ops {
    use super::*;
    use tokio::net::TcpListener;

    /// Enhanced version of TcpListener::bind
    pub async fn bind_tcp_listener(addr: &str) -> Result<TcpListener, EnhancedError> {
        TcpListener::bind(addr).await
            .map_err(|e| network_operation_error("bind_tcp_listener", addr, Box::new(e)))
    }
}
