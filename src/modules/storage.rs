//! Submission storage
//!
//! Two small interfaces back the ingestion handler: an append-only log of
//! submitter ids and a blob store for the decoded images. The filesystem
//! implementations keep the layout the drawing pad tooling expects:
//! `<data>/user_ids.txt` and `<data>/images/{label}_{id}_{random}.png`.
//!
//! Neither implementation locks anything; the server handles one request at a
//! time, and concurrent writers could interleave log lines.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::enhanced_error::{file_operation_error, file_ops, EnhancedError};

/// File name of the user log inside the data directory
pub const USER_LOG_FILE: &str = "user_ids.txt";
/// Directory holding submitted images inside the data directory
pub const IMAGES_DIR: &str = "images";
/// Longest label or id prefix, in bytes, that goes into an image file name
pub const MAX_NAME_COMPONENT_BYTES: usize = 64;

/// Append-only record of submitter ids, one per accepted submission
pub trait UserLog {
    /// Append one id as a single line
    fn append(&self, id: &str) -> Result<(), EnhancedError>;

    /// Every recorded id, in append order
    fn read_all(&self) -> Result<Vec<String>, EnhancedError>;
}

/// Write-once storage for submitted images
pub trait ImageStore {
    /// Store `image` under a fresh name derived from `label` and `id`
    ///
    /// # Returns
    /// * `Result<String, EnhancedError>` - The name the image was stored under
    fn put(&self, label: &str, id: &str, image: &[u8]) -> Result<String, EnhancedError>;

    /// Remove a previously stored image by the name `put` returned
    fn remove(&self, name: &str) -> Result<(), EnhancedError>;
}

/// User log backed by a text file, created on first append
#[derive(Debug, Clone)]
pub struct FileUserLog {
    path: PathBuf,
}

impl FileUserLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UserLog for FileUserLog {
    fn append(&self, id: &str) -> Result<(), EnhancedError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            file_ops::create_dir_all(parent)?;
        }

        let mut file = file_ops::open_append(&self.path)?;
        file.write_all(format!("{}\n", id).as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| file_operation_error("append", &self.path, e))?;

        debug!("Appended '{}' to {}", id, self.path.display());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, EnhancedError> {
        match file_ops::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            // Nothing has been submitted yet
            Err(e) if e.io_kind() == Some(ErrorKind::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Image store backed by a directory, created on first write
#[derive(Debug, Clone)]
pub struct DirImageStore {
    dir: PathBuf,
}

impl DirImageStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the image directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ImageStore for DirImageStore {
    fn put(&self, label: &str, id: &str, image: &[u8]) -> Result<String, EnhancedError> {
        file_ops::create_dir_all(&self.dir)?;

        let name = image_file_name(label, id, rand::random::<u64>());
        let path = self.dir.join(&name);
        file_ops::write_new(&path, image)?;

        debug!("Stored {} bytes in {}", image.len(), path.display());
        Ok(name)
    }

    fn remove(&self, name: &str) -> Result<(), EnhancedError> {
        file_ops::remove_file(self.dir.join(name))
    }
}

/// Filesystem storage rooted at a data directory
pub fn file_storage<P: AsRef<Path>>(data_dir: P) -> (FileUserLog, DirImageStore) {
    let data_dir = data_dir.as_ref();
    (
        FileUserLog::new(data_dir.join(USER_LOG_FILE)),
        DirImageStore::new(data_dir.join(IMAGES_DIR)),
    )
}

/// Build `{label}_{id}_{suffix}.png`, with the suffix as 16 hex digits.
///
/// Path separators and control characters in `label` or `id` become `_` so
/// the name always stays a single component inside the image directory. Each
/// of the two is cut to `MAX_NAME_COMPONENT_BYTES` on a char boundary to keep
/// the name under filesystem limits; the suffix keeps truncated names apart.
pub fn image_file_name(label: &str, id: &str, suffix: u64) -> String {
    format!(
        "{}_{}_{:016x}.png",
        file_name_component(label),
        file_name_component(id),
        suffix
    )
}

fn file_name_component(text: &str) -> String {
    let mut component = String::with_capacity(text.len().min(MAX_NAME_COMPONENT_BYTES));
    for c in text.chars() {
        let c = if c == '/' || c == '\\' || c.is_control() { '_' } else { c };
        if component.len() + c.len_utf8() > MAX_NAME_COMPONENT_BYTES {
            break;
        }
        component.push(c);
    }
    component
}
