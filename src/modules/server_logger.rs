// server_logger.rs - Console and file logging backend for the `log` facade
// Prints "LEVEL: message" to the console and, when configured, appends
// timestamped lines to a log file.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

use super::enhanced_error::{file_ops, EnhancedError};

/// Logger that writes to stdout and optionally to a file
pub struct ServerLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl ServerLogger {
    /// Create a logger, opening `log_file` for appending if given
    pub fn new(level: LevelFilter, log_file: Option<&Path>) -> Result<Self, EnhancedError> {
        let file = match log_file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    file_ops::create_dir_all(parent)?;
                }
                Some(Mutex::new(file_ops::open_append(path)?))
            }
            None => None,
        };

        Ok(Self { level, file })
    }

    fn write_file_line(&self, record: &Record) {
        let Some(file) = &self.file else {
            return;
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let line = file_line(timestamp, record);

        if let Ok(mut file) = file.lock() {
            if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
                eprintln!("Failed to write to log file: {}", e);
            }
        }
    }
}

impl Log for ServerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{}: {}", record.level(), record.args());
            self.write_file_line(record);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

fn file_line(timestamp: u64, record: &Record) -> String {
    format!("{} {}: {}\n", timestamp, record.level(), record.args())
}

static LOGGER: OnceLock<ServerLogger> = OnceLock::new();

/// Install the global logger
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    if LOGGER.set(ServerLogger::new(level, log_file)?).is_err() {
        return Err("Server logger already initialized".into());
    }

    if let Some(logger) = LOGGER.get() {
        log::set_logger(logger).map_err(|e| e.to_string())?;
        log::set_max_level(level);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_file_line_format() {
        let line = file_line(
            1_700_000_000,
            &Record::builder()
                .args(format_args!("Accepted {}", "alice"))
                .level(Level::Info)
                .build(),
        );
        assert_eq!(line, "1700000000 INFO: Accepted alice\n");
    }

    #[test]
    fn test_level_filtering() {
        let logger = ServerLogger::new(LevelFilter::Warn, None).unwrap();
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Info).build()));
    }

    #[test]
    fn test_writes_enabled_records_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("server.log");
        let logger = ServerLogger::new(LevelFilter::Info, Some(&path)).unwrap();

        logger.log(&Record::builder().args(format_args!("kept")).level(Level::Warn).build());
        logger.log(&Record::builder().args(format_args!("dropped")).level(Level::Debug).build());
        logger.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.trim_end().ends_with("WARN: kept"));
    }
}
