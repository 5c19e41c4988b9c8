//! Session transcript logging.
//!
//! The orchestrator narrates each upgrade as a sequence of already-composed
//! human-readable lines. The sink owns timestamping and durable storage;
//! the default file sink flushes every line so the transcript survives a
//! crash mid-upgrade.

use chrono::Local;
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Append-only sink for upgrade transcript lines.
pub trait LogSink {
    /// Record one already-composed message.
    fn append(&mut self, line: &str);
}

/// Sink that discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn append(&mut self, _line: &str) {}
}

/// File-backed sink writing `[timestamp] message` lines.
///
/// The file name carries the session start time
/// (`upgrade_log_YYYYmmdd_HHMMSS.txt`); timestamps inside the file have
/// millisecond precision.
pub struct FileLogSink {
    file: File,
    path: PathBuf,
}

impl FileLogSink {
    /// Create a transcript file named after the current local time in `dir`.
    pub fn create_in(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.as_ref().join(format!("upgrade_log_{stamp}.txt"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Path of the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&mut self, line: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let result = writeln!(self.file, "[{stamp}] {line}").and_then(|()| self.file.flush());
        if let Err(e) = result {
            warn!("upgrade transcript write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_bracketed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileLogSink::create_in(dir.path()).unwrap();
        sink.append("first line");
        sink.append("second line");

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("first line"));
        assert!(lines[1].ends_with("second line"));
    }

    #[test]
    fn test_file_sink_name_carries_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::create_in(dir.path()).unwrap();
        let name = sink
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("upgrade_log_"));
        assert!(name.ends_with(".txt"));
        // upgrade_log_ + YYYYmmdd_HHMMSS + .txt
        assert_eq!(name.len(), "upgrade_log_".len() + 15 + ".txt".len());
    }

    #[test]
    fn test_timestamp_has_millisecond_precision() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileLogSink::create_in(dir.path()).unwrap();
        sink.append("tick");

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let stamp = content.split(']').next().unwrap();
        let fraction = stamp.rsplit('.').next().unwrap();
        assert_eq!(fraction.len(), 3, "expected .mmm fraction in {stamp:?}");
    }

    #[test]
    fn test_null_sink_discards() {
        let mut sink = NullSink;
        sink.append("nothing to see");
    }
}
