//! The session log: an operator-facing transcript of a preflight run.
//!
//! Every step writes timestamped, severity-tagged lines through a single
//! [`SessionLog`] handle that is passed explicitly through the run and closed
//! on every explicit exit path. Lines go to the transcript file (opened in
//! append mode, never truncated across runs) and are mirrored verbatim to
//! stdout, colorized by severity.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use crossterm::style::Stylize;

use crate::error::LogError;

/// Timestamp layout for transcript lines (year-day-month, the layout the
/// downstream lab tooling consumes).
const TIMESTAMP_FORMAT: &str = "%Y-%d-%m %H:%M:%S";

/// Severity of a transcript line.
///
/// Only two severities drive control flow; INFO is purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Successful step or measured value.
    Info,
    /// Degraded but non-fatal condition.
    Warning,
    /// Fatal condition; the run stops after logging it.
    Error,
}

impl Severity {
    /// Icon prefixed to the message text.
    fn icon(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Warning => "⚠ ",
            Self::Error => "✖ ",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Append-mode session log with console mirroring.
///
/// # Example
///
/// ```no_run
/// use lab_preflight::logging::{SessionLog, Severity};
///
/// let mut log = SessionLog::open("/var/lib/lab-preflight/preflight.log")?;
/// log.log(Severity::Info, "Preflight starting");
/// log.close();
/// # Ok::<(), lab_preflight::error::LogError>(())
/// ```
#[derive(Debug)]
pub struct SessionLog {
    path: PathBuf,
    file: Option<File>,
    mirror_console: bool,
}

impl SessionLog {
    /// Opens the session log in append mode, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns `LogError::CreateDir` if a parent directory cannot be created,
    /// or `LogError::Open` if the file cannot be opened. Both are fatal to
    /// the run and are propagated, not recovered.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LogError::CreateDir {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LogError::Open {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            path,
            file: Some(file),
            mirror_console: true,
        })
    }

    /// Disables console mirroring.
    ///
    /// Used by tests that assert on the transcript file without spamming the
    /// test runner's output.
    #[must_use]
    pub fn without_console(mut self) -> Self {
        self.mirror_console = false;
        self
    }

    /// Path of the transcript file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one transcript line and mirrors it to the console.
    ///
    /// A write failure must not abort a run that is otherwise producing its
    /// diagnostic trail, so it is reported through tracing instead of being
    /// propagated.
    pub fn log(&mut self, severity: Severity, message: impl AsRef<str>) {
        let line = format!(
            "{} [{}] - {}{}",
            Local::now().format(TIMESTAMP_FORMAT),
            severity,
            severity.icon(),
            message.as_ref()
        );

        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{line}") {
                tracing::warn!(error = %e, "Failed to write transcript line");
            }
        }

        if self.mirror_console {
            match severity {
                Severity::Info => println!("{line}"),
                Severity::Warning => println!("{}", line.as_str().yellow()),
                Severity::Error => println!("{}", line.as_str().red()),
            }
        }
    }

    /// Logs an INFO line.
    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log(Severity::Info, message);
    }

    /// Logs a WARNING line.
    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.log(Severity::Warning, message);
    }

    /// Logs an ERROR line.
    pub fn error(&mut self, message: impl AsRef<str>) {
        self.log(Severity::Error, message);
    }

    /// Flushes and releases the log handle.
    ///
    /// Called on every explicit exit path. `Drop` flushes as a backstop for
    /// externally forced termination, where a clean close is not guaranteed.
    pub fn close(mut self) {
        self.flush_file();
        self.file = None;
    }

    fn flush_file(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush() {
                tracing::warn!(error = %e, "Failed to flush session log");
            }
        }
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        self.flush_file();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directories() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("nested").join("dir").join("preflight.log");

        let log = SessionLog::open(&path).expect("open should succeed");
        assert!(path.parent().expect("path has parent").is_dir());
        assert_eq!(log.path(), path);
        log.close();
    }

    #[test]
    fn test_line_format() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("preflight.log");

        let mut log = SessionLog::open(&path)
            .expect("open should succeed")
            .without_console();
        log.info("all good");
        log.warn("heads up");
        log.error("broken");
        log.close();

        let content = fs::read_to_string(&path).expect("failed to read transcript");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        // `<yyyy-dd-MM HH:mm:ss> [<LEVEL>] - <icon><message>`
        let timestamp = lines[0].split(" [").next().expect("timestamp prefix");
        assert_eq!(timestamp.len(), 19, "unexpected timestamp: {timestamp}");
        assert!(lines[0].contains("[INFO] - all good"));
        assert!(lines[1].contains("[WARNING] - ⚠ heads up"));
        assert!(lines[2].contains("[ERROR] - ✖ broken"));
    }

    #[test]
    fn test_appends_across_sessions() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let path = tmp.path().join("preflight.log");

        let mut log = SessionLog::open(&path)
            .expect("first open should succeed")
            .without_console();
        log.info("first run");
        log.close();

        let mut log = SessionLog::open(&path)
            .expect("second open should succeed")
            .without_console();
        log.info("second run");
        log.close();

        let content = fs::read_to_string(&path).expect("failed to read transcript");
        assert_eq!(content.lines().count(), 2, "log must never be truncated");
    }
}
