// src/progress.rs

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

/// Append-only progress log. One entry per line, nothing else.
///
/// Assumes a single writer: there is no locking, so two runs sharing a
/// file may interleave lines.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `lines`, each followed by a newline. The file is created on first use.
    pub fn log(&self, lines: &[&str]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening log {}", self.path.display()))?;
        for line in lines {
            info!(target: "progress", "{}", line);
            writeln!(file, "{}", line)
                .with_context(|| format!("appending to log {}", self.path.display()))?;
        }
        Ok(())
    }

    pub fn read_all(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("reading log {}", self.path.display()))
    }
}

/// Print the whole log to stdout, bracketed by two entries of its own.
/// Returns the text that was printed.
pub fn verify_log(log: &ProgressLog) -> Result<String> {
    log.log(&["Verifying log entries"])?;
    let contents = log.read_all()?;
    println!("{}", contents);
    log.log(&["Log verification completed"])?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_is_purely_additive() {
        let tmp = tempdir().unwrap();
        let log = ProgressLog::new(tmp.path().join("code_log.txt"));
        log.log(&["first", "second"]).unwrap();

        let before = log.read_all().unwrap();
        for i in 0..5 {
            log.log(&[format!("entry {}", i).as_str()]).unwrap();
        }
        let after = log.read_all().unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), before.lines().count() + 5);
        assert_eq!(after.lines().last(), Some("entry 4"));
    }

    #[test]
    fn empty_batch_still_creates_file() {
        let tmp = tempdir().unwrap();
        let log = ProgressLog::new(tmp.path().join("log.txt"));
        log.log(&[]).unwrap();
        assert!(log.path().exists());
        assert_eq!(log.read_all().unwrap(), "");
    }

    #[test]
    fn missing_directory_is_fatal() {
        let tmp = tempdir().unwrap();
        let log = ProgressLog::new(tmp.path().join("nope").join("log.txt"));
        assert!(log.log(&["x"]).is_err());
    }

    #[test]
    fn verify_returns_contents_before_its_closing_line() {
        let tmp = tempdir().unwrap();
        let log = ProgressLog::new(tmp.path().join("code_log.txt"));
        log.log(&["Start of the bank ETL run"]).unwrap();

        let seen = verify_log(&log).unwrap();
        assert_eq!(seen, "Start of the bank ETL run\nVerifying log entries\n");

        let full = log.read_all().unwrap();
        assert_eq!(full.lines().last(), Some("Log verification completed"));
        assert_eq!(full.lines().count(), 3);
    }
}
