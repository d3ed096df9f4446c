//! Spool of unverified references issued while the registry was down.
//!
//! One JSON object per line. `refctl reconcile` replays the spool into the
//! registry once it is reachable again.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use we_reference::ReferenceCode;

/// A reference handed out without being recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReference {
    pub reference: ReferenceCode,
    pub issued_at: DateTime<Utc>,
}

/// Append-only file of [`PendingReference`]s.
#[derive(Debug, Clone)]
pub struct PendingSpool {
    path: PathBuf,
}

impl PendingSpool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All pending references, oldest first. A missing file is an empty spool.
    pub fn load(&self) -> Result<Vec<PendingReference>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {:?}", self.path));
            }
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {:?}", self.path))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line)
                .with_context(|| format!("{:?} line {}: invalid entry", self.path, index + 1))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Appends `reference` unless it is already pending.
    ///
    /// Returns false when the reference was already in the spool.
    pub fn push(&self, reference: &ReferenceCode) -> Result<bool> {
        if self.load()?.iter().any(|entry| &entry.reference == reference) {
            return Ok(false);
        }

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let entry = PendingReference {
            reference: reference.clone(),
            issued_at: Utc::now(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)
            .with_context(|| format!("Failed to write {:?}", self.path))?;

        debug!(
            reference = %reference,
            spool = %self.path.display(),
            "Spooled unverified reference"
        );
        Ok(true)
    }

    /// Rewrites the spool with `entries`, removing the file when empty.
    pub fn replace(&self, entries: &[PendingReference]) -> Result<()> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => {
                    Err(e).with_context(|| format!("Failed to remove {:?}", self.path))
                }
                _ => Ok(()),
            };
        }

        let mut contents = String::new();
        for entry in entries {
            contents.push_str(&serde_json::to_string(entry)?);
            contents.push('\n');
        }
        fs::write(&self.path, contents).with_context(|| format!("Failed to write {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(text: &str) -> ReferenceCode {
        ReferenceCode::parse(text).unwrap()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let spool = PendingSpool::new(dir.path().join("pending.jsonl"));
        assert!(spool.load().unwrap().is_empty());
        spool.replace(&[]).unwrap();
    }

    #[test]
    fn push_appends_once() {
        let dir = tempfile::tempdir().unwrap();
        let spool = PendingSpool::new(dir.path().join("nested").join("pending.jsonl"));

        assert!(spool.push(&code("FAC-20250902-143027-9123")).unwrap());
        assert!(spool.push(&code("FAC-20250902-143027-9456-COPIE001")).unwrap());
        assert!(!spool.push(&code("FAC-20250902-143027-9123")).unwrap());

        let entries = spool.load().unwrap();
        let texts: Vec<String> = entries.iter().map(|e| e.reference.to_string()).collect();
        assert_eq!(
            texts,
            vec!["FAC-20250902-143027-9123", "FAC-20250902-143027-9456-COPIE001"]
        );
    }

    #[test]
    fn replace_rewrites_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let spool = PendingSpool::new(dir.path().join("pending.jsonl"));
        spool.push(&code("LIV-20250902-143027-9001")).unwrap();
        spool.push(&code("LIV-20250902-143027-9002")).unwrap();

        let entries = spool.load().unwrap();
        spool.replace(&entries[1..]).unwrap();
        assert_eq!(spool.load().unwrap(), entries[1..].to_vec());

        spool.replace(&[]).unwrap();
        assert!(!spool.path().exists());
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.jsonl");
        fs::write(&path, "{\"reference\":\"BC16/2025\"}\n").unwrap();

        let err = PendingSpool::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
