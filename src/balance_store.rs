//! Durable single-value balance store.
//!
//! One plain-text file per participant, holding one `%.2f`-formatted
//! signed amount (SPEC_FULL §4.1). Writes go to a sibling temp file
//! and are renamed into place so a concurrent reader never observes a
//! partially-written number — the same write-then-rename discipline
//! the teacher's storage layer uses for page writes, applied here to
//! a single flat file instead of a page file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::common::Money;

pub struct BalanceStore {
    path: PathBuf,
}

impl BalanceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the stored balance. Returns `None` if the file does not
    /// exist or holds unparsable content (treated as `AccountMissing`
    /// by the caller per SPEC_FULL §7).
    pub fn read(&self) -> Option<Money> {
        match fs::read_to_string(&self.path) {
            Ok(text) => match Money::parse(&text) {
                Some(m) => Some(m),
                None => {
                    warn!(path = %self.path.display(), "balance file contains unparsable content");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read balance file");
                None
            }
        }
    }

    /// Overwrites the stored balance atomically with respect to
    /// `read()`.
    pub fn write(&self, value: Money) -> bool {
        let tmp_path = self.tmp_path();
        let formatted = value.to_string();
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(formatted.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to persist balance");
                let _ = fs::remove_file(&tmp_path);
                false
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
