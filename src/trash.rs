use crate::errors::{StoreError, StoreResult};
use crate::models::TrashKind;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Append-only lists of soft-deleted ids, one file per kind. Display only;
/// the `deleted` flag on the record itself is authoritative.
#[derive(Debug, Clone)]
pub struct TrashLedger {
    dir: PathBuf,
}

impl TrashLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ledger_path(&self, kind: TrashKind) -> PathBuf {
        self.dir.join(format!("{}.txt", kind.as_str()))
    }

    pub fn record(&self, kind: TrashKind, id: &str) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|error| StoreError::Io(error.to_string()))?;
        let path = self.ledger_path(kind);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| StoreError::Io(error.to_string()))?;
        writeln!(file, "{}", id).map_err(|error| StoreError::Io(error.to_string()))?;
        tracing::info!(kind = kind.as_str(), id, "added to trash");
        Ok(())
    }

    pub fn read(&self, kind: TrashKind) -> StoreResult<Option<String>> {
        let path = self.ledger_path(kind);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StoreError::from_read(error, &path)),
        }
    }

    pub fn entries(&self, kind: TrashKind) -> StoreResult<Vec<String>> {
        Ok(self
            .read(kind)?
            .map(|content| {
                content
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
