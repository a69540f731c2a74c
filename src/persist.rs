use crate::ledger::AppUsage;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure while writing the activity snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize activity snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to replace {path}: {source}")]
    Replace { path: PathBuf, source: io::Error },
}

/// Writes full ledger snapshots to a single JSON file.
///
/// Each save rewrites the whole file: serialize, write a temporary
/// sibling, rename into place. A failed save leaves the previous file
/// untouched; the next transition rewrites everything anyway.
pub struct Persister {
    path: PathBuf,
}

impl Persister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &[AppUsage]) -> Result<(), PersistError> {
        let bytes = to_indented_json(snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).map_err(|source| PersistError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| PersistError::Replace {
            path: self.path.clone(),
            source,
        })
    }
}

/// One-space indentation, matching the documented file format.
fn to_indented_json(snapshot: &[AppUsage]) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    snapshot.serialize(&mut serializer)?;
    Ok(bytes)
}
