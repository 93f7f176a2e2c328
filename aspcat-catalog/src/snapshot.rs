//! Plain JSON snapshot files: export targets, backup artifacts, rollbacks.
//!
//! These helpers do no locking — the file backend owns the live catalog
//! file and its concurrency story; snapshots here are one-shot artifacts.

use std::path::Path;

use thiserror::Error;

use crate::catalog::Catalog;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON parse error in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Read a catalog snapshot from a JSON file.
pub fn read_snapshot(path: &Path) -> Result<Catalog, SnapshotError> {
    let contents = std::fs::read_to_string(path).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| SnapshotError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write a catalog snapshot as pretty-printed JSON, creating parent
/// directories as needed.
pub fn write_snapshot(path: &Path, catalog: &Catalog) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SnapshotError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    let contents = serde_json::to_string_pretty(catalog).map_err(|e| SnapshotError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    std::fs::write(path, contents).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
