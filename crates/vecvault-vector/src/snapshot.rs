//! Explicit snapshot import/export
//!
//! A snapshot is a JSON document holding every record of a store. Nothing
//! is written implicitly; front-ends decide when to save and load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;
use vecvault_core::{IndexKind, Result, VecVaultError, VectorRecord};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized contents of a vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version
    pub version: u32,

    /// Dimension established by the exporting store
    pub dimension: Option<usize>,

    /// Index strategy of the exporting store (informational)
    pub index_kind: IndexKind,

    /// Export timestamp
    pub exported_at: DateTime<Utc>,

    /// Stored records
    pub records: Vec<VectorRecord>,
}

impl Snapshot {
    /// Build a snapshot of the given records
    pub fn new(
        dimension: Option<usize>,
        index_kind: IndexKind,
        records: Vec<VectorRecord>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            dimension,
            index_kind,
            exported_at: Utc::now(),
            records,
        }
    }

    /// Reject snapshots this build cannot restore
    pub fn check_version(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(VecVaultError::SnapshotError(format!(
                "Unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        Ok(())
    }

    /// Write the snapshot as JSON, replacing `path` only once fully written
    ///
    /// Each writer stages into its own uniquely named file in the target
    /// directory; the last rename wins.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(staged.as_file_mut(), self)?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| e.error)?;

        info!(
            path = %path.display(),
            records = self.records.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Read a snapshot from a JSON file
    pub fn read_from(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let snapshot: Self = serde_json::from_slice(&data).map_err(|e| {
            VecVaultError::SnapshotError(format!(
                "Failed to parse snapshot {}: {e}",
                path.display()
            ))
        })?;
        snapshot.check_version()?;

        info!(
            path = %path.display(),
            records = snapshot.records.len(),
            "Snapshot read"
        );
        Ok(snapshot)
    }
}
