//! In-memory vector store
//!
//! Owns the id → record map and the nearest-neighbor index behind a single
//! read/write lock. Every mutation, including the rollback of a failed
//! index insert, completes inside one write critical section, so readers
//! never observe the map and the index disagreeing.

use crate::snapshot::Snapshot;
use crate::{create_index, IndexStats, NearestNeighborIndex};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vecvault_core::{Result, ScoredRecord, StoreConfig, VecVaultError, VectorRecord};

struct StoreState {
    records: BTreeMap<String, Arc<VectorRecord>>,
    index: Box<dyn NearestNeighborIndex>,
}

/// Record count and index statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub records: usize,
    pub index: IndexStats,
}

/// Single source of truth for the vectors that currently exist
pub struct VectorStore {
    state: RwLock<StoreState>,
}

impl VectorStore {
    /// Create a store over an empty index
    pub fn new(index: Box<dyn NearestNeighborIndex>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                records: BTreeMap::new(),
                index,
            }),
        }
    }

    /// Create a store with the index described by the configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(create_index(
            config.index_kind,
            config.dimension,
            config.sparse_epsilon,
        ))
    }

    /// Insert a new record into the map and the index
    ///
    /// Fails with `InvalidArgument` if the id is already present; the existing
    /// record is left untouched. If the index rejects the embedding the map
    /// insertion is rolled back before the lock is released.
    pub fn store(&self, record: VectorRecord) -> Result<Arc<VectorRecord>> {
        if record.embedding.len() != record.dimension {
            return Err(VecVaultError::ValidationError(format!(
                "Dimension {} does not match embedding length {}",
                record.dimension,
                record.embedding.len()
            )));
        }

        let record = Arc::new(record);
        let mut state = self.state.write();

        if state.records.contains_key(&record.id) {
            return Err(VecVaultError::InvalidArgument(format!(
                "Vector with id {} already exists",
                record.id
            )));
        }

        state.records.insert(record.id.clone(), Arc::clone(&record));
        if let Err(e) = state.index.add(&record.id, &record.embedding) {
            state.records.remove(&record.id);
            warn!(id = %record.id, error = %e, "Index rejected vector, rolled back store");
            return Err(e);
        }

        debug!(id = %record.id, dimension = record.dimension, "Stored vector");
        Ok(record)
    }

    pub fn retrieve(&self, id: &str) -> Option<Arc<VectorRecord>> {
        self.state.read().records.get(id).cloned()
    }

    /// All records, ordered by id
    pub fn retrieve_all(&self) -> Vec<Arc<VectorRecord>> {
        self.state.read().records.values().cloned().collect()
    }

    /// Remove a record from map and index; absent ids are a no-op
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let removed = state.records.remove(id).is_some();
        let indexed = state.index.remove(id);
        if removed != indexed {
            warn!(id, removed, indexed, "Store and index disagreed on removal");
        }
        if removed {
            debug!(id, "Removed vector");
        }
        removed
    }

    /// Nearest records to `query`, best first
    pub fn find_nearest(&self, query: &[f64], k: usize) -> Result<Vec<Arc<VectorRecord>>> {
        Ok(self
            .find_nearest_scored(query, k)?
            .into_iter()
            .map(|scored| scored.record)
            .collect())
    }

    /// Nearest records to `query` with their similarity, best first
    pub fn find_nearest_scored(&self, query: &[f64], k: usize) -> Result<Vec<ScoredRecord>> {
        self.find_nearest_filtered(query, k, None)
    }

    /// Nearest records scoring at least `min_score`, best first
    ///
    /// Ids the index returns without a matching record are skipped.
    pub fn find_nearest_filtered(
        &self,
        query: &[f64],
        k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<ScoredRecord>> {
        let state = self.state.read();
        let neighbors = state.index.query_filtered(query, k, min_score)?;

        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                state.records.get(&n.id).map(|record| ScoredRecord {
                    record: Arc::clone(record),
                    score: n.score,
                })
            })
            .collect())
    }

    pub fn size(&self) -> usize {
        self.state.read().records.len()
    }

    /// Dimension established by the index, if any
    pub fn dimension(&self) -> Option<usize> {
        self.state.read().index.dimension()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            records: state.records.len(),
            index: state.index.stats(),
        }
    }

    /// Remove every record
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.records.clear();
        state.index.clear();
        info!("Vector store cleared");
    }

    /// Whether map and index hold exactly the same ids
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();
        let indexed: HashSet<String> = state.index.ids().into_iter().collect();
        state.index.size() == state.records.len()
            && indexed.len() == state.records.len()
            && state.records.keys().all(|id| indexed.contains(id))
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Copy every record into a snapshot
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot::new(
            state.index.dimension(),
            state.index.kind(),
            state
                .records
                .values()
                .map(|record| record.as_ref().clone())
                .collect(),
        )
    }

    /// Replace the whole store with the contents of a snapshot
    ///
    /// The replacement state is built off to the side and swapped in under
    /// the write lock, so a failed restore leaves the store unchanged.
    pub fn restore(&self, snapshot: Snapshot) -> Result<usize> {
        snapshot.check_version()?;

        let mut index = self.state.read().index.fresh();
        if let (Some(expected), Some(actual)) = (index.dimension(), snapshot.dimension) {
            if expected != actual {
                return Err(VecVaultError::DimensionMismatch { expected, actual });
            }
        }

        let mut records = BTreeMap::new();
        for record in snapshot.records {
            if record.embedding.len() != record.dimension {
                return Err(VecVaultError::SnapshotError(format!(
                    "Record {} declares dimension {} but has {} components",
                    record.id,
                    record.dimension,
                    record.embedding.len()
                )));
            }
            if let Some(header) = snapshot.dimension.filter(|d| *d != record.dimension) {
                return Err(VecVaultError::SnapshotError(format!(
                    "Record {} has dimension {} but the snapshot declares {header}",
                    record.id, record.dimension
                )));
            }
            if records.contains_key(&record.id) {
                return Err(VecVaultError::SnapshotError(format!(
                    "Duplicate id {} in snapshot",
                    record.id
                )));
            }
            index.add(&record.id, &record.embedding)?;
            records.insert(record.id.clone(), Arc::new(record));
        }

        let count = records.len();
        *self.state.write() = StoreState { records, index };
        info!(records = count, "Vector store restored from snapshot");
        Ok(count)
    }

    /// Export the store to a JSON snapshot file
    pub fn save_snapshot(&self, path: &Path) -> Result<usize> {
        let snapshot = self.snapshot();
        let count = snapshot.records.len();
        snapshot.write_to(path)?;
        Ok(count)
    }

    /// Replace the store with a JSON snapshot file
    pub fn load_snapshot(&self, path: &Path) -> Result<usize> {
        self.restore(Snapshot::read_from(path)?)
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}
