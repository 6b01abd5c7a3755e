//! vecvault Vector - Indexing, storage and creation service
//!
//! Provides exact cosine nearest-neighbor indexes (dense and sparse),
//! the vector store that keeps records and index in lock-step, and the
//! service that serializes duplicate-checked creation.

use serde::Serialize;
use vecvault_core::{IndexKind, Result};

pub mod dense;
pub mod service;
pub mod snapshot;
pub mod sparse;
pub mod store;

mod slots;

pub use dense::DenseIndex;
pub use service::VectorService;
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use sparse::SparseIndex;
pub use store::{StoreStats, VectorStore};

/// An id returned by an index query with its cosine similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: String,
    pub score: f64,
}

/// Runtime statistics of an index
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub kind: IndexKind,
    pub dimension: Option<usize>,
    pub vectors: usize,
    pub total_queries: u64,
    pub avg_query_micros: f64,
    pub memory_bytes: usize,
}

/// Trait for exact nearest-neighbor indexes over cosine similarity
///
/// Implementations must rank exactly as
/// [`vecvault_core::similarity::cosine_similarity`] would. Mutation takes
/// `&mut self`; the owning store provides synchronization.
pub trait NearestNeighborIndex: Send + Sync {
    /// Insert or replace the entry for `id`
    fn add(&mut self, id: &str, embedding: &[f64]) -> Result<()>;

    /// Remove the entry for `id`, returning whether one existed
    fn remove(&mut self, id: &str) -> bool;

    /// Top-`k` ids with scores, best first, dropping scores below `min_score`
    ///
    /// A query with non-finite components is a `ValidationError`; a NaN
    /// `min_score` is an `InvalidArgument`.
    fn query_filtered(
        &self,
        query: &[f64],
        k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<Neighbor>>;

    /// Top-`k` ids with scores, best first
    fn query_scored(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>> {
        self.query_filtered(query, k, None)
    }

    /// Top-`k` ids, best first
    fn query(&self, query: &[f64], k: usize) -> Result<Vec<String>> {
        Ok(self
            .query_scored(query, k)?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    /// Number of indexed vectors
    fn size(&self) -> usize;

    /// Remove every entry
    fn clear(&mut self);

    fn contains_id(&self, id: &str) -> bool;

    /// Established dimension, if any
    fn dimension(&self) -> Option<usize>;

    fn kind(&self) -> IndexKind;

    /// Indexed ids in slot order
    fn ids(&self) -> Vec<String>;

    fn stats(&self) -> IndexStats;

    /// An empty index with the same configuration
    fn fresh(&self) -> Box<dyn NearestNeighborIndex>;
}

/// Create an index of the given kind
///
/// `dimension` fixes the dimension up front; `epsilon` only affects sparse
/// indexes.
pub fn create_index(
    kind: IndexKind,
    dimension: Option<usize>,
    epsilon: f64,
) -> Box<dyn NearestNeighborIndex> {
    match kind {
        IndexKind::Dense => Box::new(DenseIndex::new(dimension)),
        IndexKind::Sparse => Box::new(SparseIndex::new(dimension, epsilon)),
    }
}
