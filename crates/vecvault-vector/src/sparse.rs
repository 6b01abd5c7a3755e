//! Sparse exact index
//!
//! Stores only components whose magnitude exceeds epsilon. Scores agree with
//! the dense index within floating-point tolerance while using less memory
//! for mostly-zero embeddings.

use crate::slots::{check_query, DimensionGuard, IdSlots, QueryCounters};
use crate::{IndexStats, NearestNeighborIndex, Neighbor};
use std::time::Instant;
use tracing::debug;
use vecvault_core::similarity::{
    clamp_similarity, select_top_k, sparse_dot, sparse_memory_bytes, to_sparse, SparseVector,
    DEFAULT_SPARSE_EPSILON,
};
use vecvault_core::{IndexKind, Result};

/// Exact cosine index over sparse encodings
#[derive(Debug)]
pub struct SparseIndex {
    slots: IdSlots,
    /// Pruned entries scaled to unit length
    entries: Vec<SparseVector>,
    epsilon: f64,
    guard: DimensionGuard,
    counters: QueryCounters,
}

impl Default for SparseIndex {
    fn default() -> Self {
        Self::new(None, DEFAULT_SPARSE_EPSILON)
    }
}

impl SparseIndex {
    /// Create an index dropping components with `|x| <= epsilon`
    pub fn new(dimension: Option<usize>, epsilon: f64) -> Self {
        Self {
            slots: IdSlots::default(),
            entries: Vec::new(),
            epsilon,
            guard: DimensionGuard::new(dimension),
            counters: QueryCounters::default(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Total stored components across all entries
    pub fn stored_components(&self) -> usize {
        self.entries.iter().map(SparseVector::nnz).sum()
    }
}

impl NearestNeighborIndex for SparseIndex {
    fn add(&mut self, id: &str, embedding: &[f64]) -> Result<()> {
        self.guard.admit(embedding)?;
        let entry = to_sparse(embedding, self.epsilon).normalized();

        match self.slots.position(id) {
            Some(position) => {
                self.entries[position] = entry;
                debug!(id, "Replaced sparse index entry");
            }
            None => {
                self.slots.push(id);
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.slots.swap_remove(id) {
            Some(position) => {
                self.entries.swap_remove(position);
                true
            }
            None => false,
        }
    }

    fn query_filtered(
        &self,
        query: &[f64],
        k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<Neighbor>> {
        let started = Instant::now();
        check_query(&self.guard, query, k, min_score)?;

        let query = to_sparse(query, self.epsilon).normalized();
        let scores = self
            .entries
            .iter()
            .map(|entry| clamp_similarity(sparse_dot(&query, entry)));

        let floor = min_score.unwrap_or(f64::NEG_INFINITY);
        let neighbors = select_top_k(scores, k)
            .into_iter()
            .take_while(|(_, score)| *score >= floor)
            .map(|(position, score)| Neighbor {
                id: self.slots.id_at(position).to_string(),
                score,
            })
            .collect::<Vec<_>>();

        self.counters.record(started.elapsed());
        debug!(
            candidates = self.entries.len(),
            query_nnz = query.nnz(),
            returned = neighbors.len(),
            "Sparse index query"
        );
        Ok(neighbors)
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.entries.clear();
        self.guard.reset();
    }

    fn contains_id(&self, id: &str) -> bool {
        self.slots.position(id).is_some()
    }

    fn dimension(&self) -> Option<usize> {
        self.guard.current()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Sparse
    }

    fn ids(&self) -> Vec<String> {
        self.slots.ids().to_vec()
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            kind: IndexKind::Sparse,
            dimension: self.guard.current(),
            vectors: self.size(),
            total_queries: self.counters.total_queries(),
            avg_query_micros: self.counters.avg_micros(),
            memory_bytes: sparse_memory_bytes(self.stored_components())
                + self.entries.len() * std::mem::size_of::<SparseVector>()
                + self.slots.memory_bytes(),
        }
    }

    fn fresh(&self) -> Box<dyn NearestNeighborIndex> {
        Box::new(SparseIndex::new(self.guard.configured(), self.epsilon))
    }
}
