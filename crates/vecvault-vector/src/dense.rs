//! Dense exact index
//!
//! Vectors are stored normalized, row-major in one contiguous buffer, so a
//! query costs one normalization, one dot product per row and an
//! O(n log k) heap selection.

use crate::slots::{check_query, DimensionGuard, IdSlots, QueryCounters};
use crate::{IndexStats, NearestNeighborIndex, Neighbor};
use std::time::Instant;
use tracing::debug;
use vecvault_core::similarity::{clamp_similarity, dense_memory_bytes, dot, normalize, select_top_k};
use vecvault_core::{IndexKind, Result};

/// Exact cosine index over full-precision dense vectors
#[derive(Debug, Default)]
pub struct DenseIndex {
    slots: IdSlots,
    /// Unit-length rows; zero vectors stay zero
    data: Vec<f64>,
    guard: DimensionGuard,
    counters: QueryCounters,
}

impl DenseIndex {
    /// Create an index; `dimension` fixes the accepted length up front
    pub fn new(dimension: Option<usize>) -> Self {
        Self {
            guard: DimensionGuard::new(dimension),
            ..Default::default()
        }
    }

    fn row(&self, position: usize, dim: usize) -> &[f64] {
        &self.data[position * dim..(position + 1) * dim]
    }
}

impl NearestNeighborIndex for DenseIndex {
    fn add(&mut self, id: &str, embedding: &[f64]) -> Result<()> {
        let dim = self.guard.admit(embedding)?;
        let unit = normalize(embedding);

        match self.slots.position(id) {
            Some(position) => {
                self.data[position * dim..(position + 1) * dim].copy_from_slice(&unit);
                debug!(id, "Replaced dense index entry");
            }
            None => {
                self.slots.push(id);
                self.data.extend_from_slice(&unit);
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(position) = self.slots.swap_remove(id) else {
            return false;
        };
        // Slot bookkeeping already moved the last id into `position`; move its row too.
        if let Some(dim) = self.guard.current() {
            let last = self.slots.len();
            if position != last {
                self.data.copy_within(last * dim..(last + 1) * dim, position * dim);
            }
            self.data.truncate(last * dim);
        }
        true
    }

    fn query_filtered(
        &self,
        query: &[f64],
        k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<Neighbor>> {
        let started = Instant::now();
        check_query(&self.guard, query, k, min_score)?;

        let Some(dim) = self.guard.current() else {
            return Ok(Vec::new());
        };

        let query = normalize(query);
        let rows = self.slots.len();
        let scores = (0..rows)
            .map(|position| clamp_similarity(dot(&query, self.row(position, dim))));

        // Scores arrive best first, so the ones above the floor form a prefix.
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
            candidates = rows,
            returned = neighbors.len(),
            "Dense index query"
        );
        Ok(neighbors)
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.data.clear();
        self.guard.reset();
    }

    fn contains_id(&self, id: &str) -> bool {
        self.slots.position(id).is_some()
    }

    fn dimension(&self) -> Option<usize> {
        self.guard.current()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Dense
    }

    fn ids(&self) -> Vec<String> {
        self.slots.ids().to_vec()
    }

    fn stats(&self) -> IndexStats {
        let vectors = self.size();
        let row_bytes = dense_memory_bytes(self.guard.current().unwrap_or(0));
        IndexStats {
            kind: IndexKind::Dense,
            dimension: self.guard.current(),
            vectors,
            total_queries: self.counters.total_queries(),
            avg_query_micros: self.counters.avg_micros(),
            memory_bytes: vectors * row_bytes + self.slots.memory_bytes(),
        }
    }

    fn fresh(&self) -> Box<dyn NearestNeighborIndex> {
        Box::new(DenseIndex::new(self.guard.configured()))
    }
}
