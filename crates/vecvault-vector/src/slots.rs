//! Bookkeeping shared by the index implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use vecvault_core::similarity::ensure_finite;
use vecvault_core::{Result, VecVaultError};

/// Maps ids to dense slot positions
///
/// Removal swaps the last slot into the freed position, mirroring
/// `Vec::swap_remove`, so payload vectors kept in parallel stay aligned.
#[derive(Debug, Default, Clone)]
pub(crate) struct IdSlots {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl IdSlots {
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub(crate) fn id_at(&self, position: usize) -> &str {
        &self.ids[position]
    }

    pub(crate) fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Append a new id, returning its slot
    pub(crate) fn push(&mut self, id: &str) -> usize {
        let position = self.ids.len();
        self.ids.push(id.to_string());
        self.positions.insert(id.to_string(), position);
        position
    }

    /// Free the slot of `id`, returning the freed position
    pub(crate) fn swap_remove(&mut self, id: &str) -> Option<usize> {
        let position = self.positions.remove(id)?;
        self.ids.swap_remove(position);
        if let Some(moved) = self.ids.get(position) {
            self.positions.insert(moved.clone(), position);
        }
        Some(position)
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
        self.positions.clear();
    }

    /// Approximate bytes held by ids and the position map
    pub(crate) fn memory_bytes(&self) -> usize {
        let per_id = 2 * std::mem::size_of::<String>() + std::mem::size_of::<usize>();
        self.ids.iter().map(|id| 2 * id.len() + per_id).sum()
    }
}

/// Tracks the dimension an index accepts
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DimensionGuard {
    configured: Option<usize>,
    inferred: Option<usize>,
}

impl DimensionGuard {
    pub(crate) fn new(configured: Option<usize>) -> Self {
        Self {
            configured: configured.filter(|d| *d > 0),
            inferred: None,
        }
    }

    pub(crate) fn configured(&self) -> Option<usize> {
        self.configured
    }

    pub(crate) fn current(&self) -> Option<usize> {
        self.configured.or(self.inferred)
    }

    pub(crate) fn check(&self, actual: usize) -> Result<()> {
        match self.current() {
            Some(expected) if expected != actual => {
                Err(VecVaultError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Check an embedding about to be inserted, fixing the dimension if unset
    pub(crate) fn admit(&mut self, embedding: &[f64]) -> Result<usize> {
        let actual = embedding.len();
        if actual == 0 {
            return Err(VecVaultError::InvalidArgument(
                "Cannot index an empty embedding".to_string(),
            ));
        }
        ensure_finite(embedding)?;
        self.check(actual)?;
        if self.current().is_none() {
            self.inferred = Some(actual);
        }
        Ok(actual)
    }

    /// Forget an inferred dimension; a configured one is kept
    pub(crate) fn reset(&mut self) {
        self.inferred = None;
    }
}

/// Validate the query arguments shared by every index
pub(crate) fn check_query(
    guard: &DimensionGuard,
    query: &[f64],
    k: usize,
    min_score: Option<f64>,
) -> Result<()> {
    if k == 0 {
        return Err(VecVaultError::InvalidArgument(
            "Number of similar vectors must be positive".to_string(),
        ));
    }
    if let Some(min) = min_score.filter(|m| m.is_nan()) {
        return Err(VecVaultError::InvalidArgument(format!(
            "Minimum similarity must be a number, got {min}"
        )));
    }
    ensure_finite(query)?;
    guard.check(query.len())
}

/// Lock-free query counters so queries can run behind a shared borrow
#[derive(Debug, Default)]
pub(crate) struct QueryCounters {
    queries: AtomicU64,
    nanos: AtomicU64,
}

impl QueryCounters {
    pub(crate) fn record(&self, elapsed: Duration) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn total_queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub(crate) fn avg_micros(&self) -> f64 {
        let queries = self.total_queries();
        if queries == 0 {
            return 0.0;
        }
        self.nanos.load(Ordering::Relaxed) as f64 / queries as f64 / 1_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_remove_keeps_positions_aligned() {
        let mut slots = IdSlots::default();
        slots.push("a");
        slots.push("b");
        slots.push("c");

        assert_eq!(slots.swap_remove("a"), Some(0));
        assert_eq!(slots.id_at(0), "c");
        assert_eq!(slots.position("c"), Some(0));
        assert_eq!(slots.position("b"), Some(1));
        assert_eq!(slots.position("a"), None);
        assert_eq!(slots.len(), 2);

        assert_eq!(slots.swap_remove("b"), Some(1));
        assert_eq!(slots.swap_remove("b"), None);
        assert_eq!(slots.ids(), &["c".to_string()]);
    }

    #[test]
    fn test_dimension_guard_infers_then_enforces() {
        let mut guard = DimensionGuard::new(None);
        assert_eq!(guard.current(), None);
        assert!(guard.check(7).is_ok());

        guard.admit(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(guard.current(), Some(3));
        assert!(matches!(
            guard.admit(&[1.0; 4]),
            Err(VecVaultError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        ));

        guard.reset();
        assert_eq!(guard.current(), None);
    }

    #[test]
    fn test_dimension_guard_configured_survives_reset() {
        let mut guard = DimensionGuard::new(Some(2));
        assert!(guard.admit(&[1.0; 3]).is_err());
        guard.reset();
        assert_eq!(guard.current(), Some(2));
        assert!(guard.admit(&[]).is_err());
    }

    #[test]
    fn test_check_query_rejects_zero_k() {
        let guard = DimensionGuard::new(Some(2));
        assert!(matches!(
            check_query(&guard, &[1.0, 0.0], 0, None),
            Err(VecVaultError::InvalidArgument(_))
        ));
        assert!(check_query(&guard, &[1.0, 0.0], 1, None).is_ok());
    }

    #[test]
    fn test_check_query_rejects_non_finite_input() {
        let guard = DimensionGuard::new(Some(2));
        assert!(matches!(
            check_query(&guard, &[f64::NAN, 0.0], 1, None),
            Err(VecVaultError::ValidationError(_))
        ));
        assert!(matches!(
            check_query(&guard, &[f64::INFINITY, 0.0], 1, None),
            Err(VecVaultError::ValidationError(_))
        ));
        assert!(matches!(
            check_query(&guard, &[1.0, 0.0], 1, Some(f64::NAN)),
            Err(VecVaultError::InvalidArgument(_))
        ));
        assert!(check_query(&guard, &[1.0, 0.0], 1, Some(0.5)).is_ok());
    }

    #[test]
    fn test_admit_rejects_non_finite_embedding() {
        let mut guard = DimensionGuard::new(None);
        assert!(matches!(
            guard.admit(&[1.0, f64::NAN]),
            Err(VecVaultError::ValidationError(_))
        ));
        assert_eq!(guard.current(), None);
    }

    #[test]
    fn test_query_counters() {
        let counters = QueryCounters::default();
        assert_eq!(counters.avg_micros(), 0.0);
        counters.record(Duration::from_micros(10));
        counters.record(Duration::from_micros(30));
        assert_eq!(counters.total_queries(), 2);
        assert!((counters.avg_micros() - 20.0).abs() < 1e-9);
    }
}
