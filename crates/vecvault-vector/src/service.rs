//! Vector creation service
//!
//! The transactional boundary in front of [`VectorStore`]. Creation runs
//! "find nearest, reject near-duplicate, insert" under one mutex (the
//! create gate) so two concurrent creates of near-identical vectors cannot
//! both pass the duplicate check. Reads and deletes go straight to the
//! store and never wait on the gate.

use crate::snapshot::Snapshot;
use crate::store::{StoreStats, VectorStore};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vecvault_core::similarity::cosine_similarity;
use vecvault_core::{
    ConfigError, EmbeddingProducer, NewVector, Result, ScoredRecord, StoreConfig, VecVaultError,
    VectorRecord,
};

/// Default cosine similarity at which a new vector counts as a duplicate
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Duplicate-checked creation plus pass-through reads
pub struct VectorService {
    store: Arc<VectorStore>,
    create_gate: Mutex<()>,
    similarity_threshold: f64,
}

impl VectorService {
    /// Create a service over a store
    ///
    /// `similarity_threshold` must lie in [0, 1].
    pub fn new(store: Arc<VectorStore>, similarity_threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "similarity_threshold".to_string(),
                value: similarity_threshold.to_string(),
            }
            .into());
        }

        info!(
            similarity_threshold,
            dimension = ?store.dimension(),
            "Vector service initialized"
        );
        Ok(Self {
            store,
            create_gate: Mutex::new(()),
            similarity_threshold,
        })
    }

    /// Create a service and its store from configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            Arc::new(VectorStore::from_config(config)),
            config.similarity_threshold,
        )
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Validate, reject near-duplicates, assign an id and store the vector
    ///
    /// Only the single nearest existing vector is compared against the
    /// threshold.
    pub fn create(&self, input: NewVector) -> Result<Arc<VectorRecord>> {
        input.validate()?;

        let _gate = self.create_gate.lock();

        if let Some(nearest) = self.store.find_nearest_scored(&input.embedding, 1)?.first() {
            let similarity = cosine_similarity(&input.embedding, &nearest.record.embedding)?;
            debug!(
                nearest = %nearest.record.id,
                similarity,
                "Duplicate check"
            );
            if similarity >= self.similarity_threshold {
                warn!(
                    existing_id = %nearest.record.id,
                    similarity,
                    threshold = self.similarity_threshold,
                    "Similar vector already exists"
                );
                return Err(VecVaultError::DuplicateVector {
                    existing_id: nearest.record.id.clone(),
                    similarity,
                });
            }
        }

        let id = input
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = self.store.store(input.into_record(id))?;

        info!(id = %record.id, dimension = record.dimension, "Vector created");
        Ok(record)
    }

    /// Embed `input` with the producer and create the resulting vector
    ///
    /// The gate is only taken after the embedding is available.
    pub async fn ingest(
        &self,
        producer: &dyn EmbeddingProducer,
        input: &str,
        metadata: impl Into<String>,
    ) -> Result<Arc<VectorRecord>> {
        let embedding = producer.embed(input).await?;
        if let Some(expected) = producer.dimension() {
            if expected != embedding.len() {
                return Err(VecVaultError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        self.create(NewVector::new(embedding).with_metadata(metadata))
    }

    pub fn get(&self, id: &str) -> Option<Arc<VectorRecord>> {
        self.store.retrieve(id)
    }

    pub fn get_all(&self) -> Vec<Arc<VectorRecord>> {
        self.store.retrieve_all()
    }

    /// Delete a vector; deleting an absent id succeeds
    pub fn delete(&self, id: &str) -> bool {
        self.store.remove(id)
    }

    /// The `k` most similar vectors, best first
    pub fn find_similar(&self, query: &[f64], k: usize) -> Result<Vec<Arc<VectorRecord>>> {
        Ok(self
            .find_similar_scored(query, k)?
            .into_iter()
            .map(|scored| scored.record)
            .collect())
    }

    /// The `k` most similar vectors with their similarity, best first
    pub fn find_similar_scored(&self, query: &[f64], k: usize) -> Result<Vec<ScoredRecord>> {
        self.find_similar_filtered(query, k, None)
    }

    /// Like [`find_similar_scored`](Self::find_similar_scored), keeping only
    /// results whose similarity is at least `min_score`
    pub fn find_similar_filtered(
        &self,
        query: &[f64],
        k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Err(VecVaultError::InvalidArgument(
                "Number of similar vectors must be positive".to_string(),
            ));
        }
        self.store.find_nearest_filtered(query, k, min_score)
    }

    pub fn count(&self) -> usize {
        self.store.size()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn export_snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Replace the store contents; waits for any in-flight create
    pub fn import_snapshot(&self, snapshot: Snapshot) -> Result<usize> {
        let _gate = self.create_gate.lock();
        self.store.restore(snapshot)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<usize> {
        self.store.save_snapshot(path)
    }

    pub fn load_snapshot(&self, path: &Path) -> Result<usize> {
        let snapshot = Snapshot::read_from(path)?;
        self.import_snapshot(snapshot)
    }
}

impl Default for VectorService {
    fn default() -> Self {
        Self {
            store: Arc::new(VectorStore::default()),
            create_gate: Mutex::new(()),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_id() {
        let service = VectorService::default();
        let record = service
            .create(NewVector::new(vec![0.1, 0.2, 0.3]).with_metadata("test"))
            .unwrap();

        assert!(!record.id.is_empty());
        assert!(Uuid::parse_str(&record.id).is_ok());
        assert_eq!(record.metadata, "test");
        assert_eq!(service.count(), 1);
    }

    #[test]
    fn test_create_keeps_supplied_id() {
        let service = VectorService::default();
        let record = service
            .create(NewVector::new(vec![1.0, 0.0]).with_id("mine"))
            .unwrap();
        assert_eq!(record.id, "mine");
        assert!(service.get("mine").is_some());
    }

    #[test]
    fn test_create_validation_errors() {
        let service = VectorService::default();
        assert!(matches!(
            service.create(NewVector::new(vec![])),
            Err(VecVaultError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(NewVector::new(vec![1.0, 2.0]).with_dimension(3)),
            Err(VecVaultError::ValidationError(_))
        ));
        assert_eq!(service.count(), 0);
    }

    #[test]
    fn test_duplicate_detected_by_threshold() {
        let service = VectorService::default();
        let first = service.create(NewVector::new(vec![0.1, 0.2, 0.3])).unwrap();

        let err = service
            .create(NewVector::new(vec![0.11, 0.21, 0.31]))
            .unwrap_err();
        match err {
            VecVaultError::DuplicateVector {
                existing_id,
                similarity,
            } => {
                assert_eq!(existing_id, first.id);
                assert!(similarity >= DEFAULT_SIMILARITY_THRESHOLD);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(service.count(), 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let service =
            VectorService::new(Arc::new(VectorStore::default()), 0.0).unwrap();
        service.create(NewVector::new(vec![1.0, 0.0])).unwrap();
        // Orthogonal vectors score exactly 0.0, which meets a 0.0 threshold.
        assert!(matches!(
            service.create(NewVector::new(vec![0.0, 1.0])),
            Err(VecVaultError::DuplicateVector { .. })
        ));
    }

    #[test]
    fn test_threshold_one_only_rejects_exact_direction() {
        let service =
            VectorService::new(Arc::new(VectorStore::default()), 1.0).unwrap();
        service.create(NewVector::new(vec![1.0, 0.0])).unwrap();
        assert!(service.create(NewVector::new(vec![1.0, 0.01])).is_ok());
        assert!(service.create(NewVector::new(vec![2.0, 0.0])).is_err());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let store = Arc::new(VectorStore::default());
        assert!(matches!(
            VectorService::new(Arc::clone(&store), 1.2),
            Err(VecVaultError::ConfigError(_))
        ));
        assert!(VectorService::new(store, f64::NAN).is_err());
    }

    #[test]
    fn test_find_similar_zero_k() {
        let service = VectorService::default();
        service.create(NewVector::new(vec![1.0, 0.0])).unwrap();
        assert!(matches!(
            service.find_similar(&[1.0, 0.0], 0),
            Err(VecVaultError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_delete_passes_through() {
        let service = VectorService::default();
        let record = service.create(NewVector::new(vec![1.0, 0.0])).unwrap();
        assert!(service.delete(&record.id));
        assert!(!service.delete(&record.id));
        assert!(service.get(&record.id).is_none());
        assert!(service.get_all().is_empty());
    }

    #[test]
    fn test_recreate_after_delete() {
        let service = VectorService::default();
        let record = service
            .create(NewVector::new(vec![1.0, 0.0]).with_id("a"))
            .unwrap();
        service.delete(&record.id);

        let replaced = service
            .create(NewVector::new(vec![1.0, 0.0]).with_id("a"))
            .unwrap();
        assert_eq!(replaced.id, "a");
        assert_eq!(service.count(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = StoreConfig {
            similarity_threshold: 0.5,
            dimension: Some(2),
            ..Default::default()
        };
        let service = VectorService::from_config(&config).unwrap();
        assert_eq!(service.similarity_threshold(), 0.5);
        assert!(matches!(
            service.create(NewVector::new(vec![1.0, 0.0, 0.0])),
            Err(VecVaultError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_import_export_snapshot() {
        let source = VectorService::default();
        source.create(NewVector::new(vec![1.0, 0.0]).with_id("a")).unwrap();
        source.create(NewVector::new(vec![0.0, 1.0]).with_id("b")).unwrap();

        let target = VectorService::default();
        assert_eq!(target.import_snapshot(source.export_snapshot()).unwrap(), 2);
        assert_eq!(target.count(), 2);

        // Imported vectors take part in duplicate detection.
        assert!(target.create(NewVector::new(vec![1.0, 0.0])).is_err());
    }
}
