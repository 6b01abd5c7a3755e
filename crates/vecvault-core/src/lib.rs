//! vecvault Core - Records, errors, configuration and similarity math
//!
//! This crate defines the shared abstractions used by the vecvault engine:
//! - Vector records and creation input
//! - The error taxonomy surfaced to callers
//! - Similarity math (cosine, normalization, sparse encodings, top-k)
//! - Configuration management
//! - The embedding producer seam consumed by ingestion front-ends

pub mod config;
pub mod similarity;

pub use config::{AppConfig, ConfigError, LoggingConfig, StoreConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by vecvault operations
#[derive(Error, Debug)]
pub enum VecVaultError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate vector: similar to {existing_id} (similarity {similarity:.4})")]
    DuplicateVector { existing_id: String, similarity: f64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VecVaultError {
    /// Whether the error reflects a contract violation by the caller
    ///
    /// Duplicate rejections count as client errors: the caller decides whether
    /// to treat them as a warning or a hard failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::DimensionMismatch { .. }
                | Self::DuplicateVector { .. }
                | Self::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VecVaultError>;

// ============================================================================
// Records
// ============================================================================

/// A stored vector with its identifier and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier, immutable once assigned
    pub id: String,

    /// Embedding components
    pub embedding: Vec<f64>,

    /// Number of components (always equal to `embedding.len()`)
    pub dimension: usize,

    /// Provenance tag (source filename, "text-input", ...)
    #[serde(default)]
    pub metadata: String,

    /// When the record was accepted
    pub created_at: DateTime<Utc>,
}

impl VectorRecord {
    /// Build a record from an id and embedding, deriving the dimension
    pub fn new(id: impl Into<String>, embedding: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            dimension: embedding.len(),
            embedding,
            metadata: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }
}

/// Input accepted by the service when creating a vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVector {
    /// Caller-chosen id; a fresh one is assigned when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Embedding components
    pub embedding: Vec<f64>,

    /// Declared dimension, must match the embedding length
    pub dimension: usize,

    /// Provenance tag
    #[serde(default)]
    pub metadata: String,
}

impl NewVector {
    /// Create input from an embedding, declaring its own length as dimension
    pub fn new(embedding: Vec<f64>) -> Self {
        Self {
            id: None,
            dimension: embedding.len(),
            embedding,
            metadata: String::new(),
        }
    }

    /// Set a caller-chosen id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Override the declared dimension
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Check the structural invariants of the input
    pub fn validate(&self) -> Result<()> {
        if self.embedding.is_empty() {
            return Err(VecVaultError::ValidationError(
                "Embedding cannot be empty".to_string(),
            ));
        }
        if self.dimension == 0 {
            return Err(VecVaultError::ValidationError(
                "Dimension must be a positive number".to_string(),
            ));
        }
        if self.embedding.len() != self.dimension {
            return Err(VecVaultError::ValidationError(format!(
                "Dimension {} does not match embedding length {}",
                self.dimension,
                self.embedding.len()
            )));
        }
        if let Some(pos) = self.embedding.iter().position(|v| !v.is_finite()) {
            return Err(VecVaultError::ValidationError(format!(
                "Embedding component {pos} is not a finite number"
            )));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(VecVaultError::ValidationError(
                    "Vector ID cannot be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Turn the input into a record under the given id
    pub fn into_record(self, id: String) -> VectorRecord {
        VectorRecord {
            id,
            embedding: self.embedding,
            dimension: self.dimension,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// A record paired with its similarity to a query
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    /// The matched record
    pub record: Arc<VectorRecord>,

    /// Cosine similarity to the query (higher is better)
    pub score: f64,
}

// ============================================================================
// Index Kinds
// ============================================================================

/// Storage strategy of a nearest-neighbor index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Every component stored
    #[default]
    Dense,
    /// Only components above epsilon stored
    Sparse,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dense => write!(f, "dense"),
            Self::Sparse => write!(f, "sparse"),
        }
    }
}

impl std::str::FromStr for IndexKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dense" => Ok(Self::Dense),
            "sparse" => Ok(Self::Sparse),
            _ => Err(ConfigError::InvalidValue {
                key: "VECVAULT_INDEX_KIND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Producer of embeddings for arbitrary input (text, extracted documents)
///
/// vecvault never generates embeddings itself; front-ends plug a producer in
/// and hand its output to the service.
#[async_trait::async_trait]
pub trait EmbeddingProducer: Send + Sync {
    /// Produce an embedding for the input
    async fn embed(&self, input: &str) -> Result<Vec<f64>>;

    /// Fixed output dimension, if the producer knows it up front
    fn dimension(&self) -> Option<usize> {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
