//! Similarity math shared by every index and the duplicate check
//!
//! All functions are pure. Cosine similarity is the [`dot`] product of two
//! [`normalize`]d vectors passed through [`clamp_similarity`], so an index
//! that stores unit rows produces bit-identical scores to
//! [`cosine_similarity`]. Normalization divides by the largest component
//! before squaring, so finite inputs never overflow or underflow to a
//! meaningless score.

use crate::{Result, VecVaultError};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Components with an absolute value at or below this are dropped by [`to_sparse`]
pub const DEFAULT_SPARSE_EPSILON: f64 = 1e-10;

// ============================================================================
// Dense vectors
// ============================================================================

/// Dot product over the common prefix of two slices
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        sum += x * y;
    }
    sum
}

/// Largest absolute component (`0.0` for an empty slice)
fn max_abs<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().fold(0.0, |m: f64, x| m.max(x.abs()))
}

/// Euclidean norm of `values` after dividing each by `scale`
fn scaled_norm<'a>(values: impl IntoIterator<Item = &'a f64>, scale: f64) -> f64 {
    let mut sum = 0.0;
    for x in values {
        let x = x / scale;
        sum += x * x;
    }
    sum.sqrt()
}

/// Euclidean norm
///
/// Computed on components scaled by the largest one, so it only overflows
/// when the true norm exceeds `f64::MAX`.
pub fn norm(v: &[f64]) -> f64 {
    let scale = max_abs(v);
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    scale * scaled_norm(v, scale)
}

/// Map a raw dot product of unit vectors onto a similarity score
///
/// The result lies in [-1, 1] and is never `-0.0`; NaN maps to `0.0`.
pub fn clamp_similarity(raw: f64) -> f64 {
    if raw.is_nan() || raw == 0.0 {
        0.0
    } else {
        raw.clamp(-1.0, 1.0)
    }
}

/// Cosine similarity of two dense vectors of equal length
///
/// Zero vectors score `0.0` against everything.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(VecVaultError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(clamp_similarity(dot(&normalize(a), &normalize(b))))
}

/// Scale a vector to unit length
///
/// Zero vectors and vectors with non-finite components are returned unchanged.
pub fn normalize(v: &[f64]) -> Vec<f64> {
    let scale = max_abs(v);
    if scale == 0.0 || !scale.is_finite() {
        return v.to_vec();
    }
    let n = scaled_norm(v, scale);
    v.iter().map(|x| x / scale / n).collect()
}

/// Check that every component is finite
pub fn ensure_finite(v: &[f64]) -> Result<()> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(pos) => Err(VecVaultError::ValidationError(format!(
            "Vector component {pos} is not a finite number"
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// Sparse vectors
// ============================================================================

/// Sparse encoding: `(position, value)` pairs in ascending position order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Number of stored (non-negligible) components
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored components in ascending position order
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Euclidean norm of the stored components
    pub fn norm(&self) -> f64 {
        let scale = max_abs(self.entries.iter().map(|(_, x)| x));
        if scale == 0.0 || !scale.is_finite() {
            return scale;
        }
        scale * scaled_norm(self.entries.iter().map(|(_, x)| x), scale)
    }

    /// The same positions scaled to unit length; empty vectors stay empty
    pub fn normalized(&self) -> SparseVector {
        let scale = max_abs(self.entries.iter().map(|(_, x)| x));
        if scale == 0.0 || !scale.is_finite() {
            return self.clone();
        }
        let n = scaled_norm(self.entries.iter().map(|(_, x)| x), scale);
        SparseVector {
            entries: self
                .entries
                .iter()
                .map(|&(i, x)| (i, x / scale / n))
                .collect(),
        }
    }
}

/// Drop every component whose absolute value is at most `epsilon`
pub fn to_sparse(v: &[f64], epsilon: f64) -> SparseVector {
    let entries = v
        .iter()
        .enumerate()
        .filter(|(_, x)| x.abs() > epsilon)
        .map(|(i, x)| (i, *x))
        .collect();
    SparseVector { entries }
}

/// Rebuild a zero-filled dense vector of `dimension` components
pub fn to_dense(sparse: &SparseVector, dimension: usize) -> Result<Vec<f64>> {
    let mut dense = vec![0.0; dimension];
    for &(i, x) in &sparse.entries {
        let slot = dense.get_mut(i).ok_or_else(|| {
            VecVaultError::InvalidArgument(format!(
                "Sparse position {i} out of range for dimension {dimension}"
            ))
        })?;
        *slot = x;
    }
    Ok(dense)
}

/// Dot product of two sparse vectors (merge over sorted positions)
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.entries.len() && j < b.entries.len() {
        let (pa, va) = a.entries[i];
        let (pb, vb) = b.entries[j];
        match pa.cmp(&pb) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += va * vb;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Cosine similarity of two sparse vectors
pub fn sparse_cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    clamp_similarity(sparse_dot(&a.normalized(), &b.normalized()))
}

// ============================================================================
// Top-k selection
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    position: usize,
}

// Greater means ranked earlier: higher score, then lower position.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Best `k` `(position, score)` pairs, highest score first
///
/// Positions are the iteration order of `scores`; equal scores keep that
/// order, so the result matches a stable descending sort truncated to `k`.
/// Runs in O(n log k).
pub fn select_top_k(scores: impl IntoIterator<Item = f64>, k: usize) -> Vec<(usize, f64)> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k + 1);
    for (position, score) in scores.into_iter().enumerate() {
        heap.push(Reverse(Candidate { score, position }));
        if heap.len() > k {
            heap.pop();
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(c)| (c.position, c.score))
        .collect()
}

/// Keep the `k` highest-scoring items, best first, ties in input order
pub fn top_k<T>(items: Vec<T>, scores: &[f64], k: usize) -> Result<Vec<T>> {
    if items.len() != scores.len() {
        return Err(VecVaultError::InvalidArgument(format!(
            "Items and scores must have same size ({} vs {})",
            items.len(),
            scores.len()
        )));
    }

    let selected = select_top_k(scores.iter().copied(), k);
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(selected
        .into_iter()
        .filter_map(|(position, _)| slots[position].take())
        .collect())
}

// ============================================================================
// Memory accounting
// ============================================================================

/// Bytes held by the components of a dense vector
pub fn dense_memory_bytes(dimension: usize) -> usize {
    dimension * std::mem::size_of::<f64>()
}

/// Bytes held by the entries of a sparse vector
pub fn sparse_memory_bytes(nnz: usize) -> usize {
    nnz * std::mem::size_of::<(usize, f64)>()
}

// ============================================================================
// Tests
// ============================================================================
