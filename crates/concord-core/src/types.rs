//! Partition tensor view and score container.

use crate::errors::{ConcordError, Result};
use crate::index;

/// Borrowed view of a dense partition tensor.
///
/// Row-major shape (F, P, N): `n_features` features, `n_partitions`
/// partition variants per feature, `n_objects` objects. Labels are signed
/// 32-bit integers; valid labels lie in [0, K) where K is inferred by the
/// engine as max(label)+1. The caller owns the backing storage; the engine
/// copies it to device memory for the duration of one call.
#[derive(Debug, Clone, Copy)]
pub struct PartitionSet<'a> {
    labels: &'a [i32],
    n_features: usize,
    n_partitions: usize,
    n_objects: usize,
}

impl<'a> PartitionSet<'a> {
    /// Wraps a label buffer, validating shape against length.
    ///
    /// # Errors
    ///
    /// [`ConcordError::InvalidInput`] if any dimension is zero or the
    /// buffer length is not F·P·N.
    pub fn new(
        labels: &'a [i32],
        n_features: usize,
        n_partitions: usize,
        n_objects: usize,
    ) -> Result<Self> {
        if n_features == 0 || n_partitions == 0 || n_objects == 0 {
            return Err(ConcordError::invalid_input(format!(
                "all dimensions must be positive, got (F={}, P={}, N={})",
                n_features, n_partitions, n_objects
            )));
        }
        let expected = n_features
            .checked_mul(n_partitions)
            .and_then(|fp| fp.checked_mul(n_objects))
            .ok_or_else(|| ConcordError::invalid_input("tensor shape overflows usize"))?;
        if labels.len() != expected {
            return Err(ConcordError::invalid_input(format!(
                "label buffer has {} elements, shape (F={}, P={}, N={}) needs {}",
                labels.len(),
                n_features,
                n_partitions,
                n_objects,
                expected
            )));
        }
        Ok(Self {
            labels,
            n_features,
            n_partitions,
            n_objects,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_partitions(&self) -> usize {
        self.n_partitions
    }

    pub fn n_objects(&self) -> usize {
        self.n_objects
    }

    /// The full backing buffer, row-major (F, P, N).
    pub fn labels(&self) -> &'a [i32] {
        self.labels
    }

    /// The length-N label vector for one (feature, variant) slot.
    pub fn partition(&self, feature: usize, variant: usize) -> &'a [i32] {
        assert!(feature < self.n_features && variant < self.n_partitions);
        let start = (feature * self.n_partitions + variant) * self.n_objects;
        &self.labels[start..start + self.n_objects]
    }

    /// Output size A = F·(F−1)/2 · P².
    pub fn num_scores(&self) -> u64 {
        index::num_feature_pairs(self.n_features)
            * (self.n_partitions * self.n_partitions) as u64
    }
}

/// Maximum-ARI summary for one feature pair: the coefficient of the
/// clustermatch family (max over the P×P variant block, clamped to ≥ 0)
/// and the variant indices that achieved it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaturePairMax {
    pub feature_a: usize,
    pub feature_b: usize,
    /// max ARI over the block, clamped to 0.0 from below
    pub coef: f32,
    pub variant_a: usize,
    pub variant_b: usize,
}

/// Dense ARI results for one engine call.
///
/// `values[b]` is the score for work-group id `b`; ordering is
/// lexicographic by unordered feature pair (i, j), then row-major over the
/// P×P variant block (see [`index::block_to_pair`]).
#[derive(Debug, Clone)]
pub struct AriScores {
    values: Vec<f32>,
    n_features: usize,
    n_partitions: usize,
}

impl AriScores {
    pub fn new(values: Vec<f32>, n_features: usize, n_partitions: usize) -> Self {
        debug_assert_eq!(
            values.len() as u64,
            index::num_feature_pairs(n_features) * (n_partitions * n_partitions) as u64
        );
        Self {
            values,
            n_features,
            n_partitions,
        }
    }

    /// An empty result for grids with no feature pair (F = 1).
    pub fn empty(n_features: usize, n_partitions: usize) -> Self {
        Self::new(Vec::new(), n_features, n_partitions)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_partitions(&self) -> usize {
        self.n_partitions
    }

    /// The (i, j, m, n) pairing scored at position `block`.
    pub fn pair_indices(&self, block: u64) -> (usize, usize, usize, usize) {
        index::block_to_pair(block, self.n_features, self.n_partitions)
    }

    /// Score for feature pair (i, j) with i < j and variants (m, n).
    pub fn get(&self, i: usize, j: usize, m: usize, n: usize) -> Option<f32> {
        if i >= j || j >= self.n_features || m >= self.n_partitions || n >= self.n_partitions {
            return None;
        }
        let b = index::pair_to_block((i, j, m, n), self.n_features, self.n_partitions);
        self.values.get(b as usize).copied()
    }

    /// Collapses each feature pair's P×P block to its maximum ARI,
    /// clamped to ≥ 0, with the argmax variant indices. First occurrence
    /// wins on ties. Condensed (i, j) order.
    pub fn max_per_feature_pair(&self) -> Vec<FeaturePairMax> {
        let p2 = self.n_partitions * self.n_partitions;
        let pairs = index::num_feature_pairs(self.n_features) as usize;
        let mut out = Vec::with_capacity(pairs);
        for fpair in 0..pairs {
            let block = &self.values[fpair * p2..(fpair + 1) * p2];
            let mut best = 0usize;
            for (v, &score) in block.iter().enumerate() {
                if score > block[best] {
                    best = v;
                }
            }
            let (i, j) = index::condensed_to_pair(self.n_features, fpair as u64);
            let (m, n) = index::unravel2(best as u64, self.n_partitions as u64);
            out.push(FeaturePairMax {
                feature_a: i,
                feature_b: j,
                coef: block[best].max(0.0),
                variant_a: m as usize,
                variant_b: n as usize,
            });
        }
        out
    }
}
