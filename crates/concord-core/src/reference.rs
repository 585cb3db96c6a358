//! CPU reference scorer.
//!
//! Walks the identical contingency → pair-confusion → finalize pipeline as
//! the device kernels, sequentially. Serves as ground truth for the GPU
//! integration tests and as a fallback for environments without CUDA. Not
//! tuned for throughput.

use crate::errors::{ConcordError, Result};
use crate::index;
use crate::types::PartitionSet;

/// K×K contingency counts for two equal-length label vectors.
///
/// Out-of-range labels are skipped, matching the kernel's backstop guard.
pub fn contingency(part_a: &[i32], part_b: &[i32], k: usize) -> Vec<i64> {
    debug_assert_eq!(part_a.len(), part_b.len());
    let mut cont = vec![0i64; k * k];
    for (&a, &b) in part_a.iter().zip(part_b) {
        if (0..k as i32).contains(&a) && (0..k as i32).contains(&b) {
            cont[a as usize * k + b as usize] += 1;
        }
    }
    cont
}

/// Collapses a contingency matrix into the pair-confusion counts
/// [TN, FP, FN, TP]. All entries are 64-bit; TN+FP+FN+TP = N².
pub fn pair_confusion(cont: &[i64], k: usize, n_objects: u64) -> [i64; 4] {
    let mut row = vec![0i64; k];
    let mut col = vec![0i64; k];
    for a in 0..k {
        for b in 0..k {
            row[a] += cont[a * k + b];
            col[b] += cont[a * k + b];
        }
    }
    let mut ss = 0i64;
    let mut dot_col = 0i64;
    let mut dot_row = 0i64;
    for a in 0..k {
        for b in 0..k {
            let v = cont[a * k + b];
            ss += v * v;
            dot_col += v * col[b];
            dot_row += cont[b * k + a] * row[b];
        }
    }
    let n = n_objects as i64;
    let tp = ss - n;
    let fp = dot_col - ss;
    let f_n = dot_row - ss;
    let tn = n * n - fp - f_n - ss;
    [tn, fp, f_n, tp]
}

/// ARI from pair-confusion counts [TN, FP, FN, TP].
///
/// Perfect agreement (FP = FN = 0) is pinned to 1.0; the formula would be
/// 0/0 there. The numerator and denominator are formed from the 64-bit
/// counts in double precision and divided once.
pub fn ari_from_confusion(conf: [i64; 4]) -> f32 {
    let [tn, fp, f_n, tp] = conf;
    if f_n == 0 && fp == 0 {
        return 1.0;
    }
    let num = 2.0 * (tp as f64 * tn as f64 - f_n as f64 * fp as f64);
    let den = (tp + f_n) as f64 * (f_n + tn) as f64 + (tp + fp) as f64 * (fp + tn) as f64;
    (num / den) as f32
}

/// ARI of two label vectors. The alphabet bound is inferred from the pair.
///
/// # Errors
///
/// [`ConcordError::InvalidInput`] on length mismatch, empty vectors, or a
/// negative label.
pub fn ari(part_a: &[i32], part_b: &[i32]) -> Result<f32> {
    if part_a.len() != part_b.len() {
        return Err(ConcordError::invalid_input(format!(
            "partition lengths differ: {} vs {}",
            part_a.len(),
            part_b.len()
        )));
    }
    if part_a.is_empty() {
        return Err(ConcordError::invalid_input("partitions are empty"));
    }
    let k = alphabet_bound(part_a.iter().chain(part_b))?;
    let cont = contingency(part_a, part_b, k);
    Ok(ari_from_confusion(pair_confusion(
        &cont,
        k,
        part_a.len() as u64,
    )))
}

/// The full engine output computed on the CPU: one score per work-group
/// id, in the same order as the device path.
pub fn score_all(parts: &PartitionSet<'_>) -> Result<Vec<f32>> {
    let k = alphabet_bound(parts.labels().iter())?;
    let n = parts.n_objects() as u64;
    let total = parts.num_scores();
    let mut out = Vec::with_capacity(total as usize);
    for b in 0..total {
        let (i, j, m, vn) = index::block_to_pair(b, parts.n_features(), parts.n_partitions());
        let cont = contingency(parts.partition(i, m), parts.partition(j, vn), k);
        out.push(ari_from_confusion(pair_confusion(&cont, k, n)));
    }
    Ok(out)
}

/// max(labels)+1 over an iterator, rejecting negative labels.
fn alphabet_bound<'a>(labels: impl Iterator<Item = &'a i32>) -> Result<usize> {
    let mut max = -1i32;
    for &v in labels {
        if v < 0 {
            return Err(ConcordError::invalid_input(format!(
                "negative label {} (labels must lie in [0, K))",
                v
            )));
        }
        max = max.max(v);
    }
    Ok((max + 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const TOL: f32 = 1e-6;

    #[test]
    fn test_identical_partitions() {
        let parts = [0, 0, 1, 1, /**/ 0, 0, 1, 1];
        let set = PartitionSet::new(&parts, 2, 1, 4).unwrap();
        assert_eq!(score_all(&set).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_label_permutation_is_perfect_agreement() {
        let parts = [0, 0, 1, 1, /**/ 1, 1, 0, 0];
        let set = PartitionSet::new(&parts, 2, 1, 4).unwrap();
        assert_eq!(score_all(&set).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_complete_pair_disagreement() {
        let parts = [0, 0, 1, 1, /**/ 0, 1, 0, 1];
        let set = PartitionSet::new(&parts, 2, 1, 4).unwrap();
        let out = score_all(&set).unwrap();
        assert!((out[0] - (-0.5)).abs() < TOL);
    }

    #[test]
    fn test_partial_agreement_value() {
        let parts = [0, 0, 0, 1, 1, 1, /**/ 0, 0, 1, 1, 2, 2];
        let set = PartitionSet::new(&parts, 2, 1, 6).unwrap();
        let out = score_all(&set).unwrap();
        assert!((out[0] - 0.242).abs() < 1e-3, "got {}", out[0]);
    }

    #[test]
    fn test_three_features_two_variants_all_equal() {
        let one = [0, 0, 1, 1];
        let mut parts = Vec::new();
        for _ in 0..6 {
            parts.extend_from_slice(&one);
        }
        let set = PartitionSet::new(&parts, 3, 2, 4).unwrap();
        let out = score_all(&set).unwrap();
        assert_eq!(out.len(), 12);
        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_single_object_is_trivial_agreement() {
        let parts = [0, /**/ 0];
        let set = PartitionSet::new(&parts, 2, 1, 1).unwrap();
        assert_eq!(score_all(&set).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_negative_label_rejected() {
        let parts = [0, -1, 1, 1, /**/ 0, 0, 1, 1];
        let set = PartitionSet::new(&parts, 2, 1, 4).unwrap();
        assert!(score_all(&set).is_err());
        assert!(ari(&[0, -3], &[0, 1]).is_err());
    }

    #[test]
    fn test_contingency_marginals_sum_to_n() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let n = rng.gen_range(1..200);
            let k = rng.gen_range(1..8);
            let a: Vec<i32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let b: Vec<i32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let cont = contingency(&a, &b, k as usize);
            let total: i64 = cont.iter().sum();
            assert_eq!(total, n as i64);
            for row in 0..k as usize {
                let rsum: i64 = (0..k as usize).map(|c| cont[row * k as usize + c]).sum();
                assert!(rsum <= n as i64);
            }
            let [tn, fp, f_n, tp] = pair_confusion(&cont, k as usize, n as u64);
            assert!(tn >= 0 && fp >= 0 && f_n >= 0 && tp >= 0);
            assert_eq!(tn + fp + f_n + tp, (n as i64) * (n as i64));
        }
    }

    #[test]
    fn test_ari_symmetric_and_bounded() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..50 {
            let n = rng.gen_range(2..100);
            let k = rng.gen_range(1..6);
            let a: Vec<i32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let b: Vec<i32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let ab = ari(&a, &b).unwrap();
            let ba = ari(&b, &a).unwrap();
            assert!((ab - ba).abs() < TOL);
            assert!((-1.0..=1.0 + TOL).contains(&ab));
            assert!((ari(&a, &a).unwrap() - 1.0).abs() < TOL);
        }
    }

    #[test]
    fn test_ari_invariant_under_relabeling() {
        let mut rng = StdRng::seed_from_u64(37);
        for _ in 0..20 {
            let n = rng.gen_range(2..120);
            let k = 5i32;
            let a: Vec<i32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let b: Vec<i32> = (0..n).map(|_| rng.gen_range(0..k)).collect();
            let mut bijection: Vec<i32> = (0..k).collect();
            bijection.shuffle(&mut rng);
            let b_relabeled: Vec<i32> = b.iter().map(|&v| bijection[v as usize]).collect();
            let before = ari(&a, &b).unwrap();
            let after = ari(&a, &b_relabeled).unwrap();
            assert!((before - after).abs() < TOL);
        }
    }
}
