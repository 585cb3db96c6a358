//! Pair-index arithmetic for the work grid.
//!
//! One linear work-group id addresses one (feature-i, feature-j,
//! variant-m, variant-n) pairing. The feature level enumerates the upper
//! triangle (i < j) row-major; the variant level is a dense P×P block.
//! The same arithmetic runs on the device (see `kernels/ari_pairs.cu`);
//! this module is the host twin used for result addressing and testing.

/// Number of unordered feature pairs for `n` features: n·(n−1)/2.
pub fn num_feature_pairs(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

/// Splits a flat row-major index over a matrix with `cols` columns.
pub fn unravel2(flat: u64, cols: u64) -> (u64, u64) {
    (flat / cols, flat % cols)
}

/// Condensed index of the first pair in row `x`, i.e. of (x, x+1).
fn pair_row_start(n: usize, x: usize) -> u64 {
    let (n, x) = (n as u64, x as u64);
    x * (2 * n - x - 1) / 2
}

/// Condensed index of the pair (i, j), 0 ≤ i < j < n.
pub fn pair_to_condensed(n: usize, i: usize, j: usize) -> u64 {
    debug_assert!(i < j && j < n);
    pair_row_start(n, i) + (j - i - 1) as u64
}

/// Inverse of [`pair_to_condensed`]: recovers (i, j) with i < j from a
/// condensed upper-triangle index.
///
/// Uses the closed form x = ⌊(−b − √(b² − 8·idx))/2⌋ with b = 1 − 2n in
/// single precision, then steps x until its row brackets `idx`. The f32
/// square root loses exactness for large n; the correction restores it
/// (property-tested below and mirrored in the device code).
pub fn condensed_to_pair(n: usize, idx: u64) -> (usize, usize) {
    debug_assert!(n >= 2 && idx < num_feature_pairs(n));
    let b = 1.0f32 - 2.0 * n as f32;
    let disc = b * b - 8.0 * idx as f32;
    let mut x = ((-b - disc.sqrt()) / 2.0).floor() as i64;
    x = x.clamp(0, n as i64 - 2);
    let mut x = x as usize;
    while x > 0 && idx < pair_row_start(n, x) {
        x -= 1;
    }
    while x < n - 2 && idx >= pair_row_start(n, x + 1) {
        x += 1;
    }
    let j = x + 1 + (idx - pair_row_start(n, x)) as usize;
    (x, j)
}

/// Decomposes a linear work-group id into (feature-i, feature-j,
/// variant-m, variant-n) for a grid over `n_features` and `n_partitions`.
pub fn block_to_pair(
    block: u64,
    n_features: usize,
    n_partitions: usize,
) -> (usize, usize, usize, usize) {
    let p2 = (n_partitions * n_partitions) as u64;
    let (fpair, variant) = unravel2(block, p2);
    let (i, j) = condensed_to_pair(n_features, fpair);
    let (m, n) = unravel2(variant, n_partitions as u64);
    (i, j, m as usize, n as usize)
}

/// Inverse of [`block_to_pair`].
pub fn pair_to_block(
    (i, j, m, n): (usize, usize, usize, usize),
    n_features: usize,
    n_partitions: usize,
) -> u64 {
    let p = n_partitions as u64;
    pair_to_condensed(n_features, i, j) * p * p + m as u64 * p + n as u64
}
