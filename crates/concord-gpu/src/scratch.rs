//! Per-block scratch sizing policy.
//!
//! Mirrors the shared-memory record carved out by `kernels/ari_pairs.cu`,
//! field for field and in the same order, so the driver can validate the
//! footprint against the device limit before any launch.

/// Threads per block. The bounds-reduction kernel assumes a power of two.
pub const BLOCK_THREADS: u32 = 256;

/// Staged objects per thread per tile in the tiled variant.
pub const ITEMS_PER_THREAD: usize = 4;

/// Objects staged per label vector per tile (two vectors are staged, so a
/// tile holds 2 × TILE_OBJECTS cells).
pub const TILE_OBJECTS: usize = BLOCK_THREADS as usize * ITEMS_PER_THREAD;

/// Which contingency builder the driver launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// Accumulate straight from global memory. Chosen when N fits one tile.
    Direct,
    /// Stream the label vectors through shared-memory staging tiles.
    /// Mandatory when N exceeds [`TILE_OBJECTS`].
    Tiled,
}

impl KernelVariant {
    /// The variant the driver must use for `n_objects`.
    pub fn for_objects(n_objects: usize) -> Self {
        if n_objects > TILE_OBJECTS {
            KernelVariant::Tiled
        } else {
            KernelVariant::Direct
        }
    }
}

/// Byte layout of one block's shared-memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchLayout {
    /// K·K contingency cells (i32)
    pub contingency_bytes: usize,
    /// row[K] + col[K] marginals (i32)
    pub marginal_bytes: usize,
    /// alignment pad before the 64-bit confusion record
    pub pad_bytes: usize,
    /// pair-confusion [TN, FP, FN, TP] (i64)
    pub confusion_bytes: usize,
    /// two staging tiles (i32), zero for the direct variant
    pub staging_bytes: usize,
}

impl ScratchLayout {
    /// Layout for alphabet bound `k` under the given variant.
    pub fn for_alphabet(k: usize, variant: KernelVariant) -> Self {
        let ints = k * k + 2 * k;
        let pad_bytes = if ints % 2 == 1 { 4 } else { 0 };
        let staging_bytes = match variant {
            KernelVariant::Direct => 0,
            KernelVariant::Tiled => 2 * TILE_OBJECTS * std::mem::size_of::<i32>(),
        };
        Self {
            contingency_bytes: k * k * std::mem::size_of::<i32>(),
            marginal_bytes: 2 * k * std::mem::size_of::<i32>(),
            pad_bytes,
            confusion_bytes: 4 * std::mem::size_of::<i64>(),
            staging_bytes,
        }
    }

    /// Total dynamic shared memory requested per block.
    pub fn total_bytes(&self) -> usize {
        self.contingency_bytes
            + self.marginal_bytes
            + self.pad_bytes
            + self.confusion_bytes
            + self.staging_bytes
    }

    /// Whether the record fits the device's per-block limit.
    pub fn fits(&self, device_limit_bytes: usize) -> bool {
        self.total_bytes() <= device_limit_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_selection() {
        assert_eq!(KernelVariant::for_objects(1), KernelVariant::Direct);
        assert_eq!(KernelVariant::for_objects(TILE_OBJECTS), KernelVariant::Direct);
        assert_eq!(KernelVariant::for_objects(TILE_OBJECTS + 1), KernelVariant::Tiled);
    }

    #[test]
    fn test_layout_k1_direct() {
        // 1 contingency cell + 2 marginals = 3 ints, padded to 8 bytes
        let layout = ScratchLayout::for_alphabet(1, KernelVariant::Direct);
        assert_eq!(layout.contingency_bytes, 4);
        assert_eq!(layout.marginal_bytes, 8);
        assert_eq!(layout.pad_bytes, 4);
        assert_eq!(layout.confusion_bytes, 32);
        assert_eq!(layout.staging_bytes, 0);
        assert_eq!(layout.total_bytes(), 48);
    }

    #[test]
    fn test_alignment_pad_follows_parity() {
        // k even: k*k + 2k is even, no pad. k odd: odd cell count, pad.
        for k in 1..64 {
            let layout = ScratchLayout::for_alphabet(k, KernelVariant::Direct);
            let ints = k * k + 2 * k;
            assert_eq!(layout.pad_bytes, if ints % 2 == 1 { 4 } else { 0 }, "k={}", k);
            assert_eq!(layout.total_bytes() % 8, 0, "k={}", k);
        }
    }

    #[test]
    fn test_tiled_adds_staging() {
        let direct = ScratchLayout::for_alphabet(10, KernelVariant::Direct);
        let tiled = ScratchLayout::for_alphabet(10, KernelVariant::Tiled);
        assert_eq!(tiled.total_bytes() - direct.total_bytes(), 2 * TILE_OBJECTS * 4);
    }

    #[test]
    fn test_fits_against_common_limit() {
        // 48KB static per-block limit: K=64 tiled fits, K=104 does not
        let limit = 48 * 1024;
        assert!(ScratchLayout::for_alphabet(64, KernelVariant::Tiled).fits(limit));
        assert!(!ScratchLayout::for_alphabet(104, KernelVariant::Tiled).fits(limit));
    }
}
