//! # concord-gpu
//!
//! CUDA engine for batch Adjusted Rand Index scoring across partition
//! pairs. One work group per output score; contingency and pair-confusion
//! reductions run cooperatively in shared memory. Kernel source lives in
//! `src/kernels/ari_pairs.cu` and is compiled through NVRTC at engine
//! construction.

pub mod ari_batch;
pub mod scratch;

pub use ari_batch::{compute_ari, AriBatchConfig, AriBatchGpu};
pub use scratch::{KernelVariant, ScratchLayout, BLOCK_THREADS, ITEMS_PER_THREAD, TILE_OBJECTS};

pub use concord_core::{AriScores, ConcordError, FeaturePairMax, PartitionSet, Result};
