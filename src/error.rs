//! Crate-wide error types.
//!
//! Per-voxel arithmetic never produces an error: non-finite or out-of-range
//! values are masked at read/write time by the safe-get/safe-clamp contract
//! in [`crate::volume`]. Only orchestration failures — bad configuration,
//! GPU device loss, frame-cache I/O — surface as a typed [`SolverError`].

use crate::backend::GpuError;
use crate::schema::ConfigError;

/// Top-level error type returned by fallible orchestration calls.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("frame cache error: {0}")]
    FrameCache(#[from] FrameCacheError),
}

/// Errors from the on-disk frame-cache writer/reader.
#[derive(Debug, thiserror::Error)]
pub enum FrameCacheError {
    #[error("I/O error writing cache: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize frame metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache interval must be >= 1, got {0}")]
    InvalidInterval(u32),
}
