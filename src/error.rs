//! Crate-wide error taxonomy.
//!
//! Mirrors the reference engine's `CoreError`/`BlockError` shape (a flat
//! `thiserror` enum per concern) rather than one error type per module,
//! since the voxel core is small enough that callers want a single
//! `Result<T, EngineError>` to match on.

use thiserror::Error;

use crate::coord::ChunkCoord;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown generator variant")]
    UnknownGenerator,

    #[error("allocation failed for chunk {chunk:?}")]
    AllocationFailed { chunk: ChunkCoord },

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("GPU dispatch was cancelled")]
    GpuDispatchCancelled,
}

pub type Result<T> = std::result::Result<T, EngineError>;
