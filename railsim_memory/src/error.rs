//! Error types for in-process shared-buffer operations.

use thiserror::Error;

/// Errors that can occur while allocating or accessing a shared region.
#[derive(Error, Debug)]
pub enum MemError {
    /// Requested region size falls outside `[SHM_MIN_SIZE, SHM_MAX_SIZE]` or
    /// is not a multiple of the page size.
    #[error("invalid region size: {size} bytes (must be {min}-{max}, page-aligned)")]
    InvalidSize {
        size: usize,
        min: usize,
        max: usize,
    },

    /// Version conflict detected during a consistency-checked read: the
    /// writer was mid-update across every retry attempt.
    #[error("version conflict detected after {attempts} attempts")]
    VersionConflict { attempts: u32 },

    /// A region offset/address failed to meet the required alignment.
    #[error("memory alignment error: address {address:#x} not aligned to {alignment}")]
    AlignmentError { address: usize, alignment: usize },

    /// Index outside the capacity the region was sized for.
    #[error("index {index} out of bounds (capacity {capacity})")]
    IndexOutOfBounds { index: usize, capacity: usize },

    /// Underlying mmap allocation failed.
    #[error("mmap error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type for shared-buffer operations.
pub type MemResult<T> = Result<T, MemError>;
