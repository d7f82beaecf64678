//! The continuous render buffer (§4.1, §5).
//!
//! Grounded on the reference `evo_shared_memory::writer`/`reader` version
//! protocol, collapsed into a single in-process type: per §5 the renderer
//! reads are unsynchronized by default (one-frame-stale data is accepted),
//! so there is exactly one owner — the worker that writes it each tick —
//! and readers borrow it directly rather than attaching to a named segment.
//! [`RenderBuffer::read_consistent`] retains the even/odd version retry
//! protocol for callers that do want a torn-read guarantee (diagnostics,
//! tests), at the cost of a bounded number of retries.

use crate::error::{MemError, MemResult};
use crate::segment::SharedRegion;
use crate::version::VersionCounter;
use std::sync::atomic::Ordering;

const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Owns the shared float array the renderer polls every frame.
pub struct RenderBuffer {
    region: SharedRegion,
}

impl RenderBuffer {
    /// Allocate a render buffer with room for `float_count` `f32` slots.
    pub fn new(float_count: usize) -> MemResult<Self> {
        let region = SharedRegion::new(float_count * std::mem::size_of::<f32>())?;
        Ok(Self { region })
    }

    /// Number of `f32` slots in the buffer.
    pub fn len(&self) -> usize {
        self.region.data_size() / std::mem::size_of::<f32>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unsynchronized read of the whole buffer — the default per §5.
    pub fn read_unsynchronized(&self) -> &[f32] {
        self.region.as_f32_slice()
    }

    /// Write `values` into `[offset, offset + values.len())`, bracketed by
    /// the version-counter protocol so a concurrent [`Self::read_consistent`]
    /// can detect a torn read.
    pub fn write_versioned(&mut self, offset: usize, values: &[f32]) -> MemResult<()> {
        let len = self.len();
        if offset + values.len() > len {
            return Err(MemError::IndexOutOfBounds {
                index: offset + values.len(),
                capacity: len,
            });
        }
        let version = self.region.version();
        version.begin_write();
        std::sync::atomic::fence(Ordering::Release);
        self.region.as_f32_slice_mut()[offset..offset + values.len()].copy_from_slice(values);
        std::sync::atomic::fence(Ordering::Release);
        version.end_write();
        Ok(())
    }

    /// Read the whole buffer, retrying up to [`MAX_RETRY_ATTEMPTS`] times if
    /// a write is caught in progress. Returns `VersionConflict` if the
    /// writer never settled within the retry budget.
    pub fn read_consistent(&self) -> MemResult<Vec<f32>> {
        let version = self.region.version();
        for _ in 0..MAX_RETRY_ATTEMPTS {
            let before = version.load();
            if !VersionCounter::is_stable(before) {
                continue;
            }
            std::sync::atomic::fence(Ordering::Acquire);
            let snapshot = self.region.as_f32_slice().to_vec();
            std::sync::atomic::fence(Ordering::Acquire);
            let after = version.load();
            if before == after {
                return Ok(snapshot);
            }
        }
        Err(MemError::VersionConflict {
            attempts: MAX_RETRY_ATTEMPTS,
        })
    }
}
