//! Anonymous-mmap-backed shared region.
//!
//! Grounded on the reference `evo_shared_memory::segment` header/layout
//! primitives, stripped of the named-segment-with-pid discovery model: a
//! `SharedRegion` here is an anonymous mapping owned in-process by the
//! worker thread that allocated it, handed to `railsim_engine`/`railsim`
//! callers as plain slices. The optional versioned header survives only for
//! the render buffer, where a reader thread may run concurrently with the
//! writer (§5).

use crate::consts::{CACHE_LINE_SIZE, REGION_MAGIC, SHM_MAX_SIZE, SHM_MIN_SIZE};
use crate::error::{MemError, MemResult};
use crate::version::VersionCounter;
use memmap2::MmapMut;
use std::sync::atomic::AtomicU64;

/// Fixed-size header prefixed to a versioned region's mapping.
#[repr(C, align(64))]
pub struct RegionHeader {
    magic: u64,
    version: AtomicU64,
    data_size: u64,
    _padding: [u8; 40],
}

static_assertions::const_assert_eq!(std::mem::size_of::<RegionHeader>(), CACHE_LINE_SIZE);

impl RegionHeader {
    fn new(data_size: usize) -> Self {
        Self {
            magic: REGION_MAGIC,
            version: AtomicU64::new(0),
            data_size: data_size as u64,
            _padding: [0u8; 40],
        }
    }

    fn validate(&self) -> MemResult<()> {
        if self.magic != REGION_MAGIC {
            return Err(MemError::AlignmentError {
                address: self as *const _ as usize,
                alignment: CACHE_LINE_SIZE,
            });
        }
        Ok(())
    }

    fn version_counter(&self) -> &VersionCounter {
        // SAFETY: `VersionCounter` is `repr(transparent)` over `AtomicU64`.
        unsafe { &*(&self.version as *const AtomicU64 as *const VersionCounter) }
    }
}

fn validate_region_size(size: usize) -> MemResult<()> {
    if size < SHM_MIN_SIZE || size > SHM_MAX_SIZE || size % SHM_MIN_SIZE != 0 {
        return Err(MemError::InvalidSize {
            size,
            min: SHM_MIN_SIZE,
            max: SHM_MAX_SIZE,
        });
    }
    Ok(())
}

/// An anonymous mapping large enough for a `RegionHeader` plus `data_size`
/// bytes of payload, cache-line aligned at the data boundary.
pub struct SharedRegion {
    data_size: usize,
    total_size: usize,
    mmap: MmapMut,
}

impl SharedRegion {
    /// Allocate a new anonymous region sized to hold `data_size` bytes of
    /// payload plus the header, rounded up to the next page.
    pub fn new(data_size: usize) -> MemResult<Self> {
        let header_size = std::mem::size_of::<RegionHeader>();
        let raw_total = header_size + data_size;
        let total_size = raw_total.div_ceil(SHM_MIN_SIZE) * SHM_MIN_SIZE;
        validate_region_size(total_size)?;

        let mut mmap = MmapMut::map_anon(total_size)?;
        let header = RegionHeader::new(data_size);
        // SAFETY: `mmap` is at least `header_size` bytes, freshly allocated
        // and zeroed, so writing the header in place is sound.
        unsafe {
            std::ptr::write(mmap.as_mut_ptr() as *mut RegionHeader, header);
        }

        let region = Self {
            data_size,
            total_size,
            mmap,
        };
        region.header().validate()?;
        Ok(region)
    }

    fn header(&self) -> &RegionHeader {
        // SAFETY: constructed in `new` with the header at offset 0.
        unsafe { &*(self.mmap.as_ptr() as *const RegionHeader) }
    }

    /// The region's version counter.
    pub fn version(&self) -> &VersionCounter {
        self.header().version_counter()
    }

    /// Payload byte length (excludes the header).
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Total mapped size including the header, rounded up to a page.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    fn header_size() -> usize {
        std::mem::size_of::<RegionHeader>()
    }

    /// Immutable view over the payload.
    pub fn data(&self) -> &[u8] {
        let offset = Self::header_size();
        &self.mmap[offset..offset + self.data_size]
    }

    /// Mutable view over the payload.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let offset = Self::header_size();
        &mut self.mmap[offset..offset + self.data_size]
    }

    /// Reinterpret the payload as a slice of `f32`. Callers size regions in
    /// float counts so `data_size` is always a multiple of 4 in practice.
    pub fn as_f32_slice(&self) -> &[f32] {
        let bytes = self.data();
        debug_assert_eq!(bytes.len() % std::mem::size_of::<f32>(), 0);
        unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, bytes.len() / 4) }
    }

    /// Mutable float view, see [`Self::as_f32_slice`].
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        let bytes = self.data_mut();
        debug_assert_eq!(bytes.len() % std::mem::size_of::<f32>(), 0);
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, bytes.len() / 4) }
    }
}

/// Cache-line alignment helpers reused by [`crate::layout`] for manual
/// struct-layout packing.
pub mod cache {
    use super::CACHE_LINE_SIZE;

    /// Round `offset` up to the next cache-line boundary.
    pub fn align_to_cache_line(offset: usize) -> usize {
        (offset + CACHE_LINE_SIZE - 1) & !(CACHE_LINE_SIZE - 1)
    }

    /// Round a size up to a whole number of cache lines.
    pub fn cache_aligned_size(size: usize) -> usize {
        align_to_cache_line(size)
    }

    pub fn is_cache_aligned(offset: usize) -> bool {
        offset % CACHE_LINE_SIZE == 0
    }

    /// Accumulates field sizes into cache-line-aligned offsets, used to pack
    /// the per-fab region layout deterministically (§4.1).
    #[derive(Debug, Default)]
    pub struct LayoutOptimizer {
        offset: usize,
    }

    impl LayoutOptimizer {
        pub fn new() -> Self {
            Self { offset: 0 }
        }

        /// Reserve `size` bytes at the current offset, aligned to `align`,
        /// and return the offset assigned to this field.
        pub fn add_field(&mut self, size: usize, align: usize) -> usize {
            let aligned = (self.offset + align - 1) & !(align - 1);
            self.offset = aligned + size;
            aligned
        }

        /// Total size consumed so far, rounded up to a cache line.
        pub fn finalize(&self) -> usize {
            cache_aligned_size(self.offset)
        }
    }
}
