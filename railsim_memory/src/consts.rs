//! Constants specific to shared-region layout, not general simulator
//! constants (those live in `railsim_common::consts`).

/// Magic value stamped into a region header, validated on attach.
pub const REGION_MAGIC: u64 = 0x5241_494C_5349_4D00; // "RAILSIM\0"

/// Minimum region size (one page).
pub const SHM_MIN_SIZE: usize = 4096;

/// Maximum region size (1 GiB) — generous upper bound against a
/// misconfigured fab count producing a runaway allocation.
pub const SHM_MAX_SIZE: usize = 1024 * 1024 * 1024;

/// Cache line size used for region/header alignment (bytes).
pub const CACHE_LINE_SIZE: usize = 64;
