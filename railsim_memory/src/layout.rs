//! `MemoryLayoutManager` (spec.md §4.1).
//!
//! Deterministically carves the shared vehicle/sensor/path/checkpoint byte
//! arrays into per-fab regions and assigns fabs to workers, then (once
//! actual vehicle counts are known) computes the continuous render layout.
//! Grounded on `evo_shared_memory::segment::cache::LayoutOptimizer` for the
//! offset-accumulation pattern, generalized from single-struct field
//! packing to a list of per-fab regions.

use railsim_common::consts::{CACHE_LINE_SIZE, MAX_PATH_LENGTH, SENSOR_DATA_SIZE, VEHICLE_DATA_SIZE};

/// A single fab's allocation within one shared byte array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabRegion {
    pub offset: usize,
    pub size: usize,
    pub max_vehicles: u32,
}

/// All regions allocated to one fab.
#[derive(Debug, Clone)]
pub struct FabAllocation {
    pub fab_id: String,
    pub vehicle_region: FabRegion,
    pub sensor_region: FabRegion,
    pub path_region: FabRegion,
    pub checkpoint_region: Option<FabRegion>,
}

/// A fab-to-worker assignment, with fab ids re-indexed consecutively within
/// their worker.
#[derive(Debug, Clone)]
pub struct WorkerAssignment {
    pub worker_index: u32,
    pub fab_ids: Vec<String>,
}

/// One input row: a fab id plus its maximum vehicle capacity.
#[derive(Debug, Clone)]
pub struct FabSpec {
    pub fab_id: String,
    pub max_vehicles: u32,
}

/// Per-fab slice within the continuous render layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSlice {
    pub vehicle_start_index: u32,
    pub vehicle_count: u32,
}

/// The seven contiguous sections of the render layout (§4.1), each
/// `totalVehicles * 4` floats wide. Fields hold each section's *base float
/// offset* within the combined sensor render buffer, in the specified
/// order `[zone0_startEnd, zone0_other, zone1_startEnd, zone1_other,
/// zone2_startEnd, zone2_other, body_other]` — `zone0_start_end` is always
/// `0`, each subsequent field is the previous one plus one section width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSections {
    pub zone0_start_end: usize,
    pub zone0_other: usize,
    pub zone1_start_end: usize,
    pub zone1_other: usize,
    pub zone2_start_end: usize,
    pub zone2_other: usize,
    pub body_other: usize,
}

impl RenderSections {
    /// Every section's base offset, in layout order — the order
    /// `write_sensor_region`/renderers walk.
    pub fn all(&self) -> [usize; 7] {
        [
            self.zone0_start_end,
            self.zone0_other,
            self.zone1_start_end,
            self.zone1_other,
            self.zone2_start_end,
            self.zone2_other,
            self.body_other,
        ]
    }

    /// Total float count of the combined sensor render buffer (7 sections).
    pub fn total_floats(&self, total_vehicles: u32) -> usize {
        self.body_other + total_vehicles as usize * 4
    }
}

/// Result of [`MemoryLayoutManager::compute_render_layout`].
#[derive(Debug, Clone)]
pub struct RenderLayout {
    pub total_vehicles: u32,
    pub sections: RenderSections,
    pub fab_slices: Vec<(String, RenderSlice)>,
}

/// Carves per-fab regions and worker assignments from an ordered fab list,
/// with checkpoint regions enabled whenever a fab requests them (some fabs
/// run TransferMode::Loop without ever needing a checkpoint buffer).
pub struct MemoryLayoutManager {
    allocations: Vec<FabAllocation>,
    worker_assignments: Vec<WorkerAssignment>,
}

impl MemoryLayoutManager {
    /// Carve vehicle/sensor/path (and optional checkpoint) regions for each
    /// fab in `fabs`, in input order, and distribute fabs across
    /// `worker_count` workers as `ceil(fabs/workers)` per worker.
    pub fn new(fabs: &[FabSpec], worker_count: u32, with_checkpoint: bool) -> Self {
        let mut vehicle_offset = 0usize;
        let mut sensor_offset = 0usize;
        let mut path_offset = 0usize;
        let mut checkpoint_offset = 0usize;

        let allocations = fabs
            .iter()
            .map(|fab| {
                let max = fab.max_vehicles as usize;

                let vehicle_size = cache_aligned(max * VEHICLE_DATA_SIZE * 4);
                let vehicle_region = FabRegion {
                    offset: vehicle_offset,
                    size: vehicle_size,
                    max_vehicles: fab.max_vehicles,
                };
                vehicle_offset += vehicle_size;

                let sensor_size = cache_aligned(max * SENSOR_DATA_SIZE * 4);
                let sensor_region = FabRegion {
                    offset: sensor_offset,
                    size: sensor_size,
                    max_vehicles: fab.max_vehicles,
                };
                sensor_offset += sensor_size;

                let path_size = cache_aligned(max * MAX_PATH_LENGTH * 4);
                let path_region = FabRegion {
                    offset: path_offset,
                    size: path_size,
                    max_vehicles: fab.max_vehicles,
                };
                path_offset += path_size;

                let checkpoint_region = with_checkpoint.then(|| {
                    let size = cache_aligned(max * 4);
                    let region = FabRegion {
                        offset: checkpoint_offset,
                        size,
                        max_vehicles: fab.max_vehicles,
                    };
                    checkpoint_offset += size;
                    region
                });

                FabAllocation {
                    fab_id: fab.fab_id.clone(),
                    vehicle_region,
                    sensor_region,
                    path_region,
                    checkpoint_region,
                }
            })
            .collect::<Vec<_>>();

        let worker_count = worker_count.max(1);
        let fabs_per_worker = (fabs.len() as u32).div_ceil(worker_count).max(1);
        let mut worker_assignments = Vec::new();
        for (idx, chunk) in fabs.chunks(fabs_per_worker as usize).enumerate() {
            worker_assignments.push(WorkerAssignment {
                worker_index: idx as u32,
                fab_ids: chunk.iter().map(|f| f.fab_id.clone()).collect(),
            });
        }

        Self {
            allocations,
            worker_assignments,
        }
    }

    pub fn allocations(&self) -> &[FabAllocation] {
        &self.allocations
    }

    pub fn worker_assignments(&self) -> &[WorkerAssignment] {
        &self.worker_assignments
    }

    pub fn allocation_for(&self, fab_id: &str) -> Option<&FabAllocation> {
        self.allocations.iter().find(|a| a.fab_id == fab_id)
    }

    /// Compute the continuous render layout once actual per-fab vehicle
    /// counts are known. Independent of the worker/region layout above —
    /// fab order here is whatever order `actual_counts` was given in.
    pub fn compute_render_layout(actual_counts: &[(String, u32)]) -> RenderLayout {
        let mut fab_slices = Vec::with_capacity(actual_counts.len());
        let mut cursor = 0u32;
        for (fab_id, count) in actual_counts {
            fab_slices.push((
                fab_id.clone(),
                RenderSlice {
                    vehicle_start_index: cursor,
                    vehicle_count: *count,
                },
            ));
            cursor += count;
        }
        let total_vehicles = cursor;
        let section_width = total_vehicles as usize * 4;
        RenderLayout {
            total_vehicles,
            sections: RenderSections {
                zone0_start_end: 0,
                zone0_other: section_width,
                zone1_start_end: section_width * 2,
                zone1_other: section_width * 3,
                zone2_start_end: section_width * 4,
                zone2_other: section_width * 5,
                body_other: section_width * 6,
            },
            fab_slices,
        }
    }
}

fn cache_aligned(size: usize) -> usize {
    (size + CACHE_LINE_SIZE - 1) & !(CACHE_LINE_SIZE - 1)
}
