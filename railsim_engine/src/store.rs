//! `EngineStore`: typed struct-of-arrays accessors over one fab's vehicle,
//! sensor and path shared regions (spec.md §4.2).
//!
//! Grounded on the reference `evo_shared_memory::shm` typed-accessor pattern
//! (fixed stride, `get`/`set` per logical field) generalized from per-axis
//! records to per-vehicle records, and on `EdgeVehicleQueue` (spec.md §3) for
//! the edge-queue bookkeeping `addVehicle`/`removeVehicle`/`moveVehicleToEdge`
//! must keep consistent.

use railsim_common::consts::{MAX_PATH_LENGTH, VEHICLE_DATA_SIZE};
use railsim_common::error::EngineError;
use railsim_common::vehicle::{HitZone, MovingStatus, NextEdgeState, StopReason, TrafficState};
use railsim_memory::SharedRegion;

/// Field offsets within one vehicle's `VEHICLE_DATA_SIZE`-float record.
/// Contractual per spec.md §3 — never reorder.
mod field {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
    pub const ROTATION: usize = 3;
    pub const VELOCITY: usize = 4;
    pub const ACCELERATION: usize = 5;
    pub const DECELERATION: usize = 6;
    pub const EDGE_RATIO: usize = 7;
    pub const CURRENT_EDGE: usize = 8;
    pub const NEXT_EDGE: usize = 9;
    pub const NEXT_EDGE_STATE: usize = 10;
    pub const MOVING_STATUS: usize = 11;
    pub const PRESET_IDX: usize = 12;
    pub const HIT_ZONE: usize = 13;
    pub const COLLISION_TARGET: usize = 14;
    pub const TRAFFIC_STATE: usize = 15;
    pub const STOP_REASON: usize = 16;
    pub const JOB_STATE: usize = 17;
}

/// Initial field values for a newly added vehicle.
#[derive(Debug, Clone, Copy)]
pub struct VehicleInit {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub edge_index: u32,
    pub edge_ratio: f32,
    pub rotation: f32,
    pub velocity: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub moving_status: MovingStatus,
}

/// Reads `idx`'s current `edgeRatio` directly out of the vehicle region,
/// bypassing `EngineStore::edge_ratio` so callers can borrow the region and
/// `EngineStore::queues` disjointly while reordering a queue.
fn edge_ratio_in(region: &SharedRegion, idx: u32) -> f32 {
    region.as_f32_slice()[idx as usize * VEHICLE_DATA_SIZE + field::EDGE_RATIO]
}

/// Per-edge vehicle queue (spec.md §3): rear-to-front order, `queue[0]` is
/// the rear-most slot the source used historically; we keep the simpler
/// "index 0 = tail, last = lead" convention and expose `lead()`/`tail()`
/// rather than replicate the source's off-by-one indexing scheme. Queue
/// membership is kept ordered rear-to-front by each occupant's live
/// `edgeRatio` (see `insert_ordered`), not by insertion order — a vehicle
/// transitioning onto an edge with a farther-along occupant must not become
/// the new `lead()` just because it arrived second.
#[derive(Debug, Clone, Default)]
pub struct EdgeQueue {
    vehicles: Vec<u32>,
}

impl EdgeQueue {
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.vehicles.iter().copied()
    }

    /// The front-most (lead) vehicle, i.e. closest to the edge's `to_node`.
    pub fn lead(&self) -> Option<u32> {
        self.vehicles.last().copied()
    }

    /// The rear-most (tail) vehicle, i.e. closest to the edge's `from_node`.
    pub fn tail(&self) -> Option<u32> {
        self.vehicles.first().copied()
    }

    /// Windows of adjacent (tail_side, lead_side) pairs for following-collision checks.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.vehicles.windows(2).map(|w| (w[0], w[1]))
    }

    /// Inserts `veh_idx` at the position that keeps the queue ordered
    /// rear-to-front by edge ratio: before the first existing occupant
    /// whose ratio is already `>= ratio`, or at the (lead) end if none is
    /// farther along. `ratio_of` resolves another queued vehicle's current
    /// `edgeRatio` on this edge.
    fn insert_ordered(&mut self, veh_idx: u32, ratio: f32, ratio_of: impl Fn(u32) -> f32) {
        let pos = self
            .vehicles
            .iter()
            .position(|&v| ratio_of(v) >= ratio)
            .unwrap_or(self.vehicles.len());
        self.vehicles.insert(pos, veh_idx);
    }

    fn remove(&mut self, veh_idx: u32) {
        self.vehicles.retain(|&v| v != veh_idx);
    }
}

/// Typed view over one fab's vehicle/sensor/path shared byte regions.
pub struct EngineStore {
    vehicle_region: SharedRegion,
    path_region: SharedRegion,
    max_vehicles: u32,
    active: Vec<bool>,
    queues: Vec<EdgeQueue>,
}

impl EngineStore {
    /// `edge_count` sizes the per-edge queue table (1-based; index 0 unused).
    pub fn new(vehicle_region: SharedRegion, path_region: SharedRegion, max_vehicles: u32, edge_count: u32) -> Self {
        Self {
            vehicle_region,
            path_region,
            max_vehicles,
            active: vec![false; max_vehicles as usize],
            queues: vec![EdgeQueue::default(); edge_count as usize + 1],
        }
    }

    pub fn max_vehicles(&self) -> u32 {
        self.max_vehicles
    }

    pub fn is_active(&self, idx: u32) -> bool {
        self.active.get(idx as usize).copied().unwrap_or(false)
    }

    pub fn active_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, a)| **a)
            .map(|(i, _)| i as u32)
    }

    pub fn queue(&self, edge_idx: u32) -> Option<&EdgeQueue> {
        self.queues.get(edge_idx as usize)
    }

    fn check_vehicle_index(&self, idx: u32) -> Result<(), EngineError> {
        if idx >= self.max_vehicles {
            return Err(EngineError::CommandRejected {
                reason: format!("vehicle index {idx} outside [0, {})", self.max_vehicles),
            });
        }
        Ok(())
    }

    fn check_edge_index(&self, edge_idx: u32) -> Result<(), EngineError> {
        if edge_idx == 0 || edge_idx as usize >= self.queues.len() {
            return Err(EngineError::MissingEdge(edge_idx));
        }
        Ok(())
    }

    fn slot(&self, idx: u32, field: usize) -> usize {
        idx as usize * VEHICLE_DATA_SIZE + field
    }

    fn get(&self, idx: u32, field: usize) -> f32 {
        self.vehicle_region.as_f32_slice()[self.slot(idx, field)]
    }

    fn set(&mut self, idx: u32, field: usize, value: f32) {
        let slot = self.slot(idx, field);
        self.vehicle_region.as_f32_slice_mut()[slot] = value;
    }

    pub fn position(&self, idx: u32) -> (f32, f32, f32) {
        (self.get(idx, field::X), self.get(idx, field::Y), self.get(idx, field::Z))
    }

    pub fn set_position(&mut self, idx: u32, x: f32, y: f32, z: f32) {
        self.set(idx, field::X, x);
        self.set(idx, field::Y, y);
        self.set(idx, field::Z, z);
    }

    pub fn rotation(&self, idx: u32) -> f32 {
        self.get(idx, field::ROTATION)
    }

    pub fn set_rotation(&mut self, idx: u32, rotation: f32) {
        self.set(idx, field::ROTATION, rotation);
    }

    pub fn velocity(&self, idx: u32) -> f32 {
        self.get(idx, field::VELOCITY)
    }

    pub fn set_velocity(&mut self, idx: u32, v: f32) {
        self.set(idx, field::VELOCITY, v);
    }

    pub fn acceleration(&self, idx: u32) -> f32 {
        self.get(idx, field::ACCELERATION)
    }

    pub fn set_acceleration(&mut self, idx: u32, a: f32) {
        self.set(idx, field::ACCELERATION, a);
    }

    pub fn deceleration(&self, idx: u32) -> f32 {
        self.get(idx, field::DECELERATION)
    }

    pub fn set_deceleration(&mut self, idx: u32, d: f32) {
        self.set(idx, field::DECELERATION, d);
    }

    pub fn edge_ratio(&self, idx: u32) -> f32 {
        self.get(idx, field::EDGE_RATIO)
    }

    pub fn set_edge_ratio(&mut self, idx: u32, r: f32) {
        self.set(idx, field::EDGE_RATIO, r);
    }

    pub fn current_edge(&self, idx: u32) -> u32 {
        self.get(idx, field::CURRENT_EDGE) as u32
    }

    fn set_current_edge_raw(&mut self, idx: u32, edge: u32) {
        self.set(idx, field::CURRENT_EDGE, edge as f32);
    }

    pub fn next_edge(&self, idx: u32) -> u32 {
        self.get(idx, field::NEXT_EDGE) as u32
    }

    pub fn set_next_edge(&mut self, idx: u32, edge: u32) {
        self.set(idx, field::NEXT_EDGE, edge as f32);
    }

    pub fn next_edge_state(&self, idx: u32) -> NextEdgeState {
        match self.get(idx, field::NEXT_EDGE_STATE) as u32 {
            1 => NextEdgeState::Pending,
            2 => NextEdgeState::Ready,
            _ => NextEdgeState::Empty,
        }
    }

    pub fn set_next_edge_state(&mut self, idx: u32, state: NextEdgeState) {
        self.set(idx, field::NEXT_EDGE_STATE, state as u8 as f32);
    }

    pub fn moving_status(&self, idx: u32) -> MovingStatus {
        match self.get(idx, field::MOVING_STATUS) as u32 {
            1 => MovingStatus::Stopped,
            2 => MovingStatus::Paused,
            _ => MovingStatus::Moving,
        }
    }

    pub fn set_moving_status(&mut self, idx: u32, status: MovingStatus) {
        self.set(idx, field::MOVING_STATUS, status as u8 as f32);
    }

    pub fn preset_idx(&self, idx: u32) -> u32 {
        self.get(idx, field::PRESET_IDX) as u32
    }

    pub fn set_preset_idx(&mut self, idx: u32, preset: u32) {
        self.set(idx, field::PRESET_IDX, preset as f32);
    }

    pub fn hit_zone(&self, idx: u32) -> Option<HitZone> {
        HitZone::from_buffer_value(self.get(idx, field::HIT_ZONE))
    }

    pub fn set_hit_zone(&mut self, idx: u32, zone: Option<HitZone>) {
        self.set(idx, field::HIT_ZONE, HitZone::to_buffer_value(zone));
    }

    pub fn collision_target(&self, idx: u32) -> Option<u32> {
        let v = self.get(idx, field::COLLISION_TARGET);
        if v < 0.0 { None } else { Some(v as u32) }
    }

    pub fn set_collision_target(&mut self, idx: u32, target: Option<u32>) {
        self.set(idx, field::COLLISION_TARGET, target.map(|t| t as f32).unwrap_or(-1.0));
    }

    pub fn traffic_state(&self, idx: u32) -> TrafficState {
        match self.get(idx, field::TRAFFIC_STATE) as u32 {
            1 => TrafficState::Waiting,
            2 => TrafficState::Acquired,
            _ => TrafficState::Free,
        }
    }

    pub fn set_traffic_state(&mut self, idx: u32, state: TrafficState) {
        self.set(idx, field::TRAFFIC_STATE, state as u8 as f32);
    }

    pub fn stop_reason(&self, idx: u32) -> StopReason {
        StopReason::from_bits_truncate(self.get(idx, field::STOP_REASON) as u8)
    }

    pub fn set_stop_reason(&mut self, idx: u32, reason: StopReason) {
        self.set(idx, field::STOP_REASON, reason.bits() as f32);
    }

    pub fn job_state(&self, idx: u32) -> u32 {
        self.get(idx, field::JOB_STATE) as u32
    }

    pub fn set_job_state(&mut self, idx: u32, state: u32) {
        self.set(idx, field::JOB_STATE, state as f32);
    }

    // ─── Path buffer ────────────────────────────────────────────────

    fn path_slot(&self, idx: u32, slot: usize) -> usize {
        idx as usize * (MAX_PATH_LENGTH + 1) + slot
    }

    /// Upcoming edge indices for `idx`, oldest-first.
    pub fn path(&self, idx: u32) -> Vec<u32> {
        let data = self.path_region.as_f32_slice();
        let len = data[self.path_slot(idx, 0)] as usize;
        let len = len.min(MAX_PATH_LENGTH);
        (0..len).map(|i| data[self.path_slot(idx, i + 1)] as u32).collect()
    }

    pub fn set_path(&mut self, idx: u32, path: &[u32]) {
        let len = path.len().min(MAX_PATH_LENGTH);
        let len_slot = self.path_slot(idx, 0);
        self.path_region.as_f32_slice_mut()[len_slot] = len as f32;
        for (i, &edge) in path.iter().take(len).enumerate() {
            let slot = self.path_slot(idx, i + 1);
            self.path_region.as_f32_slice_mut()[slot] = edge as f32;
        }
    }

    /// Pop the next edge index off the front of `idx`'s path buffer.
    pub fn pop_path_front(&mut self, idx: u32) -> Option<u32> {
        let mut path = self.path(idx);
        if path.is_empty() {
            return None;
        }
        let next = path.remove(0);
        self.set_path(idx, &path);
        Some(next)
    }

    // ─── Vehicle lifecycle ──────────────────────────────────────────

    /// Atomically inserts a vehicle at `idx` into the target edge queue.
    pub fn add_vehicle(&mut self, idx: u32, init: VehicleInit) -> Result<(), EngineError> {
        self.check_vehicle_index(idx)?;
        self.check_edge_index(init.edge_index)?;
        self.set_position(idx, init.x, init.y, init.z);
        self.set_rotation(idx, init.rotation);
        self.set_velocity(idx, init.velocity);
        self.set_acceleration(idx, init.acceleration);
        self.set_deceleration(idx, init.deceleration);
        self.set_edge_ratio(idx, init.edge_ratio);
        self.set_current_edge_raw(idx, init.edge_index);
        self.set_next_edge(idx, 0);
        self.set_next_edge_state(idx, NextEdgeState::Empty);
        self.set_moving_status(idx, init.moving_status);
        self.set_preset_idx(idx, 0);
        self.set_hit_zone(idx, None);
        self.set_collision_target(idx, None);
        self.set_traffic_state(idx, TrafficState::Free);
        self.set_stop_reason(idx, StopReason::empty());
        self.set_job_state(idx, 0);
        self.active[idx as usize] = true;
        let region = &self.vehicle_region;
        self.queues[init.edge_index as usize]
            .insert_ordered(idx, init.edge_ratio, |v| edge_ratio_in(region, v));
        Ok(())
    }

    pub fn remove_vehicle(&mut self, idx: u32) -> Result<(), EngineError> {
        self.check_vehicle_index(idx)?;
        if !self.is_active(idx) {
            return Ok(());
        }
        let edge = self.current_edge(idx);
        if edge != 0 {
            if let Some(q) = self.queues.get_mut(edge as usize) {
                q.remove(idx);
            }
        }
        self.active[idx as usize] = false;
        Ok(())
    }

    /// Removes `idx` from its current edge's queue, inserts it into
    /// `new_edge`'s queue at the position that preserves rear-to-front
    /// ratio order, and writes `currentEdge`/`edgeRatio`.
    pub fn move_vehicle_to_edge(&mut self, idx: u32, new_edge: u32, ratio: f32) -> Result<(), EngineError> {
        self.check_vehicle_index(idx)?;
        self.check_edge_index(new_edge)?;
        let old_edge = self.current_edge(idx);
        if old_edge != 0 {
            if let Some(q) = self.queues.get_mut(old_edge as usize) {
                q.remove(idx);
            }
        }
        let region = &self.vehicle_region;
        self.queues[new_edge as usize].insert_ordered(idx, ratio, |v| edge_ratio_in(region, v));
        self.set_current_edge_raw(idx, new_edge);
        self.set_edge_ratio(idx, ratio);
        Ok(())
    }
}
