//! `FabContext` (spec.md §4.9): owns one fab's whole simulation state and
//! drives its per-tick pipeline in the strict order spec.md §5 requires —
//! collision, lock update, movement (transfer queue, integration, edge
//! transition, merge-lock, pose/sensor update), auto-routing, render-region
//! emission.

use std::collections::HashMap;

use railsim_common::config::FabConfig;
use railsim_common::consts::{SENSOR_DATA_SIZE, VEHICLE_DATA_SIZE};
use railsim_common::error::EngineError;
use railsim_common::graph::{Edge, Node};
use railsim_common::sensor::SensorPreset;
use railsim_memory::render::RenderBuffer;
use railsim_memory::layout::{RenderSections, RenderSlice};
use railsim_memory::segment::SharedRegion;

use crate::auto::{AutoMgr, Station};
use crate::collision;
use crate::config::FabMapConfig;
use crate::dispatch::DispatchMgr;
use crate::lock::LockMgr;
use crate::movement;
use crate::sensor::SensorStore;
use crate::state::{ControlSignal, FabState};
use crate::store::EngineStore;
use crate::transfer::{self, TransferMgr};
use crate::transition::UnusualMoveEvent;

/// Which endpoint of an edge to resolve a name for in [`FabContext::edge_ref`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeNodeSide {
    From,
    To,
}

/// Everything one fab needs to run independently: its graph, shared
/// regions, and the per-fab managers (lock table, transfer queue, loop map,
/// station router). Fab-local state never crosses workers (§5).
pub struct FabContext {
    pub fab_id: String,
    state: FabState,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_index: HashMap<String, u32>,
    edge_index: HashMap<String, u32>,
    store: EngineStore,
    sensors: SensorStore,
    presets: Vec<SensorPreset>,
    lock: LockMgr,
    transfer: TransferMgr,
    auto: AutoMgr,
    config: FabConfig,
}

impl FabContext {
    /// Wires shared regions, builds name -> index maps, detects deadlock
    /// zones, places vehicles, and builds the LOOP map, per spec.md §4.9
    /// `init(params)`. Fails fast (`FatalInit`) on a map that doesn't parse,
    /// over-requests capacity, or can't place its starting vehicles.
    pub fn init(config: FabConfig, map: &FabMapConfig, stations: Vec<Station>) -> Result<Self, EngineError> {
        let mut resolved = map.build().map_err(|e| EngineError::FatalInit(e.to_string()))?;
        crate::deadlock::detect_deadlock_zones(&mut resolved.nodes, &mut resolved.edges);

        let max_vehicles = config.max_vehicles;
        let edge_count = resolved.edges.len() as u32;
        let vehicle_region = SharedRegion::new(max_vehicles as usize * VEHICLE_DATA_SIZE * 4)
            .map_err(|e| EngineError::FatalInit(e.to_string()))?;
        let path_region = SharedRegion::new(max_vehicles as usize * (railsim_common::consts::MAX_PATH_LENGTH + 1) * 4)
            .map_err(|e| EngineError::FatalInit(e.to_string()))?;
        let sensor_region = SharedRegion::new(max_vehicles as usize * SENSOR_DATA_SIZE * 4)
            .map_err(|e| EngineError::FatalInit(e.to_string()))?;

        let mut store = EngineStore::new(vehicle_region, path_region, max_vehicles, edge_count);
        let mut sensors = SensorStore::new(sensor_region);
        let presets: Vec<SensorPreset> = map.sensor_presets.iter().map(SensorPreset::from).collect();

        if !map.vehicles.is_empty() {
            crate::placement::place_from_config(&mut store, &resolved.edges, &resolved.edge_index, &map.vehicles)?;
        } else if let Some(count) = map.auto_vehicle_count {
            crate::placement::place_auto(&mut store, &resolved.edges, count)?;
        }

        for veh_id in store.active_indices().collect::<Vec<_>>() {
            let edge_idx = store.current_edge(veh_id);
            if let Some(edge) = resolved.edges.get(edge_idx as usize - 1) {
                let preset_idx = movement::select_preset_idx(edge, presets.len() as u32);
                store.set_preset_idx(veh_id, preset_idx);
            }
            let (x, y, _z) = store.position(veh_id);
            let rotation = store.rotation(veh_id);
            let preset_idx = store.preset_idx(veh_id) as usize;
            if let Some(preset) = presets.get(preset_idx) {
                sensors.update_sensor_points(veh_id, x, y, rotation, preset);
            }
        }

        let starting_edges: Vec<(u32, u32)> = store
            .active_indices()
            .map(|v| (v, store.current_edge(v)))
            .collect();
        let loop_map = transfer::build_loop_map(&resolved.edges, &starting_edges);
        let mut transfer = TransferMgr::new();
        transfer.set_loop_map(loop_map);

        let lock = LockMgr::new(config.lock_grant_strategy);
        let auto = AutoMgr::new(stations);

        Ok(Self {
            fab_id: config.fab_id.clone(),
            state: FabState::Initialized,
            nodes: resolved.nodes,
            edges: resolved.edges,
            node_index: resolved.node_index,
            edge_index: resolved.edge_index,
            store,
            sensors,
            presets,
            lock,
            transfer,
            auto,
            config,
        })
    }

    pub fn apply_signal(&mut self, signal: ControlSignal) -> Result<(), EngineError> {
        self.state = self.state.apply(signal)?;
        Ok(())
    }

    pub fn state(&self) -> FabState {
        self.state
    }

    pub fn active_vehicle_count(&self) -> u32 {
        self.store.active_indices().count() as u32
    }

    /// Resolves an edge index to its `{name, toNode}` pair for
    /// `UNUSUAL_MOVE` reporting (§6). `side` picks which endpoint's name is
    /// reported: events carry `prevEdge:{name,toNode}` and
    /// `nextEdge:{name,fromNode}`.
    pub fn edge_ref(&self, edge_idx: u32, node_side: EdgeNodeSide) -> railsim_common::command::EdgeRef {
        let edge = self.edges.get(edge_idx.wrapping_sub(1) as usize);
        let node_idx = match (edge, node_side) {
            (Some(e), EdgeNodeSide::To) => e.to_node,
            (Some(e), EdgeNodeSide::From) => e.from_node,
            (None, _) => 0,
        };
        railsim_common::command::EdgeRef {
            name: edge.map(|e| e.name.clone()).unwrap_or_default(),
            node: self
                .nodes
                .get(node_idx.wrapping_sub(1) as usize)
                .map(|n| n.name.clone())
                .unwrap_or_default(),
        }
    }

    /// Routes an external dispatch command to [`TransferMgr::assign_command`]
    /// via [`DispatchMgr`]. Returns whether the command was accepted.
    pub fn handle_command(&mut self, cmd: &railsim_common::command::DispatchCommand) -> bool {
        DispatchMgr::handle_command(&mut self.store, &self.edges, &self.edge_index, &mut self.transfer, cmd)
    }

    /// Runs one tick's pipeline (spec.md §5): collision -> lock update ->
    /// movement (transfer-queue processing, integration, edge transition,
    /// merge-lock, pose/sensor update) -> auto-routing. No-op, returning no
    /// events, unless the fab is `Running`.
    pub fn step(&mut self, dt: f32) -> Vec<UnusualMoveEvent> {
        if !self.state.is_steppable() {
            return Vec::new();
        }

        collision::run_collision_pipeline(&mut self.store, &self.sensors, &self.edges, &self.presets);
        movement::update_lock_requests(&mut self.store, &self.edges, &mut self.lock);
        self.transfer
            .process_transfer_queue(&mut self.store, &self.edges, self.config.transfer_mode);
        let events = movement::step_all(
            &mut self.store,
            &mut self.sensors,
            &self.edges,
            &self.presets,
            &mut self.lock,
            &mut self.transfer,
            &self.config,
            dt,
        );
        self.auto.assign_destinations(&mut self.store, &self.edges, &self.nodes);
        events
    }

    /// Writes every active vehicle's pose into its assigned slice of the
    /// continuous vehicle render buffer (spec.md §4.1, "render-region
    /// emission"). `slice` comes from
    /// [`railsim_memory::layout::MemoryLayoutManager::compute_render_layout`].
    pub fn write_render_region(&self, buffer: &mut RenderBuffer, slice: RenderSlice) -> Result<(), railsim_memory::MemError> {
        for veh_id in 0..slice.vehicle_count {
            if !self.store.is_active(veh_id) {
                continue;
            }
            let local_idx = veh_id;
            let (x, y, z) = self.store.position(veh_id);
            let rotation = self.store.rotation(veh_id);
            let offset = (slice.vehicle_start_index + local_idx) as usize * 4;
            buffer.write_versioned(
                offset,
                &[x + self.config.render_offset_x, y + self.config.render_offset_y, z, rotation],
            )?;
        }
        Ok(())
    }

    /// Writes every active vehicle's sensor corner points into the
    /// continuous sensor render buffer (spec.md §4.1, §6): each of the seven
    /// sections gets this fab's slice at `section_base + (vehicle_start_index
    /// + local_idx) * 4`, per-section values coming from
    /// [`crate::sensor::SensorStore::render_section_points`]. The same
    /// `(offsetX, offsetY)` translation applied to pose is applied to every
    /// corner point here too, so sensor geometry lines up with rendered
    /// vehicle position.
    pub fn write_sensor_render_region(
        &self,
        buffer: &mut RenderBuffer,
        sections: RenderSections,
        slice: RenderSlice,
    ) -> Result<(), railsim_memory::MemError> {
        let section_bases = sections.all();
        for veh_id in 0..slice.vehicle_count {
            if !self.store.is_active(veh_id) {
                continue;
            }
            let points = self.sensors.render_section_points(veh_id);
            let local_offset = (slice.vehicle_start_index + veh_id) as usize * 4;
            for (section_base, [x0, y0, x1, y1]) in section_bases.iter().zip(points) {
                buffer.write_versioned(
                    section_base + local_offset,
                    &[
                        x0 + self.config.render_offset_x,
                        y0 + self.config.render_offset_y,
                        x1 + self.config.render_offset_x,
                        y1 + self.config.render_offset_y,
                    ],
                )?;
            }
        }
        Ok(())
    }
}
