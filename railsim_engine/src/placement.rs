//! Vehicle placement (spec.md §4.11): seat vehicles onto the graph either
//! from explicit config entries or by auto-spacing along eligible edges.

use std::collections::HashMap;

use railsim_common::consts::{EDGE_MIN_LENGTH_M, NODE_MARGIN_M, VEHICLE_SPACING_M};
use railsim_common::error::EngineError;
use railsim_common::graph::edge::EdgeKind;
use railsim_common::graph::Edge;
use railsim_common::vehicle::MovingStatus;

use crate::config::VehiclePlacementConfig;
use crate::store::{EngineStore, VehicleInit};

/// Places vehicles at explicit edge/ratio positions resolved through
/// `edge_name_to_index`. Fails fast on an unknown edge name — a config
/// placement is operator-authored and should never silently drop a vehicle.
pub fn place_from_config(
    store: &mut EngineStore,
    edges: &[Edge],
    edge_name_to_index: &HashMap<String, u32>,
    specs: &[VehiclePlacementConfig],
) -> Result<(), EngineError> {
    for spec in specs {
        let edge_idx = *edge_name_to_index
            .get(&spec.edge_name)
            .ok_or_else(|| EngineError::MissingNode(spec.edge_name.clone()))?;
        let edge = edges
            .get(edge_idx as usize - 1)
            .ok_or(EngineError::MissingEdge(edge_idx))?;
        let (x, y, z, rotation) = edge
            .interpolate(spec.ratio)
            .ok_or_else(|| EngineError::FatalInit(format!("edge {} has no rendering polyline", spec.edge_name)))?;
        store.add_vehicle(
            spec.veh_id,
            VehicleInit {
                x,
                y,
                z,
                edge_index: edge_idx,
                edge_ratio: spec.ratio,
                rotation,
                velocity: 0.0,
                acceleration: 0.0,
                deceleration: 0.0,
                moving_status: MovingStatus::Moving,
            },
        )?;
    }
    Ok(())
}

/// Generates placement spots along every `LINEAR` edge at least
/// `EDGE_MIN_LENGTH_M` long: one every `VEHICLE_SPACING_M`, within
/// `[NODE_MARGIN_M, distance - NODE_MARGIN_M]`. Takes the first
/// `num_vehicles` spots across all eligible edges, assigning ids
/// `0..num_vehicles`. Returns the number of vehicles actually placed, which
/// is less than `num_vehicles` when the map's capacity is exceeded — the
/// caller logs `maxCapacity` against the shortfall.
pub fn place_auto(store: &mut EngineStore, edges: &[Edge], num_vehicles: u32) -> Result<u32, EngineError> {
    let mut placed = 0u32;
    'edges: for (edge_idx_zero, edge) in edges.iter().enumerate() {
        if edge.kind != EdgeKind::Linear || edge.distance < EDGE_MIN_LENGTH_M {
            continue;
        }
        let edge_idx = edge_idx_zero as u32 + 1;
        let mut offset = NODE_MARGIN_M;
        while offset <= edge.distance - NODE_MARGIN_M {
            if placed >= num_vehicles {
                break 'edges;
            }
            let ratio = offset / edge.distance;
            let (x, y, z, rotation) = edge
                .interpolate(ratio)
                .ok_or_else(|| EngineError::FatalInit(format!("edge {} has no rendering polyline", edge.name)))?;
            store.add_vehicle(
                placed,
                VehicleInit {
                    x,
                    y,
                    z,
                    edge_index: edge_idx,
                    edge_ratio: ratio,
                    rotation,
                    velocity: 0.0,
                    acceleration: 0.0,
                    deceleration: 0.0,
                    moving_status: MovingStatus::Moving,
                },
            )?;
            placed += 1;
            offset += VEHICLE_SPACING_M;
        }
    }
    if placed < num_vehicles {
        tracing::warn!(
            requested = num_vehicles,
            max_capacity = placed,
            "auto placement could not seat every requested vehicle"
        );
    }
    Ok(placed)
}
