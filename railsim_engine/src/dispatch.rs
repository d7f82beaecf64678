//! `DispatchMgr` (spec.md §4.8): resolves external `{vehId, ...}` commands
//! into `TransferMgr` path overrides; malformed input is logged and dropped,
//! never propagated across the tick boundary (spec.md §7).

use std::collections::HashMap;

use railsim_common::command::{DispatchCommand, VehicleId};
use railsim_common::graph::Edge;

use crate::store::EngineStore;
use crate::transfer::TransferMgr;

/// Expected shape of a dispatch command's JSON payload: `{"target_edge": "E_NAME"}`.
/// Anything else is treated as malformed (§7 command-error policy).
pub struct DispatchMgr;

impl DispatchMgr {
    /// Resolves `cmd.veh_id`, extracts `target_edge` from the payload, and
    /// routes the vehicle there via [`TransferMgr::assign_command`]. Returns
    /// `false` (and logs a warning) for any malformed or unresolvable input.
    pub fn handle_command(
        store: &mut EngineStore,
        edges: &[Edge],
        edge_name_to_index: &HashMap<String, u32>,
        transfer: &mut TransferMgr,
        cmd: &DispatchCommand,
    ) -> bool {
        let Some(veh_id) = cmd.veh_id.resolve() else {
            tracing::warn!(veh_id = ?cmd.veh_id, "dispatch command has an unresolvable vehId");
            return false;
        };
        if !store.is_active(veh_id) {
            tracing::warn!(veh_id, "dispatch command targets an inactive vehicle");
            return false;
        }
        let Some(target_edge) = cmd.payload.get("target_edge").and_then(|v| v.as_str()) else {
            tracing::warn!(veh_id, "dispatch command payload missing target_edge");
            return false;
        };
        let accepted = transfer.assign_command(store, edges, edge_name_to_index, veh_id, target_edge);
        if !accepted {
            tracing::warn!(veh_id, target_edge, "dispatch command references an unknown edge");
        }
        accepted
    }
}
