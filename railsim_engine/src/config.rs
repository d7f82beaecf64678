//! Fab map configuration: the TOML-facing description of a fab's rail graph
//! (spec.md §3/§4.9) and the pure function that turns it into a validated
//! `Vec<Node>`/`Vec<Edge>` pair with derived topology filled in.
//!
//! We do not parse the source's native CSV/CFG map format — that's an
//! explicit Non-goal (§1). This is the engine's own collaborator contract:
//! a TOML document an external host (or a test) hands us, in the shape this
//! engine actually consumes.

use railsim_common::config::{ConfigError, SensorPresetConfig};
use railsim_common::graph::edge::{Axis, RenderPoint};
use railsim_common::graph::{Edge, EdgeKind, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One node entry as it appears in a fab map file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub barcode: Option<String>,
}

/// One edge entry as it appears in a fab map file. `rail_type` is the raw
/// source string (`"LINEAR"`, `"CURVE_90"`, ...); canonicalized to
/// [`EdgeKind`] by [`FabMapConfig::build`], rejecting unknown strings per
/// spec.md §9's Open Question rather than defaulting to `Linear`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub waypoints: Vec<String>,
    pub rail_type: String,
    pub distance: f32,
    #[serde(default)]
    pub radius: Option<f32>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default = "default_axis")]
    pub axis: AxisConfig,
    /// Precomputed rendering polyline; we consume it, we do not generate it
    /// (explicit Non-goal, §1).
    pub rendering_points: Vec<[f32; 3]>,
}

fn default_axis() -> AxisConfig {
    AxisConfig::X
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisConfig {
    X,
    Y,
}

impl From<AxisConfig> for Axis {
    fn from(a: AxisConfig) -> Self {
        match a {
            AxisConfig::X => Axis::X,
            AxisConfig::Y => Axis::Y,
        }
    }
}

/// A single vehicle's "from config" placement (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePlacementConfig {
    pub veh_id: u32,
    pub edge_name: String,
    pub ratio: f32,
}

/// Top-level fab map document: nodes, edges, sensor presets, and either an
/// explicit vehicle placement list or an automatic-placement count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabMapConfig {
    pub nodes: Vec<NodeConfig>,
    pub edges: Vec<EdgeConfig>,
    #[serde(default)]
    pub sensor_presets: Vec<SensorPresetConfig>,
    #[serde(default)]
    pub vehicles: Vec<VehiclePlacementConfig>,
    #[serde(default)]
    pub auto_vehicle_count: Option<u32>,
}

impl railsim_common::config::ConfigLoader for FabMapConfig {}

/// Fully resolved fab map: validated, topology-complete graph plus the
/// name -> index maps `FabContext::init` needs to resolve commands and
/// config-driven placements.
pub struct ResolvedMap {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub node_index: HashMap<String, u32>,
    pub edge_index: HashMap<String, u32>,
}

impl FabMapConfig {
    /// Parse raw config into a validated graph with derived topology filled
    /// in (degree flags, `next_edge_indices`/`prev_edge_indices`, endpoint
    /// merge/diverge flags). Edge/node indices are 1-based per spec.md §3.
    pub fn build(&self) -> Result<ResolvedMap, ConfigError> {
        if self.edges.is_empty() {
            return Err(ConfigError::ValidationError(
                "fab map must contain at least one edge".to_string(),
            ));
        }

        let mut node_index = HashMap::with_capacity(self.nodes.len());
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, n) in self.nodes.iter().enumerate() {
            if node_index.insert(n.name.clone(), (i + 1) as u32).is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate node name: {}",
                    n.name
                )));
            }
            nodes.push(Node::new(n.name.clone(), n.x, n.y, n.z));
        }

        let mut edge_index = HashMap::with_capacity(self.edges.len());
        let mut edges = Vec::with_capacity(self.edges.len());
        for (i, e) in self.edges.iter().enumerate() {
            if edge_index.insert(e.name.clone(), (i + 1) as u32).is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate edge name: {}",
                    e.name
                )));
            }
            let kind = EdgeKind::parse(&e.rail_type).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "edge {} has unknown rail_type {:?}; refusing to default to LINEAR",
                    e.name, e.rail_type
                ))
            })?;
            let from_node = *node_index.get(&e.from).ok_or_else(|| {
                ConfigError::ValidationError(format!("edge {} references unknown node {}", e.name, e.from))
            })?;
            let to_node = *node_index.get(&e.to).ok_or_else(|| {
                ConfigError::ValidationError(format!("edge {} references unknown node {}", e.name, e.to))
            })?;
            if e.distance <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "edge {} distance must be > 0",
                    e.name
                )));
            }
            if e.rendering_points.len() < 2 {
                return Err(ConfigError::ValidationError(format!(
                    "edge {} needs at least 2 rendering points",
                    e.name
                )));
            }

            edges.push(Edge {
                name: e.name.clone(),
                from_node,
                to_node,
                waypoints: e.waypoints.clone(),
                kind,
                distance: e.distance,
                radius: e.radius,
                rotation: e.rotation,
                axis: e.axis.into(),
                rendering_points: e
                    .rendering_points
                    .iter()
                    .map(|p| RenderPoint { x: p[0], y: p[1], z: p[2] })
                    .collect(),
                from_node_is_merge: false,
                from_node_is_diverge: false,
                to_node_is_merge: false,
                to_node_is_diverge: false,
                next_edge_indices: vec![],
                prev_edge_indices: vec![],
                is_deadlock_zone_inside: false,
                is_deadlock_zone_entry: false,
                deadlock_zone_id: None,
            });
        }

        crate::topology::compute_topology(&mut nodes, &mut edges);

        Ok(ResolvedMap { nodes, edges, node_index, edge_index })
    }
}
