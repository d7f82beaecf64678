//! Rail-graph edge: a directed arc between two nodes, plus a precomputed
//! rendering polyline and derived topology.

use serde::{Deserialize, Serialize};

/// Edge kinematics variant (§9 design note: "polymorphism over edge kinds").
///
/// The source branches on a `rail_type` string and a separately-truthy
/// `vos_rail_type` flag that different source files disagree on the meaning
/// of when absent. Here the variant is canonicalized once at config-parse
/// time via [`EdgeKind::parse`]; ambiguous/unknown strings are a hard
/// validation error, never silently treated as `Linear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Linear,
    Curve90,
    Curve180,
    CurveCsc,
    SCurve,
    CscHomo,
}

impl EdgeKind {
    pub fn is_curve(self) -> bool {
        !matches!(self, EdgeKind::Linear)
    }

    /// Parse the source's `rail_type` string into a canonical variant.
    ///
    /// Returns `None` for any string that isn't one of the known rail
    /// types — callers must treat this as a hard config-validation error,
    /// per the Open Question in spec.md §9, not default to `Linear`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "LINEAR" => Some(EdgeKind::Linear),
            "CURVE_90" => Some(EdgeKind::Curve90),
            "CURVE_180" => Some(EdgeKind::Curve180),
            "CURVE_CSC" => Some(EdgeKind::CurveCsc),
            "S_CURVE" => Some(EdgeKind::SCurve),
            "CSC_HOMO" => Some(EdgeKind::CscHomo),
            _ => None,
        }
    }
}

/// Which planar axis a `Linear` edge's 1-D collision math is measured along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// A point on an edge's rendering polyline (2.5-D: integrator plane + passive z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A rail-graph edge, per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub name: String,
    /// 1-based index into the node table.
    pub from_node: u32,
    /// 1-based index into the node table.
    pub to_node: u32,
    pub waypoints: Vec<String>,
    pub kind: EdgeKind,
    /// Edge length in meters.
    pub distance: f32,
    pub radius: Option<f32>,
    pub rotation: Option<f32>,
    pub axis: Axis,

    /// Ordered polyline consumed for pose interpolation; we do not define
    /// its generation math, only consume it (explicit Non-goal).
    pub rendering_points: Vec<RenderPoint>,

    #[serde(default)]
    pub from_node_is_merge: bool,
    #[serde(default)]
    pub from_node_is_diverge: bool,
    #[serde(default)]
    pub to_node_is_merge: bool,
    #[serde(default)]
    pub to_node_is_diverge: bool,

    /// 1-based indices of edges reachable from `to_node`. Index `[0]` is the
    /// canonical "next" edge used by the LOOP map builder (§9 Open Question:
    /// no further ordering semantics are implied).
    #[serde(default)]
    pub next_edge_indices: Vec<u32>,
    /// 1-based indices of edges whose `to_node == self.from_node`.
    #[serde(default)]
    pub prev_edge_indices: Vec<u32>,

    #[serde(default)]
    pub is_deadlock_zone_inside: bool,
    #[serde(default)]
    pub is_deadlock_zone_entry: bool,
    #[serde(default)]
    pub deadlock_zone_id: Option<u32>,
}

impl Edge {
    /// Linear-interpolate `(x, y, z)` and a tangent-derived rotation at
    /// `ratio in [0, 1]` along the rendering polyline. Used by movement
    /// integration (§4.6 step 8) and vehicle placement (§4.11).
    ///
    /// Returns `None` if the polyline has fewer than two points.
    pub fn interpolate(&self, ratio: f32) -> Option<(f32, f32, f32, f32)> {
        let pts = &self.rendering_points;
        if pts.len() < 2 {
            return None;
        }
        let ratio = ratio.clamp(0.0, 1.0);
        let segments = pts.len() - 1;
        let scaled = ratio * segments as f32;
        let idx = (scaled.floor() as usize).min(segments - 1);
        let local_t = scaled - idx as f32;
        let a = pts[idx];
        let b = pts[idx + 1];
        let x = a.x + (b.x - a.x) * local_t;
        let y = a.y + (b.y - a.y) * local_t;
        let z = a.z + (b.z - a.z) * local_t;
        let rotation = (b.y - a.y).atan2(b.x - a.x);
        Some((x, y, z, rotation))
    }
}
