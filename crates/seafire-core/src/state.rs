//! Outbound status and engagement telemetry views.

use serde::{Deserialize, Serialize};

use crate::enums::{ControlState, WeaponKind};
use crate::types::{GeoPoint, GeoPoint3, Waypoint};

/// Per-tube status reported on the periodic status cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TubeStatus {
    pub tube_number: u16,
    pub has_weapon: bool,
    pub kind: WeaponKind,
    pub state: ControlState,
    pub launched: bool,
    pub plan_valid: bool,
}

/// Missile engagement result for the operator console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissileEngagementView {
    pub tube_number: u16,
    /// Whether `current_position` is a live post-launch estimate.
    pub position_valid: bool,
    pub current_position: GeoPoint3,
    /// Trajectory polyline, at most 128 points.
    pub trajectory: Vec<GeoPoint3>,
    /// Operator waypoints, at most 8.
    pub waypoints: Vec<GeoPoint3>,
    /// Computed route inflections, at most 16.
    pub turning_points: Vec<GeoPoint3>,
    pub next_waypoint_index: u32,
    pub time_to_next_waypoint_secs: f64,
}

/// Mine engagement result for the operator console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MineEngagementView {
    pub tube_number: u16,
    /// Whether `current_position` is a live post-launch estimate.
    pub position_valid: bool,
    pub current_position: GeoPoint3,
    pub estimated_driving_time_secs: f64,
    pub remaining_time_secs: f64,
    pub launch_position: GeoPoint,
    pub drop_position: GeoPoint,
    pub trajectory: Vec<GeoPoint3>,
    pub waypoints: Vec<Waypoint>,
    pub next_waypoint_index: u32,
    pub time_to_next_waypoint_secs: f64,
}

/// Fleet occupancy counters for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetCounts {
    /// Tubes holding a weapon.
    pub assigned: usize,
    /// Tubes whose weapon is ready to launch.
    pub ready: usize,
}
