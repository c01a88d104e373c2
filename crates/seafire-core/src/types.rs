//! Fundamental geodetic and weapon-control value types.

use serde::{Deserialize, Serialize};

use crate::enums::WeaponKind;

/// 2D geodetic point (degrees).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    /// Promote to a 3D position at the given altitude (metres, up positive).
    pub fn at_altitude(self, alt_m: f64) -> GeoPoint3 {
        GeoPoint3 {
            lat_deg: self.lat_deg,
            lon_deg: self.lon_deg,
            alt_m,
        }
    }
}

/// 3D geodetic position. Altitude in metres, up positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint3 {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
}

impl GeoPoint3 {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            alt_m,
        }
    }

    /// Drop the vertical component.
    pub fn horizontal(self) -> GeoPoint {
        GeoPoint {
            lat_deg: self.lat_deg,
            lon_deg: self.lon_deg,
        }
    }
}

/// Operator-supplied route point. Depth in metres, down positive
/// (surface weapons report negative depth as altitude).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub depth_m: f64,
}

impl Waypoint {
    pub fn new(lat_deg: f64, lon_deg: f64, depth_m: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            depth_m,
        }
    }

    /// The waypoint as a 3D position (depth negated to altitude).
    pub fn to_position(self) -> GeoPoint3 {
        GeoPoint3 {
            lat_deg: self.lat_deg,
            lon_deg: self.lon_deg,
            alt_m: -self.depth_m,
        }
    }
}

/// Own-ship navigation telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnShipNav {
    pub position: GeoPoint3,
    /// True course (degrees, 0 = North, clockwise).
    pub course_deg: f64,
    /// Speed over ground (m/s).
    pub speed_mps: f64,
}

/// System-target kinematics published by the tracking service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetTrack {
    /// Nonzero system-wide target identifier.
    pub system_target_id: u32,
    pub position: GeoPoint,
    /// Target depth (metres, down positive).
    pub depth_m: f64,
    pub course_deg: f64,
    pub speed_mps: f64,
}

impl TargetTrack {
    /// Target position as a 3D point (depth negated to altitude).
    pub fn geodetic_position(&self) -> GeoPoint3 {
        self.position.at_altitude(-self.depth_m)
    }
}

/// Reference to a stored mine drop plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropPlanRef {
    pub list_number: u32,
    pub plan_number: u16,
}

/// A pre-planned mine drop trajectory stored in the plan library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinePlan {
    /// Nonzero plan number, unique within its list.
    pub plan_number: u16,
    pub launch_pos: GeoPoint,
    pub drop_pos: GeoPoint,
    /// Route from launch to drop position (at most 8 entries).
    pub waypoints: Vec<Waypoint>,
}

/// Static performance envelope of a weapon kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub name: String,
    pub max_range_km: f64,
    pub speed_mps: f64,
    pub launch_delay_secs: f64,
}

impl WeaponSpec {
    pub fn new(name: &str, max_range_km: f64, speed_mps: f64, launch_delay_secs: f64) -> Self {
        Self {
            name: name.to_string(),
            max_range_km,
            speed_mps,
            launch_delay_secs,
        }
    }
}

/// Assignment parameters for binding a weapon to a tube.
///
/// A missile assignment carries either a nonzero `system_target_id` or a
/// direct `target_pos`; a mine assignment carries a `drop_plan` reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentInfo {
    pub tube_number: u16,
    pub kind: WeaponKind,
    /// System target to engage (0 = unset, use `target_pos` instead).
    pub system_target_id: u32,
    /// Directly designated target position.
    pub target_pos: GeoPoint3,
    /// Drop plan coordinates for mine assignments.
    pub drop_plan: Option<DropPlanRef>,
}

/// One step of a launch sequence. Read-only after weapon construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchStep {
    pub description: String,
    pub duration_secs: f64,
}

impl LaunchStep {
    pub fn new(description: &str, duration_secs: f64) -> Self {
        Self {
            description: description.to_string(),
            duration_secs,
        }
    }
}

/// Computed engagement (trajectory) plan for one tube.
///
/// `valid` gates the fire solution: a plan is valid once its inputs are
/// complete (target present for missiles, drop plan loaded for mines).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementPlan {
    pub tube_number: u16,
    pub kind: WeaponKind,
    pub valid: bool,
    pub total_time_secs: f64,
    pub time_to_target_secs: f64,
    pub next_waypoint_index: u32,
    pub time_to_next_waypoint_secs: f64,
    /// Ordered polyline from launch position to target/drop position.
    pub trajectory: Vec<GeoPoint3>,
    pub waypoints: Vec<Waypoint>,
    pub launch_position: GeoPoint3,
    pub target_position: GeoPoint3,
    /// Interpolated weapon position (meaningful after launch).
    pub current_position: GeoPoint3,
}

impl EngagementPlan {
    /// An empty, invalid plan for the given tube and kind.
    pub fn empty(tube_number: u16, kind: WeaponKind) -> Self {
        Self {
            tube_number,
            kind,
            ..Default::default()
        }
    }
}
