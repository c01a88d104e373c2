//! Per-weapon engagement (trajectory) planning.
//!
//! One concrete planner type serves both weapon families; the guidance
//! variant selects the family-specific inputs (live target for missiles,
//! pre-planned drop plan for mines). The computed plan's validity is the
//! fire-solution gate consumed by the launch tube.

use std::time::Instant;

use tracing::debug;

use seafire_core::constants::{MAX_TRAJECTORY_POINTS, MAX_TURNING_POINTS, MAX_WAYPOINTS};
use seafire_core::enums::WeaponKind;
use seafire_core::state::{MineEngagementView, MissileEngagementView};
use seafire_core::types::{
    DropPlanRef, EngagementPlan, GeoPoint, GeoPoint3, MinePlan, OwnShipNav, TargetTrack, Waypoint,
};
use seafire_core::{Result, WcsError};

use crate::geo::{lerp_position, polyline_length_m};

/// Family-specific planning inputs.
#[derive(Debug, Clone)]
pub enum Guidance {
    /// Live-target guidance for ALM/ASM/AAM.
    Missile {
        /// Nonzero when tracking a system target; 0 for a direct position.
        system_target_id: u32,
        /// Resolved target position; `None` until designated.
        target: Option<GeoPoint3>,
        speed_mps: f64,
    },
    /// Pre-planned drop guidance for mines.
    Mine {
        plan_ref: Option<DropPlanRef>,
        drop_plan: Option<MinePlan>,
        speed_mps: f64,
    },
}

/// Trajectory planner for one assigned weapon.
#[derive(Debug)]
pub struct EngagementPlanner {
    tube_number: u16,
    kind: WeaponKind,
    guidance: Guidance,
    waypoints: Vec<Waypoint>,
    own_ship: Option<OwnShipNav>,
    axis_center: GeoPoint,
    launched: bool,
    launch_time: Option<Instant>,
    plan: EngagementPlan,
}

impl EngagementPlanner {
    pub fn missile(kind: WeaponKind, speed_mps: f64) -> Self {
        Self {
            tube_number: 0,
            kind,
            guidance: Guidance::Missile {
                system_target_id: 0,
                target: None,
                speed_mps,
            },
            waypoints: Vec::new(),
            own_ship: None,
            axis_center: GeoPoint::default(),
            launched: false,
            launch_time: None,
            plan: EngagementPlan::empty(0, kind),
        }
    }

    pub fn mine(speed_mps: f64) -> Self {
        Self {
            tube_number: 0,
            kind: WeaponKind::Mine,
            guidance: Guidance::Mine {
                plan_ref: None,
                drop_plan: None,
                speed_mps,
            },
            waypoints: Vec::new(),
            own_ship: None,
            axis_center: GeoPoint::default(),
            launched: false,
            launch_time: None,
            plan: EngagementPlan::empty(0, WeaponKind::Mine),
        }
    }

    // --- Basic information ---

    pub fn kind(&self) -> WeaponKind {
        self.kind
    }

    pub fn tube_number(&self) -> u16 {
        self.tube_number
    }

    pub fn plan(&self) -> &EngagementPlan {
        &self.plan
    }

    pub fn is_valid(&self) -> bool {
        self.plan.valid
    }

    pub fn is_launched(&self) -> bool {
        self.launched
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    // --- Lifecycle ---

    pub fn initialize(&mut self, tube_number: u16) {
        self.tube_number = tube_number;
        self.launched = false;
        self.launch_time = None;
        self.plan = EngagementPlan::empty(tube_number, self.kind);
    }

    pub fn reset(&mut self) {
        self.launched = false;
        self.launch_time = None;
        self.waypoints.clear();
        self.plan = EngagementPlan::empty(self.tube_number, self.kind);
    }

    // --- Target and drop-plan designation ---

    /// Designate a direct target position (missile guidance only).
    pub fn set_target_position(&mut self, position: GeoPoint3) -> Result<()> {
        match &mut self.guidance {
            Guidance::Missile {
                system_target_id,
                target,
                ..
            } => {
                *system_target_id = 0;
                *target = Some(position);
                self.calculate()
            }
            Guidance::Mine { .. } => Err(WcsError::InvalidPlan(
                "mine guidance takes a drop plan, not a target".into(),
            )),
        }
    }

    /// Track a system target. The plan stays invalid until a matching
    /// kinematics update arrives via [`update_target`](Self::update_target).
    pub fn set_system_target(&mut self, id: u32) -> Result<()> {
        match &mut self.guidance {
            Guidance::Missile {
                system_target_id,
                target,
                ..
            } => {
                *system_target_id = id;
                *target = None;
                self.plan.valid = false;
                debug!(tube = self.tube_number, system_target_id = id, "system target set");
                Ok(())
            }
            Guidance::Mine { .. } => Err(WcsError::InvalidPlan(
                "mine guidance takes a drop plan, not a target".into(),
            )),
        }
    }

    /// Consume a target kinematics update. Ignored unless this planner is
    /// tracking the matching system target.
    pub fn update_target(&mut self, track: &TargetTrack) {
        if let Guidance::Missile {
            system_target_id,
            target,
            ..
        } = &mut self.guidance
        {
            if *system_target_id != 0 && track.system_target_id == *system_target_id {
                *target = Some(track.geodetic_position());
                let _ = self.calculate();
            }
        }
    }

    /// Load a resolved drop plan (mine guidance only). The plan's
    /// waypoints become the route.
    pub fn set_drop_plan(&mut self, plan_ref: DropPlanRef, plan: MinePlan) -> Result<()> {
        match &mut self.guidance {
            Guidance::Mine {
                plan_ref: stored_ref,
                drop_plan,
                ..
            } => {
                if plan.waypoints.len() > MAX_WAYPOINTS {
                    return Err(WcsError::InvalidPlan(format!(
                        "drop plan {} has {} waypoints, limit is {MAX_WAYPOINTS}",
                        plan.plan_number,
                        plan.waypoints.len()
                    )));
                }
                *stored_ref = Some(plan_ref);
                self.waypoints = plan.waypoints.clone();
                *drop_plan = Some(plan);
                self.calculate()
            }
            Guidance::Missile { .. } => Err(WcsError::InvalidPlan(
                "missile guidance takes a target, not a drop plan".into(),
            )),
        }
    }

    /// Drop-plan coordinates this planner was loaded from.
    pub fn drop_plan_ref(&self) -> Option<DropPlanRef> {
        match &self.guidance {
            Guidance::Mine { plan_ref, .. } => *plan_ref,
            Guidance::Missile { .. } => None,
        }
    }

    /// Replace the operator route (at most 8 waypoints).
    pub fn update_waypoints(&mut self, waypoints: Vec<Waypoint>) -> Result<()> {
        if waypoints.len() > MAX_WAYPOINTS {
            return Err(WcsError::InvalidPlan(format!(
                "{} waypoints exceed the limit of {MAX_WAYPOINTS}",
                waypoints.len()
            )));
        }

        self.waypoints = waypoints;
        if let Guidance::Mine { drop_plan, .. } = &mut self.guidance {
            if let Some(plan) = drop_plan {
                plan.waypoints = self.waypoints.clone();
            }
        }

        // Incomplete inputs keep the plan invalid; the route is stored
        // either way.
        let _ = self.calculate();
        Ok(())
    }

    // --- Environment ---

    pub fn update_own_ship(&mut self, nav: OwnShipNav) {
        self.own_ship = Some(nav);
    }

    pub fn set_axis_center(&mut self, center: GeoPoint) {
        self.axis_center = center;
    }

    /// Mark the weapon as away; starts the position-estimate clock.
    pub fn set_launched(&mut self, launched: bool) {
        self.launched = launched;
        if launched {
            if self.launch_time.is_none() {
                self.launch_time = Some(Instant::now());
            }
        } else {
            self.launch_time = None;
        }
    }

    // --- Plan computation ---

    /// Recompute the engagement plan from current inputs.
    ///
    /// Fails (and marks the plan invalid) while inputs are incomplete:
    /// missiles need a resolved target, mines a loaded drop plan.
    pub fn calculate(&mut self) -> Result<()> {
        self.plan.tube_number = self.tube_number;
        self.plan.kind = self.kind;

        let (target_position, speed_mps) = match &self.guidance {
            Guidance::Missile { target, speed_mps, .. } => match target {
                Some(position) => (*position, *speed_mps),
                None => {
                    self.plan.valid = false;
                    return Err(WcsError::InvalidPlan("no target designated".into()));
                }
            },
            Guidance::Mine {
                drop_plan,
                speed_mps,
                ..
            } => match drop_plan {
                Some(plan) => (plan.drop_pos.at_altitude(0.0), *speed_mps),
                None => {
                    self.plan.valid = false;
                    return Err(WcsError::InvalidPlan("no drop plan loaded".into()));
                }
            },
        };

        let launch_position = self.launch_position();

        let mut trajectory = Vec::with_capacity(self.waypoints.len() + 2);
        trajectory.push(launch_position);
        trajectory.extend(self.waypoints.iter().map(|w| w.to_position()));
        trajectory.push(target_position);
        trajectory.truncate(MAX_TRAJECTORY_POINTS);

        let length_m = polyline_length_m(&trajectory);
        let total_time_secs = if speed_mps > 0.0 { length_m / speed_mps } else { 0.0 };

        self.plan.valid = true;
        self.plan.total_time_secs = total_time_secs;
        self.plan.launch_position = launch_position;
        self.plan.target_position = target_position;
        self.plan.waypoints = self.waypoints.clone();
        self.plan.trajectory = trajectory;
        self.refresh_progress();
        Ok(())
    }

    /// Periodic tick: refresh the interpolated position estimate after
    /// launch.
    pub fn update(&mut self) {
        if self.launched && self.plan.valid && self.plan.trajectory.len() >= 2 {
            self.refresh_progress();
        }
    }

    // --- Telemetry views ---

    /// Missile engagement result; `None` for mine guidance.
    pub fn missile_view(&self) -> Option<MissileEngagementView> {
        match &self.guidance {
            Guidance::Missile { .. } => Some(MissileEngagementView {
                tube_number: self.tube_number,
                position_valid: self.plan.valid && self.launched,
                current_position: self.plan.current_position,
                trajectory: self.plan.trajectory.clone(),
                waypoints: self.waypoints.iter().map(|w| w.to_position()).collect(),
                turning_points: self.turning_points(),
                next_waypoint_index: self.plan.next_waypoint_index,
                time_to_next_waypoint_secs: self.plan.time_to_next_waypoint_secs,
            }),
            Guidance::Mine { .. } => None,
        }
    }

    /// Mine engagement result; `None` for missile guidance.
    pub fn mine_view(&self) -> Option<MineEngagementView> {
        match &self.guidance {
            Guidance::Mine { drop_plan, .. } => {
                let (launch_position, drop_position) = match drop_plan {
                    Some(plan) => (plan.launch_pos, plan.drop_pos),
                    None => (
                        self.plan.launch_position.horizontal(),
                        self.plan.target_position.horizontal(),
                    ),
                };
                Some(MineEngagementView {
                    tube_number: self.tube_number,
                    position_valid: self.plan.valid && self.launched,
                    current_position: self.plan.current_position,
                    estimated_driving_time_secs: self.plan.total_time_secs,
                    remaining_time_secs: self.plan.time_to_target_secs,
                    launch_position,
                    drop_position,
                    trajectory: self.plan.trajectory.clone(),
                    waypoints: self.waypoints.clone(),
                    next_waypoint_index: self.plan.next_waypoint_index,
                    time_to_next_waypoint_secs: self.plan.time_to_next_waypoint_secs,
                })
            }
            Guidance::Missile { .. } => None,
        }
    }

    /// Computed route inflections. With straight-segment routing these
    /// coincide with the operator waypoints, capped at 16.
    pub fn turning_points(&self) -> Vec<GeoPoint3> {
        self.waypoints
            .iter()
            .take(MAX_TURNING_POINTS)
            .map(|w| w.to_position())
            .collect()
    }

    // --- Internals ---

    fn launch_position(&self) -> GeoPoint3 {
        if let Guidance::Mine {
            drop_plan: Some(plan),
            ..
        } = &self.guidance
        {
            return plan.launch_pos.at_altitude(0.0);
        }
        match self.own_ship {
            Some(nav) => nav.position,
            None => self.axis_center.at_altitude(0.0),
        }
    }

    fn refresh_progress(&mut self) {
        let progress = match self.launch_time {
            Some(at) if self.launched && self.plan.total_time_secs > 0.0 => {
                (at.elapsed().as_secs_f64() / self.plan.total_time_secs).min(1.0)
            }
            _ => 0.0,
        };

        self.plan.time_to_target_secs = self.plan.total_time_secs * (1.0 - progress);
        self.plan.current_position = if self.launched {
            self.position_at(progress)
        } else {
            self.plan.launch_position
        };

        let (next_index, time_to_next) = self.next_waypoint_at(progress);
        self.plan.next_waypoint_index = next_index;
        self.plan.time_to_next_waypoint_secs = time_to_next;
    }

    /// Interpolated position for a completion fraction in [0, 1].
    ///
    /// Mines walk the trajectory segment-wise with each segment an equal
    /// share of the total time; missiles fly one straight segment from
    /// launch to target.
    fn position_at(&self, progress: f64) -> GeoPoint3 {
        let trajectory = &self.plan.trajectory;
        if trajectory.len() < 2 {
            return self.plan.launch_position;
        }

        match &self.guidance {
            Guidance::Missile { .. } => lerp_position(
                trajectory[0],
                trajectory[trajectory.len() - 1],
                progress.clamp(0.0, 1.0),
            ),
            Guidance::Mine { .. } => {
                let segments = trajectory.len() - 1;
                let along = progress.clamp(0.0, 1.0) * segments as f64;
                let index = (along.floor() as usize).min(segments - 1);
                let local = along - index as f64;
                lerp_position(trajectory[index], trajectory[index + 1], local)
            }
        }
    }

    /// Next-waypoint bookkeeping for a completion fraction.
    ///
    /// Returns the 0-based index of the next operator waypoint ahead
    /// (equal to the waypoint count once only the target remains) and the
    /// time until the next trajectory vertex.
    fn next_waypoint_at(&self, progress: f64) -> (u32, f64) {
        let trajectory = &self.plan.trajectory;
        let segments = trajectory.len().saturating_sub(1);
        if segments == 0 {
            return (0, 0.0);
        }

        let segment_time = self.plan.total_time_secs / segments as f64;
        let along = progress.clamp(0.0, 1.0) * segments as f64;
        let index = (along.floor() as usize).min(segments - 1);
        let time_to_next = (index as f64 + 1.0 - along) * segment_time;
        let next_waypoint = index.min(self.waypoints.len());
        (next_waypoint as u32, time_to_next)
    }
}
