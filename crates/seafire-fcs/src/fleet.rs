//! Launch-tube fleet manager.
//!
//! Owns the fixed bank of tubes (numbered 1..=N, tube 0 is invalid),
//! validates and dispatches operator commands, and fans environment
//! updates out to every assigned tube. The tube vector and the
//! environment snapshot sit behind separate read-write locks; external
//! callbacks are invoked outside both.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use seafire_core::cancel::CancelToken;
use seafire_core::commands::{ControlRequest, WaypointRequest};
use seafire_core::config::SystemConfig;
use seafire_core::constants::MIN_TUBE_NUMBER;
use seafire_core::enums::{ControlState, WeaponKind};
use seafire_core::events::{
    AssignmentChangeFn, EngagementPlanFn, LaunchStatusFn, StateChangeFn,
};
use seafire_core::state::{FleetCounts, TubeStatus};
use seafire_core::types::{AssignmentInfo, EngagementPlan, GeoPoint, OwnShipNav, TargetTrack};
use seafire_core::{Result, WcsError};

use seafire_plans::MinePlanStore;

use crate::factory::WeaponFactory;
use crate::targets::TargetCache;
use crate::tube::LaunchTube;

/// Shared environment snapshot fanned out to assigned tubes.
#[derive(Debug, Clone, Copy, Default)]
struct Environment {
    axis_center: GeoPoint,
    own_ship: Option<OwnShipNav>,
}

#[derive(Default)]
struct FleetCallbacks {
    state_change: Mutex<Option<StateChangeFn>>,
    launch_status: Mutex<Option<LaunchStatusFn>>,
    engagement_plan: Mutex<Option<EngagementPlanFn>>,
    assignment_change: Mutex<Option<AssignmentChangeFn>>,
}

/// The bank of launch tubes and its validated command surface.
pub struct LaunchTubeManager {
    max_tubes: u16,
    factory: Arc<WeaponFactory>,
    plans: Arc<MinePlanStore>,
    targets: Arc<TargetCache>,
    tubes: RwLock<Vec<Arc<LaunchTube>>>,
    environment: RwLock<Environment>,
    callbacks: Arc<FleetCallbacks>,
}

impl LaunchTubeManager {
    pub fn new(
        config: &SystemConfig,
        factory: Arc<WeaponFactory>,
        plans: Arc<MinePlanStore>,
        targets: Arc<TargetCache>,
    ) -> Self {
        Self {
            max_tubes: config.system.max_launch_tubes,
            factory,
            plans,
            targets,
            tubes: RwLock::new(Vec::new()),
            environment: RwLock::new(Environment::default()),
            callbacks: Arc::new(FleetCallbacks::default()),
        }
    }

    /// Build the tube bank and wire per-tube callbacks through to the
    /// fleet-level ones. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        let mut tubes = self.tubes.write().unwrap_or_else(PoisonError::into_inner);
        if !tubes.is_empty() {
            return Ok(());
        }

        for number in MIN_TUBE_NUMBER..=self.max_tubes {
            let tube = Arc::new(LaunchTube::new(number));

            let callbacks = self.callbacks.clone();
            tube.set_state_change_callback(Box::new(move |tube_number, old, new| {
                if let Ok(callback) = callbacks.state_change.lock() {
                    if let Some(callback) = callback.as_ref() {
                        callback(tube_number, old, new);
                    }
                }
            }));

            let callbacks = self.callbacks.clone();
            tube.set_launch_status_callback(Box::new(move |tube_number, launched| {
                if let Ok(callback) = callbacks.launch_status.lock() {
                    if let Some(callback) = callback.as_ref() {
                        callback(tube_number, launched);
                    }
                }
            }));

            let callbacks = self.callbacks.clone();
            tube.set_engagement_plan_callback(Box::new(move |tube_number, plan| {
                if let Ok(callback) = callbacks.engagement_plan.lock() {
                    if let Some(callback) = callback.as_ref() {
                        callback(tube_number, plan);
                    }
                }
            }));

            tubes.push(tube);
        }

        info!(tubes = self.max_tubes, "launch tube bank initialized");
        Ok(())
    }

    /// Release every assigned tube.
    pub fn shutdown(&self) {
        for tube in self.assigned_tubes() {
            tube.clear();
        }
        info!("launch tube bank shut down");
    }

    // --- Assignment ---

    /// Bind a weapon to a tube: validate the index, occupancy, and
    /// factory support, construct the collaborators, delegate to the
    /// tube, then seed it with the current environment snapshot.
    pub fn assign(&self, info: AssignmentInfo) -> Result<()> {
        let tube = self.validated_tube(info.tube_number)?;
        if tube.has_weapon() {
            return Err(WcsError::TubeOccupied(info.tube_number));
        }
        if !self.factory.is_supported(info.kind) {
            return Err(WcsError::UnsupportedKind(info.kind));
        }

        let weapon = self.factory.create_weapon(info.kind)?;
        let mut planner = self.factory.create_planner(info.kind)?;

        match info.kind {
            WeaponKind::Mine => {
                let plan_ref = info.drop_plan.ok_or_else(|| {
                    WcsError::InvalidPlan("mine assignment requires a drop plan".into())
                })?;
                let plan = self
                    .plans
                    .get_plan(plan_ref.list_number, plan_ref.plan_number)?;
                planner.set_drop_plan(plan_ref, plan)?;
            }
            _ => {
                if info.system_target_id > 0 {
                    planner.set_system_target(info.system_target_id)?;
                } else {
                    planner.set_target_position(info.target_pos)?;
                }
            }
        }

        tube.assign(weapon, planner, info)?;

        // Seed the new tube with the environment snapshot.
        {
            let environment = *self
                .environment
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            tube.set_axis_center(environment.axis_center);
            if let Some(nav) = environment.own_ship {
                tube.update_own_ship(nav);
            }
        }
        if info.system_target_id > 0 {
            if let Some(track) = self.targets.get(info.system_target_id) {
                tube.update_target(&track);
            }
        }

        self.notify_assignment(info.tube_number, info.kind, true);
        Ok(())
    }

    /// Release a tube's weapon.
    pub fn unassign(&self, tube_number: u16) -> Result<()> {
        let tube = self.validated_tube(tube_number)?;
        let status = tube.status();
        if !status.has_weapon {
            return Err(WcsError::TubeEmpty(tube_number));
        }

        tube.clear();
        self.notify_assignment(tube_number, status.kind, false);
        Ok(())
    }

    pub fn is_assigned(&self, tube_number: u16) -> bool {
        self.validated_tube(tube_number)
            .map(|tube| tube.has_weapon())
            .unwrap_or(false)
    }

    /// Whether an assign of `kind` to `tube_number` would be accepted.
    pub fn can_assign(&self, tube_number: u16, kind: WeaponKind) -> bool {
        self.validated_tube(tube_number)
            .map(|tube| !tube.has_weapon() && self.factory.is_supported(kind))
            .unwrap_or(false)
    }

    // --- Weapon control ---

    pub fn request_state_change(&self, request: ControlRequest) -> Result<()> {
        let tube = self.validated_tube(request.tube_number)?;
        tube.request_state_change(request.target_state, request.cancel)
    }

    /// Best-effort broadcast to every assigned tube. Succeeds only if
    /// every tube accepted; failures are aggregated per tube.
    pub fn request_all_state_change(&self, new_state: ControlState) -> Result<()> {
        let mut failures = Vec::new();
        for tube in self.assigned_tubes() {
            if let Err(e) = tube.request_state_change(new_state, CancelToken::new()) {
                failures.push((tube.tube_number(), e.to_string()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WcsError::Broadcast { failures })
        }
    }

    pub fn can_change_state(&self, tube_number: u16, new_state: ControlState) -> bool {
        self.validated_tube(tube_number)
            .map(|tube| tube.can_change_state(new_state))
            .unwrap_or(false)
    }

    /// Abort launching weapons, power down the rest.
    ///
    /// Abort handles are pre-cancelled so the launching tube's transition
    /// releases immediately. Tubes already in `Off` are left alone.
    /// Partial failures are aggregated with the offending tube numbers.
    pub fn emergency_stop(&self) -> Result<()> {
        warn!("emergency stop initiated");

        let mut failures = Vec::new();
        for tube in self.assigned_tubes() {
            let current = tube.weapon_state();
            let (target, token) = if current == ControlState::Launch {
                (ControlState::Abort, CancelToken::cancelled())
            } else if current == ControlState::Off {
                continue;
            } else {
                (ControlState::Off, CancelToken::new())
            };

            if let Err(e) = tube.request_state_change(target, token) {
                failures.push((tube.tube_number(), e.to_string()));
            }
        }

        if failures.is_empty() {
            info!("emergency stop complete");
            Ok(())
        } else {
            Err(WcsError::Broadcast { failures })
        }
    }

    // --- Environment updates ---

    pub fn update_own_ship(&self, nav: OwnShipNav) {
        {
            let mut environment = self
                .environment
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            environment.own_ship = Some(nav);
        }
        for tube in self.assigned_tubes() {
            tube.update_own_ship(nav);
        }
    }

    /// Record a target update in the cache, then fan it out.
    pub fn update_target(&self, track: TargetTrack) {
        self.targets.update(track);
        for tube in self.assigned_tubes() {
            tube.update_target(&track);
        }
    }

    pub fn set_axis_center(&self, center: GeoPoint) {
        {
            let mut environment = self
                .environment
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            environment.axis_center = center;
        }
        for tube in self.assigned_tubes() {
            tube.set_axis_center(center);
        }
    }

    // --- Route and plan management ---

    pub fn update_waypoints(&self, request: WaypointRequest) -> Result<()> {
        let tube = self.validated_tube(request.tube_number)?;
        tube.update_waypoints(request.waypoints)
    }

    pub fn calculate_engagement_plan(&self, tube_number: u16) -> Result<()> {
        let tube = self.validated_tube(tube_number)?;
        tube.calculate_engagement_plan()
    }

    pub fn calculate_all_engagement_plans(&self) {
        for tube in self.assigned_tubes() {
            tube.calculate_engagement_plan().ok();
        }
    }

    // --- Periodic update ---

    pub fn update(&self) {
        for tube in self.assigned_tubes() {
            tube.update();
        }
    }

    // --- Status queries ---

    pub fn tube_status(&self, tube_number: u16) -> Result<TubeStatus> {
        Ok(self.validated_tube(tube_number)?.status())
    }

    pub fn all_tube_status(&self) -> Vec<TubeStatus> {
        self.all_tubes().iter().map(|tube| tube.status()).collect()
    }

    pub fn engagement_plan(&self, tube_number: u16) -> Result<EngagementPlan> {
        Ok(self.validated_tube(tube_number)?.engagement_plan())
    }

    pub fn all_engagement_plans(&self) -> Vec<EngagementPlan> {
        self.assigned_tubes()
            .iter()
            .map(|tube| tube.engagement_plan())
            .collect()
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned_tubes().len()
    }

    pub fn ready_count(&self) -> usize {
        self.assigned_tubes()
            .iter()
            .filter(|tube| tube.weapon_state() == ControlState::Rtl)
            .count()
    }

    pub fn counts(&self) -> FleetCounts {
        FleetCounts {
            assigned: self.assigned_count(),
            ready: self.ready_count(),
        }
    }

    pub fn is_valid_tube_number(&self, tube_number: u16) -> bool {
        (MIN_TUBE_NUMBER..=self.max_tubes).contains(&tube_number)
    }

    /// Direct access to one tube (validated).
    pub fn tube(&self, tube_number: u16) -> Result<Arc<LaunchTube>> {
        self.validated_tube(tube_number)
    }

    // --- Callback registration ---

    pub fn set_state_change_callback(&self, callback: StateChangeFn) {
        if let Ok(mut slot) = self.callbacks.state_change.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_launch_status_callback(&self, callback: LaunchStatusFn) {
        if let Ok(mut slot) = self.callbacks.launch_status.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_engagement_plan_callback(&self, callback: EngagementPlanFn) {
        if let Ok(mut slot) = self.callbacks.engagement_plan.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_assignment_change_callback(&self, callback: AssignmentChangeFn) {
        if let Ok(mut slot) = self.callbacks.assignment_change.lock() {
            *slot = Some(callback);
        }
    }

    // --- Internals ---

    fn validated_tube(&self, tube_number: u16) -> Result<Arc<LaunchTube>> {
        if !self.is_valid_tube_number(tube_number) {
            return Err(WcsError::InvalidTubeNumber(tube_number));
        }
        let tubes = self.tubes.read().unwrap_or_else(PoisonError::into_inner);
        tubes
            .get((tube_number - MIN_TUBE_NUMBER) as usize)
            .cloned()
            .ok_or(WcsError::InvalidTubeNumber(tube_number))
    }

    fn all_tubes(&self) -> Vec<Arc<LaunchTube>> {
        self.tubes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn assigned_tubes(&self) -> Vec<Arc<LaunchTube>> {
        self.all_tubes()
            .into_iter()
            .filter(|tube| tube.has_weapon())
            .collect()
    }

    fn notify_assignment(&self, tube_number: u16, kind: WeaponKind, assigned: bool) {
        if let Ok(callback) = self.callbacks.assignment_change.lock() {
            if let Some(callback) = callback.as_ref() {
                callback(tube_number, kind, assigned);
            }
        }
    }
}
