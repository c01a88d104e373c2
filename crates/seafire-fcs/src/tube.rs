//! Launch tube: the container binding one weapon to its planner.
//!
//! The tube registers itself as the weapon's observer through a weak
//! reference, so the weapon never keeps its tube alive; teardown removes
//! the registration. Tube locks are never held across weapon transition
//! calls, which may block for seconds.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, info};

use seafire_core::cancel::CancelToken;
use seafire_core::enums::{ControlState, WeaponKind};
use seafire_core::events::{EngagementPlanFn, LaunchStatusFn, StateChangeFn, WeaponObserver};
use seafire_core::state::{MineEngagementView, MissileEngagementView, TubeStatus};
use seafire_core::types::{AssignmentInfo, EngagementPlan, GeoPoint, OwnShipNav, TargetTrack, Waypoint};
use seafire_core::{Result, WcsError};

use crate::planner::EngagementPlanner;
use crate::weapon::Weapon;

struct TubeAssignment {
    weapon: Arc<Weapon>,
    planner: Mutex<EngagementPlanner>,
    info: AssignmentInfo,
}

/// Digest of the last reported plan, for change detection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PlanDigest {
    valid: bool,
    total_time_secs: f64,
    trajectory_len: usize,
}

/// One slot in the launcher bank.
pub struct LaunchTube {
    tube_number: u16,
    slot: Mutex<Option<TubeAssignment>>,
    last_plan: Mutex<PlanDigest>,
    state_change_callback: Mutex<Option<StateChangeFn>>,
    launch_status_callback: Mutex<Option<LaunchStatusFn>>,
    engagement_plan_callback: Mutex<Option<EngagementPlanFn>>,
}

impl LaunchTube {
    pub fn new(tube_number: u16) -> Self {
        Self {
            tube_number,
            slot: Mutex::new(None),
            last_plan: Mutex::new(PlanDigest::default()),
            state_change_callback: Mutex::new(None),
            launch_status_callback: Mutex::new(None),
            engagement_plan_callback: Mutex::new(None),
        }
    }

    // --- Basic information ---

    pub fn tube_number(&self) -> u16 {
        self.tube_number
    }

    pub fn has_weapon(&self) -> bool {
        self.lock_slot().is_some()
    }

    pub fn assignment_info(&self) -> Option<AssignmentInfo> {
        self.lock_slot().as_ref().map(|a| a.info)
    }

    // --- Assignment ---

    /// Bind a weapon and planner to this tube.
    ///
    /// Fails if the tube is occupied or the assignment targets another
    /// tube; a collaborator initialization failure leaves the tube empty.
    pub fn assign(
        self: &Arc<Self>,
        weapon: Arc<Weapon>,
        mut planner: EngagementPlanner,
        info: AssignmentInfo,
    ) -> Result<()> {
        if info.tube_number != self.tube_number {
            return Err(WcsError::InvalidTubeNumber(info.tube_number));
        }

        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(WcsError::TubeOccupied(self.tube_number));
        }

        weapon.initialize(self.tube_number)?;
        planner.initialize(self.tube_number);

        weapon.add_observer(self.observer_handle());
        *slot = Some(TubeAssignment {
            weapon,
            planner: Mutex::new(planner),
            info,
        });
        drop(slot);

        if let Ok(mut digest) = self.last_plan.lock() {
            *digest = PlanDigest::default();
        }

        info!(
            tube = self.tube_number,
            kind = info.kind.label(),
            "weapon assigned"
        );
        Ok(())
    }

    /// Detach the weapon: reset both collaborators, remove the observer
    /// registration, and empty the slot.
    pub fn clear(self: &Arc<Self>) {
        let assignment = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(assignment) = assignment {
            assignment.weapon.remove_observer(&self.observer_handle());
            assignment.weapon.reset();
            if let Ok(mut planner) = assignment.planner.lock() {
                planner.reset();
            }
            info!(tube = self.tube_number, "assignment cleared");
        }

        if let Ok(mut digest) = self.last_plan.lock() {
            *digest = PlanDigest::default();
        }
    }

    // --- Weapon control (delegation) ---

    /// Forward a state-change request to the weapon. Blocks for the
    /// duration of long-running transitions; no tube lock is held.
    pub fn request_state_change(&self, new_state: ControlState, token: CancelToken) -> Result<()> {
        let weapon = self.weapon()?;
        weapon.request_state_change(new_state, token)
    }

    pub fn weapon_state(&self) -> ControlState {
        self.lock_slot()
            .as_ref()
            .map(|a| a.weapon.current_state())
            .unwrap_or_default()
    }

    pub fn is_launched(&self) -> bool {
        self.lock_slot()
            .as_ref()
            .map(|a| a.weapon.is_launched())
            .unwrap_or(false)
    }

    /// Whether the weapon would accept `new_state` from its current state.
    pub fn can_change_state(&self, new_state: ControlState) -> bool {
        self.lock_slot()
            .as_ref()
            .map(|a| {
                new_state == ControlState::Abort
                    || a.weapon.current_state().can_transition_to(new_state)
            })
            .unwrap_or(false)
    }

    // --- Route management (delegation) ---

    pub fn update_waypoints(&self, waypoints: Vec<Waypoint>) -> Result<()> {
        {
            let mut slot = self.lock_slot();
            let assignment = slot.as_mut().ok_or(WcsError::TubeEmpty(self.tube_number))?;
            let mut planner = assignment
                .planner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            planner.update_waypoints(waypoints)?;
        }
        self.calculate_engagement_plan().ok();
        Ok(())
    }

    // --- Environment forwarding ---

    pub fn update_own_ship(&self, nav: OwnShipNav) {
        if let Some(assignment) = self.lock_slot().as_ref() {
            if let Ok(mut planner) = assignment.planner.lock() {
                planner.update_own_ship(nav);
            }
        }
    }

    pub fn update_target(&self, track: &TargetTrack) {
        if let Some(assignment) = self.lock_slot().as_ref() {
            if let Ok(mut planner) = assignment.planner.lock() {
                planner.update_target(track);
            }
        }
    }

    pub fn set_axis_center(&self, center: GeoPoint) {
        if let Some(assignment) = self.lock_slot().as_ref() {
            if let Ok(mut planner) = assignment.planner.lock() {
                planner.set_axis_center(center);
            }
        }
    }

    // --- Engagement plan ---

    /// Drive the planner and feed the result back into the weapon's
    /// fire-solution gate. The engagement-plan callback fires whenever
    /// the plan's validity, total time, or trajectory length changes.
    pub fn calculate_engagement_plan(&self) -> Result<()> {
        let (result, valid, plan, weapon) = {
            let slot = self.lock_slot();
            let assignment = slot.as_ref().ok_or(WcsError::TubeEmpty(self.tube_number))?;
            let mut planner = assignment
                .planner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let result = planner.calculate();
            (
                result,
                planner.is_valid(),
                planner.plan().clone(),
                assignment.weapon.clone(),
            )
        };

        weapon.set_fire_solution_ready(valid);
        self.notify_plan_change(&plan);
        result
    }

    pub fn engagement_plan(&self) -> EngagementPlan {
        self.lock_slot()
            .as_ref()
            .and_then(|a| a.planner.lock().ok().map(|p| p.plan().clone()))
            .unwrap_or_else(|| EngagementPlan::empty(self.tube_number, WeaponKind::Na))
    }

    pub fn is_plan_valid(&self) -> bool {
        self.lock_slot()
            .as_ref()
            .and_then(|a| a.planner.lock().ok().map(|p| p.is_valid()))
            .unwrap_or(false)
    }

    pub fn missile_view(&self) -> Option<MissileEngagementView> {
        self.lock_slot()
            .as_ref()
            .and_then(|a| a.planner.lock().ok().and_then(|p| p.missile_view()))
    }

    pub fn mine_view(&self) -> Option<MineEngagementView> {
        self.lock_slot()
            .as_ref()
            .and_then(|a| a.planner.lock().ok().and_then(|p| p.mine_view()))
    }

    // --- Periodic update ---

    /// Tick the weapon and planner; recompute the engagement plan while
    /// the weapon is still in the tube.
    pub fn update(&self) {
        let weapon = match self.lock_slot().as_ref() {
            Some(assignment) => assignment.weapon.clone(),
            None => return,
        };

        weapon.update();

        if let Some(assignment) = self.lock_slot().as_ref() {
            if let Ok(mut planner) = assignment.planner.lock() {
                planner.update();
            }
        }

        if !weapon.is_launched() {
            self.calculate_engagement_plan().ok();
        }
    }

    // --- Status ---

    pub fn status(&self) -> TubeStatus {
        let slot = self.lock_slot();
        match slot.as_ref() {
            Some(assignment) => TubeStatus {
                tube_number: self.tube_number,
                has_weapon: true,
                kind: assignment.weapon.kind(),
                state: assignment.weapon.current_state(),
                launched: assignment.weapon.is_launched(),
                plan_valid: assignment
                    .planner
                    .lock()
                    .map(|p| p.is_valid())
                    .unwrap_or(false),
            },
            None => TubeStatus {
                tube_number: self.tube_number,
                ..Default::default()
            },
        }
    }

    // --- Callback registration ---

    pub fn set_state_change_callback(&self, callback: StateChangeFn) {
        if let Ok(mut slot) = self.state_change_callback.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_launch_status_callback(&self, callback: LaunchStatusFn) {
        if let Ok(mut slot) = self.launch_status_callback.lock() {
            *slot = Some(callback);
        }
    }

    pub fn set_engagement_plan_callback(&self, callback: EngagementPlanFn) {
        if let Ok(mut slot) = self.engagement_plan_callback.lock() {
            *slot = Some(callback);
        }
    }

    // --- Internals ---

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<TubeAssignment>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn weapon(&self) -> Result<Arc<Weapon>> {
        self.lock_slot()
            .as_ref()
            .map(|a| a.weapon.clone())
            .ok_or(WcsError::TubeEmpty(self.tube_number))
    }

    fn observer_handle(self: &Arc<Self>) -> Weak<dyn WeaponObserver> {
        let as_observer: Arc<dyn WeaponObserver> = self.clone();
        Arc::downgrade(&as_observer)
    }

    fn notify_plan_change(&self, plan: &EngagementPlan) {
        let digest = PlanDigest {
            valid: plan.valid,
            total_time_secs: plan.total_time_secs,
            trajectory_len: plan.trajectory.len(),
        };

        let changed = match self.last_plan.lock() {
            Ok(mut last) => {
                let changed = *last != digest;
                *last = digest;
                changed
            }
            Err(_) => false,
        };

        if changed {
            if let Ok(callback) = self.engagement_plan_callback.lock() {
                if let Some(callback) = callback.as_ref() {
                    callback(self.tube_number, plan);
                }
            }
        }
    }
}

impl WeaponObserver for LaunchTube {
    fn on_state_changed(&self, tube_number: u16, old_state: ControlState, new_state: ControlState) {
        if tube_number != self.tube_number {
            return;
        }
        debug!(
            tube = self.tube_number,
            old = old_state.label(),
            new = new_state.label(),
            "weapon state changed"
        );
        if let Ok(callback) = self.state_change_callback.lock() {
            if let Some(callback) = callback.as_ref() {
                callback(tube_number, old_state, new_state);
            }
        }
    }

    fn on_launch_status_changed(&self, tube_number: u16, launched: bool) {
        if tube_number != self.tube_number {
            return;
        }

        // The planner tracks the weapon's position once it is away.
        if let Some(assignment) = self.lock_slot().as_ref() {
            if let Ok(mut planner) = assignment.planner.lock() {
                planner.set_launched(launched);
            }
        }

        if let Ok(callback) = self.launch_status_callback.lock() {
            if let Some(callback) = callback.as_ref() {
                callback(tube_number, launched);
            }
        }
    }
}
