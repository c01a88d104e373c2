//! Weapon-control service facade.
//!
//! Wires the fleet manager, the target cache, and the mine plan store
//! together behind the operator command surface. The transport layer
//! hands commands and telemetry to this type; the control loop drives
//! its periodic work.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use seafire_core::commands::{
    ControlRequest, EditedPlanList, FleetCommand, SelectedPlan, WaypointRequest,
};
use seafire_core::config::SystemConfig;
use seafire_core::enums::{ControlState, WeaponKind};
use seafire_core::events::{
    AssignmentChangeFn, EngagementPlanFn, LaunchStatusFn, StateChangeFn,
};
use seafire_core::state::{FleetCounts, MineEngagementView, MissileEngagementView, TubeStatus};
use seafire_core::types::{
    AssignmentInfo, DropPlanRef, EngagementPlan, GeoPoint, MinePlan, OwnShipNav, TargetTrack,
};
use seafire_core::{Result, WcsError};

use seafire_plans::MinePlanStore;

use crate::factory::WeaponFactory;
use crate::fleet::LaunchTubeManager;
use crate::targets::TargetCache;

/// The core business-logic facade.
pub struct WeaponControlService {
    config: SystemConfig,
    fleet: LaunchTubeManager,
    targets: Arc<TargetCache>,
    plans: Arc<MinePlanStore>,
    selected_plan: Mutex<Option<SelectedPlan>>,
}

impl WeaponControlService {
    /// Build the full subsystem stack from one configuration snapshot.
    pub fn new(config: SystemConfig) -> Self {
        let factory = Arc::new(WeaponFactory::with_defaults(&config));
        let targets = Arc::new(TargetCache::new());
        let plans = Arc::new(MinePlanStore::new(&config));
        let fleet = LaunchTubeManager::new(&config, factory, plans.clone(), targets.clone());

        Self {
            config,
            fleet,
            targets,
            plans,
            selected_plan: Mutex::new(None),
        }
    }

    /// Bring the plan store and the tube bank up.
    pub fn initialize(&self) -> Result<()> {
        self.plans.initialize()?;
        self.fleet.initialize()?;
        info!("weapon control service initialized");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.fleet.shutdown();
        info!("weapon control service shut down");
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // --- Operator commands ---

    /// Assign a weapon. A mine assignment without explicit drop-plan
    /// coordinates falls back to the operator-selected plan.
    pub fn assign(&self, mut info: AssignmentInfo) -> Result<()> {
        if info.kind == WeaponKind::Mine && info.drop_plan.is_none() {
            let selected = self
                .selected_plan
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .ok_or_else(|| {
                    WcsError::InvalidPlan("no drop plan selected for mine assignment".into())
                })?;
            info.drop_plan = Some(DropPlanRef {
                list_number: selected.list_number,
                plan_number: selected.plan_number,
            });
        }
        self.fleet.assign(info)
    }

    pub fn unassign(&self, tube_number: u16) -> Result<()> {
        self.fleet.unassign(tube_number)
    }

    pub fn control(&self, request: ControlRequest) -> Result<()> {
        self.fleet.request_state_change(request)
    }

    pub fn request_all_state_change(&self, new_state: ControlState) -> Result<()> {
        self.fleet.request_all_state_change(new_state)
    }

    pub fn update_waypoints(&self, request: WaypointRequest) -> Result<()> {
        self.fleet.update_waypoints(request)
    }

    pub fn emergency_stop(&self) -> Result<()> {
        self.fleet.emergency_stop()
    }

    /// Entry point for commands arriving over the control-loop channel.
    pub fn handle_command(&self, command: FleetCommand) {
        let result = match command {
            FleetCommand::Assign(info) => self.assign(info),
            FleetCommand::Unassign(tube_number) => self.unassign(tube_number),
            FleetCommand::Control(request) => self.control(request),
            FleetCommand::Waypoints(request) => self.update_waypoints(request),
            FleetCommand::EmergencyStop => self.emergency_stop(),
            FleetCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            warn!(code = e.code(), error = %e, "command rejected");
        }
    }

    // --- Inbound telemetry ---

    pub fn update_own_ship(&self, nav: OwnShipNav) {
        self.fleet.update_own_ship(nav);
    }

    pub fn update_target(&self, track: TargetTrack) {
        self.fleet.update_target(track);
    }

    pub fn set_axis_center(&self, center: GeoPoint) {
        self.fleet.set_axis_center(center);
    }

    // --- Mine plan management ---

    /// Replace one plan list wholesale with an operator-edited payload.
    pub fn apply_edited_plan_list(&self, edited: EditedPlanList) -> Result<()> {
        self.plans.save(edited.list_number, &edited.plans)
    }

    /// Record the operator's drop-plan selection for later assignments.
    pub fn select_plan(&self, selection: SelectedPlan) -> Result<()> {
        // Reject selections that do not resolve to a stored plan.
        self.plans
            .get_plan(selection.list_number, selection.plan_number)?;
        if let Ok(mut selected) = self.selected_plan.lock() {
            *selected = Some(selection);
        }
        info!(
            list_number = selection.list_number,
            plan_number = selection.plan_number,
            "drop plan selected"
        );
        Ok(())
    }

    pub fn selected_plan(&self) -> Option<SelectedPlan> {
        self.selected_plan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .copied()
    }

    pub fn plan_list(&self, list_number: u32) -> Vec<MinePlan> {
        self.plans.get_list(list_number)
    }

    pub fn get_plan(&self, list_number: u32, plan_number: u16) -> Result<MinePlan> {
        self.plans.get_plan(list_number, plan_number)
    }

    pub fn plan_store(&self) -> &Arc<MinePlanStore> {
        &self.plans
    }

    // --- Status queries ---

    pub fn tube_status(&self, tube_number: u16) -> Result<TubeStatus> {
        self.fleet.tube_status(tube_number)
    }

    pub fn all_tube_status(&self) -> Vec<TubeStatus> {
        self.fleet.all_tube_status()
    }

    pub fn engagement_plan(&self, tube_number: u16) -> Result<EngagementPlan> {
        self.fleet.engagement_plan(tube_number)
    }

    pub fn all_engagement_plans(&self) -> Vec<EngagementPlan> {
        self.fleet.all_engagement_plans()
    }

    pub fn missile_engagement(&self, tube_number: u16) -> Result<MissileEngagementView> {
        let tube = self.fleet.tube(tube_number)?;
        if !tube.has_weapon() {
            return Err(WcsError::TubeEmpty(tube_number));
        }
        tube.missile_view().ok_or_else(|| {
            WcsError::InvalidPlan(format!("tube {tube_number} is not a missile tube"))
        })
    }

    pub fn mine_engagement(&self, tube_number: u16) -> Result<MineEngagementView> {
        let tube = self.fleet.tube(tube_number)?;
        if !tube.has_weapon() {
            return Err(WcsError::TubeEmpty(tube_number));
        }
        tube.mine_view()
            .ok_or_else(|| WcsError::InvalidPlan(format!("tube {tube_number} is not a mine tube")))
    }

    pub fn counts(&self) -> FleetCounts {
        self.fleet.counts()
    }

    // --- Periodic work ---

    pub fn update(&self) {
        self.fleet.update();
    }

    pub fn calculate_all_engagement_plans(&self) {
        self.fleet.calculate_all_engagement_plans();
    }

    pub fn clear_old_targets(&self, max_age: Duration) {
        self.targets.clear_old(max_age);
    }

    // --- Callback registration ---

    pub fn set_state_change_callback(&self, callback: StateChangeFn) {
        self.fleet.set_state_change_callback(callback);
    }

    pub fn set_launch_status_callback(&self, callback: LaunchStatusFn) {
        self.fleet.set_launch_status_callback(callback);
    }

    pub fn set_engagement_plan_callback(&self, callback: EngagementPlanFn) {
        self.fleet.set_engagement_plan_callback(callback);
    }

    pub fn set_assignment_change_callback(&self, callback: AssignmentChangeFn) {
        self.fleet.set_assignment_change_callback(callback);
    }
}
