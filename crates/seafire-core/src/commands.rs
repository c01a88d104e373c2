//! Operator command records delivered by the external wire layer.
//!
//! Commands are validated by the fleet manager and dispatched to the
//! target tube. The wire encoding belongs to the transport collaborator;
//! these are the semantic schemas.

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::enums::ControlState;
use crate::types::{AssignmentInfo, MinePlan, Waypoint};

/// Request to drive one weapon to a new control state.
///
/// The cancellation handle is owned by the transport layer, not the wire
/// format: a deserialized request starts with a fresh token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlRequest {
    pub tube_number: u16,
    pub target_state: ControlState,
    #[serde(skip, default)]
    pub cancel: CancelToken,
}

impl ControlRequest {
    pub fn new(tube_number: u16, target_state: ControlState) -> Self {
        Self {
            tube_number,
            target_state,
            cancel: CancelToken::new(),
        }
    }
}

/// Replacement route for one tube's weapon (at most 8 waypoints).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaypointRequest {
    pub tube_number: u16,
    pub waypoints: Vec<Waypoint>,
}

/// Full replacement payload for one mine drop-plan list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditedPlanList {
    pub list_number: u32,
    pub plans: Vec<MinePlan>,
}

/// Operator selection of the active drop plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectedPlan {
    pub list_number: u32,
    pub plan_number: u16,
}

/// Commands forwarded from the transport layer to the control loop thread.
#[derive(Debug)]
pub enum FleetCommand {
    /// Bind a weapon to a tube.
    Assign(AssignmentInfo),
    /// Release a tube's weapon.
    Unassign(u16),
    /// Drive one weapon through a state transition.
    Control(ControlRequest),
    /// Replace one weapon's route.
    Waypoints(WaypointRequest),
    /// Abort launching weapons, power down the rest.
    EmergencyStop,
    /// Shut down the control loop thread gracefully.
    Shutdown,
}
