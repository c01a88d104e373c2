//! Observer traits and callback types for state and launch events.

use crate::enums::{ControlState, WeaponKind};
use crate::types::EngagementPlan;

/// Subscriber to one weapon's state-change and launch-status events.
///
/// Observers are registered as non-owning `Weak` references and must
/// tolerate expiry: the dispatcher sweeps dead entries before each
/// notification. Calling back into the weapon's state machine from an
/// observer is not supported.
pub trait WeaponObserver: Send + Sync {
    fn on_state_changed(&self, tube_number: u16, old_state: ControlState, new_state: ControlState);

    fn on_launch_status_changed(&self, tube_number: u16, launched: bool);
}

/// Fleet-level state-change callback (tube, old, new).
pub type StateChangeFn = Box<dyn Fn(u16, ControlState, ControlState) + Send + Sync>;

/// Fleet-level launch-status callback (tube, launched).
pub type LaunchStatusFn = Box<dyn Fn(u16, bool) + Send + Sync>;

/// Fleet-level engagement-plan callback, fired when a tube's plan changes.
pub type EngagementPlanFn = Box<dyn Fn(u16, &EngagementPlan) + Send + Sync>;

/// Fleet-level assignment callback (tube, kind, assigned).
pub type AssignmentChangeFn = Box<dyn Fn(u16, WeaponKind, bool) + Send + Sync>;
