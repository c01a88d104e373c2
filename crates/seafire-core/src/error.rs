//! Error types for the weapon-control core.
//!
//! Every fallible operation returns [`WcsError`] on failure. Each variant
//! carries enough context to be surfaced directly to the operator console;
//! `code` preserves the numeric error code used in status reporting.

use thiserror::Error;

use crate::enums::{ControlState, WeaponKind};

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WcsError>;

/// Structured failure for all core operations.
#[derive(Debug, Error)]
pub enum WcsError {
    /// Tube number outside the configured bank (valid range starts at 1).
    #[error("invalid tube number {0}")]
    InvalidTubeNumber(u16),

    /// Assign requested on a tube that already holds a weapon.
    #[error("tube {0} already has an assigned weapon")]
    TubeOccupied(u16),

    /// Operation requested on a tube with no assigned weapon.
    #[error("tube {0} has no assigned weapon")]
    TubeEmpty(u16),

    /// The weapon factory has no entry for this kind.
    #[error("unsupported weapon kind {}", .0.label())]
    UnsupportedKind(WeaponKind),

    /// Requested edge is not in the control-state transition graph.
    #[error("invalid transition {} -> {}", from.label(), to.label())]
    InvalidTransition {
        from: ControlState,
        to: ControlState,
    },

    /// A long-running transition observed its cancellation handle.
    #[error("operation cancelled")]
    Cancelled,

    /// Waypoints or positions out of range, or a malformed plan.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The requested plan list or plan number does not exist.
    #[error("plan {plan_number} not found in list {list_number}")]
    PlanNotFound { list_number: u32, plan_number: u16 },

    /// Persisted store unreadable or unwritable.
    #[error("plan store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file unreadable or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A best-effort broadcast partially failed; per-tube reasons attached.
    #[error("{} tube(s) rejected the command: {}", failures.len(), format_failures(failures))]
    Broadcast { failures: Vec<(u16, String)> },
}

impl WcsError {
    /// Numeric code for status reporting.
    pub fn code(&self) -> i32 {
        match self {
            WcsError::InvalidTubeNumber(_) => 1,
            WcsError::TubeOccupied(_) => 2,
            WcsError::TubeEmpty(_) => 3,
            WcsError::UnsupportedKind(_) => 4,
            WcsError::InvalidTransition { .. } => 5,
            WcsError::Cancelled => 6,
            WcsError::InvalidPlan(_) => 7,
            WcsError::PlanNotFound { .. } => 8,
            WcsError::Io(_) => 9,
            WcsError::Config(_) => 10,
            WcsError::Broadcast { .. } => 11,
        }
    }
}

fn format_failures(failures: &[(u16, String)]) -> String {
    failures
        .iter()
        .map(|(tube, reason)| format!("tube {tube}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}
