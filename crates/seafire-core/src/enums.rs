//! Enumeration types used throughout the weapon-control system.

use serde::{Deserialize, Serialize};

/// Weapon kind carried by a launch tube.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Anti-land missile.
    Alm,
    /// Anti-ship missile.
    Asm,
    /// Anti-air missile.
    Aam,
    /// Wire-guided torpedo.
    Wgt,
    /// Self-propelled mine (follows a pre-planned drop trajectory).
    Mine,
    /// No weapon / unknown kind.
    #[default]
    Na,
}

impl WeaponKind {
    /// Short display label matching operator console conventions.
    pub fn label(self) -> &'static str {
        match self {
            WeaponKind::Alm => "ALM",
            WeaponKind::Asm => "ASM",
            WeaponKind::Aam => "AAM",
            WeaponKind::Wgt => "WGT",
            WeaponKind::Mine => "MINE",
            WeaponKind::Na => "NA",
        }
    }
}

/// Weapon control state.
///
/// The lifecycle is operator-driven: power-on takes the weapon through a
/// transient power-on-check, interlocks gate ready-to-launch, and the
/// launch sequence ends with the weapon leaving the tube.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlState {
    /// Powered down. Initial state.
    #[default]
    Off,
    /// Power-on check in progress (transient, entered only during turn-on).
    Poc,
    /// Powered, interlocks not yet satisfied.
    On,
    /// Ready to launch: interlocks satisfied and fire solution valid.
    Rtl,
    /// Launch sequence executing.
    Launch,
    /// Weapon has left the tube; position is tracked as an estimate.
    PostLaunch,
    /// Launch aborted; requires Off before any further use.
    Abort,
}

impl ControlState {
    /// Short display label matching operator console conventions.
    pub fn label(self) -> &'static str {
        match self {
            ControlState::Off => "OFF",
            ControlState::Poc => "POC",
            ControlState::On => "ON",
            ControlState::Rtl => "RTL",
            ControlState::Launch => "LAUNCH",
            ControlState::PostLaunch => "POST_LAUNCH",
            ControlState::Abort => "ABORT",
        }
    }

    /// Whether `self -> next` is a legal operator-requested transition.
    ///
    /// Abort is not listed here: an abort request is always accepted and
    /// handled separately by the state machine.
    pub fn can_transition_to(self, next: ControlState) -> bool {
        use ControlState::*;
        matches!(
            (self, next),
            (Off, On) | (On, Off) | (Rtl, Launch) | (Rtl, Off) | (Launch, Abort) | (Abort, Off) | (PostLaunch, Off)
        )
    }
}
