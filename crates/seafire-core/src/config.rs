//! System configuration.
//!
//! Loaded once at startup from a TOML file and injected into each
//! subsystem as a read-only snapshot. Every key has a default so a
//! missing file or a partial file still yields a working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WcsError};

/// Complete system configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub system: SystemSection,
    pub paths: PathsSection,
    pub mine_drop_plan: MineDropPlanSection,
    pub weapon: WeaponSection,
}

/// `[system]` — bank size and periodic work cadences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSection {
    pub max_launch_tubes: u16,
    pub update_interval_ms: u64,
    pub engagement_plan_interval_ms: u64,
    pub status_report_interval_ms: u64,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            max_launch_tubes: 6,
            update_interval_ms: 100,
            engagement_plan_interval_ms: 1000,
            status_report_interval_ms: 1000,
        }
    }
}

/// `[paths]` — on-disk locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub mine_data_path: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            mine_data_path: PathBuf::from("data/mine_plans"),
        }
    }
}

/// `[mine_drop_plan]` — plan library capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MineDropPlanSection {
    pub max_plan_lists: u32,
    pub max_plans_per_list: usize,
}

impl Default for MineDropPlanSection {
    fn default() -> Self {
        Self {
            max_plan_lists: 15,
            max_plans_per_list: 15,
        }
    }
}

/// `[weapon]` — kind performance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponSection {
    pub default_launch_delay_secs: f64,
    pub mine_speed_mps: f64,
    pub alm_max_range_km: f64,
    pub asm_max_range_km: f64,
    pub aam_max_range_km: f64,
    pub alm_speed_mps: f64,
    pub asm_speed_mps: f64,
    pub aam_speed_mps: f64,
}

impl Default for WeaponSection {
    fn default() -> Self {
        Self {
            default_launch_delay_secs: 3.0,
            mine_speed_mps: 5.0,
            alm_max_range_km: 50.0,
            asm_max_range_km: 100.0,
            aam_max_range_km: 80.0,
            alm_speed_mps: 300.0,
            asm_speed_mps: 400.0,
            aam_speed_mps: 350.0,
        }
    }
}

impl SystemConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            WcsError::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            WcsError::Config(format!("cannot parse {}: {e}", path.as_ref().display()))
        })
    }

    /// Load from a file if it exists and parses, otherwise fall back to
    /// the built-in defaults.
    pub fn load_with_defaults<P: AsRef<Path>>(path: Option<P>) -> Self {
        if let Some(p) = path {
            if p.as_ref().exists() {
                if let Ok(config) = Self::from_file(p) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Write the current configuration back out as TOML.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WcsError::Config(format!("cannot serialize configuration: {e}")))?;
        std::fs::write(&path, content).map_err(|e| {
            WcsError::Config(format!("cannot write {}: {e}", path.as_ref().display()))
        })
    }
}
