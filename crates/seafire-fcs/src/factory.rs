//! Weapon construction registry.
//!
//! Maps each weapon kind to the template used to build its state machine
//! and planner. One factory instance is built at startup from the system
//! configuration and injected wherever construction happens; the
//! registry can be extended at runtime.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use seafire_core::config::SystemConfig;
use seafire_core::enums::WeaponKind;
use seafire_core::types::{LaunchStep, WeaponSpec};
use seafire_core::{Result, WcsError};

use crate::planner::EngagementPlanner;
use crate::weapon::Weapon;

/// Per-kind construction parameters.
#[derive(Debug, Clone)]
pub struct WeaponTemplate {
    pub spec: WeaponSpec,
    pub power_on_delay_secs: f64,
    pub launch_steps: Vec<LaunchStep>,
}

/// Registry of supported weapon kinds.
pub struct WeaponFactory {
    templates: RwLock<HashMap<WeaponKind, WeaponTemplate>>,
}

impl WeaponFactory {
    /// A factory with the four standard kinds registered (ALM, ASM, AAM,
    /// MINE). Everything else reports unsupported.
    pub fn with_defaults(config: &SystemConfig) -> Self {
        let weapon = &config.weapon;
        let delay = weapon.default_launch_delay_secs;

        let factory = Self {
            templates: RwLock::new(HashMap::new()),
        };

        factory.register(
            WeaponKind::Alm,
            standard_template(
                WeaponSpec::new("ALM", weapon.alm_max_range_km, weapon.alm_speed_mps, delay),
                delay,
            ),
        );
        factory.register(
            WeaponKind::Asm,
            standard_template(
                WeaponSpec::new("ASM", weapon.asm_max_range_km, weapon.asm_speed_mps, delay),
                delay,
            ),
        );
        factory.register(
            WeaponKind::Aam,
            standard_template(
                WeaponSpec::new("AAM", weapon.aam_max_range_km, weapon.aam_speed_mps, delay),
                delay,
            ),
        );
        factory.register(
            WeaponKind::Mine,
            standard_template(
                WeaponSpec::new("MINE", 30.0, weapon.mine_speed_mps, delay),
                delay,
            ),
        );

        factory
    }

    /// Register or replace the template for a kind.
    pub fn register(&self, kind: WeaponKind, template: WeaponTemplate) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, template);
    }

    pub fn is_supported(&self, kind: WeaponKind) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }

    pub fn specification(&self, kind: WeaponKind) -> Result<WeaponSpec> {
        self.template(kind).map(|t| t.spec)
    }

    pub fn create_weapon(&self, kind: WeaponKind) -> Result<Arc<Weapon>> {
        let template = self.template(kind)?;
        Ok(Arc::new(Weapon::new(
            kind,
            template.spec,
            template.power_on_delay_secs,
            template.launch_steps,
        )))
    }

    pub fn create_planner(&self, kind: WeaponKind) -> Result<EngagementPlanner> {
        let template = self.template(kind)?;
        Ok(match kind {
            WeaponKind::Mine => EngagementPlanner::mine(template.spec.speed_mps),
            _ => EngagementPlanner::missile(kind, template.spec.speed_mps),
        })
    }

    fn template(&self, kind: WeaponKind) -> Result<WeaponTemplate> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .ok_or(WcsError::UnsupportedKind(kind))
    }
}

/// The standard three-step launch sequence; the steps split the
/// configured launch delay evenly so the sequence total equals it.
fn standard_template(spec: WeaponSpec, launch_delay_secs: f64) -> WeaponTemplate {
    let step = launch_delay_secs / 3.0;
    let name = spec.name.clone();
    WeaponTemplate {
        power_on_delay_secs: launch_delay_secs,
        launch_steps: vec![
            LaunchStep::new(&format!("{name} power-on check"), step),
            LaunchStep::new(&format!("{name} system verification"), step),
            LaunchStep::new(&format!("{name} launch sequence"), step),
        ],
        spec,
    }
}
