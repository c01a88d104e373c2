//! Control loop thread — drives the periodic work of the service.
//!
//! Commands arrive via an `mpsc` channel and are applied at the next
//! tick boundary. Each cadence (tube update, engagement-plan recompute,
//! status report) comes from the system configuration; the latest status
//! snapshot is stored in shared state for synchronous polling.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use seafire_core::commands::FleetCommand;
use seafire_core::state::TubeStatus;

use crate::service::WeaponControlService;

/// Age past which cached targets are evicted.
const TARGET_MAX_AGE: Duration = Duration::from_secs(300);

/// Cadence of the target-cache cleanup pass.
const TARGET_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to a running control loop.
pub struct ControlLoopHandle {
    command_tx: mpsc::Sender<FleetCommand>,
    latest_status: Arc<Mutex<Vec<TubeStatus>>>,
    join: Option<JoinHandle<()>>,
}

impl ControlLoopHandle {
    /// Queue a command for the next tick boundary.
    pub fn send(&self, command: FleetCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    /// The most recent status snapshot published by the loop.
    pub fn latest_status(&self) -> Vec<TubeStatus> {
        self.latest_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.command_tx.send(FleetCommand::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the control loop in a named thread.
pub fn spawn_control_loop(service: Arc<WeaponControlService>) -> ControlLoopHandle {
    let (command_tx, command_rx) = mpsc::channel::<FleetCommand>();
    let latest_status = Arc::new(Mutex::new(Vec::new()));

    let shared_status = latest_status.clone();
    let join = std::thread::Builder::new()
        .name("seafire-control-loop".into())
        .spawn(move || run_control_loop(&service, &command_rx, &shared_status))
        .ok();

    if join.is_none() {
        warn!("control loop thread failed to start");
    }

    ControlLoopHandle {
        command_tx,
        latest_status,
        join,
    }
}

/// The loop. Runs until a Shutdown command or channel disconnect.
fn run_control_loop(
    service: &WeaponControlService,
    command_rx: &mpsc::Receiver<FleetCommand>,
    latest_status: &Mutex<Vec<TubeStatus>>,
) {
    let system = &service.config().system;
    let tick = Duration::from_millis(system.update_interval_ms.max(1));
    let plan_interval = Duration::from_millis(system.engagement_plan_interval_ms.max(1));
    let status_interval = Duration::from_millis(system.status_report_interval_ms.max(1));

    info!(
        tick_ms = tick.as_millis() as u64,
        plan_ms = plan_interval.as_millis() as u64,
        status_ms = status_interval.as_millis() as u64,
        "control loop started"
    );

    let mut next_tick_time = Instant::now();
    let mut last_plan_pass = Instant::now();
    let mut last_status_pass = Instant::now();
    let mut last_target_cleanup = Instant::now();

    loop {
        // 1. Drain all pending commands.
        loop {
            match command_rx.try_recv() {
                Ok(FleetCommand::Shutdown) => {
                    info!("control loop stopping");
                    return;
                }
                Ok(command) => service.handle_command(command),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => return,
            }
        }

        // 2. Tick every assigned tube.
        service.update();

        // 3. Cadenced work.
        let now = Instant::now();
        if now.duration_since(last_plan_pass) >= plan_interval {
            service.calculate_all_engagement_plans();
            last_plan_pass = now;
        }
        if now.duration_since(last_status_pass) >= status_interval {
            let snapshot = service.all_tube_status();
            if let Ok(mut latest) = latest_status.lock() {
                *latest = snapshot;
            }
            last_status_pass = now;
        }
        if now.duration_since(last_target_cleanup) >= TARGET_CLEANUP_INTERVAL {
            service.clear_old_targets(TARGET_MAX_AGE);
            last_target_cleanup = now;
        }

        // 4. Sleep until the next tick.
        next_tick_time += tick;
        let now = Instant::now();
        if next_tick_time > now {
            std::thread::sleep(next_tick_time - now);
        } else if now - next_tick_time > tick * 2 {
            // Too far behind: reset to avoid a catch-up spiral.
            next_tick_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seafire_core::commands::ControlRequest;
    use seafire_core::config::SystemConfig;
    use seafire_core::enums::{ControlState, WeaponKind};
    use seafire_core::types::{AssignmentInfo, GeoPoint3};
    use tempfile::TempDir;

    fn test_service(dir: &TempDir) -> Arc<WeaponControlService> {
        let mut config = SystemConfig::default();
        config.system.update_interval_ms = 10;
        config.system.engagement_plan_interval_ms = 20;
        config.system.status_report_interval_ms = 20;
        config.weapon.default_launch_delay_secs = 0.05;
        config.paths.mine_data_path = dir.path().to_path_buf();
        let service = Arc::new(WeaponControlService::new(config));
        service.initialize().unwrap();
        service
    }

    #[test]
    fn test_command_channel_round_trip() {
        let (tx, rx) = mpsc::channel::<FleetCommand>();

        tx.send(FleetCommand::Control(ControlRequest::new(2, ControlState::On)))
            .unwrap();
        tx.send(FleetCommand::EmergencyStop).unwrap();
        tx.send(FleetCommand::Shutdown).unwrap();

        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }

        assert_eq!(commands.len(), 3);
        assert!(matches!(
            commands[0],
            FleetCommand::Control(ControlRequest {
                tube_number: 2,
                target_state: ControlState::On,
                ..
            })
        ));
        assert!(matches!(commands[1], FleetCommand::EmergencyStop));
        assert!(matches!(commands[2], FleetCommand::Shutdown));
    }

    #[test]
    fn test_loop_publishes_status_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let handle = spawn_control_loop(service.clone());

        assert!(handle.send(FleetCommand::Assign(AssignmentInfo {
            tube_number: 2,
            kind: WeaponKind::Alm,
            system_target_id: 0,
            target_pos: GeoPoint3::new(35.1, 129.1, 0.0),
            drop_plan: None,
        })));

        // Give the loop a few ticks to apply the command and publish.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let status = handle.latest_status();
            if status.iter().any(|s| s.tube_number == 2 && s.has_weapon) {
                break;
            }
            assert!(Instant::now() < deadline, "status never published");
            std::thread::sleep(Duration::from_millis(10));
        }

        // The loop's plan cadence validates the direct-target solution.
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let status = handle.latest_status();
            if status
                .iter()
                .any(|s| s.tube_number == 2 && s.plan_valid)
            {
                break;
            }
            assert!(Instant::now() < deadline, "plan never became valid");
            std::thread::sleep(Duration::from_millis(10));
        }

        handle.shutdown();
        assert!(service.tube_status(2).unwrap().has_weapon);
    }
}
