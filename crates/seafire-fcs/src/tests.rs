//! End-to-end tests for the weapon-control service: assignment, state
//! machine scenarios, emergency stop, target resolution, and the mine
//! plan round trip.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use seafire_core::commands::{ControlRequest, EditedPlanList, SelectedPlan, WaypointRequest};
use seafire_core::config::SystemConfig;
use seafire_core::enums::{ControlState, WeaponKind};
use seafire_core::types::{
    AssignmentInfo, DropPlanRef, GeoPoint, GeoPoint3, MinePlan, OwnShipNav, TargetTrack, Waypoint,
};
use seafire_core::WcsError;

use crate::service::WeaponControlService;

/// Test-scaled configuration: the standard 3-second sequences shrink to
/// 300 ms so scenario timing stays observable without slow tests.
fn test_config(dir: &TempDir) -> SystemConfig {
    let mut config = SystemConfig::default();
    config.weapon.default_launch_delay_secs = 0.3;
    config.paths.mine_data_path = dir.path().to_path_buf();
    config
}

fn test_service(dir: &TempDir) -> Arc<WeaponControlService> {
    let service = Arc::new(WeaponControlService::new(test_config(dir)));
    service.initialize().unwrap();
    service
}

fn alm_assignment(tube_number: u16) -> AssignmentInfo {
    AssignmentInfo {
        tube_number,
        kind: WeaponKind::Alm,
        system_target_id: 0,
        target_pos: GeoPoint3::new(35.1, 129.1, 0.0),
        drop_plan: None,
    }
}

fn own_ship() -> OwnShipNav {
    OwnShipNav {
        position: GeoPoint3::new(35.0, 129.0, 0.0),
        course_deg: 90.0,
        speed_mps: 10.0,
    }
}

fn store_drop_plan(service: &WeaponControlService) {
    service
        .apply_edited_plan_list(EditedPlanList {
            list_number: 3,
            plans: vec![MinePlan {
                plan_number: 42,
                launch_pos: GeoPoint::new(35.0, 129.0),
                drop_pos: GeoPoint::new(35.5, 129.5),
                waypoints: vec![
                    Waypoint::new(35.1, 129.1, 0.0),
                    Waypoint::new(35.2, 129.2, 0.0),
                ],
            }],
        })
        .unwrap();
}

fn mine_assignment(tube_number: u16) -> AssignmentInfo {
    AssignmentInfo {
        tube_number,
        kind: WeaponKind::Mine,
        system_target_id: 0,
        target_pos: GeoPoint3::default(),
        drop_plan: Some(DropPlanRef {
            list_number: 3,
            plan_number: 42,
        }),
    }
}

// ---- Scenario: happy-path ALM launch ----

#[test]
fn test_happy_path_alm_launch() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);

    let state_events: Arc<Mutex<Vec<(u16, ControlState, ControlState)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let launch_events: Arc<Mutex<Vec<(u16, bool)>>> = Arc::new(Mutex::new(Vec::new()));

    let events = state_events.clone();
    service.set_state_change_callback(Box::new(move |tube, old, new| {
        events.lock().unwrap().push((tube, old, new));
    }));
    let events = launch_events.clone();
    service.set_launch_status_callback(Box::new(move |tube, launched| {
        events.lock().unwrap().push((tube, launched));
    }));

    service.assign(alm_assignment(2)).unwrap();
    service.update_own_ship(own_ship());
    service.set_axis_center(GeoPoint::new(35.0, 129.0));

    // One tick computes the plan and feeds the fire-solution gate.
    service.update();
    assert!(service.tube_status(2).unwrap().plan_valid);

    // Turn on: blocks through the power-on check.
    let started = Instant::now();
    service
        .control(ControlRequest::new(2, ControlState::On))
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(280));
    assert_eq!(service.tube_status(2).unwrap().state, ControlState::On);

    // Next tick sees the interlocks and advances to ready-to-launch.
    service.update();
    assert_eq!(service.tube_status(2).unwrap().state, ControlState::Rtl);

    // Launch: blocks through the step sequence, ends post-launch.
    service
        .control(ControlRequest::new(2, ControlState::Launch))
        .unwrap();
    let status = service.tube_status(2).unwrap();
    assert_eq!(status.state, ControlState::PostLaunch);
    assert!(status.launched);

    let transitions: Vec<(ControlState, ControlState)> = state_events
        .lock()
        .unwrap()
        .iter()
        .filter(|(tube, _, _)| *tube == 2)
        .map(|(_, old, new)| (*old, *new))
        .collect();
    assert_eq!(
        transitions,
        vec![
            (ControlState::Off, ControlState::Poc),
            (ControlState::Poc, ControlState::On),
            (ControlState::On, ControlState::Rtl),
            (ControlState::Rtl, ControlState::Launch),
            (ControlState::Launch, ControlState::PostLaunch),
        ]
    );
    assert_eq!(*launch_events.lock().unwrap(), vec![(2, true)]);
}

// ---- Scenario: abort preempts launch ----

#[test]
fn test_abort_preempts_launch() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);

    let launch_events: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let events = launch_events.clone();
    service.set_launch_status_callback(Box::new(move |_, launched| {
        events.lock().unwrap().push(launched);
    }));

    service.assign(alm_assignment(2)).unwrap();
    service.update_own_ship(own_ship());
    service.update();
    service
        .control(ControlRequest::new(2, ControlState::On))
        .unwrap();
    service.update();
    assert_eq!(service.tube_status(2).unwrap().state, ControlState::Rtl);

    let launcher = service.clone();
    let launch = std::thread::spawn(move || {
        launcher.control(ControlRequest::new(2, ControlState::Launch))
    });

    // Abort mid-sequence from another thread.
    std::thread::sleep(Duration::from_millis(150));
    let abort_started = Instant::now();
    service
        .control(ControlRequest::new(2, ControlState::Abort))
        .unwrap();

    let launch_result = launch.join().unwrap();
    assert!(matches!(launch_result, Err(WcsError::Cancelled)));
    assert!(
        abort_started.elapsed() < Duration::from_millis(200),
        "abort was not prompt"
    );

    let status = service.tube_status(2).unwrap();
    assert_eq!(status.state, ControlState::Abort);
    assert!(!status.launched);
    // No post-launch event was emitted.
    assert!(launch_events.lock().unwrap().is_empty());
}

// ---- Scenario: invalid transition ----

#[test]
fn test_launch_from_off_is_invalid() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    service.assign(alm_assignment(2)).unwrap();

    let err = service
        .control(ControlRequest::new(2, ControlState::Launch))
        .unwrap_err();
    assert!(matches!(
        err,
        WcsError::InvalidTransition {
            from: ControlState::Off,
            to: ControlState::Launch
        }
    ));
    assert_eq!(service.tube_status(2).unwrap().state, ControlState::Off);

    // Off from Off surfaces the same rejection; the state is unchanged.
    let err = service
        .control(ControlRequest::new(2, ControlState::Off))
        .unwrap_err();
    assert!(matches!(err, WcsError::InvalidTransition { .. }));
    assert_eq!(service.tube_status(2).unwrap().state, ControlState::Off);
}

// ---- Scenario: emergency stop across a mixed fleet ----

#[test]
fn test_emergency_stop_mixed_fleet() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    store_drop_plan(&service);

    // Tube 1: ALM mid-launch.
    service.assign(alm_assignment(1)).unwrap();
    // Tube 3: ASM at ready-to-launch.
    service
        .assign(AssignmentInfo {
            tube_number: 3,
            kind: WeaponKind::Asm,
            ..alm_assignment(3)
        })
        .unwrap();
    // Tube 5: mine powered on.
    service.assign(mine_assignment(5)).unwrap();

    service.update_own_ship(own_ship());
    service.update();

    for tube in [1, 3, 5] {
        service
            .control(ControlRequest::new(tube, ControlState::On))
            .unwrap();
    }
    let mine_tube = service.tube_status(5).unwrap();
    assert_eq!(mine_tube.state, ControlState::On);
    service.update();
    assert_eq!(service.tube_status(1).unwrap().state, ControlState::Rtl);
    assert_eq!(service.tube_status(3).unwrap().state, ControlState::Rtl);

    let launcher = service.clone();
    let launch = std::thread::spawn(move || {
        launcher.control(ControlRequest::new(1, ControlState::Launch))
    });
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(service.tube_status(1).unwrap().state, ControlState::Launch);

    // Tube 5 may have advanced to RTL on the earlier tick; emergency stop
    // handles RTL and ON the same way, so the scenario stands either way.
    service.emergency_stop().unwrap();

    assert!(matches!(launch.join().unwrap(), Err(WcsError::Cancelled)));
    assert_eq!(service.tube_status(1).unwrap().state, ControlState::Abort);
    assert_eq!(service.tube_status(3).unwrap().state, ControlState::Off);
    assert_eq!(service.tube_status(5).unwrap().state, ControlState::Off);
}

// ---- Scenario: system-target resolution ----

#[test]
fn test_system_target_resolution() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);

    service
        .assign(AssignmentInfo {
            tube_number: 4,
            kind: WeaponKind::Asm,
            system_target_id: 7,
            target_pos: GeoPoint3::default(),
            drop_plan: None,
        })
        .unwrap();
    service.update_own_ship(own_ship());
    service.update();
    assert!(!service.tube_status(4).unwrap().plan_valid);

    // Kinematics for target 7 arrive: the plan resolves.
    service.update_target(TargetTrack {
        system_target_id: 7,
        position: GeoPoint::new(36.0, 130.0),
        depth_m: 50.0,
        course_deg: 180.0,
        speed_mps: 8.0,
    });
    service.update();

    let status = service.tube_status(4).unwrap();
    assert!(status.plan_valid);
    let plan = service.engagement_plan(4).unwrap();
    assert_eq!(plan.target_position.lat_deg, 36.0);
    assert_eq!(plan.target_position.lon_deg, 130.0);
    assert_eq!(plan.target_position.alt_m, -50.0);

    // An update for a different target must not retarget tube 4.
    service.update_target(TargetTrack {
        system_target_id: 8,
        position: GeoPoint::new(40.0, 140.0),
        depth_m: 0.0,
        course_deg: 0.0,
        speed_mps: 0.0,
    });
    service.update();
    let plan = service.engagement_plan(4).unwrap();
    assert_eq!(plan.target_position.lat_deg, 36.0);
}

// ---- Scenario: mine drop-plan round trip ----

#[test]
fn test_mine_drop_plan_round_trip() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    store_drop_plan(&service);

    let plan = service.get_plan(3, 42).unwrap();
    assert_eq!(plan.plan_number, 42);
    assert_eq!(plan.launch_pos, GeoPoint::new(35.0, 129.0));
    assert_eq!(plan.drop_pos, GeoPoint::new(35.5, 129.5));
    assert_eq!(
        plan.waypoints,
        vec![
            Waypoint::new(35.1, 129.1, 0.0),
            Waypoint::new(35.2, 129.2, 0.0),
        ]
    );

    // The persisted file reloads to the same fields.
    service.plan_store().load(3).unwrap();
    assert_eq!(service.get_plan(3, 42).unwrap(), plan);
}

// ---- Boundary behaviors ----

#[test]
fn test_tube_number_bounds() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);

    for bad_tube in [0u16, 7] {
        assert!(matches!(
            service.assign(alm_assignment(bad_tube)),
            Err(WcsError::InvalidTubeNumber(n)) if n == bad_tube
        ));
        assert!(matches!(
            service.control(ControlRequest::new(bad_tube, ControlState::On)),
            Err(WcsError::InvalidTubeNumber(_))
        ));
        assert!(service.tube_status(bad_tube).is_err());
    }
}

#[test]
fn test_assign_occupied_tube_fails_without_mutation() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    service.assign(alm_assignment(2)).unwrap();

    let second = AssignmentInfo {
        kind: WeaponKind::Asm,
        ..alm_assignment(2)
    };
    assert!(matches!(
        service.assign(second),
        Err(WcsError::TubeOccupied(2))
    ));

    let status = service.tube_status(2).unwrap();
    assert_eq!(status.kind, WeaponKind::Alm);
    assert_eq!(status.state, ControlState::Off);
}

#[test]
fn test_unassign_frees_the_tube() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    service.assign(alm_assignment(2)).unwrap();
    assert_eq!(service.counts().assigned, 1);

    service.unassign(2).unwrap();
    assert_eq!(service.counts().assigned, 0);
    assert!(!service.tube_status(2).unwrap().has_weapon);
    assert!(matches!(
        service.unassign(2),
        Err(WcsError::TubeEmpty(2))
    ));

    // The freed tube accepts a new weapon.
    service
        .assign(AssignmentInfo {
            kind: WeaponKind::Asm,
            ..alm_assignment(2)
        })
        .unwrap();
    assert_eq!(service.tube_status(2).unwrap().kind, WeaponKind::Asm);
}

#[test]
fn test_ninth_waypoint_rejected() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    service.assign(alm_assignment(2)).unwrap();

    let waypoints: Vec<Waypoint> = (0..9)
        .map(|i| Waypoint::new(35.0 + i as f64 * 0.01, 129.0, 0.0))
        .collect();
    assert!(matches!(
        service.update_waypoints(WaypointRequest {
            tube_number: 2,
            waypoints,
        }),
        Err(WcsError::InvalidPlan(_))
    ));

    // Eight are accepted.
    let waypoints: Vec<Waypoint> = (0..8)
        .map(|i| Waypoint::new(35.0 + i as f64 * 0.01, 129.0, 0.0))
        .collect();
    service
        .update_waypoints(WaypointRequest {
            tube_number: 2,
            waypoints,
        })
        .unwrap();

    assert!(matches!(
        service.update_waypoints(WaypointRequest {
            tube_number: 6,
            waypoints: Vec::new(),
        }),
        Err(WcsError::TubeEmpty(6))
    ));
}

#[test]
fn test_unsupported_kind_rejected() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);

    for kind in [WeaponKind::Wgt, WeaponKind::Na] {
        assert!(matches!(
            service.assign(AssignmentInfo {
                kind,
                ..alm_assignment(2)
            }),
            Err(WcsError::UnsupportedKind(k)) if k == kind
        ));
    }
    assert!(!service.tube_status(2).unwrap().has_weapon);
}

#[test]
fn test_broadcast_aggregates_per_tube_failures() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    service.assign(alm_assignment(1)).unwrap();
    service
        .assign(AssignmentInfo {
            kind: WeaponKind::Asm,
            ..alm_assignment(4)
        })
        .unwrap();

    // Launch from Off fails on every assigned tube.
    let err = service
        .request_all_state_change(ControlState::Launch)
        .unwrap_err();
    match err {
        WcsError::Broadcast { failures } => {
            let tubes: Vec<u16> = failures.iter().map(|(tube, _)| *tube).collect();
            assert_eq!(tubes, vec![1, 4]);
        }
        other => panic!("expected Broadcast, got {other:?}"),
    }

    // A broadcast every tube accepts returns success.
    service.request_all_state_change(ControlState::On).unwrap();
    assert_eq!(service.tube_status(1).unwrap().state, ControlState::On);
    assert_eq!(service.tube_status(4).unwrap().state, ControlState::On);
}

// ---- Mine selection and engagement views ----

#[test]
fn test_mine_assignment_uses_selected_plan() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    store_drop_plan(&service);

    // Without a selection, a mine assignment with no coordinates fails.
    let mut info = mine_assignment(5);
    info.drop_plan = None;
    assert!(matches!(
        service.assign(info),
        Err(WcsError::InvalidPlan(_))
    ));

    // Selecting a nonexistent plan is rejected.
    assert!(matches!(
        service.select_plan(SelectedPlan {
            list_number: 3,
            plan_number: 99,
        }),
        Err(WcsError::PlanNotFound { .. })
    ));

    service
        .select_plan(SelectedPlan {
            list_number: 3,
            plan_number: 42,
        })
        .unwrap();
    let selected = service.selected_plan().unwrap();
    assert_eq!((selected.list_number, selected.plan_number), (3, 42));

    let mut info = mine_assignment(5);
    info.drop_plan = None;
    service.assign(info).unwrap();

    let status = service.tube_status(5).unwrap();
    assert!(status.has_weapon);
    assert!(status.plan_valid);
}

#[test]
fn test_engagement_views_match_weapon_family() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);
    store_drop_plan(&service);

    service.assign(alm_assignment(2)).unwrap();
    service.assign(mine_assignment(5)).unwrap();
    service.update_own_ship(own_ship());
    service.update();

    let missile = service.missile_engagement(2).unwrap();
    assert_eq!(missile.tube_number, 2);
    assert!(!missile.position_valid);
    assert!(matches!(
        service.mine_engagement(2),
        Err(WcsError::InvalidPlan(_))
    ));

    let mine = service.mine_engagement(5).unwrap();
    assert_eq!(mine.launch_position, GeoPoint::new(35.0, 129.0));
    assert_eq!(mine.drop_position, GeoPoint::new(35.5, 129.5));
    assert!(mine.estimated_driving_time_secs > 0.0);
    assert!(matches!(
        service.missile_engagement(5),
        Err(WcsError::InvalidPlan(_))
    ));

    assert!(matches!(
        service.missile_engagement(6),
        Err(WcsError::TubeEmpty(6))
    ));
}

// ---- Fleet query surface ----

#[test]
fn test_fleet_queries_and_shutdown() {
    use crate::factory::WeaponFactory;
    use crate::fleet::LaunchTubeManager;
    use crate::targets::TargetCache;
    use seafire_plans::MinePlanStore;

    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let plans = Arc::new(MinePlanStore::new(&config));
    plans.initialize().unwrap();
    let fleet = LaunchTubeManager::new(
        &config,
        Arc::new(WeaponFactory::with_defaults(&config)),
        plans,
        Arc::new(TargetCache::new()),
    );
    fleet.initialize().unwrap();

    assert!(fleet.can_assign(2, WeaponKind::Alm));
    assert!(!fleet.can_assign(2, WeaponKind::Wgt));
    assert!(!fleet.can_assign(0, WeaponKind::Alm));
    assert!(!fleet.is_assigned(2));

    fleet.assign(alm_assignment(2)).unwrap();
    assert!(fleet.is_assigned(2));
    assert!(!fleet.can_assign(2, WeaponKind::Asm));

    // The tube keeps its assignment parameters.
    let info = fleet.tube(2).unwrap().assignment_info().unwrap();
    assert_eq!(info.kind, WeaponKind::Alm);
    assert_eq!(info.target_pos.lat_deg, 35.1);

    // State acceptance mirrors the transition graph, abort always allowed.
    assert!(fleet.can_change_state(2, ControlState::On));
    assert!(!fleet.can_change_state(2, ControlState::Launch));
    assert!(fleet.can_change_state(2, ControlState::Abort));
    assert!(!fleet.can_change_state(3, ControlState::On));

    assert_eq!(fleet.all_engagement_plans().len(), 1);
    fleet.calculate_engagement_plan(2).unwrap();
    assert!(fleet.engagement_plan(2).unwrap().valid);

    fleet.shutdown();
    assert_eq!(fleet.assigned_count(), 0);
    assert!(!fleet.is_assigned(2));
}

// ---- Post-launch tracking ----

#[test]
fn test_post_launch_position_estimate() {
    let dir = TempDir::new().unwrap();
    let service = test_service(&dir);

    service.assign(alm_assignment(2)).unwrap();
    service.update_own_ship(own_ship());
    service.update();
    service
        .control(ControlRequest::new(2, ControlState::On))
        .unwrap();
    service.update();
    service
        .control(ControlRequest::new(2, ControlState::Launch))
        .unwrap();

    std::thread::sleep(Duration::from_millis(30));
    service.update();

    let view = service.missile_engagement(2).unwrap();
    assert!(view.position_valid);
    let plan = service.engagement_plan(2).unwrap();
    assert!(plan.time_to_target_secs < plan.total_time_secs);

    // Post-launch the tube stops recomputing the solution, but status
    // still reports the flight.
    let status = service.tube_status(2).unwrap();
    assert!(status.launched);
    assert_eq!(status.state, ControlState::PostLaunch);
}
