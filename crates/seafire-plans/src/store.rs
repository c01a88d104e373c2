//! Plan list persistence and cache.
//!
//! One file per plan list under the configured data path, written as
//! newline-delimited JSON records (one plan per line). The in-memory
//! cache is the read path; files are rewritten whole on every mutation
//! and the cache is only updated after a successful write.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use seafire_core::config::SystemConfig;
use seafire_core::constants::{MAX_WAYPOINTS, PLAN_DEPTH_RANGE, PLAN_LAT_RANGE, PLAN_LON_RANGE};
use seafire_core::types::MinePlan;
use seafire_core::{Result, WcsError};

/// File-backed library of mine drop-plan lists.
pub struct MinePlanStore {
    data_path: PathBuf,
    max_plan_lists: u32,
    max_plans_per_list: usize,
    cache: RwLock<HashMap<u32, Vec<MinePlan>>>,
}

impl MinePlanStore {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            data_path: config.paths.mine_data_path.clone(),
            max_plan_lists: config.mine_drop_plan.max_plan_lists,
            max_plans_per_list: config.mine_drop_plan.max_plans_per_list,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create the data directory and bring every list into the cache,
    /// creating empty lists for files that do not exist yet.
    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.data_path)?;

        for list_number in 1..=self.max_plan_lists {
            if self.load(list_number).is_err() {
                self.create(list_number)?;
            }
        }

        info!(
            path = %self.data_path.display(),
            lists = self.max_plan_lists,
            "mine plan store initialized"
        );
        Ok(())
    }

    /// Read one list from disk into the cache.
    pub fn load(&self, list_number: u32) -> Result<()> {
        self.check_list_number(list_number)?;

        let path = self.list_file_path(list_number);
        let plans = read_plan_file(&path)?;
        if plans.len() > self.max_plans_per_list {
            return Err(WcsError::InvalidPlan(format!(
                "list {list_number} holds {} plans, limit is {}",
                plans.len(),
                self.max_plans_per_list
            )));
        }

        debug!(list_number, count = plans.len(), "plan list loaded");
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(list_number, plans);
        }
        Ok(())
    }

    /// Validate and persist a full list, then update the cache.
    pub fn save(&self, list_number: u32, plans: &[MinePlan]) -> Result<()> {
        self.check_list_number(list_number)?;

        if plans.len() > self.max_plans_per_list {
            return Err(WcsError::InvalidPlan(format!(
                "list {list_number} would hold {} plans, limit is {}",
                plans.len(),
                self.max_plans_per_list
            )));
        }
        for plan in plans {
            validate_plan(plan)?;
        }

        write_plan_file(&self.list_file_path(list_number), plans)?;

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(list_number, plans.to_vec());
        }

        info!(list_number, count = plans.len(), "plan list saved");
        Ok(())
    }

    /// Create an empty list (persisted immediately).
    pub fn create(&self, list_number: u32) -> Result<()> {
        self.save(list_number, &[])
    }

    /// Remove a list's file and cache entry.
    pub fn delete(&self, list_number: u32) -> Result<()> {
        self.check_list_number(list_number)?;

        let path = self.list_file_path(list_number);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(&list_number);
        }

        info!(list_number, "plan list deleted");
        Ok(())
    }

    /// All plans in a list. Empty for an unknown or invalid list number.
    pub fn get_list(&self, list_number: u32) -> Vec<MinePlan> {
        self.cache
            .read()
            .map(|cache| cache.get(&list_number).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// One plan by (list, plan) coordinates.
    pub fn get_plan(&self, list_number: u32, plan_number: u16) -> Result<MinePlan> {
        self.get_list(list_number)
            .into_iter()
            .find(|plan| plan.plan_number == plan_number)
            .ok_or(WcsError::PlanNotFound {
                list_number,
                plan_number,
            })
    }

    /// Replace a plan with the same number, or append it if absent.
    pub fn update_plan(&self, list_number: u32, plan: MinePlan) -> Result<()> {
        validate_plan(&plan)?;

        let mut plans = self.get_list(list_number);
        match plans.iter_mut().find(|p| p.plan_number == plan.plan_number) {
            Some(existing) => *existing = plan,
            None => plans.push(plan),
        }
        self.save(list_number, &plans)
    }

    /// Append a new plan. The plan number must not already exist.
    pub fn add_plan(&self, list_number: u32, plan: MinePlan) -> Result<()> {
        validate_plan(&plan)?;

        let mut plans = self.get_list(list_number);
        if plans.len() >= self.max_plans_per_list {
            return Err(WcsError::InvalidPlan(format!(
                "list {list_number} is full ({} plans)",
                self.max_plans_per_list
            )));
        }
        if plans.iter().any(|p| p.plan_number == plan.plan_number) {
            return Err(WcsError::InvalidPlan(format!(
                "plan {} already exists in list {list_number}",
                plan.plan_number
            )));
        }

        plans.push(plan);
        self.save(list_number, &plans)
    }

    /// Remove a plan by number.
    pub fn remove_plan(&self, list_number: u32, plan_number: u16) -> Result<()> {
        let mut plans = self.get_list(list_number);
        let before = plans.len();
        plans.retain(|p| p.plan_number != plan_number);
        if plans.len() == before {
            return Err(WcsError::PlanNotFound {
                list_number,
                plan_number,
            });
        }
        self.save(list_number, &plans)
    }

    /// List numbers that currently exist on disk.
    pub fn available_list_numbers(&self) -> Vec<u32> {
        (1..=self.max_plan_lists)
            .filter(|n| self.list_file_path(*n).exists())
            .collect()
    }

    pub fn plan_count(&self, list_number: u32) -> usize {
        self.get_list(list_number).len()
    }

    pub fn list_count(&self) -> usize {
        self.available_list_numbers().len()
    }

    pub fn is_valid_list_number(&self, list_number: u32) -> bool {
        (1..=self.max_plan_lists).contains(&list_number)
    }

    fn check_list_number(&self, list_number: u32) -> Result<()> {
        if self.is_valid_list_number(list_number) {
            Ok(())
        } else {
            Err(WcsError::InvalidPlan(format!(
                "list number {list_number} outside 1..={}",
                self.max_plan_lists
            )))
        }
    }

    fn list_file_path(&self, list_number: u32) -> PathBuf {
        self.data_path.join(format!("plan_list_{list_number}.jsonl"))
    }
}

/// Check a plan against position ranges and the waypoint limit.
pub fn validate_plan(plan: &MinePlan) -> Result<()> {
    if plan.plan_number == 0 {
        return Err(WcsError::InvalidPlan("plan number 0 is reserved".into()));
    }
    if plan.waypoints.len() > MAX_WAYPOINTS {
        return Err(WcsError::InvalidPlan(format!(
            "plan {} has {} waypoints, limit is {MAX_WAYPOINTS}",
            plan.plan_number,
            plan.waypoints.len()
        )));
    }

    check_position(plan.launch_pos.lat_deg, plan.launch_pos.lon_deg, 0.0)?;
    check_position(plan.drop_pos.lat_deg, plan.drop_pos.lon_deg, 0.0)?;
    for waypoint in &plan.waypoints {
        check_position(waypoint.lat_deg, waypoint.lon_deg, waypoint.depth_m)?;
    }
    Ok(())
}

fn check_position(lat_deg: f64, lon_deg: f64, depth_m: f64) -> Result<()> {
    if !(PLAN_LAT_RANGE.0..=PLAN_LAT_RANGE.1).contains(&lat_deg) {
        return Err(WcsError::InvalidPlan(format!(
            "latitude {lat_deg} outside [{}, {}]",
            PLAN_LAT_RANGE.0, PLAN_LAT_RANGE.1
        )));
    }
    if !(PLAN_LON_RANGE.0..=PLAN_LON_RANGE.1).contains(&lon_deg) {
        return Err(WcsError::InvalidPlan(format!(
            "longitude {lon_deg} outside [{}, {}]",
            PLAN_LON_RANGE.0, PLAN_LON_RANGE.1
        )));
    }
    if !(PLAN_DEPTH_RANGE.0..=PLAN_DEPTH_RANGE.1).contains(&depth_m) {
        return Err(WcsError::InvalidPlan(format!(
            "depth {depth_m} outside [{}, {}]",
            PLAN_DEPTH_RANGE.0, PLAN_DEPTH_RANGE.1
        )));
    }
    Ok(())
}

/// Parse a plan-list file: one JSON record per line, blank lines ignored.
fn read_plan_file(path: &Path) -> Result<Vec<MinePlan>> {
    let content = fs::read_to_string(path)?;

    let mut plans = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let plan: MinePlan = serde_json::from_str(line).map_err(|e| {
            warn!(path = %path.display(), line = index + 1, "malformed plan record");
            WcsError::InvalidPlan(format!(
                "{}:{}: malformed plan record: {e}",
                path.display(),
                index + 1
            ))
        })?;
        plans.push(plan);
    }
    Ok(plans)
}

/// Write a plan-list file: one JSON record per line.
fn write_plan_file(path: &Path, plans: &[MinePlan]) -> Result<()> {
    let mut buf = Vec::new();
    for plan in plans {
        let line = serde_json::to_string(plan)
            .map_err(|e| WcsError::InvalidPlan(format!("cannot serialize plan: {e}")))?;
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }

    let mut file = fs::File::create(path)?;
    file.write_all(&buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seafire_core::types::{GeoPoint, Waypoint};
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> MinePlanStore {
        let mut config = SystemConfig::default();
        config.paths.mine_data_path = dir.path().to_path_buf();
        config.mine_drop_plan.max_plan_lists = 5;
        config.mine_drop_plan.max_plans_per_list = 3;
        MinePlanStore::new(&config)
    }

    fn sample_plan(plan_number: u16) -> MinePlan {
        MinePlan {
            plan_number,
            launch_pos: GeoPoint::new(35.0, 129.0),
            drop_pos: GeoPoint::new(35.5, 129.5),
            waypoints: vec![
                Waypoint::new(35.1, 129.1, 0.0),
                Waypoint::new(35.2, 129.2, 0.0),
            ],
        }
    }

    #[test]
    fn test_save_load_get_plan_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.initialize().unwrap();

        let plan = sample_plan(42);
        store.save(3, std::slice::from_ref(&plan)).unwrap();

        // Drop the cache entry and re-load from disk.
        store.load(3).unwrap();
        let loaded = store.get_plan(3, 42).unwrap();
        assert_eq!(loaded, plan);

        // Round-trip preserves every field, including waypoints.
        assert_eq!(loaded.launch_pos, GeoPoint::new(35.0, 129.0));
        assert_eq!(loaded.drop_pos, GeoPoint::new(35.5, 129.5));
        assert_eq!(loaded.waypoints.len(), 2);
    }

    #[test]
    fn test_initialize_creates_all_lists() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.initialize().unwrap();

        assert_eq!(store.available_list_numbers(), vec![1, 2, 3, 4, 5]);
        assert_eq!(store.list_count(), 5);
        assert_eq!(store.plan_count(1), 0);
    }

    #[test]
    fn test_list_number_bounds() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        assert!(matches!(
            store.save(0, &[]),
            Err(WcsError::InvalidPlan(_))
        ));
        assert!(matches!(
            store.save(6, &[]),
            Err(WcsError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_ninth_waypoint_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut plan = sample_plan(1);
        plan.waypoints = (0..9)
            .map(|i| Waypoint::new(35.0 + i as f64 * 0.01, 129.0, 0.0))
            .collect();

        let err = store.save(1, &[plan]).unwrap_err();
        assert!(matches!(err, WcsError::InvalidPlan(_)));
        // Store unchanged: nothing was written.
        assert!(store.get_list(1).is_empty());
    }

    #[test]
    fn test_out_of_range_positions_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut plan = sample_plan(1);
        plan.launch_pos.lat_deg = 91.0;
        assert!(matches!(
            store.save(1, std::slice::from_ref(&plan)),
            Err(WcsError::InvalidPlan(_))
        ));

        let mut plan = sample_plan(1);
        plan.drop_pos.lon_deg = -180.5;
        assert!(matches!(
            store.save(1, std::slice::from_ref(&plan)),
            Err(WcsError::InvalidPlan(_))
        ));

        let mut plan = sample_plan(1);
        plan.waypoints[0].depth_m = 10_001.0;
        assert!(matches!(
            store.save(1, &[plan]),
            Err(WcsError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_plan_number_zero_rejected() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        assert!(matches!(
            store.save(1, &[sample_plan(0)]),
            Err(WcsError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_add_plan_rejects_duplicates_and_overflow() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.create(2).unwrap();

        store.add_plan(2, sample_plan(1)).unwrap();
        assert!(matches!(
            store.add_plan(2, sample_plan(1)),
            Err(WcsError::InvalidPlan(_))
        ));

        store.add_plan(2, sample_plan(2)).unwrap();
        store.add_plan(2, sample_plan(3)).unwrap();
        // max_plans_per_list = 3 in the test store.
        assert!(matches!(
            store.add_plan(2, sample_plan(4)),
            Err(WcsError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_update_plan_replaces_in_place() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.create(1).unwrap();
        store.add_plan(1, sample_plan(7)).unwrap();

        let mut changed = sample_plan(7);
        changed.drop_pos = GeoPoint::new(36.0, 130.0);
        store.update_plan(1, changed.clone()).unwrap();

        assert_eq!(store.plan_count(1), 1);
        assert_eq!(store.get_plan(1, 7).unwrap(), changed);
    }

    #[test]
    fn test_remove_plan_and_not_found() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.create(1).unwrap();
        store.add_plan(1, sample_plan(7)).unwrap();

        store.remove_plan(1, 7).unwrap();
        assert!(store.get_list(1).is_empty());

        assert!(matches!(
            store.remove_plan(1, 7),
            Err(WcsError::PlanNotFound {
                list_number: 1,
                plan_number: 7
            })
        ));
        assert!(matches!(
            store.get_plan(1, 7),
            Err(WcsError::PlanNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_removes_file_and_cache() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.create(4).unwrap();
        store.add_plan(4, sample_plan(1)).unwrap();

        store.delete(4).unwrap();
        assert!(store.get_list(4).is_empty());
        assert!(!store.available_list_numbers().contains(&4));
    }

    #[test]
    fn test_malformed_file_surfaces_invalid_plan() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        std::fs::write(dir.path().join("plan_list_1.jsonl"), "not json\n").unwrap();

        assert!(matches!(store.load(1), Err(WcsError::InvalidPlan(_))));
    }
}
