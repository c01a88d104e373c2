//! Short-lived registry of system-target kinematics.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use seafire_core::types::TargetTrack;

struct CachedTarget {
    track: TargetTrack,
    updated_at: Instant,
}

/// Cache of the latest kinematics per system target, keyed by id.
/// Entries not refreshed within the configured age are evicted at the
/// next periodic cleanup.
#[derive(Default)]
pub struct TargetCache {
    entries: RwLock<HashMap<u32, CachedTarget>>,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for this target.
    pub fn update(&self, track: TargetTrack) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            track.system_target_id,
            CachedTarget {
                track,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, system_target_id: u32) -> Option<TargetTrack> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&system_target_id)
            .map(|cached| cached.track)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict entries older than `max_age`.
    pub fn clear_old(&self, max_age: Duration) {
        let cutoff = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|id, cached| {
            let keep = cutoff.duration_since(cached.updated_at) <= max_age;
            if !keep {
                debug!(system_target_id = *id, "evicting stale target");
            }
            keep
        });
    }
}
