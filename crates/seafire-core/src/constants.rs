//! System-wide limits and fixed parameters.

// --- Capacity limits ---

/// Maximum operator waypoints per weapon route.
pub const MAX_WAYPOINTS: usize = 8;

/// Maximum points in a reported trajectory polyline.
pub const MAX_TRAJECTORY_POINTS: usize = 128;

/// Maximum computed turning points in a missile engagement report.
pub const MAX_TURNING_POINTS: usize = 16;

/// Lowest valid launch tube number. Tube 0 is reserved and invalid.
pub const MIN_TUBE_NUMBER: u16 = 1;

// --- Cancellation ---

/// Granularity of cancellation checks inside long-running transitions (ms).
pub const CANCEL_POLL_INTERVAL_MS: u64 = 50;

/// Polling granularity of `CancelToken::wait_for` (ms).
pub const CANCEL_WAIT_POLL_MS: u64 = 10;

// --- Geodesy ---

/// Mean Earth radius in metres (haversine distance).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// --- Plan validation ranges ---

/// Valid latitude range for stored plan positions (degrees).
pub const PLAN_LAT_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid longitude range for stored plan positions (degrees).
pub const PLAN_LON_RANGE: (f64, f64) = (-180.0, 180.0);

/// Valid depth/altitude range for stored plan positions (metres).
pub const PLAN_DEPTH_RANGE: (f64, f64) = (-1000.0, 10_000.0);
