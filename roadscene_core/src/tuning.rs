//! Scenario tuning constants.
//!
//! These values were tuned by eye against the rendered demo and have no
//! derivation; treat them as parameters, not physics.

// =============================================================================
// TRAVEL AXIS
// =============================================================================

/// Lowest z an actor may reach (furthest along the travel direction).
pub const MIN_Z: f64 = -1000.0;

/// Highest z an actor may reach.
pub const MAX_Z: f64 = 100.0;

/// Width of the road along x. Nudged actors wrap back to 0 past this.
pub const ROAD_WIDTH: f64 = 6.0;

/// Lateral step applied per tick while the nudge input is held.
pub const NUDGE_STEP: f64 = 0.02;

// =============================================================================
// OVERTAKE SCENARIOS (per-tick distances)
// =============================================================================

pub const MOTORIST_OVERTAKE_STEP: f64 = 0.09;
pub const CAR_STEP_BEHIND_MOTORIST: f64 = 0.05;
pub const CYCLIST_OVERTAKE_STEP: f64 = 0.05;
pub const CAR_STEP_PASSING_CYCLIST: f64 = 0.08;

// =============================================================================
// STOP-AND-GO SCENARIOS
// =============================================================================

/// Stop line shared by every actor.
pub const STOP_LINE_Z: f64 = 0.0;

/// Cyclists stop this far before the line.
pub const CYCLIST_STOP_OFFSET: f64 = 0.75;

/// Ticks an actor stays at the stop line before re-accelerating (~2s at 60Hz).
pub const DWELL_TICKS: u32 = 120;

pub const CAR_MAX_SPEED: f64 = 0.08;
pub const CAR_DECELERATION: f64 = 0.02;
pub const CAR_ACCELERATION: f64 = 0.0015;
pub const CAR_MIN_STEP: f64 = 0.005;

pub const MOTORIST_MAX_SPEED: f64 = 0.09;
pub const MOTORIST_DECELERATION: f64 = 0.025;
pub const MOTORIST_ACCELERATION: f64 = 0.002;
pub const MOTORIST_MIN_STEP: f64 = 0.005;

pub const CYCLIST_MAX_SPEED: f64 = 0.05;
pub const CYCLIST_DECELERATION: f64 = 0.015;
pub const CYCLIST_ACCELERATION: f64 = 0.0008;
pub const CYCLIST_MIN_STEP: f64 = 0.003;

// =============================================================================
// SPAWN LAYOUT
// =============================================================================

/// Car spawn z at scenario start.
pub const CAR_SPAWN_Z: f64 = 30.0;

/// Lane centres (x) for the car and the two-wheeler.
pub const CAR_LANE_X: f64 = 1.5;
pub const PARTNER_LANE_X: f64 = 4.5;

/// Model heights above the road surface.
pub const CAR_HEIGHT: f64 = 0.5;
pub const RIDER_HEIGHT: f64 = 1.0;

// =============================================================================
// WORLD STREAMING
// =============================================================================

pub const TILE_LENGTH: f64 = 5.0;
pub const BATCH_TILES: usize = 10;
pub const MAX_BATCHES: usize = 3;

/// Distance ahead of the forward edge at which the next batch is generated.
pub const GENERATION_LOOKAHEAD: f64 = 60.0;

/// Road kept behind the car when the window is (re)built.
pub const INITIAL_BEHIND: f64 = 10.0;

pub const PLANE_SPACING: f64 = 100.0;
pub const MAX_PLANES: usize = 2;

pub const PROPS_PER_BATCH: usize = 6;

/// Gap between the road edge and the nearest scenery prop.
pub const PROP_EDGE_MARGIN: f64 = 2.0;

/// Band (beyond the margin) that props are scattered across.
pub const PROP_BAND: f64 = 12.0;

// =============================================================================
// CAMERA
// =============================================================================

/// Free camera translation per tick while a movement key is held.
pub const FREE_CAMERA_SPEED: f64 = 1.0;

pub const CHASE_DISTANCE: f64 = 14.0;

/// Polar angle (from straight down) of the chase camera, radians.
pub const CHASE_POLAR_ANGLE: f64 = 0.35;

pub const CHASE_MIN_POLAR: f64 = 0.0;
pub const CHASE_MAX_POLAR: f64 = 0.6;

// =============================================================================
// TELEMETRY
// =============================================================================

pub const POSITION_INTERVAL_MS: u64 = 2000;
pub const SCREENSHOT_INTERVAL_MS: u64 = 500;
pub const SCREENSHOT_WIDTH: u32 = 320;
pub const SCREENSHOT_HEIGHT: u32 = 240;
pub const MAX_PENDING_MARKERS: usize = 50;
pub const FRAME_RATE_HZ: u32 = 60;
