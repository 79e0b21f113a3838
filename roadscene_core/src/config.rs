//! Scene configuration.
//!
//! Every field has a default from [`crate::tuning`]; a JSON file only needs
//! to name the values it overrides.

use crate::error::{Result, SceneError};
use crate::scenario::max_actor_step;
use crate::tuning::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Travel interval and road geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelBounds {
    pub min_z: f64,
    pub max_z: f64,
    pub road_width: f64,
    pub nudge_step: f64,
}

impl Default for TravelBounds {
    fn default() -> Self {
        Self {
            min_z: MIN_Z,
            max_z: MAX_Z,
            road_width: ROAD_WIDTH,
            nudge_step: NUDGE_STEP,
        }
    }
}

impl TravelBounds {
    /// Clamps z into the travel interval (held at the boundary).
    pub fn clamp_z(&self, z: f64) -> f64 {
        z.clamp(self.min_z, self.max_z)
    }
}

/// World streaming window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub tile_length: f64,
    pub batch_tiles: usize,
    pub max_batches: usize,
    pub lookahead: f64,
    pub initial_behind: f64,
    pub plane_spacing: f64,
    pub max_planes: usize,
    pub props_per_batch: usize,
    pub prop_edge_margin: f64,
    pub prop_band: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tile_length: TILE_LENGTH,
            batch_tiles: BATCH_TILES,
            max_batches: MAX_BATCHES,
            lookahead: GENERATION_LOOKAHEAD,
            initial_behind: INITIAL_BEHIND,
            plane_spacing: PLANE_SPACING,
            max_planes: MAX_PLANES,
            props_per_batch: PROPS_PER_BATCH,
            prop_edge_margin: PROP_EDGE_MARGIN,
            prop_band: PROP_BAND,
        }
    }
}

impl StreamConfig {
    /// Length of road covered by one batch.
    pub fn batch_span(&self) -> f64 {
        self.tile_length * self.batch_tiles as f64
    }
    
    /// Maximum number of live road tiles.
    pub fn tile_cap(&self) -> usize {
        self.batch_tiles * self.max_batches
    }
    
    /// Checks that eviction can never remove the tile under the lead actor
    /// moving at most `max_step` per tick.
    ///
    /// After a batch is added the window reaches `(max_batches - 1)` spans
    /// behind the previous forward edge, and the lead actor sits at most
    /// `lookahead` behind that edge.
    pub fn validate(&self, max_step: f64) -> Result<()> {
        if self.tile_length <= 0.0 || self.batch_tiles == 0 {
            return Err(SceneError::Config("tiles must have positive length and count".into()));
        }
        if self.max_batches < 2 {
            return Err(SceneError::Config("at least two live batches are required".into()));
        }
        if self.max_planes < 2 || self.plane_spacing <= 0.0 {
            return Err(SceneError::Config("ground planes need spacing > 0 and a cap >= 2".into()));
        }
        let behind = (self.max_batches - 1) as f64 * self.batch_span();
        if self.lookahead > behind {
            return Err(SceneError::Config(format!(
                "lookahead {:.2} exceeds retained road {:.2}; eviction could drop the lead tile",
                self.lookahead, behind
            )));
        }
        if self.lookahead < self.tile_length.max(max_step) {
            return Err(SceneError::Config(format!(
                "lookahead {:.2} leaves no road ahead of an actor moving {:.2}/tick",
                self.lookahead, max_step
            )));
        }
        Ok(())
    }
}

/// Telemetry topics and intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub position_interval_ms: u64,
    pub screenshot_interval_ms: u64,
    pub screenshot_width: u32,
    pub screenshot_height: u32,
    pub max_pending_markers: usize,
    pub positions_topic: String,
    pub screenshot_topic: String,
    pub detections_topic: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: POSITION_INTERVAL_MS,
            screenshot_interval_ms: SCREENSHOT_INTERVAL_MS,
            screenshot_width: SCREENSHOT_WIDTH,
            screenshot_height: SCREENSHOT_HEIGHT,
            max_pending_markers: MAX_PENDING_MARKERS,
            positions_topic: "scene/positions".to_string(),
            screenshot_topic: "scene/screenshot".to_string(),
            detections_topic: "scene/detections".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }
    
    pub fn screenshot_interval(&self) -> Duration {
        Duration::from_millis(self.screenshot_interval_ms)
    }
}

/// Top-level configuration for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Frame callback rate in Hz
    pub frame_rate_hz: u32,
    
    /// Seed for procedural scenery
    pub seed: u64,
    
    pub bounds: TravelBounds,
    pub stream: StreamConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: FRAME_RATE_HZ,
            seed: 42,
            bounds: TravelBounds::default(),
            stream: StreamConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Loads a config from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
    
    /// Parses a config from JSON text and validates it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: SceneConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
    
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate_hz == 0 {
            return Err(SceneError::Config("frame rate must be positive".into()));
        }
        if self.bounds.min_z >= self.bounds.max_z {
            return Err(SceneError::Config("min_z must be below max_z".into()));
        }
        if self.bounds.min_z >= STOP_LINE_Z || self.bounds.max_z < CAR_SPAWN_Z {
            return Err(SceneError::Config(format!(
                "travel interval [{}, {}] must hold the car spawn {} and the stop line {}",
                self.bounds.min_z, self.bounds.max_z, CAR_SPAWN_Z, STOP_LINE_Z
            )));
        }
        if self.bounds.road_width <= 0.0 {
            return Err(SceneError::Config("road width must be positive".into()));
        }
        if self.telemetry.position_interval_ms == 0 {
            return Err(SceneError::Config("position interval must be positive".into()));
        }
        if !(250..=1000).contains(&self.telemetry.screenshot_interval_ms) {
            return Err(SceneError::Config(format!(
                "screenshot interval {}ms outside 250-1000ms",
                self.telemetry.screenshot_interval_ms
            )));
        }
        if self.telemetry.screenshot_width == 0 || self.telemetry.screenshot_height == 0 {
            return Err(SceneError::Config("screenshot resolution must be non-zero".into()));
        }
        if self.telemetry.max_pending_markers == 0 {
            return Err(SceneError::Config("marker window must hold at least one marker".into()));
        }
        self.stream.validate(max_actor_step(self.bounds.max_z))
    }
    
    /// Duration of one frame tick.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_default_config_is_valid() {
        assert!(SceneConfig::default().validate().is_ok());
    }
    
    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SceneConfig::from_json_str(
            r#"{ "seed": 7, "telemetry": { "positions_topic": "demo/pos" } }"#,
        )
        .unwrap();
        
        assert_eq!(config.seed, 7);
        assert_eq!(config.telemetry.positions_topic, "demo/pos");
        assert_eq!(config.telemetry.screenshot_topic, "scene/screenshot");
        assert_eq!(config.stream, StreamConfig::default());
    }
    
    #[test]
    fn test_unsafe_lookahead_rejected() {
        let stream = StreamConfig {
            lookahead: 200.0,
            ..Default::default()
        };
        assert!(matches!(stream.validate(0.1), Err(SceneError::Config(_))));
        
        let stream = StreamConfig {
            lookahead: 1.0,
            ..Default::default()
        };
        assert!(stream.validate(0.1).is_err());
    }
    
    #[test]
    fn test_screenshot_interval_range() {
        let mut config = SceneConfig::default();
        config.telemetry.screenshot_interval_ms = 100;
        assert!(config.validate().is_err());
        
        config.telemetry.screenshot_interval_ms = 1000;
        assert!(config.validate().is_ok());
    }
    
    #[test]
    fn test_bounds_must_hold_spawn_and_stop_line() {
        let mut config = SceneConfig::default();
        config.bounds.max_z = CAR_SPAWN_Z - 1.0;
        assert!(config.validate().is_err());
        
        let mut config = SceneConfig::default();
        config.bounds.min_z = 5.0;
        assert!(config.validate().is_err());
        
        let mut config = SceneConfig::default();
        config.bounds.max_z = CAR_SPAWN_Z + 5.0;
        assert!(config.validate().is_ok());
    }
    
    #[test]
    fn test_clamp_z_holds_at_boundary() {
        let bounds = TravelBounds::default();
        assert_eq!(bounds.clamp_z(MIN_Z - 5.0), MIN_Z);
        assert_eq!(bounds.clamp_z(MAX_Z + 5.0), MAX_Z);
        assert_eq!(bounds.clamp_z(3.0), 3.0);
    }
    
    #[test]
    fn test_frame_period() {
        let config = SceneConfig::default();
        assert!((config.frame_period().as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }
}
