//! JSON exporter for offline inspection of a run.
//!
//! Exports sampled frames (actors, live road window, markers) as one JSON
//! document.

use nalgebra::Vector3;
use roadscene_core::{ActorRole, MarkerColor, SceneRegistry};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single sampled frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,
    
    pub tick: u64,
    
    /// Ready actors
    pub actors: Vec<ActorPosition>,
    
    /// Live road window `[z_min, z_max]`
    pub road: Option<(f64, f64)>,
    
    pub tile_count: usize,
    pub plane_count: usize,
    pub prop_count: usize,
    pub camera_mode: String,
    
    /// Markers by colour
    pub markers_pending: usize,
    pub markers_detected: usize,
    pub markers_clear: usize,
    
    /// Events (restarts, failures, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

impl SimFrame {
    /// Samples the registry.
    pub fn capture(time_sec: f64, tick: u64, registry: &SceneRegistry) -> Self {
        let actors = registry
            .actors()
            .filter(|slot| slot.is_ready())
            .map(|slot| ActorPosition::new(slot.role, slot.position(), slot.state.stopped))
            .collect();
        
        let world = registry.world();
        let road = world
            .tiles()
            .map(|t| t.z_min)
            .reduce(f64::min)
            .zip(world.tiles().map(|t| t.z_max).reduce(f64::max));
        
        let markers = registry.markers();
        let count = |color: MarkerColor| markers.iter().filter(|m| m.color == color).count();
        
        Self {
            time_sec,
            tick,
            actors,
            road,
            tile_count: world.tile_count(),
            plane_count: world.plane_count(),
            prop_count: registry.scenery().props().len(),
            camera_mode: registry.camera_mode().name().to_string(),
            markers_pending: count(MarkerColor::Pending),
            markers_detected: count(MarkerColor::Detected),
            markers_clear: count(MarkerColor::Clear),
            events: Vec::new(),
        }
    }
}

/// Position of an actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorPosition {
    pub role: ActorRole,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub stopped: bool,
}

impl ActorPosition {
    pub fn new(role: ActorRole, pos: &Vector3<f64>, stopped: bool) -> Self {
        Self {
            role,
            x: pos.x,
            y: pos.y,
            z: pos.z,
            stopped,
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }
    
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("error".to_string()),
        }
    }
}

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,
    
    /// Seed used
    pub seed: u64,
    
    pub map_style: String,
    
    /// Duration in seconds
    pub duration_sec: f64,
    
    /// All frames
    pub frames: Vec<SimFrame>,
    
    /// Final results
    pub passed: bool,
    
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, map_style: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            map_style: map_style.to_string(),
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }
    
    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }
    
    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }
    
    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadscene_core::{LoadEvent, MapStyle, ScenarioId, SceneConfig, StartForm};
    use roadscene_env::LoadedModel;
    
    #[test]
    fn test_frame_samples_ready_actors() {
        let mut registry = SceneRegistry::new(SceneConfig::default()).unwrap();
        let requests = registry
            .start_scenario(StartForm::new(ScenarioId::MotoristStopAndGo, 12.0, MapStyle::Desert))
            .unwrap();
        let car = &requests[0];
        registry.on_model_loaded(LoadEvent::for_request(
            car,
            Ok(LoadedModel {
                path: car.path.clone(),
                scale: 0.1,
                mesh_count: 1,
            }),
        ));
        
        let frame = SimFrame::capture(0.5, 30, &registry);
        assert_eq!(frame.actors.len(), 1);
        assert_eq!(frame.actors[0].role, ActorRole::Car);
        let (z_min, z_max) = frame.road.unwrap();
        assert!(z_min < frame.actors[0].z && frame.actors[0].z < z_max);
        assert_eq!(frame.camera_mode, "free_orbit");
        
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["actors"][0]["role"], "car");
        assert!(json.get("events").is_none());
    }
}
