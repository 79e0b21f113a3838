//! Scenario runner - executes the traffic scenarios headless and checks the
//! scene invariants every tick.

use crate::error::SimError;
use crate::exporter::{SimEvent, SimExport, SimFrame};
use crate::world::{SimConfig, SimWorld};

use roadscene_core::{
    ActorRole, BatchEvent, InputEvent, MapStyle, MotionRule, ScenarioId, SceneConfig, SceneRegistry, StartForm,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Float slack for position comparisons.
const EPSILON: f64 = 1e-9;

/// Ticks after which every stop-and-go actor must have reached its line.
const STOP_DEADLINE_TICKS: u64 = 900;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,
    
    /// Seed used
    pub seed: u64,
    
    /// Whether scenario passed all assertions
    pub passed: bool,
    
    /// Total ticks executed
    pub total_ticks: u64,
    
    /// Final simulation time in seconds
    pub final_time_secs: f64,
    
    /// Final z of each ready actor
    pub final_positions: BTreeMap<ActorRole, f64>,
    
    /// Failure message if any
    pub failure_reason: Option<String>,
    
    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub batches_generated: u64,
    pub batches_evicted: u64,
    pub max_live_tiles: usize,
    pub positions_published: u64,
    pub screenshots_published: u64,
    pub detections_matched: u64,
    pub detections_unmatched: u64,
    pub messages_dropped: u64,
}

/// Per-tick invariant checks over the registry.
#[derive(Debug, Default)]
struct InvariantChecker {
    last_z: BTreeMap<ActorRole, f64>,
    stopped_once: BTreeMap<ActorRole, bool>,
}

impl InvariantChecker {
    fn check(&mut self, scenario: ScenarioId, registry: &SceneRegistry) -> Result<(), String> {
        let bounds = &registry.config().bounds;
        
        for slot in registry.actors().filter(|slot| slot.is_ready()) {
            let z = slot.position().z;
            
            if let Some(&last) = self.last_z.get(&slot.role) {
                if z > last + EPSILON {
                    return Err(format!("{} moved backwards: {:.4} -> {:.4}", slot.role, last, z));
                }
            }
            self.last_z.insert(slot.role, z);
            
            if z < bounds.min_z - EPSILON || z > bounds.max_z + EPSILON {
                return Err(format!("{} left the travel interval at z={:.4}", slot.role, z));
            }
            
            let x = slot.position().x;
            if !(0.0..bounds.road_width + EPSILON).contains(&x) {
                return Err(format!("{} left the road at x={:.4}", slot.role, x));
            }
            
            if let Some(MotionRule::StopAndGo(profile)) = scenario.rule_for(slot.role) {
                if slot.state.stopped {
                    self.stopped_once.insert(slot.role, true);
                }
                let past_line = z < profile.stop_z - EPSILON;
                if past_line && slot.state.stop_frames <= profile.dwell_ticks && slot.state.stopped {
                    return Err(format!(
                        "{} crossed the stop line after {} of {} dwell ticks",
                        slot.role, slot.state.stop_frames, profile.dwell_ticks
                    ));
                }
            }
        }
        
        let world = registry.world();
        let stream = world.config();
        if world.tile_count() > stream.tile_cap() {
            return Err(format!("{} live tiles exceed cap {}", world.tile_count(), stream.tile_cap()));
        }
        if world.plane_count() > stream.max_planes {
            return Err(format!("{} ground planes exceed cap {}", world.plane_count(), stream.max_planes));
        }
        
        if let Some(car) = registry.car() {
            let z = car.position().z;
            if !world.covers(z) {
                return Err(format!("no road tile under the car at z={:.4}", z));
            }
            if !world.plane_covers(z) {
                return Err(format!("no ground plane under the car at z={:.4}", z));
            }
        }
        
        Ok(())
    }
    
    /// End-of-run outcome checks.
    fn finish(&self, scenario: ScenarioId, registry: &SceneRegistry, ticks: u64) -> Result<(), String> {
        if registry.tracked_count() < 2 {
            return Err(format!("only {} actors became ready", registry.tracked_count()));
        }
        
        if scenario.is_stop_and_go() {
            if ticks >= STOP_DEADLINE_TICKS {
                for role in scenario.roles() {
                    if !self.stopped_once.get(&role).copied().unwrap_or(false) {
                        return Err(format!("{} never reached its stop line", role));
                    }
                }
            }
            return Ok(());
        }
        
        // Overtakes: the faster actor must end ahead once it had time to pass
        let step = |role| match scenario.rule_for(role) {
            Some(MotionRule::Constant { step }) => step,
            _ => 0.0,
        };
        let [car, partner] = scenario.roles();
        let (fast, slow) = if step(car) > step(partner) { (car, partner) } else { (partner, car) };
        let (Some(fast_slot), Some(slow_slot)) = (registry.actor(fast), registry.actor(slow)) else {
            return Ok(());
        };
        
        let gap = fast_slot.position().z - slow_slot.position().z;
        let closing = step(fast) - step(slow);
        let clamped = slow_slot.position().z <= registry.config().bounds.min_z + EPSILON;
        let spawn_gap = registry.form().map(|f| f.distance).unwrap_or(0.0);
        let needed = (spawn_gap / closing).ceil() as u64 + 1;
        
        if ticks > needed + 60 && !clamped && gap >= 0.0 {
            return Err(format!("{} did not overtake {} within {} ticks", fast, slow, ticks));
        }
        Ok(())
    }
}

/// Runs traffic scenarios headless.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,
    
    /// Partner distance for the start form
    distance: f64,
    
    map_style: MapStyle,
    
    /// Maximum duration in seconds
    max_duration_secs: f64,
    
    scene: SceneConfig,
    
    /// Sample a frame for export every this many ticks
    export_interval: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            distance: 10.0,
            map_style: MapStyle::default(),
            max_duration_secs: 20.0,
            scene: SceneConfig::default(),
            export_interval: 10,
        }
    }
    
    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }
    
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance;
        self
    }
    
    pub fn with_map_style(mut self, map_style: MapStyle) -> Self {
        self.map_style = map_style;
        self
    }
    
    pub fn with_scene_config(mut self, scene: SceneConfig) -> Self {
        self.scene = scene;
        self
    }
    
    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_inner(scenario, None).await
    }
    
    /// Runs a scenario, sampling frames into an export.
    pub async fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let mut export = SimExport::new(scenario.name(), self.seed, self.map_style.name());
        let result = self.run_inner(scenario, Some(&mut export)).await;
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }
    
    async fn run_inner(&self, scenario: ScenarioId, export: Option<&mut SimExport>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        
        let mut metrics = ScenarioMetrics::default();
        let outcome = self.drive(scenario, &mut metrics, export).await;
        
        let (world, failure_reason) = match outcome {
            Ok(world) => (Some(world), None),
            Err((world, e)) => {
                warn!("{} failed: {}", scenario.name(), e);
                (world, Some(e.to_string()))
            }
        };
        
        let (total_ticks, final_time_secs, final_positions) = match &world {
            Some(world) => (
                world.tick_count(),
                world.time(),
                world
                    .registry()
                    .actors()
                    .filter(|slot| slot.is_ready())
                    .map(|slot| (slot.role, slot.position().z))
                    .collect(),
            ),
            None => (0, 0.0, BTreeMap::new()),
        };
        
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks,
            final_time_secs,
            final_positions,
            failure_reason,
            metrics,
        }
    }
    
    /// Runs the frame loop; on failure hands back the world (if one was
    /// built) with the error.
    async fn drive(
        &self,
        scenario: ScenarioId,
        metrics: &mut ScenarioMetrics,
        mut export: Option<&mut SimExport>,
    ) -> Result<SimWorld, (Option<SimWorld>, SimError)> {
        let config = SimConfig {
            seed: self.seed,
            scene: self.scene.clone(),
            ..Default::default()
        };
        let mut world = SimWorld::new(config).await.map_err(|e| (None, e))?;
        
        let form = StartForm::new(scenario, self.distance, self.map_style);
        if let Err(e) = world.input(InputEvent::Start(form)) {
            return Err((Some(world), e));
        }
        
        let frame_rate = world.registry().config().frame_rate_hz as f64;
        let target_ticks = (self.max_duration_secs * frame_rate) as u64;
        let mut checker = InvariantChecker::default();
        
        // Events since the last sampled frame
        let mut events = vec![SimEvent::info(format!("{} started", scenario.name()))];
        let mut ready = BTreeSet::new();
        
        for _ in 0..target_ticks {
            let summary = world.tick().await;
            let tick = world.tick_count();
            
            for event in &summary.batch_events {
                match event {
                    BatchEvent::Generated { batch, z_min, z_max } => {
                        metrics.batches_generated += 1;
                        events.push(SimEvent::info(format!("batch {} generated [{:.1}, {:.1}]", batch, z_min, z_max)));
                    }
                    BatchEvent::Evicted { batch } => {
                        metrics.batches_evicted += 1;
                        events.push(SimEvent::info(format!("batch {} evicted", batch)));
                    }
                }
            }
            for slot in world.registry().actors().filter(|slot| slot.is_ready()) {
                if ready.insert(slot.role) {
                    events.push(SimEvent::info(format!("{} ready", slot.role)));
                }
            }
            metrics.max_live_tiles = metrics.max_live_tiles.max(world.registry().world().tile_count());
            
            let violation = checker.check(scenario, world.registry()).err();
            
            if let Some(export) = export.as_deref_mut() {
                if let Some(reason) = &violation {
                    events.push(SimEvent::error(reason.clone()));
                }
                if tick % self.export_interval == 0 || violation.is_some() {
                    let mut frame = SimFrame::capture(world.time(), tick, world.registry());
                    frame.events = std::mem::take(&mut events);
                    export.add_frame(frame);
                }
            }
            
            if let Some(reason) = violation {
                self.collect(&world, metrics);
                return Err((Some(world), SimError::Invariant { tick, reason }));
            }
            
            if tick % 60 == 0 {
                debug!(
                    "  t={:.1}s | tiles={} | props={} | markers={}",
                    world.time(),
                    world.registry().world().tile_count(),
                    world.registry().scenery().props().len(),
                    world.registry().markers().len()
                );
            }
        }
        
        self.collect(&world, metrics);
        if let Err(reason) = checker.finish(scenario, world.registry(), world.tick_count()) {
            let tick = world.tick_count();
            return Err((Some(world), SimError::Invariant { tick, reason }));
        }
        Ok(world)
    }
    
    fn collect(&self, world: &SimWorld, metrics: &mut ScenarioMetrics) {
        let stats = world.runtime().stats();
        metrics.positions_published = stats.positions_published;
        metrics.screenshots_published = stats.screenshots_published;
        metrics.detections_matched = stats.detections_matched;
        metrics.detections_unmatched = stats.detections_unmatched;
        metrics.messages_dropped = world.broker.stats().dropped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[tokio::test]
    async fn test_motorist_overtake_passes() {
        let result = ScenarioRunner::new(42)
            .with_duration(8.0)
            .run(ScenarioId::MotoristOvertake)
            .await;
        
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 480);
        let motorist = result.final_positions[&ActorRole::Motorist];
        let car = result.final_positions[&ActorRole::Car];
        assert!(motorist < car);
    }
    
    #[tokio::test]
    async fn test_invalid_distance_fails_the_run() {
        let result = ScenarioRunner::new(42)
            .with_distance(500.0)
            .with_duration(1.0)
            .run(ScenarioId::CyclistStopAndGo)
            .await;
        
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("distance"));
    }
    
    #[tokio::test]
    async fn test_export_samples_frames() {
        let (result, export) = ScenarioRunner::new(7)
            .with_duration(2.0)
            .with_map_style(MapStyle::City)
            .run_with_export(ScenarioId::CyclistOvertake)
            .await;
        
        assert!(result.passed);
        assert_eq!(export.frames.len(), 12);
        assert_eq!(export.map_style, "city");
        assert!(export.passed);
        
        let messages: Vec<&str> = export.frames[0].events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["cyclist_overtake started", "car ready", "cyclist ready"]);
        assert!(export.frames[1..].iter().all(|f| f.events.is_empty()));
    }
    
    #[tokio::test]
    async fn test_export_records_streaming_events() {
        let (result, export) = ScenarioRunner::new(7)
            .with_duration(12.0)
            .run_with_export(ScenarioId::CyclistOvertake)
            .await;
        
        assert!(result.passed, "{:?}", result.failure_reason);
        let messages: Vec<&str> = export
            .frames
            .iter()
            .flat_map(|f| f.events.iter())
            .map(|e| e.message.as_str())
            .collect();
        assert!(messages.iter().any(|m| m.starts_with("batch") && m.contains("generated")));
        assert!(export.frames.iter().flat_map(|f| &f.events).all(|e| e.level.is_none()));
    }
}
