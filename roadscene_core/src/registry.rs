//! The scene registry: all state of a running scene in one owned struct.
//!
//! Asynchronous completions (model loads, detection replies) are applied
//! through methods that take the event as a value; nothing else mutates the
//! scene.

use crate::actor::{ActorRole, ActorSlot};
use crate::camera::{CameraMode, CameraPlacement, CameraSelector, FreeCamera, MoveKeys};
use crate::config::SceneConfig;
use crate::error::{Result, SceneError};
use crate::input::{InputEvent, Key, StartForm};
use crate::kinematics::{nudge, update_actors};
use crate::markers::MarkerRegistry;
use crate::scenario::ScenarioId;
use crate::scenery::{MapStyle, Scenery};
use crate::world::{BatchEvent, WorldStreamer};
use nalgebra::Vector3;
use roadscene_env::{EnvError, LoadedModel};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A model load the host must perform.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub generation: u64,
    pub role: ActorRole,
    pub path: String,
}

/// Completion of a [`LoadRequest`].
#[derive(Debug)]
pub struct LoadEvent {
    pub generation: u64,
    pub role: ActorRole,
    pub result: std::result::Result<LoadedModel, EnvError>,
}

impl LoadEvent {
    pub fn for_request(request: &LoadRequest, result: std::result::Result<LoadedModel, EnvError>) -> Self {
        Self {
            generation: request.generation,
            role: request.role,
            result,
        }
    }
}

/// What the host should do after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Handled,
    Load(Vec<LoadRequest>),
    Quit,
}

/// Summary of one frame step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSummary {
    pub actors_moved: usize,
    pub batch_events: Vec<BatchEvent>,
}

/// Travel direction of every actor.
pub fn travel_direction() -> Vector3<f64> {
    -Vector3::z()
}

pub struct SceneRegistry {
    config: SceneConfig,
    generation: u64,
    form: Option<StartForm>,
    actors: BTreeMap<ActorRole, ActorSlot>,
    world: WorldStreamer,
    scenery: Scenery,
    camera: CameraSelector,
    free_camera: FreeCamera,
    move_keys: MoveKeys,
    nudge_held: bool,
    markers: MarkerRegistry,
    running: bool,
    overlay_visible: bool,
}

impl SceneRegistry {
    /// Creates an empty scene after validating `config`.
    pub fn new(config: SceneConfig) -> Result<Self> {
        config.validate()?;
        let world = WorldStreamer::new(config.stream.clone());
        let markers = MarkerRegistry::new(config.telemetry.max_pending_markers);
        let scenery = Scenery::new(MapStyle::default(), config.seed);
        Ok(Self {
            config,
            generation: 0,
            form: None,
            actors: BTreeMap::new(),
            world,
            scenery,
            camera: CameraSelector::default(),
            free_camera: FreeCamera::default(),
            move_keys: MoveKeys::default(),
            nudge_held: false,
            markers,
            running: false,
            overlay_visible: true,
        })
    }
    
    // =========================================================================
    // SCENARIO LIFECYCLE
    // =========================================================================
    
    /// Clears the scene and populates it for `form`.
    ///
    /// Returns the model loads the host must start. Actors exist immediately
    /// but take no part in updates until their load completes.
    pub fn start_scenario(&mut self, form: StartForm) -> Result<Vec<LoadRequest>> {
        form.validate(&self.config.bounds)?;
        
        self.generation += 1;
        self.actors.clear();
        self.world.clear();
        self.scenery = Scenery::new(form.map_style, self.config.seed ^ self.generation);
        self.markers.clear();
        self.nudge_held = false;
        
        let scenario = form.scenario;
        let mut requests = Vec::new();
        for role in scenario.roles() {
            let position = scenario.spawn_position(role, form.distance);
            let mut slot = ActorSlot::new(role, position);
            slot.state.position.z = self.config.bounds.clamp_z(position.z);
            self.actors.insert(role, slot);
            requests.push(LoadRequest {
                generation: self.generation,
                role,
                path: role.model_path().to_string(),
            });
        }
        
        let car_z = self.actors[&ActorRole::Car].state.position.z;
        let events = self.world.reset(car_z);
        self.scenery.apply(&events, &self.config.stream, &self.config.bounds);
        
        self.form = Some(form);
        self.running = true;
        self.overlay_visible = false;
        
        info!(
            scenario = %scenario,
            generation = self.generation,
            tiles = self.world.tile_count(),
            "scenario started"
        );
        Ok(requests)
    }
    
    /// Restarts the last submitted form.
    pub fn restart(&mut self) -> Result<Vec<LoadRequest>> {
        let form = self
            .form
            .clone()
            .ok_or_else(|| SceneError::InvalidForm("nothing to reload".into()))?;
        self.start_scenario(form)
    }
    
    /// Applies a completed model load. Returns whether an actor became ready.
    pub fn on_model_loaded(&mut self, event: LoadEvent) -> bool {
        if event.generation != self.generation {
            debug!(
                role = %event.role,
                load_generation = event.generation,
                generation = self.generation,
                "stale model load ignored"
            );
            return false;
        }
        
        match event.result {
            Ok(model) => match self.actors.get_mut(&event.role) {
                Some(slot) => {
                    debug!(role = %event.role, path = %model.path, "model ready");
                    slot.model = Some(model);
                    true
                }
                None => false,
            },
            Err(e) => {
                warn!(role = %event.role, error = %e, "model load failed; actor stays absent");
                false
            }
        }
    }
    
    // =========================================================================
    // INPUT
    // =========================================================================
    
    pub fn handle_input(&mut self, event: InputEvent) -> Result<InputOutcome> {
        let outcome = match event {
            InputEvent::Start(form) => InputOutcome::Load(self.start_scenario(form)?),
            InputEvent::Quit => InputOutcome::Quit,
            InputEvent::MouseDown => {
                self.nudge_held = true;
                InputOutcome::Handled
            }
            InputEvent::MouseUp => {
                self.nudge_held = false;
                InputOutcome::Handled
            }
            InputEvent::KeyDown(Key::Space) => {
                self.running = !self.running;
                info!(running = self.running, "run state toggled");
                InputOutcome::Handled
            }
            InputEvent::KeyDown(Key::Char('c')) => {
                let mode = self.camera.cycle();
                info!(mode = mode.name(), "camera mode");
                InputOutcome::Handled
            }
            InputEvent::KeyDown(Key::Char('m')) => {
                self.overlay_visible = !self.overlay_visible;
                InputOutcome::Handled
            }
            InputEvent::KeyDown(Key::Char('r')) => InputOutcome::Load(self.restart()?),
            InputEvent::KeyDown(key) => {
                self.set_move_key(key, true);
                InputOutcome::Handled
            }
            InputEvent::KeyUp(key) => {
                self.set_move_key(key, false);
                InputOutcome::Handled
            }
        };
        Ok(outcome)
    }
    
    fn set_move_key(&mut self, key: Key, held: bool) {
        match key {
            Key::Char('w') => self.move_keys.forward = held,
            Key::Char('a') => self.move_keys.left = held,
            Key::Char('s') => self.move_keys.back = held,
            Key::Char('d') => self.move_keys.right = held,
            _ => {}
        }
    }
    
    // =========================================================================
    // FRAME
    // =========================================================================
    
    /// Runs one frame: kinematics, streaming, scenery, camera.
    pub fn step_frame(&mut self) -> FrameSummary {
        let mut summary = FrameSummary::default();
        
        if let (true, Some(scenario)) = (self.running, self.scenario()) {
            summary.actors_moved = update_actors(scenario, &mut self.actors, &self.config.bounds);
            
            if self.nudge_held {
                let bounds = &self.config.bounds;
                let target = self.nudge_target(scenario);
                if let Some(slot) = target.and_then(|role| self.actors.get_mut(&role)) {
                    nudge(&mut slot.state, bounds);
                }
            }
            
            if let Some(car) = self.car() {
                let car_z = car.state.position.z;
                summary.batch_events = self.world.stream(car_z);
                self.scenery
                    .apply(&summary.batch_events, &self.config.stream, &self.config.bounds);
            }
        }
        
        if self.camera.mode() == CameraMode::FreeOrbit {
            self.free_camera.apply_movement(self.move_keys);
        }
        
        summary
    }
    
    /// Role nudged by the mouse: the partner when ready, else the car.
    fn nudge_target(&self, scenario: ScenarioId) -> Option<ActorRole> {
        [scenario.partner(), ActorRole::Car]
            .into_iter()
            .find(|role| self.actors.get(role).is_some_and(ActorSlot::is_ready))
    }
    
    /// Placement of the main camera for the current mode.
    ///
    /// Falls back to the free camera while the car is not ready.
    pub fn camera_placement(&self) -> CameraPlacement {
        self.car()
            .and_then(|car| self.camera.mode().place(car.position(), &travel_direction()))
            .unwrap_or_else(|| self.free_camera.placement())
    }
    
    /// Viewpoint for screenshot telemetry, if the car is ready.
    pub fn dashcam(&self) -> Option<CameraPlacement> {
        self.car()
            .map(|car| CameraPlacement::dashcam(car.position(), &travel_direction()))
    }
    
    // =========================================================================
    // ACCESSORS
    // =========================================================================
    
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }
    
    pub fn generation(&self) -> u64 {
        self.generation
    }
    
    pub fn scenario(&self) -> Option<ScenarioId> {
        self.form.as_ref().map(|f| f.scenario)
    }
    
    pub fn form(&self) -> Option<&StartForm> {
        self.form.as_ref()
    }
    
    pub fn actors(&self) -> impl Iterator<Item = &ActorSlot> {
        self.actors.values()
    }
    
    pub fn actor(&self, role: ActorRole) -> Option<&ActorSlot> {
        self.actors.get(&role)
    }
    
    /// The car, once its model is loaded.
    pub fn car(&self) -> Option<&ActorSlot> {
        self.actors.get(&ActorRole::Car).filter(|slot| slot.is_ready())
    }
    
    /// Number of actors whose model is loaded.
    pub fn tracked_count(&self) -> usize {
        self.actors.values().filter(|slot| slot.is_ready()).count()
    }
    
    pub fn world(&self) -> &WorldStreamer {
        &self.world
    }
    
    pub fn scenery(&self) -> &Scenery {
        &self.scenery
    }
    
    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }
    
    pub fn markers_mut(&mut self) -> &mut MarkerRegistry {
        &mut self.markers
    }
    
    pub fn camera_mode(&self) -> CameraMode {
        self.camera.mode()
    }
    
    pub fn is_running(&self) -> bool {
        self.running
    }
    
    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }
    
    pub fn nudge_held(&self) -> bool {
        self.nudge_held
    }
}
