//! Actors and their kinematic state.

use crate::tuning::{CAR_HEIGHT, RIDER_HEIGHT};
use nalgebra::Vector3;
use roadscene_env::LoadedModel;
use serde::{Deserialize, Serialize};

/// Role an actor plays in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// The lead actor; drives world streaming and the camera
    Car,
    Motorist,
    Cyclist,
}

impl ActorRole {
    pub const ALL: [ActorRole; 3] = [ActorRole::Car, ActorRole::Motorist, ActorRole::Cyclist];
    
    pub fn name(&self) -> &'static str {
        match self {
            ActorRole::Car => "car",
            ActorRole::Motorist => "motorist",
            ActorRole::Cyclist => "cyclist",
        }
    }
    
    /// Asset path of the role's model.
    pub fn model_path(&self) -> &'static str {
        match self {
            ActorRole::Car => "./models/avto.obj",
            ActorRole::Motorist => "./models/motorist.obj",
            ActorRole::Cyclist => "./models/cyclist.obj",
        }
    }
    
    /// Height of the model's origin above the road.
    pub fn ride_height(&self) -> f64 {
        match self {
            ActorRole::Car => CAR_HEIGHT,
            ActorRole::Motorist | ActorRole::Cyclist => RIDER_HEIGHT,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-actor kinematic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    /// Position; travel is towards negative z
    pub position: Vector3<f64>,
    
    /// Forward speed in units per tick (stop-and-go re-acceleration)
    pub speed: f64,
    
    /// Reached the stop line
    pub stopped: bool,
    
    /// Ticks spent stopped
    pub stop_frames: u32,
}

impl KinematicState {
    pub fn at(position: Vector3<f64>) -> Self {
        Self {
            position,
            speed: 0.0,
            stopped: false,
            stop_frames: 0,
        }
    }
}

/// An actor slot in the scene registry.
///
/// The kinematic state exists from scenario start; the actor only takes part
/// in updates once its model load has completed.
#[derive(Debug, Clone)]
pub struct ActorSlot {
    pub role: ActorRole,
    pub state: KinematicState,
    pub model: Option<LoadedModel>,
}

impl ActorSlot {
    pub fn new(role: ActorRole, position: Vector3<f64>) -> Self {
        Self {
            role,
            state: KinematicState::at(position),
            model: None,
        }
    }
    
    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }
    
    pub fn position(&self) -> &Vector3<f64> {
        &self.state.position
    }
}
