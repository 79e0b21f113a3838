//! RoadScene Core - Driving scenario engine
//!
//! Animates a car and a motorist or cyclist along a road according to one of
//! four traffic scenarios, and keeps the world around them alive:
//! 1. **Kinematics**: per-tick motion rules (constant overtakes, stop-and-go)
//! 2. **Streaming**: road tiles and ground planes recycled ahead of the car
//! 3. **Cameras**: five placement strategies cycled by the user
//! 4. **Telemetry**: positions and screenshots over a message bus, with
//!    detection replies correlated back to screenshot markers

pub mod actor;
pub mod camera;
pub mod config;
pub mod error;
pub mod input;
pub mod kinematics;
pub mod markers;
pub mod registry;
pub mod runtime;
pub mod scenario;
pub mod scenery;
pub mod telemetry;
pub mod tuning;
pub mod world;

// Re-export key types for convenience
pub use actor::{ActorRole, ActorSlot, KinematicState};
pub use camera::{CameraMode, CameraPlacement, CameraSelector, FreeCamera};
pub use config::{SceneConfig, StreamConfig, TelemetryConfig, TravelBounds};
pub use error::{Result, SceneError};
pub use input::{InputEvent, Key, StartForm};
pub use markers::{Marker, MarkerColor, MarkerRegistry};
pub use registry::{FrameSummary, InputOutcome, LoadEvent, LoadRequest, SceneRegistry};
pub use runtime::{RuntimeStats, SceneRuntime};
pub use scenario::{MotionRule, ScenarioId, StopProfile};
pub use scenery::{MapStyle, Prop, PropKind, Scenery};
pub use telemetry::{DetectionMessage, FrameSource, PositionRecord, RoundedPosition, ScreenshotFrame};
pub use world::{BatchEvent, GroundPlane, RoadTile, WorldStreamer};
