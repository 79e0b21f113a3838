//! RoadScene headless harness
//!
//! Runs the scene engine without a renderer, a GPU or a network:
//! - **Time**: virtual clock advanced one frame per tick
//! - **Messaging**: in-process broker with per-topic loss and blocking
//! - **Rendering**: top-down software rasteriser as the frame source
//! - **Consumer**: a detector stub that answers screenshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock)                           │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                        │                            │
//! │  ┌────▼─────────┐         ┌────▼────────┐                   │
//! │  │ SceneRuntime │◄───────►│ DetectorStub│                   │
//! │  │              │ Loopback│             │                   │
//! │  └──────┬───────┘  Broker └─────────────┘                   │
//! │         │                                                   │
//! │  ┌──────▼──────────────┐                                    │
//! │  │   TopDownRaster     │                                    │
//! │  └─────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use roadscene_sim::ScenarioRunner;
//! use roadscene_core::ScenarioId;
//!
//! let result = ScenarioRunner::new(42)
//!     .with_duration(20.0)
//!     .run(ScenarioId::CyclistStopAndGo)
//!     .await;
//! assert!(result.passed);
//! ```

mod bus;
mod context;
mod detector;
mod error;
mod exporter;
mod loader;
mod raster;
mod runner;
mod world;

pub use bus::{BrokerStats, LoopbackBroker, LoopbackBus};
pub use context::SimContext;
pub use detector::DetectorStub;
pub use error::SimError;
pub use exporter::{ActorPosition, SimEvent, SimExport, SimFrame};
pub use loader::SimAssetLoader;
pub use raster::{role_color, TopDownRaster};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
