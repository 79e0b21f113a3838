//! RoadScene Environment Abstraction Layer
//!
//! This crate provides the seams that let the RoadScene engine run both
//! **live** (tokio, a real message broker, a real renderer) and **headless**
//! (virtual clock, in-process broker, synthetic frames).
//!
//! # Core Concept: One Frame Task, Many Collaborators
//!
//! The scene state is owned by a single task. Everything that completes
//! asynchronously is reached through a trait and reports back as a value:
//! - Time (`now()`, `sleep()`)
//! - Messaging (`publish()`, `subscribe()`, `recv()`)
//! - Asset loading (`load()`)
//!
//! # Example
//!
//! ```ignore
//! use roadscene_env::{SceneContext, MessageBus};
//!
//! async fn frame_loop<Ctx: SceneContext, Bus: MessageBus>(ctx: &Ctx, bus: &Bus) {
//!     loop {
//!         tokio::select! {
//!             msg = bus.recv() => handle_message(msg),
//!             _ = ctx.sleep(Duration::from_millis(16)) => tick(),
//!         }
//!     }
//! }
//! ```

mod bus;
mod context;
mod error;
mod loader;
mod tokio_impl;
mod types;
#[cfg(feature = "zenoh")]
mod zenoh_bus;

pub use bus::{BusController, MessageBus};
pub use context::SceneContext;
pub use error::EnvError;
pub use loader::{AssetLoader, LoadedModel};
pub use tokio_impl::TokioContext;
pub use types::{ClientId, Message};
#[cfg(feature = "zenoh")]
pub use zenoh_bus::ZenohBus;
