//! Publish/subscribe messaging abstraction.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{ClientId, Message};

/// Abstraction for the messaging channel between the scene and its consumers.
///
/// # Implementations
///
/// - **Live**: `ZenohBus` (feature `zenoh`) against a router endpoint
/// - **Headless**: `LoopbackBus` with configurable topic loss
///
/// # Message Flow
///
/// ```text
/// Scene                      Broker                    Consumer
///   |                           |                          |
///   |-- publish(topic, bytes) ->|                          |
///   |                           |-- [per-topic order] ---->|
///   |                           |<-- publish(detections) --|
///   |<-- recv() -> message -----|                          |
/// ```
///
/// Delivery is at-least-once; only per-topic arrival order is relied upon.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    /// Publishes a payload on a topic.
    ///
    /// # Returns
    /// * `Ok(())` - Message handed to the broker
    /// * `Err(EnvError::Publish)` - Immediate failure (closed, unreachable)
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EnvError>;
    
    /// Registers interest in a topic. Matching messages arrive via `recv()`.
    async fn subscribe(&self, topic: &str) -> Result<(), EnvError>;
    
    /// Receives the next message on any subscribed topic.
    ///
    /// # Returns
    /// * `Some(message)` - A message arrived
    /// * `None` - The inbox was closed (shutdown)
    async fn recv(&self) -> Option<Message>;
    
    /// Returns this client's ID.
    fn client_id(&self) -> ClientId;
}

/// Fault injection for in-process brokers.
pub trait BusController: Send + Sync {
    /// Drops every message published on `topic` until healed.
    fn block_topic(&self, topic: &str);
    
    /// Removes all blocks and loss settings.
    fn heal_all(&self);
    
    /// Sets the loss probability for a topic (0.0 - 1.0).
    fn set_topic_loss(&self, topic: &str, loss_rate: f64);
}
