//! Common types for the RoadScene environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a messaging client.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Creates a new random ClientId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a deterministic ClientId from a seed (for headless runs).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A message delivered on a topic.
///
/// The payload is opaque bytes; the receiving component decides how to
/// decode it based on the topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Topic the message was published on
    pub topic: String,
    
    /// Raw payload bytes
    pub payload: Vec<u8>,
    
    /// Arrival time (milliseconds since epoch, receiver's clock)
    pub received_ms: u64,
}

impl Message {
    /// Creates a new message.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, received_ms: u64) -> Self {
        Self {
            topic: topic.into(),
            payload,
            received_ms,
        }
    }
    
    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
