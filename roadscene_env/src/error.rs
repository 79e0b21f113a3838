//! Error types for the RoadScene environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Publishing a message failed (broker gone, channel closed, etc.)
    #[error("Publish failed on '{topic}': {reason}")]
    Publish { topic: String, reason: String },
    
    /// Subscribing to a topic failed
    #[error("Subscribe failed on '{topic}': {reason}")]
    Subscribe { topic: String, reason: String },
    
    /// Connecting to the broker endpoint failed
    #[error("Connection error: {0}")]
    Connect(String),
    
    /// An asset could not be loaded
    #[error("Failed to load asset '{path}': {reason}")]
    Load { path: String, reason: String },
    
    /// Payload serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
    
    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a publish error.
    pub fn publish(topic: &str, reason: impl std::fmt::Display) -> Self {
        Self::Publish {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }
    
    /// Creates a subscribe error.
    pub fn subscribe(topic: &str, reason: impl std::fmt::Display) -> Self {
        Self::Subscribe {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }
    
    /// Creates a load error.
    pub fn load(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
