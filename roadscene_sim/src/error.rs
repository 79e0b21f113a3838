//! Error types for the simulation harness.

use roadscene_core::SceneError;
use roadscene_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    
    #[error(transparent)]
    Env(#[from] EnvError),
    
    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    #[error("Invariant violated at tick {tick}: {reason}")]
    Invariant { tick: u64, reason: String },
}
