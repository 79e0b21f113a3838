//! Error types for the scene engine.

use roadscene_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
    
    #[error("Unknown map style: {0}")]
    UnknownMapStyle(String),
    
    #[error("Invalid start form: {0}")]
    InvalidForm(String),
    
    #[error("Invalid input line: {0}")]
    InvalidInput(String),
    
    #[error("Invalid configuration: {0}")]
    Config(String),
    
    #[error("Config file error: {0}")]
    ConfigIo(#[from] std::io::Error),
    
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    
    #[error("Malformed screenshot frame ({0} bytes)")]
    MalformedFrame(usize),
    
    #[error(transparent)]
    Env(#[from] EnvError),
}

pub type Result<T> = std::result::Result<T, SceneError>;
