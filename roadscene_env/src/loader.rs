//! Asset loading abstraction.

use async_trait::async_trait;
use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Handle to a model that finished loading.
///
/// Geometry stays with the renderer; the scene only needs to know the load
/// completed and how the model was normalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModel {
    /// Asset path the model was loaded from
    pub path: String,
    
    /// Uniform scale applied after centring
    pub scale: f64,
    
    /// Number of meshes in the model
    pub mesh_count: usize,
}

/// Asynchronous mesh/texture loader.
#[async_trait]
pub trait AssetLoader: Send + Sync + 'static {
    /// Loads the asset at `path`.
    ///
    /// # Returns
    /// * `Ok(model)` - The asset is ready to be placed
    /// * `Err(EnvError::Load)` - The asset is missing or malformed
    async fn load(&self, path: &str) -> Result<LoadedModel, EnvError>;
}
