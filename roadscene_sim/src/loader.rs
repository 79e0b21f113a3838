//! Stand-in asset loader.
//!
//! Geometry never leaves the renderer, so the harness only decides whether a
//! load succeeds and how long it takes.

use async_trait::async_trait;
use roadscene_env::{AssetLoader, EnvError, LoadedModel};
use std::collections::HashSet;
use std::time::Duration;

pub struct SimAssetLoader {
    /// Paths that fail to load
    failing: HashSet<String>,
    
    /// Wall-clock delay per load (live mode only)
    latency: Option<Duration>,
}

impl SimAssetLoader {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            latency: None,
        }
    }
    
    /// Makes loads of `path` fail.
    pub fn with_failing(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }
    
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
    
    /// Loads synchronously; used by the headless world, which schedules
    /// completions by frame instead of by time.
    pub fn load_now(&self, path: &str) -> Result<LoadedModel, EnvError> {
        if self.failing.contains(path) {
            return Err(EnvError::load(path, "asset not found"));
        }
        Ok(LoadedModel {
            path: path.to_string(),
            scale: 0.1,
            mesh_count: 1,
        })
    }
}

impl Default for SimAssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetLoader for SimAssetLoader {
    async fn load(&self, path: &str) -> Result<LoadedModel, EnvError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.load_now(path)
    }
}
