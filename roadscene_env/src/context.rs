//! Core environment context trait for the scene runtime.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the scene runtime can run
/// against the system clock (live) or a virtual clock (headless runs).
///
/// # Implementations
///
/// - **Live**: `TokioContext` - wraps `tokio::time`
/// - **Headless**: `SimContext` - virtual clock advanced per frame
#[async_trait]
pub trait SceneContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Telemetry intervals are measured against this clock.
    fn now(&self) -> Duration;
    
    /// Returns the wall-clock time used for client-generated timestamps.
    ///
    /// Screenshot markers are keyed by this value (milliseconds since epoch).
    fn system_time(&self) -> SystemTime;
    
    /// Suspends execution for the given duration.
    ///
    /// Live: wraps `tokio::time::sleep`
    /// Headless: advances the virtual clock
    async fn sleep(&self, duration: Duration);
    
    /// Spawns a background task (model loads, subscriber pumps).
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
    
    /// Returns the context's seed (for logging/debugging).
    ///
    /// Live contexts return 0.
    fn seed(&self) -> u64;
    
    /// Wall-clock milliseconds since the Unix epoch.
    fn timestamp_ms(&self) -> u64 {
        self.system_time()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
