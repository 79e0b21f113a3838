//! World streaming: a FIFO window of road tiles and ground planes that
//! follows the lead actor along the travel axis.
//!
//! ```text
//!   -z (travel)                                                  +z
//!   |<- batch n+1 ->|<--- batch n --->|<- batch n-1 ->|
//!   ^ forward edge        ^ threshold = edge + lookahead
//! ```
//!
//! Crossing the threshold appends a batch at the forward edge and evicts the
//! oldest batch from the back once more than `max_batches` are live.

use crate::config::StreamConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// A road tile spanning `[z_min, z_max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadTile {
    /// Monotonic generation order
    pub id: u64,
    pub batch: u64,
    pub z_min: f64,
    pub z_max: f64,
}

impl RoadTile {
    pub fn center_z(&self) -> f64 {
        (self.z_min + self.z_max) * 0.5
    }
    
    pub fn contains(&self, z: f64) -> bool {
        z >= self.z_min && z <= self.z_max
    }
}

/// A ground plane centred on `center_z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundPlane {
    pub id: u64,
    pub center_z: f64,
}

/// Emitted for every batch added or evicted, so scenery can follow.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Generated { batch: u64, z_min: f64, z_max: f64 },
    Evicted { batch: u64 },
}

/// Rolling window of world segments.
#[derive(Debug, Clone)]
pub struct WorldStreamer {
    config: StreamConfig,
    tiles: VecDeque<RoadTile>,
    planes: VecDeque<GroundPlane>,
    
    /// Most negative z covered by generated road
    forward_edge: f64,
    next_tile_id: u64,
    next_batch: u64,
    next_plane_id: u64,
}

impl WorldStreamer {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            tiles: VecDeque::new(),
            planes: VecDeque::new(),
            forward_edge: 0.0,
            next_tile_id: 0,
            next_batch: 0,
            next_plane_id: 0,
        }
    }
    
    /// Drops every segment.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.planes.clear();
    }
    
    /// Rebuilds the window around `lead_z`.
    pub fn reset(&mut self, lead_z: f64) -> Vec<BatchEvent> {
        self.clear();
        self.forward_edge = lead_z + self.config.initial_behind;
        self.push_plane(lead_z);
        self.stream(lead_z)
    }
    
    /// Z coordinate the lead actor must cross to trigger the next batch.
    pub fn threshold(&self) -> f64 {
        self.forward_edge + self.config.lookahead
    }
    
    /// Generates and evicts segments for the lead actor at `lead_z`.
    pub fn stream(&mut self, lead_z: f64) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        
        while lead_z < self.threshold() {
            events.push(self.push_batch());
            while self.tiles.len() > self.config.tile_cap() {
                if let Some(batch) = self.evict_oldest_batch() {
                    events.push(BatchEvent::Evicted { batch });
                }
            }
        }
        
        while let Some(newest) = self.planes.back() {
            if lead_z >= newest.center_z {
                break;
            }
            let center = newest.center_z - self.config.plane_spacing;
            self.push_plane(center);
        }
        
        events
    }
    
    fn push_batch(&mut self) -> BatchEvent {
        let batch = self.next_batch;
        self.next_batch += 1;
        
        let z_max = self.forward_edge;
        for _ in 0..self.config.batch_tiles {
            let tile = RoadTile {
                id: self.next_tile_id,
                batch,
                z_min: self.forward_edge - self.config.tile_length,
                z_max: self.forward_edge,
            };
            self.next_tile_id += 1;
            self.forward_edge = tile.z_min;
            self.tiles.push_back(tile);
        }
        
        debug!(batch, z_min = self.forward_edge, z_max, "road batch generated");
        BatchEvent::Generated {
            batch,
            z_min: self.forward_edge,
            z_max,
        }
    }
    
    fn evict_oldest_batch(&mut self) -> Option<u64> {
        let batch = self.tiles.front()?.batch;
        while self.tiles.front().is_some_and(|t| t.batch == batch) {
            self.tiles.pop_front();
        }
        debug!(batch, "road batch evicted");
        Some(batch)
    }
    
    fn push_plane(&mut self, center_z: f64) {
        self.planes.push_back(GroundPlane {
            id: self.next_plane_id,
            center_z,
        });
        self.next_plane_id += 1;
        while self.planes.len() > self.config.max_planes {
            self.planes.pop_front();
        }
    }
    
    /// Live tiles, oldest first.
    pub fn tiles(&self) -> impl Iterator<Item = &RoadTile> {
        self.tiles.iter()
    }
    
    /// Live ground planes, oldest first.
    pub fn planes(&self) -> impl Iterator<Item = &GroundPlane> {
        self.planes.iter()
    }
    
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
    
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
    
    pub fn forward_edge(&self) -> f64 {
        self.forward_edge
    }
    
    /// Whether some live tile lies under `z`.
    pub fn covers(&self, z: f64) -> bool {
        self.tiles.iter().any(|t| t.contains(z))
    }
    
    /// Whether some live plane lies under `z`.
    pub fn plane_covers(&self, z: f64) -> bool {
        let half = self.config.plane_spacing * 0.5;
        self.planes.iter().any(|p| (z - p.center_z).abs() <= half)
    }
    
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::max_actor_step;
    use crate::tuning::MAX_Z;
    use proptest::prelude::*;
    
    #[test]
    fn test_reset_builds_initial_window() {
        let mut world = WorldStreamer::new(StreamConfig::default());
        let events = world.reset(30.0);
        
        // 40 to -10, then -10 to -60: lead no longer below the threshold
        assert_eq!(events.len(), 2);
        assert_eq!(world.tile_count(), 20);
        assert_eq!(world.plane_count(), 1);
        assert!(world.covers(30.0));
        assert!(world.threshold() < 30.0);
    }
    
    #[test]
    fn test_eviction_is_fifo_and_capped() {
        let config = StreamConfig::default();
        let cap = config.tile_cap();
        let mut world = WorldStreamer::new(config);
        world.reset(30.0);
        
        let mut last_oldest = 0;
        let mut evicted = Vec::new();
        let mut z = 30.0;
        while z > -500.0 {
            z -= 0.5;
            for event in world.stream(z) {
                if let BatchEvent::Evicted { batch } = event {
                    evicted.push(batch);
                }
            }
            assert!(world.tile_count() <= cap);
            assert!(world.covers(z), "lead uncovered at z={}", z);
            assert!(world.plane_count() <= 2);
            assert!(world.plane_covers(z));
            
            let oldest = world.tiles().next().unwrap().id;
            assert!(oldest >= last_oldest);
            last_oldest = oldest;
        }
        
        assert!(!evicted.is_empty());
        assert!(evicted.windows(2).all(|w| w[0] + 1 == w[1]));
        assert_eq!(evicted[0], 0);
    }
    
    #[test]
    fn test_tiles_are_contiguous() {
        let mut world = WorldStreamer::new(StreamConfig::default());
        world.reset(0.0);
        world.stream(-200.0);
        
        let tiles: Vec<_> = world.tiles().collect();
        for pair in tiles.windows(2) {
            assert_eq!(pair[0].z_min, pair[1].z_max);
        }
    }
    
    #[test]
    fn test_clear_drops_everything() {
        let mut world = WorldStreamer::new(StreamConfig::default());
        world.reset(0.0);
        world.clear();
        assert_eq!(world.tile_count(), 0);
        assert_eq!(world.plane_count(), 0);
    }
    
    proptest! {
        #[test]
        fn prop_lead_always_covered(start in -200.0f64..100.0, steps in proptest::collection::vec(0.0f64..1.0, 1..400)) {
            let max_step = max_actor_step(MAX_Z);
            let mut world = WorldStreamer::new(StreamConfig::default());
            world.reset(start);
            let mut z = start;
            for fraction in steps {
                z -= fraction * max_step;
                world.stream(z);
                prop_assert!(world.covers(z));
                prop_assert!(world.tile_count() <= StreamConfig::default().tile_cap());
            }
        }
    }
}
