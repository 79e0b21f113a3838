//! Screenshot markers awaiting detection results.
//!
//! Each published screenshot leaves a marker at the car's position, keyed by
//! the client-generated timestamp sent with the image. Detection replies
//! carry the same timestamp back and recolour the marker.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerColor {
    /// No reply yet
    Pending,
    /// Consumer reported a detection
    Detected,
    /// Consumer reported nothing
    Clear,
}

impl MarkerColor {
    pub fn rgb(&self) -> u32 {
        match self {
            MarkerColor::Pending => 0x888888,
            MarkerColor::Detected => 0xff0000,
            MarkerColor::Clear => 0x00ff00,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub timestamp_ms: u64,
    pub position: Vector3<f64>,
    pub color: MarkerColor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Bounded correlation window, oldest evicted first.
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    markers: VecDeque<Marker>,
    capacity: usize,
}

impl MarkerRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            markers: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }
    
    /// Adds a pending marker. Returns the evicted marker, if any.
    pub fn register(&mut self, timestamp_ms: u64, position: Vector3<f64>) -> Option<Marker> {
        self.markers.push_back(Marker {
            timestamp_ms,
            position,
            color: MarkerColor::Pending,
            label: None,
        });
        if self.markers.len() > self.capacity {
            self.markers.pop_front()
        } else {
            None
        }
    }
    
    /// Applies a detection result to the marker with `timestamp_ms`.
    ///
    /// Returns `None` when no live marker has that timestamp.
    pub fn resolve(&mut self, timestamp_ms: u64, detected: bool, label: Option<String>) -> Option<&Marker> {
        let marker = self
            .markers
            .iter_mut()
            .rev()
            .find(|m| m.timestamp_ms == timestamp_ms)?;
        marker.color = if detected {
            MarkerColor::Detected
        } else {
            MarkerColor::Clear
        };
        marker.label = label;
        Some(marker)
    }
    
    pub fn get(&self, timestamp_ms: u64) -> Option<&Marker> {
        self.markers.iter().find(|m| m.timestamp_ms == timestamp_ms)
    }
    
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }
    
    pub fn len(&self) -> usize {
        self.markers.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
    
    pub fn pending(&self) -> usize {
        self.markers
            .iter()
            .filter(|m| m.color == MarkerColor::Pending)
            .count()
    }
    
    pub fn clear(&mut self) {
        self.markers.clear();
    }
}
