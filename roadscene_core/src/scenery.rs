//! Procedural scenery placed beside each road batch.

use crate::config::{StreamConfig, TravelBounds};
use crate::error::SceneError;
use crate::world::BatchEvent;
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Map style chosen in the start form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStyle {
    #[default]
    Countryside,
    City,
    Desert,
}

impl MapStyle {
    pub fn name(&self) -> &'static str {
        match self {
            MapStyle::Countryside => "countryside",
            MapStyle::City => "city",
            MapStyle::Desert => "desert",
        }
    }
    
    /// Ground plane colour (0xRRGGBB).
    pub fn ground_color(&self) -> u32 {
        match self {
            MapStyle::Countryside => 0x3a7d2c,
            MapStyle::City => 0x6b6b6b,
            MapStyle::Desert => 0xd8b36a,
        }
    }
    
    pub fn prop_kind(&self) -> PropKind {
        match self {
            MapStyle::Countryside => PropKind::Tree,
            MapStyle::City => PropKind::Building,
            MapStyle::Desert => PropKind::Rock,
        }
    }
}

impl std::str::FromStr for MapStyle {
    type Err = SceneError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "countryside" | "grass" => Ok(MapStyle::Countryside),
            "city" | "urban" => Ok(MapStyle::City),
            "desert" | "sand" => Ok(MapStyle::Desert),
            _ => Err(SceneError::UnknownMapStyle(s.to_string())),
        }
    }
}

impl std::fmt::Display for MapStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropKind {
    Tree,
    Building,
    Rock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub kind: PropKind,
    pub batch: u64,
    pub position: Vector3<f64>,
    pub scale: f64,
}

/// Scenery props, kept in step with the road batches they belong to.
#[derive(Debug, Clone)]
pub struct Scenery {
    style: MapStyle,
    rng: ChaCha8Rng,
    props: Vec<Prop>,
}

impl Scenery {
    pub fn new(style: MapStyle, seed: u64) -> Self {
        Self {
            style,
            rng: ChaCha8Rng::seed_from_u64(seed),
            props: Vec::new(),
        }
    }
    
    pub fn style(&self) -> MapStyle {
        self.style
    }
    
    /// Spawns or evicts props for each batch event.
    pub fn apply(&mut self, events: &[BatchEvent], stream: &StreamConfig, bounds: &TravelBounds) {
        for event in events {
            match *event {
                BatchEvent::Generated { batch, z_min, z_max } => {
                    for _ in 0..stream.props_per_batch {
                        let prop = self.random_prop(batch, z_min, z_max, stream, bounds);
                        self.props.push(prop);
                    }
                }
                BatchEvent::Evicted { batch } => {
                    self.props.retain(|p| p.batch != batch);
                }
            }
        }
    }
    
    fn random_prop(
        &mut self,
        batch: u64,
        z_min: f64,
        z_max: f64,
        stream: &StreamConfig,
        bounds: &TravelBounds,
    ) -> Prop {
        let z = self.rng.gen_range(z_min..z_max);
        let offset = stream.prop_edge_margin + self.rng.gen_range(0.0..stream.prop_band);
        let x = if self.rng.gen_bool(0.5) {
            -offset
        } else {
            bounds.road_width + offset
        };
        let scale = match self.style.prop_kind() {
            PropKind::Tree => self.rng.gen_range(0.8..1.6),
            PropKind::Building => self.rng.gen_range(2.0..6.0),
            PropKind::Rock => self.rng.gen_range(0.3..1.0),
        };
        
        Prop {
            kind: self.style.prop_kind(),
            batch,
            position: Vector3::new(x, 0.0, z),
            scale,
        }
    }
    
    pub fn props(&self) -> &[Prop] {
        &self.props
    }
}
