//! Top-down software rasteriser used as the headless frame source.

use image::{Rgba, RgbaImage};
use roadscene_core::{ActorRole, CameraPlacement, FrameSource, PropKind, SceneRegistry};

/// Pixel colour of an actor role.
pub fn role_color(role: ActorRole) -> Rgba<u8> {
    match role {
        ActorRole::Car => rgb(0x1565c0),
        ActorRole::Motorist => rgb(0xffeb3b),
        ActorRole::Cyclist => rgb(0xff9800),
    }
}

fn prop_color(kind: PropKind) -> Rgba<u8> {
    match kind {
        PropKind::Tree => rgb(0x2e7d32),
        PropKind::Building => rgb(0x9e9e9e),
        PropKind::Rock => rgb(0x8d6e63),
    }
}

const ROAD_COLOR: u32 = 0x444444;

fn rgb(hex: u32) -> Rgba<u8> {
    Rgba([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255])
}

/// Renders the scene from above, centred between the viewpoint and its
/// target. Travel (negative z) points up the image.
pub struct TopDownRaster {
    width: u32,
    height: u32,
    
    /// Pixels per world unit
    scale: f64,
    
    available: bool,
    captures: u64,
}

impl TopDownRaster {
    pub fn new(width: u32, height: u32, scale: f64) -> Self {
        Self {
            width,
            height,
            scale,
            available: true,
            captures: 0,
        }
    }
    
    /// Simulates a renderer without a surface.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }
    
    pub fn captures(&self) -> u64 {
        self.captures
    }
    
    /// Fills the world-space rectangle `[x0, x1] x [z0, z1]`.
    fn fill(&self, image: &mut RgbaImage, center: (f64, f64), x: (f64, f64), z: (f64, f64), color: Rgba<u8>) {
        let to_px = |wx: f64, wz: f64| {
            (
                (wx - center.0) * self.scale + self.width as f64 / 2.0,
                (wz - center.1) * self.scale + self.height as f64 / 2.0,
            )
        };
        let (px0, py0) = to_px(x.0.min(x.1), z.0.min(z.1));
        let (px1, py1) = to_px(x.0.max(x.1), z.0.max(z.1));
        
        let clip = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
        let (px0, px1) = (clip(px0, self.width), clip(px1, self.width));
        let (py0, py1) = (clip(py0, self.height), clip(py1, self.height));
        
        for py in py0..py1 {
            for px in px0..px1 {
                image.put_pixel(px, py, color);
            }
        }
    }
}

impl Default for TopDownRaster {
    fn default() -> Self {
        Self::new(640, 480, 8.0)
    }
}

impl FrameSource for TopDownRaster {
    fn capture(&mut self, viewpoint: &CameraPlacement, scene: &SceneRegistry) -> Option<RgbaImage> {
        if !self.available {
            return None;
        }
        self.captures += 1;
        
        let mid = (viewpoint.position + viewpoint.look_at) / 2.0;
        let center = (mid.x, mid.z);
        let mut image = RgbaImage::from_pixel(self.width, self.height, rgb(scene.scenery().style().ground_color()));
        
        let road_width = scene.config().bounds.road_width;
        for tile in scene.world().tiles() {
            self.fill(&mut image, center, (0.0, road_width), (tile.z_min, tile.z_max), rgb(ROAD_COLOR));
        }
        
        for prop in scene.scenery().props() {
            let half = prop.scale / 2.0;
            self.fill(
                &mut image,
                center,
                (prop.position.x - half, prop.position.x + half),
                (prop.position.z - half, prop.position.z + half),
                prop_color(prop.kind),
            );
        }
        
        for actor in scene.actors().filter(|slot| slot.is_ready()) {
            let (half_w, half_l) = match actor.role {
                ActorRole::Car => (0.9, 2.0),
                _ => (0.4, 1.0),
            };
            let p = actor.position();
            self.fill(
                &mut image,
                center,
                (p.x - half_w, p.x + half_w),
                (p.z - half_l, p.z + half_l),
                role_color(actor.role),
            );
        }
        
        Some(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadscene_core::{LoadEvent, MapStyle, ScenarioId, SceneConfig, StartForm};
    use roadscene_env::LoadedModel;
    
    fn ready_scene() -> SceneRegistry {
        let mut scene = SceneRegistry::new(SceneConfig::default()).unwrap();
        let requests = scene
            .start_scenario(StartForm::new(ScenarioId::CyclistOvertake, 8.0, MapStyle::City))
            .unwrap();
        for request in &requests {
            let model = LoadedModel {
                path: request.path.clone(),
                scale: 0.1,
                mesh_count: 1,
            };
            scene.on_model_loaded(LoadEvent::for_request(request, Ok(model)));
        }
        scene
    }
    
    #[test]
    fn test_capture_draws_road_and_actors() {
        let scene = ready_scene();
        let mut raster = TopDownRaster::default();
        let image = raster.capture(&scene.dashcam().unwrap(), &scene).unwrap();
        
        assert_eq!(image.dimensions(), (640, 480));
        let has = |color: Rgba<u8>| image.pixels().any(|p| *p == color);
        assert!(has(rgb(ROAD_COLOR)));
        assert!(has(role_color(ActorRole::Car)));
        assert!(has(role_color(ActorRole::Cyclist)));
        assert!(!has(role_color(ActorRole::Motorist)));
    }
    
    #[test]
    fn test_unavailable_surface() {
        let scene = ready_scene();
        let mut raster = TopDownRaster::default();
        raster.set_available(false);
        
        assert!(raster.capture(&scene.dashcam().unwrap(), &scene).is_none());
        assert_eq!(raster.captures(), 0);
    }
}
