//! Telemetry payloads: position records, screenshot frames and detection
//! replies.
//!
//! Screenshot frames use a small binary layout so the PNG is not inflated by
//! a text encoding:
//!
//! ```text
//! [timestamp_ms: u64 LE][png bytes ...]
//! ```

use crate::actor::{ActorRole, ActorSlot};
use crate::camera::CameraPlacement;
use crate::error::{Result, SceneError};
use crate::registry::SceneRegistry;
use image::imageops::{self, FilterType};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Renderer hook: captures the scene from a viewpoint.
///
/// The rendering engine lives outside this crate; a capture may be
/// unavailable (no GPU surface yet), which skips the screenshot.
pub trait FrameSource {
    fn capture(&mut self, viewpoint: &CameraPlacement, scene: &SceneRegistry) -> Option<RgbaImage>;
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundedPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Position telemetry: role name to rounded position.
pub type PositionRecord = BTreeMap<String, RoundedPosition>;

/// Builds the record for every ready actor. `None` when no actor is tracked.
pub fn position_record<'a>(actors: impl IntoIterator<Item = &'a ActorSlot>) -> Option<PositionRecord> {
    let record: PositionRecord = actors
        .into_iter()
        .filter(|slot| slot.is_ready())
        .map(|slot| {
            let p = slot.position();
            (
                slot.role.name().to_string(),
                RoundedPosition {
                    x: round2(p.x),
                    y: round2(p.y),
                    z: round2(p.z),
                },
            )
        })
        .collect();
    
    if record.is_empty() {
        None
    } else {
        Some(record)
    }
}

/// Downscales (nearest neighbour) and PNG-encodes a captured frame.
pub fn encode_screenshot(frame: &RgbaImage, width: u32, height: u32) -> Result<Vec<u8>> {
    let scaled = if frame.dimensions() == (width, height) {
        frame.clone()
    } else {
        imageops::resize(frame, width, height, FilterType::Nearest)
    };
    
    let mut png = Vec::new();
    let encoder = PngEncoder::new(&mut png);
    encoder.write_image(scaled.as_raw(), width, height, ColorType::Rgba8.into())?;
    Ok(png)
}

/// A screenshot as published on the screenshot topic.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotFrame {
    pub timestamp_ms: u64,
    pub png: Vec<u8>,
}

impl ScreenshotFrame {
    pub const HEADER_SIZE: usize = 8;
    
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::HEADER_SIZE + self.png.len());
        bytes.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        bytes.extend_from_slice(&self.png);
        bytes
    }
    
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() <= Self::HEADER_SIZE {
            return Err(SceneError::MalformedFrame(data.len()));
        }
        let (header, png) = data.split_at(Self::HEADER_SIZE);
        let timestamp_ms = u64::from_le_bytes(
            header
                .try_into()
                .map_err(|_| SceneError::MalformedFrame(data.len()))?,
        );
        Ok(Self {
            timestamp_ms,
            png: png.to_vec(),
        })
    }
}

/// Detection reply from the consumer, correlated by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMessage {
    pub timestamp: u64,
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DetectionMessage {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
    
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Role name keyed lookup helper for consumers of [`PositionRecord`].
pub fn record_position(record: &PositionRecord, role: ActorRole) -> Option<&RoundedPosition> {
    record.get(role.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use nalgebra::Vector3;
    use roadscene_env::LoadedModel;
    
    fn slot(role: ActorRole, position: Vector3<f64>, ready: bool) -> ActorSlot {
        let mut slot = ActorSlot::new(role, position);
        if ready {
            slot.model = Some(LoadedModel {
                path: role.model_path().into(),
                scale: 0.1,
                mesh_count: 1,
            });
        }
        slot
    }
    
    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.005_1), -0.01);
        assert_eq!(round2(29.999), 30.0);
    }
    
    #[test]
    fn test_position_record_skips_unready() {
        let actors = vec![
            slot(ActorRole::Car, Vector3::new(1.5, 0.5, 12.3456), true),
            slot(ActorRole::Cyclist, Vector3::new(4.5, 1.0, 2.0), false),
        ];
        
        let record = position_record(&actors).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record_position(&record, ActorRole::Car).unwrap().z, 12.35);
        
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"car":{"x":1.5,"y":0.5,"z":12.35}}"#);
    }
    
    #[test]
    fn test_position_record_empty_when_nothing_tracked() {
        let actors = vec![slot(ActorRole::Car, Vector3::zeros(), false)];
        assert!(position_record(&actors).is_none());
        assert!(position_record(&Vec::<ActorSlot>::new()).is_none());
    }
    
    #[test]
    fn test_encode_screenshot_downscales() {
        let frame = RgbaImage::from_pixel(640, 480, Rgba([10, 20, 30, 255]));
        let png = encode_screenshot(&frame, 320, 240).unwrap();
        
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png).unwrap();
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 240);
        assert_eq!(decoded.to_rgba8().get_pixel(5, 5), &Rgba([10, 20, 30, 255]));
    }
    
    #[test]
    fn test_screenshot_frame_layout() {
        let frame = ScreenshotFrame {
            timestamp_ms: 1_704_067_200_123,
            png: vec![0x89, b'P', b'N', b'G'],
        };
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[..8], &1_704_067_200_123u64.to_le_bytes());
        assert_eq!(ScreenshotFrame::from_bytes(&bytes).unwrap(), frame);
        assert!(matches!(
            ScreenshotFrame::from_bytes(&bytes[..8]),
            Err(SceneError::MalformedFrame(8))
        ));
    }
    
    #[test]
    fn test_detection_parse() {
        let msg = DetectionMessage::parse(br#"{"timestamp": 42, "detected": true}"#).unwrap();
        assert_eq!(msg.timestamp, 42);
        assert!(msg.detected);
        assert!(msg.label.is_none());
        assert!(DetectionMessage::parse(b"not json").is_err());
    }
}
