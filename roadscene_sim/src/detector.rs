//! Stand-in for the external detection consumer.
//!
//! Subscribes to screenshots, looks for two-wheeler pixels in the decoded
//! PNG and replies on the detection topic with the frame's timestamp.

use crate::bus::LoopbackBus;
use crate::raster::role_color;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roadscene_core::{ActorRole, DetectionMessage, ScreenshotFrame, TelemetryConfig};
use roadscene_env::{EnvError, MessageBus};
use tracing::{debug, warn};

pub struct DetectorStub {
    bus: LoopbackBus,
    rng: ChaCha8Rng,
    
    /// Probability of reporting nothing for a frame that shows a rider
    miss_rate: f64,
    
    screenshot_topic: String,
    detections_topic: String,
    replies: u64,
}

impl DetectorStub {
    /// Subscribes `bus` to the screenshot topic.
    pub async fn connect(bus: LoopbackBus, telemetry: &TelemetryConfig, seed: u64) -> Result<Self, EnvError> {
        bus.subscribe(&telemetry.screenshot_topic).await?;
        Ok(Self {
            bus,
            rng: ChaCha8Rng::seed_from_u64(seed),
            miss_rate: 0.0,
            screenshot_topic: telemetry.screenshot_topic.clone(),
            detections_topic: telemetry.detections_topic.clone(),
            replies: 0,
        })
    }
    
    pub fn with_miss_rate(mut self, miss_rate: f64) -> Self {
        self.miss_rate = miss_rate.clamp(0.0, 1.0);
        self
    }
    
    pub fn replies(&self) -> u64 {
        self.replies
    }
    
    /// Answers every waiting screenshot. Returns the number of replies sent.
    pub async fn pump(&mut self) -> usize {
        let mut sent = 0;
        for message in self.bus.drain() {
            if message.topic != self.screenshot_topic {
                continue;
            }
            let frame = match ScreenshotFrame::from_bytes(&message.payload) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "detector skipped malformed frame");
                    continue;
                }
            };
            let Some(label) = self.inspect(&frame.png) else {
                continue;
            };
            
            let missed = self.rng.gen::<f64>() < self.miss_rate;
            let reply = DetectionMessage {
                timestamp: frame.timestamp_ms,
                detected: label.is_some() && !missed,
                label: if missed { None } else { label },
            };
            let payload = match reply.to_bytes() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "detector could not encode reply");
                    continue;
                }
            };
            match self.bus.publish(&self.detections_topic, payload).await {
                Ok(()) => {
                    sent += 1;
                    self.replies += 1;
                    debug!(timestamp = reply.timestamp, detected = reply.detected, "detection sent");
                }
                Err(e) => warn!(error = %e, "detection publish failed"),
            }
        }
        sent
    }
    
    /// Decodes the PNG and names the first rider found in it.
    ///
    /// `None` when the image cannot be decoded; `Some(None)` when it shows
    /// no rider.
    fn inspect(&self, png: &[u8]) -> Option<Option<String>> {
        let image = match image::load_from_memory(png) {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                warn!(error = %e, "detector could not decode screenshot");
                return None;
            }
        };
        let found = [ActorRole::Motorist, ActorRole::Cyclist]
            .into_iter()
            .find(|role| image.pixels().any(|p| *p == role_color(*role)));
        Some(found.map(|role| role.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LoopbackBroker;
    use image::{Rgba, RgbaImage};
    use roadscene_core::telemetry::encode_screenshot;
    use roadscene_env::ClientId;
    
    async fn setup(broker: &std::sync::Arc<LoopbackBroker>) -> (LoopbackBus, DetectorStub) {
        let telemetry = TelemetryConfig::default();
        let scene = broker.client(ClientId::from_seed(1));
        scene.subscribe(&telemetry.detections_topic).await.unwrap();
        let detector = DetectorStub::connect(broker.client(ClientId::from_seed(2)), &telemetry, 5)
            .await
            .unwrap();
        (scene, detector)
    }
    
    async fn send_frame(scene: &LoopbackBus, timestamp_ms: u64, image: &RgbaImage) {
        let png = encode_screenshot(image, 32, 24).unwrap();
        let frame = ScreenshotFrame { timestamp_ms, png };
        scene.publish("scene/screenshot", frame.to_bytes()).await.unwrap();
    }
    
    #[tokio::test]
    async fn test_detects_rider_pixels() {
        let broker = LoopbackBroker::shared(1);
        let (scene, mut detector) = setup(&broker).await;
        
        let mut image = RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255]));
        for x in 10..20 {
            for y in 10..20 {
                image.put_pixel(x, y, role_color(ActorRole::Cyclist));
            }
        }
        send_frame(&scene, 77, &image).await;
        
        assert_eq!(detector.pump().await, 1);
        let reply = DetectionMessage::parse(&scene.try_recv().unwrap().payload).unwrap();
        assert_eq!(reply.timestamp, 77);
        assert!(reply.detected);
        assert_eq!(reply.label.as_deref(), Some("cyclist"));
    }
    
    #[tokio::test]
    async fn test_empty_frame_is_clear() {
        let broker = LoopbackBroker::shared(1);
        let (scene, mut detector) = setup(&broker).await;
        
        send_frame(&scene, 5, &RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255]))).await;
        scene.publish("scene/screenshot", vec![1, 2, 3]).await.unwrap();
        
        assert_eq!(detector.pump().await, 1);
        let reply = DetectionMessage::parse(&scene.try_recv().unwrap().payload).unwrap();
        assert!(!reply.detected);
        assert!(scene.try_recv().is_none());
    }
}
