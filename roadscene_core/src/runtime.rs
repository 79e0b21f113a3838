//! Scene runtime - drives the registry against an environment context and a
//! message bus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SceneRuntime                          │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            Context: SceneContext                       │  │
//! │  │  • now() → telemetry timers                            │  │
//! │  │  • sleep() → frame pacing                              │  │
//! │  │  • spawn() → model loads                               │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                              │                               │
//! │  ┌────────────┐ ┌───────────┐ ┌──────────┐ ┌─────────────┐   │
//! │  │ KINEMATICS │→│ STREAMING │→│ SCENERY  │→│   CAMERA    │   │
//! │  └────────────┘ └───────────┘ └──────────┘ └─────────────┘   │
//! │                              │                               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  TELEMETRY: positions, screenshots, detections (Bus)   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use roadscene_core::{SceneConfig, SceneRuntime};
//! use roadscene_env::TokioContext;
//!
//! let mut runtime = SceneRuntime::new(TokioContext::shared(), bus, SceneConfig::default())?;
//! runtime.run(inputs, loader, &mut renderer).await?;
//! ```

use crate::config::SceneConfig;
use crate::error::Result;
use crate::input::InputEvent;
use crate::markers::Marker;
use crate::registry::{FrameSummary, InputOutcome, LoadEvent, LoadRequest, SceneRegistry};
use crate::telemetry::{encode_screenshot, position_record, DetectionMessage, FrameSource, ScreenshotFrame};
use roadscene_env::{AssetLoader, Message, MessageBus, SceneContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Counters kept by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuntimeStats {
    pub frames: u64,
    pub positions_published: u64,
    pub screenshots_published: u64,
    pub publish_failures: u64,
    pub detections_matched: u64,
    pub detections_unmatched: u64,
    pub detections_malformed: u64,
}

/// A scene bound to its environment.
///
/// Generic over the context and bus implementations, so the same runtime
/// runs live (tokio, zenoh) or headless (virtual clock, loopback broker).
pub struct SceneRuntime<Ctx, Bus>
where
    Ctx: SceneContext,
    Bus: MessageBus,
{
    /// Environment context
    pub context: Arc<Ctx>,
    
    /// Message bus
    pub bus: Arc<Bus>,
    
    registry: SceneRegistry,
    
    /// Context time of the last position publish
    last_positions: Duration,
    
    /// Context time of the last screenshot
    last_screenshot: Duration,
    
    stats: RuntimeStats,
}

impl<Ctx, Bus> SceneRuntime<Ctx, Bus>
where
    Ctx: SceneContext,
    Bus: MessageBus,
{
    /// Creates a runtime after validating `config`.
    pub fn new(context: Arc<Ctx>, bus: Arc<Bus>, config: SceneConfig) -> Result<Self> {
        let registry = SceneRegistry::new(config)?;
        let now = context.now();
        Ok(Self {
            context,
            bus,
            registry,
            last_positions: now,
            last_screenshot: now,
            stats: RuntimeStats::default(),
        })
    }
    
    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }
    
    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }
    
    /// Subscribes to the detection topic.
    pub async fn subscribe_detections(&self) -> Result<()> {
        let topic = &self.registry.config().telemetry.detections_topic;
        self.bus.subscribe(topic).await?;
        info!(client = %self.bus.client_id(), topic = %topic, "subscribed to detections");
        Ok(())
    }
    
    // =========================================================================
    // EVENTS
    // =========================================================================
    
    pub fn handle_input(&mut self, event: InputEvent) -> Result<InputOutcome> {
        self.registry.handle_input(event)
    }
    
    pub fn on_model_loaded(&mut self, event: LoadEvent) -> bool {
        self.registry.on_model_loaded(event)
    }
    
    /// Applies an inbound bus message.
    ///
    /// Returns the resolved marker. Unmatched and malformed detections are
    /// logged and dropped.
    pub fn on_message(&mut self, message: &Message) -> Option<&Marker> {
        if message.topic != self.registry.config().telemetry.detections_topic {
            debug!(topic = %message.topic, "ignoring message on unexpected topic");
            return None;
        }
        
        let detection = match DetectionMessage::parse(&message.payload) {
            Ok(detection) => detection,
            Err(e) => {
                warn!(error = %e, bytes = message.size(), "malformed detection dropped");
                self.stats.detections_malformed += 1;
                return None;
            }
        };
        
        let timestamp = detection.timestamp;
        match self
            .registry
            .markers_mut()
            .resolve(timestamp, detection.detected, detection.label)
        {
            Some(marker) => {
                self.stats.detections_matched += 1;
                debug!(timestamp, color = ?marker.color, "marker resolved");
                Some(marker)
            }
            None => {
                self.stats.detections_unmatched += 1;
                warn!(timestamp, "detection for unknown marker dropped");
                None
            }
        }
    }
    
    // =========================================================================
    // FRAME & TELEMETRY
    // =========================================================================
    
    /// Runs one frame of scene logic.
    pub fn frame(&mut self) -> FrameSummary {
        self.stats.frames += 1;
        self.registry.step_frame()
    }
    
    /// Publishes the position record.
    ///
    /// Returns `Ok(false)` without touching the bus when no actor is ready.
    pub async fn publish_positions(&mut self) -> Result<bool> {
        let Some(record) = position_record(self.registry.actors()) else {
            return Ok(false);
        };
        let payload = serde_json::to_vec(&record)?;
        let topic = &self.registry.config().telemetry.positions_topic;
        self.bus.publish(topic, payload).await?;
        self.stats.positions_published += 1;
        Ok(true)
    }
    
    /// Captures, encodes and publishes a dashcam screenshot, then registers
    /// its marker.
    ///
    /// Returns the screenshot timestamp, or `None` when the car is not ready
    /// or the frame source has nothing to offer.
    pub async fn publish_screenshot(&mut self, source: &mut dyn FrameSource) -> Result<Option<u64>> {
        let Some(car) = self.registry.car().map(|car| *car.position()) else {
            return Ok(None);
        };
        let Some(viewpoint) = self.registry.dashcam() else {
            return Ok(None);
        };
        let Some(image) = source.capture(&viewpoint, &self.registry) else {
            debug!("frame source returned no image");
            return Ok(None);
        };
        
        let telemetry = &self.registry.config().telemetry;
        let png = encode_screenshot(&image, telemetry.screenshot_width, telemetry.screenshot_height)?;
        let timestamp_ms = self.context.timestamp_ms();
        let frame = ScreenshotFrame { timestamp_ms, png };
        
        self.bus.publish(&telemetry.screenshot_topic, frame.to_bytes()).await?;
        if let Some(evicted) = self.registry.markers_mut().register(timestamp_ms, car) {
            debug!(timestamp = evicted.timestamp_ms, "oldest marker evicted");
        }
        self.stats.screenshots_published += 1;
        Ok(Some(timestamp_ms))
    }
    
    /// Fires any telemetry timer that is due. Publish failures are logged.
    pub async fn poll_timers(&mut self, source: &mut dyn FrameSource) {
        let now = self.context.now();
        let telemetry = self.registry.config().telemetry.clone();
        
        if now.saturating_sub(self.last_positions) >= telemetry.position_interval() {
            self.last_positions = now;
            if let Err(e) = self.publish_positions().await {
                self.stats.publish_failures += 1;
                warn!(error = %e, "position publish failed");
            }
        }
        
        if now.saturating_sub(self.last_screenshot) >= telemetry.screenshot_interval() {
            self.last_screenshot = now;
            if let Err(e) = self.publish_screenshot(source).await {
                self.stats.publish_failures += 1;
                warn!(error = %e, "screenshot publish failed");
            }
        }
    }
    
    fn spawn_loads<L: AssetLoader>(
        &self,
        requests: Vec<LoadRequest>,
        loader: &Arc<L>,
        completions: &mpsc::UnboundedSender<LoadEvent>,
    ) {
        for request in requests {
            let loader = Arc::clone(loader);
            let completions = completions.clone();
            self.context.spawn("model-load", async move {
                let result = loader.load(&request.path).await;
                // Receiver is gone only after the runtime stopped
                let _ = completions.send(LoadEvent::for_request(&request, result));
            });
        }
    }
    
    // =========================================================================
    // MAIN LOOP
    // =========================================================================
    
    /// Runs the scene until a `Quit` event or the input channel closes.
    ///
    /// All scene mutation happens on this task; model loads complete
    /// through a channel and bus messages through `recv()`.
    pub async fn run<L: AssetLoader>(
        &mut self,
        mut inputs: mpsc::Receiver<InputEvent>,
        loader: Arc<L>,
        source: &mut dyn FrameSource,
    ) -> Result<()> {
        self.subscribe_detections().await?;
        
        let (load_tx, mut load_rx) = mpsc::unbounded_channel::<LoadEvent>();
        let period = self.registry.config().frame_period();
        let mut bus_open = true;
        
        let context = Arc::clone(&self.context);
        let bus = Arc::clone(&self.bus);
        // Lives across iterations so other events never postpone a frame
        let mut next_frame = context.sleep(period);
        
        info!(frame_rate = self.registry.config().frame_rate_hz, "scene runtime started");
        
        loop {
            tokio::select! {
                _ = &mut next_frame => {
                    next_frame = context.sleep(period);
                    self.frame();
                    self.poll_timers(source).await;
                }
                event = inputs.recv() => {
                    let Some(event) = event else {
                        info!("input closed");
                        break;
                    };
                    match self.handle_input(event) {
                        Ok(InputOutcome::Load(requests)) => self.spawn_loads(requests, &loader, &load_tx),
                        Ok(InputOutcome::Quit) => break,
                        Ok(InputOutcome::Handled) => {}
                        Err(e) => warn!(error = %e, "input rejected"),
                    }
                }
                Some(event) = load_rx.recv() => {
                    self.on_model_loaded(event);
                }
                message = bus.recv(), if bus_open => match message {
                    Some(message) => {
                        self.on_message(&message);
                    }
                    None => {
                        warn!("bus inbox closed; detections disabled");
                        bus_open = false;
                    }
                },
            }
        }
        
        info!(frames = self.stats.frames, "scene runtime stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorRole;
    use crate::camera::CameraPlacement;
    use crate::input::{Key, StartForm};
    use crate::markers::MarkerColor;
    use crate::scenario::ScenarioId;
    use crate::scenery::MapStyle;
    use crate::telemetry::PositionRecord;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use roadscene_env::{ClientId, EnvError, LoadedModel, TokioContext};
    use std::future::Future;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};
    
    /// Virtual clock: sleeping advances time instantly.
    struct ManualContext {
        now: Mutex<Duration>,
    }
    
    impl ManualContext {
        fn new() -> Arc<Self> {
            Arc::new(Self { now: Mutex::new(Duration::ZERO) })
        }
        
        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }
    
    #[async_trait]
    impl SceneContext for ManualContext {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }
        
        fn system_time(&self) -> SystemTime {
            UNIX_EPOCH + Duration::from_secs(1_700_000_000) + self.now()
        }
        
        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
            tokio::task::yield_now().await;
        }
        
        fn spawn<F>(&self, _name: &str, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            tokio::spawn(future);
        }
        
        fn seed(&self) -> u64 {
            1
        }
    }
    
    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }
    
    impl RecordingBus {
        fn on(&self, topic: &str) -> Vec<Vec<u8>> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }
    
    #[async_trait]
    impl MessageBus for RecordingBus {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> std::result::Result<(), EnvError> {
            if self.fail {
                return Err(EnvError::publish(topic, "broker down"));
            }
            self.published.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
        
        async fn subscribe(&self, _topic: &str) -> std::result::Result<(), EnvError> {
            Ok(())
        }
        
        async fn recv(&self) -> Option<Message> {
            None
        }
        
        fn client_id(&self) -> ClientId {
            ClientId::from_seed(1)
        }
    }
    
    struct SolidFrames;
    
    impl FrameSource for SolidFrames {
        fn capture(&mut self, _viewpoint: &CameraPlacement, _scene: &SceneRegistry) -> Option<RgbaImage> {
            Some(RgbaImage::from_pixel(640, 480, Rgba([10, 20, 30, 255])))
        }
    }
    
    struct InstantLoader;
    
    #[async_trait]
    impl AssetLoader for InstantLoader {
        async fn load(&self, path: &str) -> std::result::Result<LoadedModel, EnvError> {
            Ok(LoadedModel {
                path: path.to_string(),
                scale: 1.0,
                mesh_count: 1,
            })
        }
    }
    
    fn runtime(bus: RecordingBus) -> (Arc<ManualContext>, SceneRuntime<ManualContext, RecordingBus>) {
        let ctx = ManualContext::new();
        let runtime = SceneRuntime::new(ctx.clone(), Arc::new(bus), SceneConfig::default()).unwrap();
        (ctx, runtime)
    }
    
    fn start_ready(runtime: &mut SceneRuntime<ManualContext, RecordingBus>, scenario: ScenarioId) {
        let form = StartForm::new(scenario, 10.0, MapStyle::Countryside);
        let InputOutcome::Load(requests) = runtime.handle_input(InputEvent::Start(form)).unwrap() else {
            panic!("start should request loads");
        };
        for request in &requests {
            let model = LoadedModel {
                path: request.path.clone(),
                scale: 1.0,
                mesh_count: 1,
            };
            runtime.on_model_loaded(LoadEvent::for_request(request, Ok(model)));
        }
    }
    
    #[tokio::test]
    async fn test_no_positions_without_ready_actors() {
        let (_ctx, mut runtime) = runtime(RecordingBus::default());
        assert!(!runtime.publish_positions().await.unwrap());
        assert!(runtime.bus.published.lock().unwrap().is_empty());
        
        runtime
            .handle_input(InputEvent::Start(StartForm::new(
                ScenarioId::CyclistOvertake,
                10.0,
                MapStyle::City,
            )))
            .unwrap();
        assert!(!runtime.publish_positions().await.unwrap());
        assert!(runtime.bus.published.lock().unwrap().is_empty());
    }
    
    #[tokio::test]
    async fn test_position_record_payload() {
        let (_ctx, mut runtime) = runtime(RecordingBus::default());
        start_ready(&mut runtime, ScenarioId::CyclistOvertake);
        runtime.frame();
        
        assert!(runtime.publish_positions().await.unwrap());
        let payloads = runtime.bus.on("scene/positions");
        let record: PositionRecord = serde_json::from_slice(&payloads[0]).unwrap();
        
        assert_eq!(record.len(), 2);
        let car = &record[ActorRole::Car.name()];
        assert_eq!(car.z, 29.92);
        assert_eq!(car.x, 1.5);
    }
    
    #[tokio::test]
    async fn test_screenshot_registers_marker() {
        let (_ctx, mut runtime) = runtime(RecordingBus::default());
        start_ready(&mut runtime, ScenarioId::MotoristOvertake);
        
        let timestamp = runtime.publish_screenshot(&mut SolidFrames).await.unwrap().unwrap();
        
        let payloads = runtime.bus.on("scene/screenshot");
        let frame = ScreenshotFrame::from_bytes(&payloads[0]).unwrap();
        assert_eq!(frame.timestamp_ms, timestamp);
        let decoded = image::load_from_memory(&frame.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
        
        let marker = runtime.registry().markers().get(timestamp).unwrap();
        assert_eq!(marker.color, MarkerColor::Pending);
        assert_eq!(marker.position, *runtime.registry().car().unwrap().position());
    }
    
    #[tokio::test]
    async fn test_detection_resolves_marker() {
        let (_ctx, mut runtime) = runtime(RecordingBus::default());
        start_ready(&mut runtime, ScenarioId::MotoristOvertake);
        let timestamp = runtime.publish_screenshot(&mut SolidFrames).await.unwrap().unwrap();
        
        let reply = DetectionMessage {
            timestamp,
            detected: true,
            label: Some("motorcycle".into()),
        };
        let message = Message::new("scene/detections", reply.to_bytes().unwrap(), 0);
        let marker = runtime.on_message(&message).unwrap();
        assert_eq!(marker.color, MarkerColor::Detected);
        assert_eq!(marker.label.as_deref(), Some("motorcycle"));
    }
    
    #[tokio::test]
    async fn test_bad_detections_are_dropped() {
        let (_ctx, mut runtime) = runtime(RecordingBus::default());
        start_ready(&mut runtime, ScenarioId::MotoristOvertake);
        
        let unknown = DetectionMessage {
            timestamp: 12345,
            detected: false,
            label: None,
        };
        let message = Message::new("scene/detections", unknown.to_bytes().unwrap(), 0);
        assert!(runtime.on_message(&message).is_none());
        
        let garbage = Message::new("scene/detections", b"{not json".to_vec(), 0);
        assert!(runtime.on_message(&garbage).is_none());
        
        assert_eq!(runtime.stats().detections_unmatched, 1);
        assert_eq!(runtime.stats().detections_malformed, 1);
    }
    
    #[tokio::test]
    async fn test_timers_fire_on_interval() {
        let (ctx, mut runtime) = runtime(RecordingBus::default());
        start_ready(&mut runtime, ScenarioId::CyclistOvertake);
        
        // 2.1 s of frames at 100 ms steps
        for _ in 0..21 {
            ctx.advance(Duration::from_millis(100));
            runtime.frame();
            runtime.poll_timers(&mut SolidFrames).await;
        }
        
        assert_eq!(runtime.stats().positions_published, 1);
        assert_eq!(runtime.stats().screenshots_published, 4);
        assert_eq!(runtime.registry().markers().len(), 4);
    }
    
    #[tokio::test]
    async fn test_publish_failure_is_not_fatal() {
        let (ctx, mut runtime) = runtime(RecordingBus {
            fail: true,
            ..Default::default()
        });
        start_ready(&mut runtime, ScenarioId::CyclistOvertake);
        
        ctx.advance(Duration::from_secs(3));
        runtime.poll_timers(&mut SolidFrames).await;
        
        assert_eq!(runtime.stats().publish_failures, 2);
        assert!(runtime.registry().markers().is_empty());
    }
    
    #[tokio::test(start_paused = true)]
    async fn test_frames_keep_pace_under_steady_input() {
        let mut runtime =
            SceneRuntime::new(TokioContext::shared(), Arc::new(RecordingBus::default()), SceneConfig::default())
                .unwrap();
        let (tx, rx) = mpsc::channel(8);
        
        // Key repeat every 10 ms, faster than the ~16.7 ms frame period
        let driver = tokio::spawn(async move {
            for _ in 0..100 {
                tx.send(InputEvent::KeyDown(Key::Char('w'))).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tx.send(InputEvent::Quit).await.unwrap();
        });
        
        runtime.run(rx, Arc::new(InstantLoader), &mut SolidFrames).await.unwrap();
        driver.await.unwrap();
        
        // One second of wall time at 60 Hz
        assert!(runtime.stats().frames >= 55, "only {} frames", runtime.stats().frames);
    }
    
    #[tokio::test]
    async fn test_run_loop_loads_and_quits() {
        let (_ctx, mut runtime) = runtime(RecordingBus::default());
        let (tx, rx) = mpsc::channel(8);
        
        tx.send(InputEvent::Start(StartForm::new(
            ScenarioId::MotoristStopAndGo,
            10.0,
            MapStyle::Desert,
        )))
        .await
        .unwrap();
        
        let driver = tokio::spawn(async move {
            // Give the loads time to land before quitting
            for _ in 0..50 {
                tokio::task::yield_now().await;
            }
            tx.send(InputEvent::Quit).await.unwrap();
        });
        
        runtime.run(rx, Arc::new(InstantLoader), &mut SolidFrames).await.unwrap();
        driver.await.unwrap();
        
        assert_eq!(runtime.registry().scenario(), Some(ScenarioId::MotoristStopAndGo));
        assert!(runtime.stats().frames > 0);
    }
}
