//! SimWorld - The headless harness container.

use crate::bus::{LoopbackBroker, LoopbackBus};
use crate::context::SimContext;
use crate::detector::DetectorStub;
use crate::error::SimError;
use crate::loader::SimAssetLoader;
use crate::raster::TopDownRaster;

use roadscene_core::{
    FrameSummary, InputEvent, InputOutcome, LoadEvent, LoadRequest, SceneConfig, SceneRegistry, SceneRuntime,
};
use roadscene_env::{BusController, ClientId, SceneContext};
use std::sync::Arc;
use tracing::debug;

/// Configuration for a headless run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,
    
    /// Scene configuration under test
    pub scene: SceneConfig,
    
    /// Frames between a load request and its completion
    pub load_delay_frames: u64,
    
    /// Asset paths whose loads fail
    pub failing_assets: Vec<String>,
    
    /// Probability that the detector misses a visible rider
    pub detector_miss_rate: f64,
    
    /// Loss rate on the screenshot topic
    pub screenshot_loss: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            scene: SceneConfig::default(),
            load_delay_frames: 3,
            failing_assets: Vec::new(),
            detector_miss_rate: 0.0,
            screenshot_loss: 0.0,
        }
    }
}

/// The SimWorld - scene runtime, broker, detector and renderer on one
/// virtual clock.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,
    
    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,
    
    /// In-process broker for fault injection
    pub broker: Arc<LoopbackBroker>,
    
    runtime: SceneRuntime<SimContext, LoopbackBus>,
    detector: DetectorStub,
    raster: TopDownRaster,
    loader: SimAssetLoader,
    
    /// (due tick, completion)
    pending_loads: Vec<(u64, LoadEvent)>,
    
    tick_count: u64,
}

impl SimWorld {
    /// Creates a SimWorld and wires the scene and detector to the broker.
    pub async fn new(config: SimConfig) -> Result<Self, SimError> {
        // Derive separate seeds for different subsystems
        let broker_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let detector_seed = config.seed.wrapping_mul(0x517cc1b727220a95);
        
        let mut scene_config = config.scene.clone();
        scene_config.seed = config.seed;
        
        let context = SimContext::shared(config.seed);
        let broker = LoopbackBroker::shared(broker_seed);
        if config.screenshot_loss > 0.0 {
            broker.set_topic_loss(&scene_config.telemetry.screenshot_topic, config.screenshot_loss);
        }
        
        let scene_bus = Arc::new(broker.client(ClientId::from_seed(config.seed)));
        let runtime = SceneRuntime::new(Arc::clone(&context), scene_bus, scene_config)?;
        runtime.subscribe_detections().await?;
        
        let detector_bus = broker.client(ClientId::from_seed(detector_seed));
        let detector = DetectorStub::connect(detector_bus, &config.scene.telemetry, detector_seed)
            .await?
            .with_miss_rate(config.detector_miss_rate);
        
        let loader = config
            .failing_assets
            .iter()
            .fold(SimAssetLoader::new(), |loader, path| loader.with_failing(path.clone()));
        
        Ok(Self {
            config,
            context,
            broker,
            runtime,
            detector,
            raster: TopDownRaster::default(),
            loader,
            pending_loads: Vec::new(),
            tick_count: 0,
        })
    }
    
    /// Delivers an input event; load requests complete after the configured
    /// number of frames.
    pub fn input(&mut self, event: InputEvent) -> Result<InputOutcome, SimError> {
        let outcome = self.runtime.handle_input(event)?;
        if let InputOutcome::Load(requests) = &outcome {
            self.schedule_loads(requests);
        }
        Ok(outcome)
    }
    
    fn schedule_loads(&mut self, requests: &[LoadRequest]) {
        let due = self.tick_count + self.config.load_delay_frames;
        for request in requests {
            let result = self.loader.load_now(&request.path);
            self.pending_loads.push((due, LoadEvent::for_request(request, result)));
        }
    }
    
    /// Advances the simulation by one frame.
    pub async fn tick(&mut self) -> FrameSummary {
        self.context.advance_time(self.runtime.registry().config().frame_period());
        self.tick_count += 1;
        
        let tick = self.tick_count;
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending_loads
            .drain(..)
            .partition(|(due, _)| *due <= tick);
        self.pending_loads = waiting;
        for (_, event) in due {
            self.runtime.on_model_loaded(event);
        }
        
        let summary = self.runtime.frame();
        self.runtime.poll_timers(&mut self.raster).await;
        
        let replies = self.detector.pump().await;
        for message in self.runtime.bus.drain() {
            self.runtime.on_message(&message);
        }
        if replies > 0 {
            debug!(tick, replies, "detections processed");
        }
        
        summary
    }
    
    pub fn runtime(&self) -> &SceneRuntime<SimContext, LoopbackBus> {
        &self.runtime
    }
    
    pub fn registry(&self) -> &SceneRegistry {
        self.runtime.registry()
    }
    
    pub fn detector(&self) -> &DetectorStub {
        &self.detector
    }
    
    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }
    
    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
    
    /// Loads not yet completed.
    pub fn pending_loads(&self) -> usize {
        self.pending_loads.len()
    }
}
