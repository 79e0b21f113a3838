//! RoadScene CLI
//!
//! Runs the traffic scenarios headless with invariant checks, or drives a
//! live scene from stdin input lines.

use clap::Parser;
use roadscene_core::{InputEvent, MapStyle, ScenarioId, SceneConfig, SceneRuntime, StartForm};
use roadscene_env::{ClientId, MessageBus, TokioContext};
use roadscene_sim::{DetectorStub, LoopbackBroker, ScenarioResult, ScenarioRunner, SimAssetLoader, SimError, TopDownRaster};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// RoadScene driving-scenario engine
#[derive(Parser, Debug)]
#[command(name = "roadscene")]
#[command(about = "Run RoadScene traffic scenarios headless or live", long_about = None)]
struct Args {
    /// Scenario to run (1-4, motorist_overtake, cyclist_overtake, motorist_stop_and_go, cyclist_stop_and_go, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,
    
    /// Distance between the car and the two-wheeler at spawn
    #[arg(long, default_value = "10")]
    distance: f64,
    
    /// Map style (countryside, city, desert)
    #[arg(short, long, default_value = "countryside")]
    map_style: String,
    
    /// Simulated duration in seconds
    #[arg(short, long, default_value = "20")]
    duration: f64,
    
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,
    
    /// Number of consecutive seeds to run (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,
    
    /// Scene configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
    
    /// Export sampled frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
    
    /// Run a live scene driven by stdin lines (`start 2 12 city`, `key c`, `quit`)
    #[arg(long)]
    live: bool,
    
    /// Zenoh router endpoint for live mode (requires the `zenoh` feature)
    #[arg(long)]
    endpoint: Option<String>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    
    // Initialize logging; RUST_LOG wins over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
    
    let scene_config = match &args.config {
        Some(path) => SceneConfig::from_json_file(path).unwrap_or_else(|e| fail(e)),
        None => SceneConfig::default(),
    };
    let map_style: MapStyle = args.map_style.parse().unwrap_or_else(|e| fail(e));
    
    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| fail(e))]
    };
    
    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };
    
    if args.live {
        if scenarios.len() > 1 {
            fail("--live needs a single --scenario");
        }
        let form = StartForm::new(scenarios[0], args.distance, map_style);
        if let Err(e) = run_live(&args, scene_config, form).await {
            error!("Live scene failed: {}", e);
            std::process::exit(1);
        }
        return;
    }
    
    if !args.json {
        info!("RoadScene v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    
    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            fail("--export only supports a single scenario, not 'all'");
        }
        
        let (result, export) = runner(&args, base_seed, map_style, &scene_config)
            .run_with_export(scenarios[0])
            .await;
        
        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {}", e),
        }
        report(&result);
        if !result.passed {
            std::process::exit(1);
        }
        return;
    }
    
    // Run scenarios
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = runner(&args, seed, map_style, &scene_config);
        
        for scenario in &scenarios {
            let result = runner.run(*scenario).await;
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }
    
    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    
    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("All {} scenario runs passed", total);
        } else {
            error!("{}/{} scenario runs failed", failed_count, total);
        }
    }
    
    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

fn runner(args: &Args, seed: u64, map_style: MapStyle, scene: &SceneConfig) -> ScenarioRunner {
    ScenarioRunner::new(seed)
        .with_duration(args.duration)
        .with_distance(args.distance)
        .with_map_style(map_style)
        .with_scene_config(scene.clone())
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED | ticks={} screenshots={} detections={}",
            result.scenario.name(),
            result.seed,
            result.total_ticks,
            result.metrics.screenshots_published,
            result.metrics.detections_matched
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

// =============================================================================
// LIVE MODE
// =============================================================================

/// Forwards stdin lines as input events until EOF.
fn spawn_stdin_reader(tx: mpsc::Sender<InputEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<InputEvent>() {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
    });
}

async fn run_live(args: &Args, config: SceneConfig, form: StartForm) -> Result<(), SimError> {
    let (tx, rx) = mpsc::channel(64);
    tx.send(InputEvent::Start(form))
        .await
        .map_err(|_| roadscene_env::EnvError::Connect("input channel closed".into()))?;
    spawn_stdin_reader(tx);
    
    #[cfg(feature = "zenoh")]
    if let Some(endpoint) = &args.endpoint {
        let bus = roadscene_env::ZenohBus::connect(Some(endpoint.as_str())).await?;
        return drive_live(Arc::new(bus), config, rx).await;
    }
    #[cfg(not(feature = "zenoh"))]
    if args.endpoint.is_some() {
        warn!("built without the zenoh feature; using the in-process broker");
    }
    
    // In-process broker with a detector answering screenshots
    let broker = LoopbackBroker::shared(args.seed);
    let scene_bus = Arc::new(broker.client(ClientId::new()));
    let mut detector = DetectorStub::connect(broker.client(ClientId::new()), &config.telemetry, args.seed).await?;
    tokio::spawn(async move {
        loop {
            detector.pump().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });
    
    drive_live(scene_bus, config, rx).await
}

async fn drive_live<B: MessageBus>(
    bus: Arc<B>,
    config: SceneConfig,
    inputs: mpsc::Receiver<InputEvent>,
) -> Result<(), SimError> {
    let mut runtime = SceneRuntime::new(TokioContext::shared(), bus, config)?;
    let loader = Arc::new(SimAssetLoader::new().with_latency(Duration::from_millis(200)));
    let mut raster = TopDownRaster::default();
    
    runtime.run(inputs, loader, &mut raster).await?;
    
    let stats = runtime.stats();
    info!(
        "frames={} positions={} screenshots={} detections={} failures={}",
        stats.frames,
        stats.positions_published,
        stats.screenshots_published,
        stats.detections_matched,
        stats.publish_failures
    );
    Ok(())
}
