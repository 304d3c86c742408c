use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use worldmap_common::MapConfig;
use worldmap_render::DebugTextRenderer;
use worldmap_scene::{EventBus, InboundPipeline, MessageQueue, SceneInspector, Topic, WorldScene};
use worldmap_stream::{CullRequest, CullingWorker};

#[derive(Parser)]
#[command(name = "worldmap-cli", about = "CLI tool for worldmap operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML map config; defaults apply to anything it omits
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Compute the visible cell range for a camera rectangle on the culling worker
    Cull {
        /// Render-space left edge
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        x: f32,
        /// Render-space top edge
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        y: f32,
        #[arg(long, default_value = "1280")]
        width: f32,
        #[arg(long, default_value = "720")]
        height: f32,
        /// Extra cells per side; defaults to the config's cull buffer
        #[arg(long)]
        buffer: Option<i32>,
    },
    /// Feed recorded transport frames (one JSON event per line) through a scene
    Replay {
        path: PathBuf,
        /// Scene time between frames, in milliseconds
        #[arg(long, default_value = "100")]
        frame_ms: u64,
        /// Queue every frame before draining, as a network burst would
        #[arg(long)]
        burst: bool,
        /// Extra ticks after the last frame so tweens and culling settle
        #[arg(long, default_value = "30")]
        settle: u32,
        /// Print the debug render of the final stage
        #[arg(long)]
        render: bool,
        /// Maximum visuals listed by --render
        #[arg(long, default_value = "40")]
        limit: usize,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MapConfig> {
    match path {
        Some(path) => MapConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(MapConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("worldmap-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", worldmap_common::crate_info());
            println!("kernel: {}", worldmap_kernel::crate_info());
            println!("ecs: {}", worldmap_ecs::crate_info());
            println!("render: {}", worldmap_render::crate_info());
            println!("stream: {}", worldmap_stream::crate_info());
            println!("input: {}", worldmap_input::crate_info());
            println!("scene: {}", worldmap_scene::crate_info());
            println!(
                "config: cell={} road_modulus={} cull_buffer={}",
                config.cell_size, config.road_modulus, config.cull_buffer
            );
        }
        Commands::Cull {
            x,
            y,
            width,
            height,
            buffer,
        } => {
            let mut worker = CullingWorker::spawn();
            let request = CullRequest::new(
                1,
                Vec2::new(x, y),
                Vec2::new(width, height),
                config.cell_size,
                buffer.unwrap_or(config.cull_buffer),
            );
            let response = worker.request(request).await?;
            worker.shutdown().await;
            let range = response.range?;
            println!("Visible range: {range} ({} cells)", range.cell_count());
        }
        Commands::Replay {
            path,
            frame_ms,
            burst,
            settle,
            render,
            limit,
        } => {
            replay(config, &path, Duration::from_millis(frame_ms), burst, settle, render, limit).await?;
        }
    }

    Ok(())
}

async fn replay(
    config: MapConfig,
    path: &Path,
    frame: Duration,
    burst: bool,
    settle: u32,
    render: bool,
    limit: usize,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let frames: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    println!("Replaying {} frames from {}", frames.len(), path.display());

    let bus = EventBus::new();
    let mut observer = bus.subscribe(&Topic::ALL);
    let mut scene = WorldScene::new(config, bus, CullingWorker::spawn())?;
    let queue = Arc::new(MessageQueue::new());
    let mut pipeline = InboundPipeline::new(Arc::clone(&queue));

    if burst {
        for line in &frames {
            queue.enqueue(line.to_string())?;
        }
        pipeline.drain(&mut scene).await;
    } else {
        for line in &frames {
            queue.enqueue(line.to_string())?;
            pipeline.drain(&mut scene).await;
            scene.tick(frame);
            tokio::task::yield_now().await;
        }
    }
    for _ in 0..settle {
        scene.tick(frame);
        // lets the culling task answer between frames
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    queue.close();

    let stats = pipeline.stats();
    println!(
        "Pipeline: applied={} skipped={} rejected={}",
        stats.applied, stats.skipped, stats.rejected
    );
    let mut by_topic: BTreeMap<Topic, usize> = BTreeMap::new();
    for event in observer.drain() {
        *by_topic.entry(event.topic()).or_default() += 1;
    }
    println!("Bus: {by_topic:?}");
    println!("{}", SceneInspector::summary(&scene));

    for request in scene.take_interior_requests() {
        println!("Interior requested: building={} player={}", request.building, request.player.id);
    }
    if render {
        println!("{}", scene.render(&DebugTextRenderer::with_limit(limit)));
    }
    Ok(())
}
