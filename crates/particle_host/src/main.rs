//! # particle_host
//!
//! Headless host for the particle engine. Builds an in-memory world with
//! one wandering viewer, registers generated demo models, restores the
//! previous snapshot and runs the tick loop until Ctrl-C or the tick limit.
//!
//! ## Startup Sequence
//!
//! 1. Load the engine config (JSON, optional) and apply CLI overrides.
//! 2. Register demo models and start the demo effects.
//! 3. Schedule snapshot recovery after the configured delay.
//! 4. Enter the tick loop; save a final snapshot on exit.

mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use particle_engine::{EngineConfig, Lifetime, Location, MemoryHost, ParticleEngine, TickLoop, ViewRights, ViewerAnchor};
use particle_math::ParticleEffects;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "particle_host", about = "Run the particle effect engine against an in-memory world")]
struct Args {
    /// JSON engine config; missing keys keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot file, overriding the config
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Name of the world to create
    #[arg(short, long, default_value = "overworld")]
    world: String,

    /// Stop after this many ticks (0 = run until Ctrl-C)
    #[arg(short, long, default_value_t = 0)]
    ticks: u64,

    /// Do not start the demo effects
    #[arg(long)]
    no_demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "particle_engine=info,particle_host=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(snapshot) = args.snapshot {
        config = config.with_snapshot_path(snapshot);
    }
    let snapshot_path = config.snapshot_path.clone();
    let recovery_delay = config.recovery_delay();

    let host = Arc::new(MemoryHost::new());
    host.add_world(args.world.clone());
    let centre = DVec3::new(0.0, 64.0, 0.0);
    let viewer = host.connect(args.world.clone(), centre, ViewRights::all());

    let engine = ParticleEngine::new(config, host.clone());
    engine.register_model(demo::ring("ring", 3.0, 64));
    engine.register_model(demo::helix("helix", 4_000));
    engine.register_animated_model(demo::ripple("ripple", 6));
    info!(models = ?engine.models().names(), "demo models registered");

    if !args.no_demo {
        start_demo(&engine, &args.world, centre, viewer)?;
        tokio::spawn(demo::wander(host.clone(), viewer, centre));
    }

    engine.schedule_recovery(snapshot_path, recovery_delay);

    let ticks = TickLoop::new(engine.clone())
        .with_max_ticks(args.ticks)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!(ticks, emitted = host.emitted_count(), usage = %engine.usage(), "particle host shut down");
    Ok(())
}

fn start_demo(engine: &ParticleEngine, world: &str, centre: DVec3, viewer: particle_engine::ViewerId) -> Result<()> {
    let rotate = ParticleEffects::preset("rotate", 1.0)?;
    engine.play("ring", Location::new(world, centre), Lifetime::Infinite, Some(rotate))?;

    let helix_at = Location::new(world, centre + DVec3::new(12.0, 0.0, 0.0));
    engine.play("helix", helix_at, Lifetime::Timed(600), None)?;

    let anchor = ViewerAnchor {
        viewer,
        only_when_still: false,
        force_visible: false,
    };
    let wave = ParticleEffects::preset("wave", 1.0)?;
    engine.play_on_viewer("ripple", anchor, Lifetime::Timed(120), Some(wave))?;

    info!(effects = engine.list_active().len(), "demo effects started");
    Ok(())
}
