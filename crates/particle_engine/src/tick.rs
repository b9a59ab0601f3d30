//! Engine tick loop.
//!
//! One recurring tick source drives every effect driver:
//!
//! 1. Drop expired temporary models and stop their effects.
//! 2. Run every driver once ([`ParticleEngine::tick_all`]).
//! 3. Warn when a tick overruns its budget.
//!
//! Snapshots are saved on a separate autosave timer, on spawned tasks, so
//! file I/O never delays a tick. On shutdown the loop writes a final
//! snapshot and tears the engine down.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{ParticleEngine, TickSummary};
use crate::error::SnapshotError;
use crate::instance::now_ms;

/// The engine's tick loop.
#[derive(Debug)]
pub struct TickLoop {
    engine: ParticleEngine,
    tick_duration: Duration,
    autosave_interval: Duration,
    /// Maximum number of ticks to run (0 = unlimited).
    max_ticks: u64,
    tick_id: u64,
}

impl TickLoop {
    /// Create a tick loop using the engine's configured periods.
    #[must_use]
    pub fn new(engine: ParticleEngine) -> Self {
        let tick_duration = engine.config().tick_duration();
        let autosave_interval = engine.config().autosave_interval();
        Self {
            engine,
            tick_duration,
            autosave_interval,
            max_ticks: 0,
            tick_id: 0,
        }
    }

    /// Stop after `max_ticks` ticks.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Returns the number of ticks run.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Run one tick.
    pub fn tick(&mut self) -> TickSummary {
        self.tick_id += 1;
        self.engine.purge_expired_models(now_ms());
        let summary = self.engine.tick_all();
        debug!(
            tick_id = self.tick_id,
            effects = summary.effects,
            emitted = summary.emitted,
            terminated = summary.terminated.len(),
            "tick"
        );
        summary
    }

    /// Tick until `shutdown` resolves or the tick limit is reached, then
    /// save a final snapshot and shut the engine down. Returns the number
    /// of ticks run.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the final snapshot cannot be written.
    /// The engine is shut down either way.
    pub async fn run<F>(mut self, shutdown: F) -> Result<u64, SnapshotError>
    where
        F: Future<Output = ()>,
    {
        info!(
            tick_ms = self.tick_duration.as_millis() as u64,
            autosave_secs = self.autosave_interval.as_secs(),
            max_ticks = self.max_ticks,
            "starting tick loop"
        );

        let mut ticker = tokio::time::interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let first_save = tokio::time::Instant::now() + self.autosave_interval;
        let mut autosave = tokio::time::interval_at(first_save, self.autosave_interval);
        autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(tick_id = self.tick_id, "shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let start = Instant::now();
                    self.tick();
                    let elapsed = start.elapsed();
                    if elapsed > self.tick_duration {
                        warn!(
                            tick_id = self.tick_id,
                            elapsed_ms = elapsed.as_millis() as u64,
                            budget_ms = self.tick_duration.as_millis() as u64,
                            "tick exceeded time budget"
                        );
                    }
                    if self.max_ticks > 0 && self.tick_id >= self.max_ticks {
                        info!(ticks = self.tick_id, "tick limit reached");
                        break;
                    }
                }
                _ = autosave.tick() => {
                    let engine = self.engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = engine.save_now().await {
                            warn!(error = %e, "autosave failed");
                        }
                    });
                }
            }
        }

        let saved = self.engine.save_now().await;
        self.engine.shutdown();
        let saved = saved?;
        info!(ticks = self.tick_id, saved, "tick loop stopped");
        Ok(self.tick_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::DVec3;
    use particle_model::{Color, ParticleTemplate, StaticModel};

    use super::*;
    use crate::config::EngineConfig;
    use crate::host::{MemoryHost, ViewRights};
    use crate::instance::{Lifetime, Location};

    fn engine(snapshot: &std::path::Path) -> (ParticleEngine, Arc<MemoryHost>) {
        let host = Arc::new(MemoryHost::new());
        host.add_world("w");
        host.connect("w", DVec3::ZERO, ViewRights::all());
        let config = EngineConfig {
            tick_ms: 1,
            ..EngineConfig::default()
        }
        .with_snapshot_path(snapshot);
        let engine = ParticleEngine::new(config, host.clone());
        let particles = vec![ParticleTemplate::at(DVec3::ONE, Color::WHITE)];
        engine.register_model(StaticModel::new("heart", particles, 20));
        (engine, host)
    }

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("particle-tick-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_tick_advances_counter() {
        let (engine, host) = engine(&temp_path());
        engine.play("heart", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None).unwrap();
        let mut tick_loop = TickLoop::new(engine);
        assert_eq!(tick_loop.tick_id(), 0);
        assert_eq!(tick_loop.tick().emitted, 1);
        assert_eq!(tick_loop.tick_id(), 1);
        assert_eq!(host.emitted_count(), 1);
    }

    #[test]
    fn test_tick_purges_expired_temporary_models() {
        let (engine, _) = engine(&temp_path());
        let flash = StaticModel::new("flash", vec![ParticleTemplate::at(DVec3::ONE, Color::WHITE)], 20);
        engine.register_temporary_model(flash, Duration::ZERO);
        let id = engine.play("flash", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None).unwrap();

        let mut tick_loop = TickLoop::new(engine.clone());
        tick_loop.tick();
        assert!(engine.info(id).is_none());
        assert!(!engine.models().has_model("flash"));
    }

    #[tokio::test]
    async fn test_run_limited_ticks_saves_and_shuts_down() {
        let path = temp_path();
        let (engine, _) = engine(&path);
        engine.play("heart", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None).unwrap();

        let ticks = TickLoop::new(engine.clone())
            .with_max_ticks(5)
            .run(std::future::pending())
            .await
            .unwrap();
        assert_eq!(ticks, 5);
        assert!(engine.list_active().is_empty());

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("\"heart\""));
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let path = temp_path();
        let (engine, _) = engine(&path);
        let ticks = TickLoop::new(engine).run(async {}).await.unwrap();
        assert_eq!(ticks, 0);
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
