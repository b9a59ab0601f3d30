//! Saving and restoring persistent effects.
//!
//! Snapshot I/O is async and never runs on the tick path. Saves write to a
//! temporary file and rename it over the snapshot, so a crash mid-write
//! leaves the previous snapshot intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::DVec3;
use particle_math::ParticleEffects;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{ParticleEngine, StartRequest};
use crate::error::{RestoreError, SnapshotError};
use crate::ids::EffectId;
use crate::instance::{Anchor, Location, now_ms};
use crate::scheduler::tick_offset;
use crate::snapshot::{self, SavedEffect, SnapshotFile};

/// Outcome of a restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<EffectId>,
    /// Entries skipped because their model, world or lifespan is gone, or
    /// the snapshot entry was unreadable.
    pub skipped: usize,
}

/// A sibling of `path` unique to one save.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

impl ParticleEngine {
    /// Capture every persistent fixed-location effect.
    #[must_use]
    pub fn snapshot(&self, now_ms: u64) -> SnapshotFile {
        let effects = self
            .list_active()
            .iter()
            .filter(|instance| instance.persistent)
            .filter_map(|instance| {
                let animated = self.models().get(&instance.model).is_some_and(|m| m.is_animated());
                SavedEffect::capture(instance, animated, now_ms)
            })
            .collect();
        SnapshotFile::new(now_ms, effects)
    }

    /// Save a snapshot to the configured path. Returns the number of saved
    /// effects.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if encoding or writing fails.
    pub async fn save_now(&self) -> Result<usize, SnapshotError> {
        let path = self.config().snapshot_path.clone();
        self.save_to(&path).await
    }

    /// Save a snapshot to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if encoding or writing fails.
    pub async fn save_to(&self, path: &Path) -> Result<usize, SnapshotError> {
        let _guard = self.shared.save_lock.lock().await;
        let file = self.snapshot(now_ms());
        let count = file.effects.len();
        let text = snapshot::encode(&file)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = temp_path_for(path);
        tokio::fs::write(&tmp, text).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(path = %path.display(), effects = count, "snapshot saved");
        Ok(count)
    }

    /// Restore saved effects. Each entry is restored independently; failures
    /// are logged and counted.
    pub fn restore(&self, saved: &[SavedEffect], now_ms: u64) -> RestoreReport {
        let mut report = RestoreReport::default();
        for effect in saved {
            match self.restore_one(effect, now_ms) {
                Ok(id) => report.restored.push(id),
                Err(e) => {
                    warn!(model = %effect.model, world = %effect.world, error = %e, "skipping saved effect");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// Restore one saved effect.
    ///
    /// Animated models resume where they would be now: the driver starts at
    /// `(now - animation_started_at) / tick_ms` ticks. Timed effects run for
    /// their remaining time only, but keep the persistence they were saved
    /// with.
    ///
    /// # Errors
    ///
    /// Returns [`RestoreError`] if the model or world is gone, the lifespan
    /// has elapsed, the effect summary is invalid, or starting fails.
    pub fn restore_one(&self, saved: &SavedEffect, now_ms: u64) -> Result<EffectId, RestoreError> {
        let model = self
            .models()
            .get(&saved.model)
            .ok_or_else(|| RestoreError::ModelMissing(saved.model.clone()))?;
        if !self.shared.host.world_exists(&saved.world) {
            return Err(RestoreError::WorldMissing(saved.world.clone()));
        }
        let lifetime = saved.lifespan.remaining_lifetime(now_ms).ok_or(RestoreError::Elapsed)?;
        let effects = ParticleEffects::from_summary(&saved.effects)?;

        let c = saved.coordinates;
        let location = Location::new(saved.world.clone(), DVec3::new(c.x, c.y, c.z));
        let (initial_tick, animation_started_at_ms) = if model.is_animated() {
            let started = saved.animation_started_at.unwrap_or(saved.lifespan.started_at);
            (tick_offset(now_ms, started, self.config().tick_ms), Some(started))
        } else {
            (0, None)
        };
        let id = self.start(StartRequest {
            model: saved.model.clone(),
            anchor: Anchor::Fixed(location),
            lifetime,
            effects,
            // A shortened timed effect stays persistent if it was saved as one.
            persistent: saved.meta.persistent || saved.lifespan.lifetime().should_be_persistent(),
            initial_tick,
            animation_started_at_ms,
        })?;
        info!(effect_id = %id, model = %saved.model, previous_id = saved.meta.effect_id, "effect recovered");
        Ok(id)
    }

    /// Restore from a snapshot file. A missing file restores nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the file cannot be read or has an
    /// unusable layout.
    pub async fn recover_from(&self, path: &Path) -> Result<RestoreReport, SnapshotError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no snapshot to recover");
                return Ok(RestoreReport::default());
            }
            Err(e) => return Err(e.into()),
        };

        let now = now_ms();
        let decoded = snapshot::decode(&text, now)?;
        let mut report = self.restore(&decoded.effects, now);
        report.skipped += decoded.skipped;
        info!(
            path = %path.display(),
            version = decoded.version,
            restored = report.restored.len(),
            skipped = report.skipped,
            "recovery complete"
        );
        Ok(report)
    }

    /// Recover from `path` once `delay` has passed, giving the host time to
    /// load worlds first.
    pub fn schedule_recovery(&self, path: PathBuf, delay: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.recover_from(&path).await {
                warn!(path = %path.display(), error = %e, "recovery failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use particle_model::{AnimatedModel, Color, Frame, ModelSource, ParticleTemplate, StaticModel};

    use super::*;
    use crate::config::EngineConfig;
    use crate::host::{MemoryHost, ViewRights};
    use crate::instance::{Lifetime, ViewerAnchor};

    fn engine() -> ParticleEngine {
        let host = Arc::new(MemoryHost::new());
        host.add_world("w");
        host.connect("w", DVec3::ZERO, ViewRights::all());
        let engine = ParticleEngine::new(EngineConfig::default(), host);
        let particles = vec![ParticleTemplate::at(DVec3::ONE, Color::WHITE)];
        engine.register_model(StaticModel::new("heart", particles, 20));
        engine.register_animated_model(animation());
        engine
    }

    fn animation() -> AnimatedModel {
        let frames = (0..8)
            .map(|i| Frame::new(i, 100, vec![ParticleTemplate::at(DVec3::new(i as f64, 0.0, 0.0), Color::WHITE)]))
            .collect();
        AnimatedModel::new("clock", frames, true, ModelSource::Generated)
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("particle-snapshot-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn test_snapshot_only_persistent_fixed_effects() {
        let host = Arc::new(MemoryHost::new());
        host.add_world("w");
        let viewer = host.connect("w", DVec3::ZERO, ViewRights::all());
        let engine = ParticleEngine::new(EngineConfig::default(), host);
        engine.register_model(StaticModel::new("heart", vec![ParticleTemplate::at(DVec3::ONE, Color::WHITE)], 20));

        let here = || Location::new("w", DVec3::ZERO);
        let kept = engine.play("heart", here(), Lifetime::Infinite, None).unwrap();
        engine.play("heart", here(), Lifetime::Timed(30), None).unwrap();
        engine.play("heart", here(), Lifetime::OneTime, None).unwrap();
        let anchor = ViewerAnchor {
            viewer,
            only_when_still: false,
            force_visible: false,
        };
        engine.play_on_viewer("heart", anchor, Lifetime::Infinite, None).unwrap();

        let file = engine.snapshot(now_ms());
        assert_eq!(file.effects.len(), 1);
        assert_eq!(file.effects[0].meta.effect_id, kept.id());
    }

    #[tokio::test]
    async fn test_save_and_recover_rotating_effect() {
        let engine = engine();
        let effects = ParticleEffects::preset("rotate", 1.0).unwrap();
        let location = Location::new("w", DVec3::new(10.5, 64.0, -3.25));
        engine.play("heart", location, Lifetime::Infinite, Some(effects)).unwrap();

        let path = temp_path();
        assert_eq!(engine.save_to(&path).await.unwrap(), 1);

        let restarted = self::engine();
        let report = restarted.recover_from(&path).await.unwrap();
        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.skipped, 0);

        let instance = restarted.info(report.restored[0]).unwrap();
        assert_eq!(instance.model, "heart");
        assert_eq!(instance.lifetime, Lifetime::Infinite);
        assert!(instance.persistent);
        let restored = instance.location().unwrap();
        assert_eq!(restored.world, "w");
        assert!((restored.position - DVec3::new(10.5, 64.0, -3.25)).length() < 1e-9);
        let rotation = instance.effects.unwrap().rotation;
        assert!((rotation.speed - effects.rotation.speed).abs() < 1e-12);
        assert_eq!(rotation.axes, effects.rotation.axes);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_snapshot_restores_nothing() {
        let report = engine().recover_from(&temp_path()).await.unwrap();
        assert_eq!(report, RestoreReport::default());
    }

    #[test]
    fn test_animated_recovery_resumes_mid_animation() {
        let engine = engine();
        let now = now_ms();
        let id = engine
            .play_with_offset("clock", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None, 0, now - 5_000)
            .unwrap();
        let saved = engine.snapshot(now).effects.remove(0);
        assert!(saved.animated);
        assert_eq!(saved.animation_started_at, Some(now - 5_000));
        engine.stop(id);

        let restored = engine.restore_one(&saved, now).unwrap();
        assert_eq!(engine.effect_tick(restored), Some(100));

        engine.tick_at(now);
        let driver = engine.shared.registry.driver(restored).unwrap();
        assert_eq!(driver.state().last_frame, animation().frame_index_at_tick(100));
    }

    #[test]
    fn test_recovery_offset_uses_configured_tick_period() {
        let host = Arc::new(MemoryHost::new());
        host.add_world("w");
        let config = EngineConfig {
            tick_ms: 100,
            ..EngineConfig::default()
        };
        let engine = ParticleEngine::new(config, host);
        engine.register_animated_model(animation());
        let now = now_ms();
        let id = engine
            .play_with_offset("clock", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None, 0, now - 5_000)
            .unwrap();
        let saved = engine.snapshot(now).effects.remove(0);
        engine.stop(id);

        let restored = engine.restore_one(&saved, now).unwrap();
        assert_eq!(engine.effect_tick(restored), Some(50));
    }

    #[test]
    fn test_restored_timed_effect_keeps_persistence() {
        let engine = engine();
        let id = engine
            .play("heart", Location::new("w", DVec3::ZERO), Lifetime::Timed(120), None)
            .unwrap();
        let started = engine.info(id).unwrap().started_at_ms;
        let saved = engine.snapshot(started).effects.remove(0);
        assert!(saved.meta.persistent);
        engine.stop_all();

        let restored = engine.restore_one(&saved, started + 90_000).unwrap();
        let instance = engine.info(restored).unwrap();
        assert_eq!(instance.lifetime, Lifetime::Timed(30));
        assert!(instance.persistent);
        assert_eq!(engine.snapshot(now_ms()).effects.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_saves_both_succeed() {
        let engine = engine();
        engine.play("heart", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None).unwrap();
        let path = temp_path();

        let (a, b) = tokio::join!(engine.save_to(&path), engine.save_to(&path));
        assert_eq!((a.unwrap(), b.unwrap()), (1, 1));

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let leftovers = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(&name) && n != &name)
            .count();
        assert_eq!(leftovers, 0);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[test]
    fn test_restore_skips_unusable_entries() {
        let engine = engine();
        engine.play("heart", Location::new("w", DVec3::ZERO), Lifetime::Infinite, None).unwrap();
        let good = engine.snapshot(now_ms()).effects.remove(0);

        let mut missing_model = good.clone();
        missing_model.model = "gone".to_string();
        let mut missing_world = good.clone();
        missing_world.world = "nether".to_string();
        let mut elapsed = good.clone();
        elapsed.lifespan = snapshot::Lifespan::new(Lifetime::Timed(10), 0, 0);
        let mut bad_effects = good.clone();
        bad_effects.effects.kind = "wobble".to_string();

        let report = engine.restore(&[missing_model, good, missing_world, elapsed, bad_effects], now_ms());
        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.skipped, 4);
    }
}
