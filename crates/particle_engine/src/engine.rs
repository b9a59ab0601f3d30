//! The particle engine service.
//!
//! [`ParticleEngine`] is a cheap, cloneable handle over the shared engine
//! state. It exposes the atomic high-level operations (play, stop, move,
//! model management) and [`ParticleEngine::tick_all`], which the tick loop
//! calls once per host tick to run every driver.

use std::sync::Arc;
use std::time::Duration;

use particle_math::ParticleEffects;
use particle_model::{AnimatedModel, Model, ModelTable};
use tracing::{debug, info};

use crate::cache::ChangeCache;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::host::{Host, ViewerId};
use crate::ids::{EffectId, EffectIdAllocator};
use crate::instance::{Anchor, EffectInstance, Lifetime, Location, ViewerAnchor, now_ms};
use crate::registry::EffectRegistry;
use crate::scheduler::{DriverSlot, DriverStatus, TerminationReason, TickContext};
use crate::stats::{EngineStats, UsageReport};

/// Everything needed to start one effect.
#[derive(Debug, Clone)]
pub(crate) struct StartRequest {
    pub model: String,
    pub anchor: Anchor,
    pub lifetime: Lifetime,
    pub effects: Option<ParticleEffects>,
    /// Whether snapshots include the effect.
    pub persistent: bool,
    pub initial_tick: u64,
    /// Back-dated animation start; `None` means now.
    pub animation_started_at_ms: Option<u64>,
}

/// Result of one [`ParticleEngine::tick_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Drivers run this tick.
    pub effects: usize,
    pub emitted: u64,
    /// Effects that terminated this tick, and why.
    pub terminated: Vec<(EffectId, TerminationReason)>,
}

/// Result of [`ParticleEngine::reload_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub models: usize,
    /// Effects stopped because their model was not reloaded.
    pub stopped: Vec<EffectId>,
}

pub(crate) struct EngineShared {
    pub config: EngineConfig,
    pub models: ModelTable,
    pub host: Arc<dyn Host>,
    pub registry: EffectRegistry,
    pub cache: ChangeCache,
    pub ids: EffectIdAllocator,
    pub stats: EngineStats,
    /// Serialises snapshot writes.
    pub save_lock: tokio::sync::Mutex<()>,
}

/// Handle to a running particle engine.
#[derive(Clone)]
pub struct ParticleEngine {
    pub(crate) shared: Arc<EngineShared>,
}

impl std::fmt::Debug for ParticleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleEngine")
            .field("effects", &self.shared.registry.len())
            .field("models", &self.shared.models.len())
            .finish_non_exhaustive()
    }
}

impl ParticleEngine {
    /// Create an engine rendering through `host`.
    #[must_use]
    pub fn new(config: EngineConfig, host: Arc<dyn Host>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                config,
                models: ModelTable::new(),
                host,
                registry: EffectRegistry::new(),
                cache: ChangeCache::new(),
                ids: EffectIdAllocator::new(),
                stats: EngineStats::default(),
                save_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn models(&self) -> &ModelTable {
        &self.shared.models
    }

    #[must_use]
    pub fn cache(&self) -> &ChangeCache {
        &self.shared.cache
    }

    /// Play `model` at a fixed location.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelNotFound`] or [`EngineError::EmptyModel`]
    /// for an unusable model, and [`EngineError::WorldNotFound`] if the host
    /// does not know the location's world.
    pub fn play(
        &self,
        model: &str,
        location: Location,
        lifetime: Lifetime,
        effects: Option<ParticleEffects>,
    ) -> Result<EffectId, EngineError> {
        self.start(StartRequest {
            model: model.to_string(),
            anchor: Anchor::Fixed(location),
            lifetime,
            effects,
            persistent: lifetime.should_be_persistent(),
            initial_tick: 0,
            animation_started_at_ms: None,
        })
    }

    /// Play `model` following a connected viewer.
    ///
    /// # Errors
    ///
    /// As [`ParticleEngine::play`], plus [`EngineError::ViewerOffline`] if
    /// the viewer is not connected.
    pub fn play_on_viewer(
        &self,
        model: &str,
        anchor: ViewerAnchor,
        lifetime: Lifetime,
        effects: Option<ParticleEffects>,
    ) -> Result<EffectId, EngineError> {
        self.start(StartRequest {
            model: model.to_string(),
            anchor: Anchor::Viewer(anchor),
            lifetime,
            effects,
            persistent: lifetime.should_be_persistent(),
            initial_tick: 0,
            animation_started_at_ms: None,
        })
    }

    /// Play a fixed-location effect whose driver starts at `initial_tick`
    /// and whose animation clock started at `animation_started_at_ms`.
    ///
    /// # Errors
    ///
    /// As [`ParticleEngine::play`].
    pub fn play_with_offset(
        &self,
        model: &str,
        location: Location,
        lifetime: Lifetime,
        effects: Option<ParticleEffects>,
        initial_tick: u64,
        animation_started_at_ms: u64,
    ) -> Result<EffectId, EngineError> {
        self.start(StartRequest {
            model: model.to_string(),
            anchor: Anchor::Fixed(location),
            lifetime,
            effects,
            persistent: lifetime.should_be_persistent(),
            initial_tick,
            animation_started_at_ms: Some(animation_started_at_ms),
        })
    }

    fn validate(&self, model: &str, anchor: &Anchor) -> Result<Arc<Model>, EngineError> {
        let found = self
            .shared
            .models
            .get(model)
            .ok_or_else(|| EngineError::ModelNotFound(model.to_string()))?;
        if found.particle_count() == 0 {
            return Err(EngineError::EmptyModel(model.to_string()));
        }
        match anchor {
            Anchor::Fixed(location) if !self.shared.host.world_exists(&location.world) => {
                Err(EngineError::WorldNotFound(location.world.clone()))
            }
            Anchor::Viewer(anchor) if self.shared.host.viewer_location(anchor.viewer).is_none() => {
                Err(EngineError::ViewerOffline(anchor.viewer))
            }
            _ => Ok(found),
        }
    }

    pub(crate) fn start(&self, request: StartRequest) -> Result<EffectId, EngineError> {
        let model = self.validate(&request.model, &request.anchor)?;

        let started_at_ms = now_ms();
        let id = self.shared.ids.allocate();
        let instance = EffectInstance {
            id,
            model: model.name().to_string(),
            anchor: request.anchor,
            lifetime: request.lifetime,
            persistent: request.persistent,
            started_at_ms,
            animation_started_at_ms: request.animation_started_at_ms.unwrap_or(started_at_ms),
            initial_tick: request.initial_tick,
            effects: request.effects,
        };

        info!(
            effect_id = %id,
            model = %instance.model,
            lifetime = instance.lifetime.seconds(),
            viewer = instance.is_viewer_attached(),
            initial_tick = instance.initial_tick,
            "effect started"
        );

        let driver = Arc::new(DriverSlot::new(request.initial_tick));
        self.shared.registry.insert(instance, driver);
        Ok(id)
    }

    /// Stop an effect. Returns `false` if the id is unknown.
    pub fn stop(&self, id: EffectId) -> bool {
        let removed = self.remove(id);
        if removed {
            info!(effect_id = %id, "effect stopped");
        }
        removed
    }

    fn remove(&self, id: EffectId) -> bool {
        let removed = self.shared.registry.remove(id).is_some();
        self.shared.cache.purge(id);
        removed
    }

    /// Restart a fixed-location effect at `location` with the same model,
    /// lifetime and effect parameters. The restarted effect gets a new id
    /// and begins again from tick zero.
    ///
    /// Returns `None` if the id is unknown, the effect follows a viewer, or
    /// the new location cannot host it; the original then keeps running.
    pub fn move_effect(&self, id: EffectId, location: Location) -> Option<EffectId> {
        let instance = self.shared.registry.get(id)?;
        if instance.is_viewer_attached() {
            return None;
        }
        let request = StartRequest {
            model: instance.model.clone(),
            anchor: Anchor::Fixed(location),
            lifetime: instance.lifetime,
            effects: instance.effects,
            persistent: instance.persistent,
            initial_tick: 0,
            animation_started_at_ms: None,
        };
        self.validate(&request.model, &request.anchor).ok()?;

        self.remove(id);
        let moved = self.start(request).ok()?;
        info!(effect_id = %id, new_id = %moved, "effect moved");
        Some(moved)
    }

    /// A running effect's record. Timed effects past their wall-clock
    /// budget are not returned, even before their driver reaps them.
    #[must_use]
    pub fn info(&self, id: EffectId) -> Option<Arc<EffectInstance>> {
        let now = now_ms();
        self.shared.registry.get(id).filter(|instance| !instance.has_expired(now))
    }

    /// Every running, unexpired effect, ordered by id.
    #[must_use]
    pub fn list_active(&self) -> Vec<Arc<EffectInstance>> {
        let now = now_ms();
        let mut effects = self.shared.registry.list();
        effects.retain(|instance| !instance.has_expired(now));
        effects
    }

    /// Ids of running effects that play `model`.
    #[must_use]
    pub fn effects_for_model(&self, model: &str) -> Vec<EffectId> {
        self.shared.registry.ids_for_model(model)
    }

    /// Ticks run by an effect's driver so far.
    #[must_use]
    pub fn effect_tick(&self, id: EffectId) -> Option<u64> {
        self.shared.registry.driver(id).map(|driver| driver.state().tick)
    }

    /// Mark every cached point of an effect as changed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EffectNotFound`] if the id is unknown.
    pub fn refresh(&self, id: EffectId) -> Result<(), EngineError> {
        if !self.shared.registry.contains(id) {
            return Err(EngineError::EffectNotFound(id));
        }
        self.shared.cache.force_update(id);
        debug!(effect_id = %id, "effect refresh forced");
        Ok(())
    }

    /// Register or replace a model.
    pub fn register_model(&self, model: impl Into<Model>) {
        let model = self.timed(model.into());
        info!(
            model = %model.name(),
            particles = model.particle_count(),
            author = model.metadata().author.as_deref().unwrap_or("-"),
            "model registered"
        );
        self.shared.models.insert(model);
    }

    /// Time animated models for the configured tick period.
    fn timed(&self, model: Model) -> Model {
        model.with_tick_ms(self.shared.config.tick_ms)
    }

    /// Register or replace an animated model.
    pub fn register_animated_model(&self, model: AnimatedModel) {
        let model = model.with_tick_ms(self.shared.config.tick_ms);
        debug!(
            model = %model.name(),
            frames = model.frame_count(),
            tick_aligned = model.is_tick_aligned(),
            tick_ms = model.tick_ms(),
            "animated model"
        );
        self.register_model(model);
    }

    /// Register a model that is dropped after `ttl`, stopping its effects.
    pub fn register_temporary_model(&self, model: impl Into<Model>, ttl: Duration) {
        let model = self.timed(model.into());
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        info!(model = %model.name(), ttl_ms, "temporary model registered");
        self.shared.models.insert_temporary(model, now_ms().saturating_add(ttl_ms));
    }

    /// Delete a model and stop every effect playing it. Returns the number
    /// of stopped effects.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModelNotFound`] if no such model exists.
    pub fn delete_model(&self, name: &str) -> Result<usize, EngineError> {
        self.shared
            .models
            .remove(name)
            .ok_or_else(|| EngineError::ModelNotFound(name.to_string()))?;
        let stopped = self.stop_model_effects(name);
        info!(model = %name, stopped, "model deleted");
        Ok(stopped)
    }

    fn stop_model_effects(&self, name: &str) -> usize {
        let ids = self.shared.registry.ids_for_model(name);
        for id in &ids {
            self.remove(*id);
        }
        ids.len()
    }

    /// Replace the whole model table. Effects whose model is gone are
    /// stopped; the rest render the reloaded model from their next tick.
    pub fn reload_all(&self, models: Vec<Model>) -> ReloadSummary {
        let count = models.len();
        let models = models.into_iter().map(|m| self.timed(m)).collect();
        let dropped = self.shared.models.replace_all(models);
        debug!(dropped = ?dropped, "stale models dropped");

        let stopped: Vec<EffectId> = self
            .shared
            .registry
            .list()
            .into_iter()
            .filter(|instance| !self.shared.models.has_model(&instance.model))
            .map(|instance| instance.id)
            .collect();
        for id in &stopped {
            self.remove(*id);
        }

        info!(models = count, stopped = stopped.len(), "models reloaded");
        ReloadSummary { models: count, stopped }
    }

    /// Drop temporary models that expired by `now_ms` and stop their
    /// effects. Returns the dropped names.
    pub fn purge_expired_models(&self, now_ms: u64) -> Vec<String> {
        let expired = self.shared.models.take_expired(now_ms);
        for name in &expired {
            let stopped = self.stop_model_effects(name);
            info!(model = %name, stopped, "temporary model expired");
        }
        expired
    }

    /// Current usage figures.
    #[must_use]
    pub fn usage(&self) -> UsageReport {
        let effects = self.shared.registry.list();
        let models = self.shared.models.models();
        let stats = &self.shared.stats;
        UsageReport {
            active_effects: effects.len(),
            persistent_effects: effects.iter().filter(|e| e.persistent).count(),
            viewer_effects: effects.iter().filter(|e| e.is_viewer_attached()).count(),
            models: models.len(),
            animated_models: models.iter().filter(|m| m.is_animated()).count(),
            total_particles: models.iter().map(|m| m.stored_particles()).sum(),
            cached_points: self.shared.cache.len(),
            estimated_bytes: 0,
            ticks_run: stats.ticks(),
            particles_emitted: stats.emitted(),
            emit_failures: stats.failed(),
            refreshable_points: stats.refreshable(),
        }
        .with_estimate()
    }

    /// Run every driver once against the current wall clock.
    pub fn tick_all(&self) -> TickSummary {
        self.tick_at(now_ms())
    }

    /// Run every driver once with `now_ms` as the wall clock.
    pub fn tick_at(&self, now_ms: u64) -> TickSummary {
        let shared = &*self.shared;
        let ctx = TickContext {
            config: &shared.config,
            models: &shared.models,
            host: shared.host.as_ref(),
            registry: &shared.registry,
            cache: &shared.cache,
            now_ms,
        };

        let mut summary = TickSummary::default();
        for (id, driver) in shared.registry.drivers() {
            let report = driver.run(id, &ctx);
            shared.stats.record(&report);
            summary.effects += 1;
            summary.emitted += report.emitted;
            if let DriverStatus::Terminated(reason) = report.status {
                self.remove(id);
                debug!(effect_id = %id, ?reason, "effect terminated");
                summary.terminated.push((id, reason));
            } else if !shared.registry.contains(id) {
                // Stopped mid-run: the run may have re-populated the cache
                // after `stop` purged it.
                shared.cache.purge(id);
            }
        }
        shared.stats.tick();
        summary
    }

    /// Stop every effect. Returns the number stopped.
    pub fn stop_all(&self) -> usize {
        let ids = self.shared.registry.clear();
        self.shared.cache.clear();
        ids.len()
    }

    /// Tear the registry down: stop everything and restart id allocation
    /// at 1.
    pub fn shutdown(&self) {
        let stopped = self.stop_all();
        self.shared.ids.reset();
        info!(stopped, "engine shut down");
    }

    /// The viewer an effect follows, if any.
    #[must_use]
    pub fn viewer_of(&self, id: EffectId) -> Option<ViewerId> {
        match self.shared.registry.get(id)?.anchor {
            Anchor::Viewer(anchor) => Some(anchor.viewer),
            Anchor::Fixed(_) => None,
        }
    }
}
