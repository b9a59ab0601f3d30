//! Per-effect tick drivers.
//!
//! Every registered effect owns one [`DriverSlot`]. The tick loop calls
//! [`DriverSlot::run`] once per host tick; a run walks the effect through
//! a fixed sequence:
//!
//! 1. Liveness: a cancelled slot, or an id no longer in the registry,
//!    terminates immediately.
//! 2. Wall-clock expiry of timed effects.
//! 3. Model lookup, and completion of one-time effects at `max_ticks`.
//! 4. Anchor resolution; a disconnected viewer terminates the effect.
//! 5. Particle selection: the active animation frame, or the LOD subset of
//!    a static model.
//! 6. Procedural transform and placement relative to the anchor.
//! 7. Per-observer distance and rights culling, then emission.
//! 8. Tick counter advance.
//!
//! A terminated driver never becomes active again; the caller removes the
//! effect from the registry when a run reports termination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use glam::DVec3;
use particle_model::{AnimatedModel, Color, Model, ModelTable, ParticleTemplate, StaticModel};
use tracing::{debug, trace, warn};

use crate::cache::ChangeCache;
use crate::config::EngineConfig;
use crate::host::{DustEmission, Host};
use crate::ids::EffectId;
use crate::instance::{Anchor, EffectInstance, Lifetime, Location};
use crate::lod::{self, EmissionGate, LodTier, MotionBudget, STATIC_SPAWN_INTERVAL};
use crate::registry::EffectRegistry;

/// Jitter applied to circular fixed-location effects.
const CIRCULAR_JITTER: f64 = 0.001;

/// Why a driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Stopped explicitly, or vanished from the registry.
    Removed,
    /// A timed effect ran out of wall-clock time.
    Expired,
    /// A one-time effect finished its single pass.
    Completed,
    /// The viewer it followed disconnected.
    ViewerOffline,
    /// Its model was deleted.
    ModelMissing,
}

/// Lifecycle of a driver. `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    Active,
    Terminated(TerminationReason),
}

impl DriverStatus {
    /// Returns `true` while the driver still runs.
    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// Mutable per-effect state, owned by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectState {
    /// Ticks run so far, starting from the instance's initial tick.
    pub tick: u64,
    /// Animation frame emitted on the previous tick.
    pub last_frame: Option<usize>,
    /// Tick at which the animation frame last changed.
    pub frame_changed_at: u64,
    /// Anchor position on the previous tick, for speed estimation.
    pub last_anchor: Option<DVec3>,
    pub status: DriverStatus,
}

impl EffectState {
    /// Fresh state starting at `initial_tick`.
    #[must_use]
    pub fn new(initial_tick: u64) -> Self {
        Self {
            tick: initial_tick,
            last_frame: None,
            frame_changed_at: initial_tick,
            last_anchor: None,
            status: DriverStatus::Active,
        }
    }

    fn terminate(&mut self, reason: TerminationReason) -> DriverStatus {
        self.status = DriverStatus::Terminated(reason);
        self.status
    }
}

/// What one driver run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub status: DriverStatus,
    /// Emissions delivered to observers.
    pub emitted: u64,
    /// Emissions the host failed to deliver.
    pub failed: u64,
    /// Rendered points the change cache considered new or changed.
    pub refreshable: u64,
}

impl TickReport {
    fn idle(status: DriverStatus) -> Self {
        Self {
            status,
            emitted: 0,
            failed: 0,
            refreshable: 0,
        }
    }
}

/// Shared services a driver run reads from.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    pub config: &'a EngineConfig,
    pub models: &'a ModelTable,
    pub host: &'a dyn Host,
    pub registry: &'a EffectRegistry,
    pub cache: &'a ChangeCache,
    /// Wall clock for this tick, unix milliseconds.
    pub now_ms: u64,
}

/// The registered driver of one effect.
#[derive(Debug)]
pub struct DriverSlot {
    cancelled: AtomicBool,
    state: Mutex<EffectState>,
}

impl DriverSlot {
    /// A driver that starts counting at `initial_tick`.
    #[must_use]
    pub fn new(initial_tick: u64) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            state: Mutex::new(EffectState::new(initial_tick)),
        }
    }

    /// Stop the driver. An in-flight run completes; later runs do nothing.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> EffectState {
        self.lock().clone()
    }

    /// The current status.
    #[must_use]
    pub fn status(&self) -> DriverStatus {
        self.lock().status
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EffectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one tick for effect `id`.
    pub fn run(&self, id: EffectId, ctx: &TickContext<'_>) -> TickReport {
        let mut state = self.lock();
        if !state.status.is_active() {
            return TickReport::idle(state.status);
        }

        let instance = match ctx.registry.get(id) {
            Some(instance) if !self.is_cancelled() => instance,
            _ => {
                self.cancel();
                return TickReport::idle(state.terminate(TerminationReason::Removed));
            }
        };

        tick_effect(&instance, &mut state, ctx)
    }
}

/// One tick of a live effect. Advances `state.tick` unless the effect
/// terminates.
pub fn tick_effect(instance: &EffectInstance, state: &mut EffectState, ctx: &TickContext<'_>) -> TickReport {
    if instance.has_expired(ctx.now_ms) {
        debug!(effect_id = %instance.id, model = %instance.model, "effect expired");
        return TickReport::idle(state.terminate(TerminationReason::Expired));
    }

    let Some(model) = ctx.models.get(&instance.model) else {
        debug!(effect_id = %instance.id, model = %instance.model, "model gone, stopping effect");
        return TickReport::idle(state.terminate(TerminationReason::ModelMissing));
    };

    let max_ticks = model.max_ticks();
    if instance.lifetime == Lifetime::OneTime && state.tick >= max_ticks {
        debug!(effect_id = %instance.id, tick = state.tick, "one-time effect completed");
        return TickReport::idle(state.terminate(TerminationReason::Completed));
    }

    let (location, only_when_still) = match &instance.anchor {
        Anchor::Fixed(location) => (location.clone(), false),
        Anchor::Viewer(anchor) => match ctx.host.viewer_location(anchor.viewer) {
            Some(location) => (location, anchor.only_when_still),
            None => {
                debug!(effect_id = %instance.id, viewer = %anchor.viewer, "viewer offline, stopping effect");
                return TickReport::idle(state.terminate(TerminationReason::ViewerOffline));
            }
        },
    };

    let speed = state.last_anchor.map_or(0.0, |last| last.distance(location.position));
    state.last_anchor = Some(location.position);

    let mut report = TickReport::idle(DriverStatus::Active);
    if !(only_when_still && speed > ctx.config.still_threshold) {
        let render = Render {
            instance,
            location: &location,
            tick: state.tick,
            ctx,
        };
        match model.as_ref() {
            Model::Animated(animated) => render.animated(animated, state, &mut report),
            Model::Static(model) => render.static_model(model, max_ticks, speed, &mut report),
        }
    }

    if ctx.config.track_changes
        && ctx.config.cache_sweep_interval > 0
        && state.tick > 0
        && state.tick % ctx.config.cache_sweep_interval == 0
    {
        let evicted = ctx.cache.sweep(instance.id, state.tick, ctx.config.cache_max_age);
        if evicted > 0 {
            trace!(effect_id = %instance.id, evicted, "swept change cache");
        }
    }

    state.tick += 1;
    report
}

struct Render<'a> {
    instance: &'a EffectInstance,
    location: &'a Location,
    tick: u64,
    ctx: &'a TickContext<'a>,
}

impl Render<'_> {
    fn animated(&self, model: &AnimatedModel, state: &mut EffectState, report: &mut TickReport) {
        let elapsed_ms = self.ctx.now_ms.saturating_sub(self.instance.animation_started_at_ms);
        let Some(index) = model.frame_index(self.tick, elapsed_ms) else {
            return;
        };
        if state.last_frame != Some(index) {
            state.last_frame = Some(index);
            state.frame_changed_at = self.tick;
        } else if !self.instance.is_viewer_attached() {
            return;
        }

        // Viewer-attached frames keep being re-emitted for a short lifespan
        // after each change so they track the moving anchor.
        if self.instance.is_viewer_attached()
            && self.tick.saturating_sub(state.frame_changed_at) >= self.ctx.config.viewer_particle_lifespan
        {
            return;
        }

        let frame = &model.frames()[index];
        self.emit_all(frame.particles.iter(), DVec3::ZERO, report);
    }

    fn static_model(&self, model: &StaticModel, max_ticks: u64, speed: f64, report: &mut TickReport) {
        let particles = model.particles();
        let config = self.ctx.config;
        let effects = self.instance.effects.filter(|e| !e.is_inert());
        let circular = effects.is_some_and(|e| e.is_circular()) && !self.instance.is_viewer_attached();

        if circular && self.tick % 2 == 1 {
            return;
        }

        let tier = LodTier::for_count(particles.len(), config.large_threshold, config.very_large_threshold);
        let budget = match self.instance.anchor {
            Anchor::Viewer(_) => Some(MotionBudget::for_speed(particles.len(), speed, config)),
            Anchor::Fixed(_) => None,
        };
        let spawn_interval = match (budget, effects) {
            (Some(budget), _) => budget.spawn_interval,
            (None, Some(_)) => 1,
            (None, None) => STATIC_SPAWN_INTERVAL,
        };
        let gate = EmissionGate {
            tick: self.tick,
            lifetime: self.instance.lifetime,
            max_ticks,
            spawn_interval,
        };

        let mut selected = lod::select(particles, tier, &gate);
        if let Some(budget) = budget {
            selected = budget.apply(selected, self.tick);
        }

        let jitter = if circular { DVec3::splat(CIRCULAR_JITTER) } else { DVec3::ZERO };
        self.emit_all(selected.into_iter().map(|i| &particles[i]), jitter, report);
    }

    fn emit_all<'p>(
        &self,
        particles: impl Iterator<Item = &'p ParticleTemplate>,
        jitter: DVec3,
        report: &mut TickReport,
    ) {
        let ctx = self.ctx;
        let instance = self.instance;
        let observers: Vec<_> = ctx
            .host
            .observers(&self.location.world)
            .into_iter()
            .filter(|o| ctx.host.can_view(o, &instance.model, instance.force_visible()))
            .collect();
        if observers.is_empty() {
            return;
        }

        let max_distance_sq = if instance.is_viewer_attached() {
            ctx.config.viewer_render_distance_squared()
        } else {
            ctx.config.render_distance_squared()
        };
        let effects = instance.effects.as_ref();

        for template in particles {
            if ctx.config.track_changes && ctx.cache.should_update(instance.id, template, self.tick) {
                report.refreshable += 1;
            }

            let offset = particle_math::transform(template.offset, self.tick, effects);
            let emission = DustEmission {
                position: self.location.position + offset,
                color: template.color.unwrap_or(Color::WHITE),
                size: template.size(),
                count: 1,
                jitter,
            };

            for observer in &observers {
                if observer.position.distance_squared(emission.position) > max_distance_sq {
                    continue;
                }
                match ctx.host.emit(observer, &emission) {
                    Ok(()) => report.emitted += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(effect_id = %instance.id, observer = %observer.id, error = %e, "emit failed");
                    }
                }
            }
        }
    }
}

/// Convert elapsed wall-clock time since an animation started into ticks
/// of `tick_ms`.
#[must_use]
pub fn tick_offset(now_ms: u64, animation_started_at_ms: u64, tick_ms: u64) -> u64 {
    now_ms.saturating_sub(animation_started_at_ms) / tick_ms.max(1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use particle_math::ParticleEffects;
    use particle_model::{Frame, ModelSource};

    use super::*;
    use crate::host::{EmitError, MemoryHost, ViewRights, ViewerId};
    use crate::instance::ViewerAnchor;

    struct Fixture {
        config: EngineConfig,
        models: ModelTable,
        host: MemoryHost,
        registry: EffectRegistry,
        cache: ChangeCache,
    }

    impl Fixture {
        fn new() -> Self {
            let host = MemoryHost::new().with_recording();
            host.add_world("w");
            Self {
                config: EngineConfig::default(),
                models: ModelTable::new(),
                host,
                registry: EffectRegistry::new(),
                cache: ChangeCache::new(),
            }
        }

        fn ctx(&self, now_ms: u64) -> TickContext<'_> {
            TickContext {
                config: &self.config,
                models: &self.models,
                host: &self.host,
                registry: &self.registry,
                cache: &self.cache,
                now_ms,
            }
        }

        fn register(&self, instance: EffectInstance) -> Arc<DriverSlot> {
            let slot = Arc::new(DriverSlot::new(instance.initial_tick));
            self.registry.insert(instance, Arc::clone(&slot));
            slot
        }
    }

    fn line(count: usize) -> Vec<ParticleTemplate> {
        (0..count)
            .map(|i| ParticleTemplate::at(DVec3::new(i as f64 * 0.1, 0.0, 0.0), Color::WHITE))
            .collect()
    }

    fn fixed(id: u64, model: &str, lifetime: Lifetime) -> EffectInstance {
        EffectInstance {
            id: EffectId(id),
            model: model.to_string(),
            anchor: Anchor::Fixed(Location::new("w", DVec3::ZERO)),
            lifetime,
            persistent: lifetime.should_be_persistent(),
            started_at_ms: 0,
            animation_started_at_ms: 0,
            initial_tick: 0,
            effects: None,
        }
    }

    fn on_viewer(id: u64, model: &str, viewer: ViewerId, only_when_still: bool) -> EffectInstance {
        EffectInstance {
            anchor: Anchor::Viewer(ViewerAnchor {
                viewer,
                only_when_still,
                force_visible: false,
            }),
            ..fixed(id, model, Lifetime::Infinite)
        }
    }

    #[test]
    fn test_static_effect_emits_at_third_rate() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(4), 20).into());
        f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let slot = f.register(fixed(1, "dots", Lifetime::Infinite));

        let emitted: Vec<u64> = (0..4).map(|_| slot.run(EffectId(1), &f.ctx(0)).emitted).collect();
        assert_eq!(emitted, vec![4, 0, 0, 4]);
        assert_eq!(slot.state().tick, 4);
    }

    #[test]
    fn test_missing_instance_terminates() {
        let f = Fixture::new();
        let slot = DriverSlot::new(0);
        let report = slot.run(EffectId(9), &f.ctx(0));
        assert_eq!(report.status, DriverStatus::Terminated(TerminationReason::Removed));
        assert!(slot.is_cancelled());
    }

    #[test]
    fn test_cancelled_slot_never_runs_again() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(1), 20).into());
        let slot = f.register(fixed(1, "dots", Lifetime::Infinite));
        slot.cancel();
        assert!(!slot.run(EffectId(1), &f.ctx(0)).status.is_active());
        assert!(!slot.run(EffectId(1), &f.ctx(0)).status.is_active());
        assert_eq!(slot.state().tick, 0);
    }

    #[test]
    fn test_timed_effect_expires_by_wall_clock() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(1), 20).into());
        let slot = f.register(fixed(1, "dots", Lifetime::Timed(2)));

        assert!(slot.run(EffectId(1), &f.ctx(1_999)).status.is_active());
        let report = slot.run(EffectId(1), &f.ctx(2_000));
        assert_eq!(report.status, DriverStatus::Terminated(TerminationReason::Expired));
    }

    #[test]
    fn test_one_time_completes_at_max_ticks() {
        let f = Fixture::new();
        // max_ticks = max(10, 0 + 60) = 60.
        f.models.insert(StaticModel::new("dots", line(1), 10).into());
        let slot = f.register(fixed(1, "dots", Lifetime::OneTime));

        for _ in 0..60 {
            assert!(slot.run(EffectId(1), &f.ctx(0)).status.is_active());
        }
        let report = slot.run(EffectId(1), &f.ctx(0));
        assert_eq!(report.status, DriverStatus::Terminated(TerminationReason::Completed));
    }

    #[test]
    fn test_deleted_model_terminates() {
        let f = Fixture::new();
        let slot = f.register(fixed(1, "gone", Lifetime::Infinite));
        let report = slot.run(EffectId(1), &f.ctx(0));
        assert_eq!(report.status, DriverStatus::Terminated(TerminationReason::ModelMissing));
    }

    #[test]
    fn test_viewer_disconnect_terminates() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(1), 20).into());
        let viewer = f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let slot = f.register(on_viewer(1, "dots", viewer, false));

        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 1);
        f.host.disconnect(viewer);
        let report = slot.run(EffectId(1), &f.ctx(0));
        assert_eq!(report.status, DriverStatus::Terminated(TerminationReason::ViewerOffline));
    }

    #[test]
    fn test_only_when_still_hides_while_moving() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(1), 20).into());
        let viewer = f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let slot = f.register(on_viewer(1, "dots", viewer, true));

        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 1);
        f.host.move_viewer(viewer, DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 0);
        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 1);
    }

    #[test]
    fn test_culling_by_distance_and_rights() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(1), 20).into());
        let near = f.host.connect("w", DVec3::new(10.0, 0.0, 0.0), ViewRights::all());
        f.host.connect("w", DVec3::new(100.0, 0.0, 0.0), ViewRights::all());
        f.host.connect("w", DVec3::ZERO, ViewRights::model("other"));
        let allowed = f.host.connect("w", DVec3::ZERO, ViewRights::model("DOTS"));
        let slot = f.register(fixed(1, "dots", Lifetime::Infinite));

        slot.run(EffectId(1), &f.ctx(0));
        let mut receivers: Vec<ViewerId> = f.host.take_emissions().into_iter().map(|(v, _)| v).collect();
        receivers.sort();
        let mut expected = vec![near, allowed];
        expected.sort();
        assert_eq!(receivers, expected);
    }

    #[test]
    fn test_viewer_effects_use_reduced_distance() {
        let mut f = Fixture::new();
        f.config = f.config.clone().with_render_distance(10.0);
        f.models.insert(StaticModel::new("dots", line(1), 20).into());
        let anchor = f.host.connect("nether", DVec3::ZERO, ViewRights::all());
        f.host.add_world("nether");
        // 9 blocks away: within 10, outside sqrt(60).
        f.host.connect("nether", DVec3::new(9.0, 0.0, 0.0), ViewRights::all());
        let slot = f.register(on_viewer(1, "dots", anchor, false));

        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 1);
        assert_eq!(f.host.take_emissions()[0].0, anchor);
    }

    /// Delivers through a [`MemoryHost`] but fails every emit to one viewer.
    struct Unreachable {
        inner: MemoryHost,
        viewer: ViewerId,
    }

    impl Host for Unreachable {
        fn world_exists(&self, world: &str) -> bool {
            self.inner.world_exists(world)
        }

        fn viewer_location(&self, viewer: ViewerId) -> Option<Location> {
            self.inner.viewer_location(viewer)
        }

        fn observers(&self, world: &str) -> Vec<crate::host::Observer> {
            self.inner.observers(world)
        }

        fn emit(&self, observer: &crate::host::Observer, emission: &DustEmission) -> Result<(), EmitError> {
            if observer.id == self.viewer {
                return Err(EmitError::Offline(observer.id));
            }
            self.inner.emit(observer, emission)
        }
    }

    #[test]
    fn test_emit_failures_are_counted_and_tick_continues() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(3), 20).into());
        let inner = MemoryHost::new().with_recording();
        inner.add_world("w");
        let reachable = inner.connect("w", DVec3::ZERO, ViewRights::all());
        let viewer = inner.connect("w", DVec3::X, ViewRights::all());
        let host = Unreachable { inner, viewer };
        let slot = f.register(fixed(1, "dots", Lifetime::Infinite));
        let ctx = TickContext {
            host: &host,
            ..f.ctx(0)
        };

        let report = slot.run(EffectId(1), &ctx);
        assert_eq!(report.status, DriverStatus::Active);
        assert_eq!(report.failed, 3);
        assert_eq!(report.emitted, 3);
        let emissions = host.inner.take_emissions();
        assert_eq!(emissions.len(), 3);
        assert!(emissions.iter().all(|(v, _)| *v == reachable));

        // The effect keeps running on later ticks.
        assert!(slot.run(EffectId(1), &ctx).status.is_active());
        assert_eq!(slot.state().tick, 2);
    }

    #[test]
    fn test_rotating_fixed_effect_renders_half_rate_with_jitter() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(2), 20).into());
        f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let mut instance = fixed(1, "dots", Lifetime::Infinite);
        instance.effects = Some(ParticleEffects::preset("rotate", 1.0).unwrap());
        let slot = f.register(instance);

        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 2);
        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 0);
        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).emitted, 2);
        let emissions = f.host.take_emissions();
        assert!(emissions.iter().all(|(_, e)| e.jitter == DVec3::splat(CIRCULAR_JITTER)));
    }

    #[test]
    fn test_orbit_displaces_emitted_position() {
        let f = Fixture::new();
        f.models
            .insert(StaticModel::new("dot", vec![ParticleTemplate::at(DVec3::ZERO, Color::WHITE)], 20).into());
        f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let mut instance = fixed(1, "dot", Lifetime::Infinite);
        instance.anchor = Anchor::Fixed(Location::new("w", DVec3::new(5.0, 1.0, 5.0)));
        instance.effects = Some(ParticleEffects::preset("orbit", 1.0).unwrap());
        let slot = f.register(instance);

        slot.run(EffectId(1), &f.ctx(0));
        let (_, emission) = f.host.take_emissions().remove(0);
        assert!((emission.position - DVec3::new(7.0, 1.0, 5.0)).length() < 1e-9);
    }

    fn animation() -> AnimatedModel {
        let frames = (0..3)
            .map(|i| Frame::new(i, 100, vec![ParticleTemplate::at(DVec3::new(i as f64, 0.0, 0.0), Color::WHITE)]))
            .collect();
        AnimatedModel::new("anim", frames, true, ModelSource::Generated)
    }

    #[test]
    fn test_fixed_animation_emits_on_frame_change() {
        let f = Fixture::new();
        f.models.insert(animation().into());
        f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let slot = f.register(fixed(1, "anim", Lifetime::Infinite));

        // 100 ms frames at 50 ms ticks: a new frame every other tick.
        let emitted: Vec<u64> = (0..6).map(|_| slot.run(EffectId(1), &f.ctx(0)).emitted).collect();
        assert_eq!(emitted, vec![1, 0, 1, 0, 1, 0]);
        assert_eq!(slot.state().last_frame, Some(2));
    }

    #[test]
    fn test_viewer_animation_re_emits_within_lifespan() {
        let f = Fixture::new();
        f.models.insert(animation().into());
        let viewer = f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let slot = f.register(on_viewer(1, "anim", viewer, false));

        let emitted: Vec<u64> = (0..4).map(|_| slot.run(EffectId(1), &f.ctx(0)).emitted).collect();
        assert_eq!(emitted, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_initial_tick_offset_resumes_mid_animation() {
        let f = Fixture::new();
        f.models.insert(animation().into());
        f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let mut instance = fixed(1, "anim", Lifetime::Infinite);
        instance.initial_tick = 100;
        let slot = f.register(instance);

        slot.run(EffectId(1), &f.ctx(0));
        let expected = animation().frame_index_at_tick(100);
        assert_eq!(slot.state().last_frame, expected);
        assert_eq!(slot.state().tick, 101);
    }

    #[test]
    fn test_change_cache_counts_refreshable_points() {
        let f = Fixture::new();
        f.models.insert(StaticModel::new("dots", line(3), 20).into());
        f.host.connect("w", DVec3::ZERO, ViewRights::all());
        let slot = f.register(fixed(1, "dots", Lifetime::Infinite));

        assert_eq!(slot.run(EffectId(1), &f.ctx(0)).refreshable, 3);
        slot.run(EffectId(1), &f.ctx(0));
        slot.run(EffectId(1), &f.ctx(0));
        // Same points again at tick 3: nothing changed.
        let report = slot.run(EffectId(1), &f.ctx(0));
        assert_eq!(report.emitted, 3);
        assert_eq!(report.refreshable, 0);
    }

    #[test]
    fn test_tick_offset() {
        assert_eq!(tick_offset(10_000, 5_000, 50), 100);
        assert_eq!(tick_offset(10_000, 5_000, 100), 50);
        assert_eq!(tick_offset(5_000, 10_000, 50), 0);
    }
}
