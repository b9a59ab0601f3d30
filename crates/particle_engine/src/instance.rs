//! Running effect instances and their lifetime policy.
//!
//! An [`EffectInstance`] is the read-mostly record of one playback. Once it
//! is registered nothing mutates it; per-tick bookkeeping lives in the
//! driver's [`EffectState`](crate::scheduler::EffectState).

use std::time::{SystemTime, UNIX_EPOCH};

use glam::DVec3;
use particle_math::ParticleEffects;

use crate::host::ViewerId;
use crate::ids::EffectId;

/// Timed effects longer than this many seconds are persisted.
pub const PERSIST_AFTER_SECS: u64 = 60;

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// A position in a named world.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub world: String,
    pub position: DVec3,
}

impl Location {
    /// Create a location.
    #[must_use]
    pub fn new(world: impl Into<String>, position: DVec3) -> Self {
        Self {
            world: world.into(),
            position,
        }
    }
}

/// How long an effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Runs until stopped. Wire value `-1`.
    Infinite,
    /// A single pass sized by the model's duration. Wire value `0`.
    OneTime,
    /// Runs for this many wall-clock seconds.
    Timed(u64),
}

impl Lifetime {
    /// Decode the signed seconds convention: negative is infinite, zero is
    /// one-time, positive is timed.
    #[must_use]
    pub fn from_seconds(seconds: i64) -> Self {
        match u64::try_from(seconds) {
            Err(_) => Self::Infinite,
            Ok(0) => Self::OneTime,
            Ok(n) => Self::Timed(n),
        }
    }

    /// Encode as signed seconds (`-1`, `0` or `n`).
    #[must_use]
    pub fn seconds(self) -> i64 {
        match self {
            Self::Infinite => -1,
            Self::OneTime => 0,
            Self::Timed(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    /// Whether an effect with this lifetime is written to snapshots:
    /// infinite always, one-time never, timed iff longer than a minute.
    #[must_use]
    pub fn should_be_persistent(self) -> bool {
        match self {
            Self::Infinite => true,
            Self::OneTime => false,
            Self::Timed(n) => n > PERSIST_AFTER_SECS,
        }
    }
}

/// Persistence rule on the signed seconds convention.
#[must_use]
pub fn should_be_persistent(lifetime_seconds: i64) -> bool {
    Lifetime::from_seconds(lifetime_seconds).should_be_persistent()
}

/// Options for an effect that follows a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerAnchor {
    pub viewer: ViewerId,
    /// Hide the effect while the viewer is moving.
    pub only_when_still: bool,
    /// Let force-exempt observers see it regardless of model rights.
    pub force_visible: bool,
}

/// What an effect is rendered relative to.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    Fixed(Location),
    Viewer(ViewerAnchor),
}

/// One running playback of a model.
#[derive(Debug, Clone)]
pub struct EffectInstance {
    pub id: EffectId,
    /// Name of the model being played.
    pub model: String,
    pub anchor: Anchor,
    pub lifetime: Lifetime,
    /// Whether snapshots include this effect.
    pub persistent: bool,
    /// Wall-clock start, unix milliseconds.
    pub started_at_ms: u64,
    /// Reference time for wall-clock frame selection. Earlier than
    /// `started_at_ms` when an animation resumes after a restart.
    pub animation_started_at_ms: u64,
    /// Tick the driver starts counting from.
    pub initial_tick: u64,
    pub effects: Option<ParticleEffects>,
}

impl EffectInstance {
    /// Returns `true` once a timed effect has outlived its wall-clock
    /// budget. Infinite and one-time effects never expire by time.
    ///
    /// Expiry follows the host clock, not the ticks actually run: a stalled
    /// or jumping clock moves expiry with it.
    #[must_use]
    pub fn has_expired(&self, now_ms: u64) -> bool {
        match self.lifetime {
            Lifetime::Timed(secs) => now_ms.saturating_sub(self.started_at_ms) >= secs.saturating_mul(1_000),
            Lifetime::Infinite | Lifetime::OneTime => false,
        }
    }

    /// Whole seconds left for a timed effect; `None` for other lifetimes.
    #[must_use]
    pub fn remaining_seconds(&self, now_ms: u64) -> Option<u64> {
        match self.lifetime {
            Lifetime::Timed(secs) => {
                let elapsed = now_ms.saturating_sub(self.started_at_ms) / 1_000;
                Some(secs.saturating_sub(elapsed))
            }
            Lifetime::Infinite | Lifetime::OneTime => None,
        }
    }

    /// The fixed location, if the effect is not viewer-attached.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match &self.anchor {
            Anchor::Fixed(location) => Some(location),
            Anchor::Viewer(_) => None,
        }
    }

    /// Returns `true` if the effect follows a viewer.
    #[must_use]
    pub fn is_viewer_attached(&self) -> bool {
        matches!(self.anchor, Anchor::Viewer(_))
    }

    /// The force-visible flag; always `false` for fixed effects.
    #[must_use]
    pub fn force_visible(&self) -> bool {
        match self.anchor {
            Anchor::Viewer(anchor) => anchor.force_visible,
            Anchor::Fixed(_) => false,
        }
    }
}
