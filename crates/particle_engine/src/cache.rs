//! Change-detection cache.
//!
//! Remembers, per effect and per quantised particle position, the colour
//! last considered rendered. [`ChangeCache::should_update`] answers whether a
//! point differs enough from what the observer last saw to be worth a
//! network refresh. The cache is bookkeeping only: the render path may
//! consult it for statistics without gating emission on it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use dashmap::DashMap;
use glam::DVec3;
use particle_model::{Color, ParticleTemplate};

use crate::ids::EffectId;

/// Normalised RGB distance above which a colour counts as changed.
pub const COLOR_CHANGE_THRESHOLD: f32 = 0.02;

/// A particle offset rounded to 1/100 of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizedPos(i64, i64, i64);

impl From<DVec3> for QuantizedPos {
    fn from(offset: DVec3) -> Self {
        let q = |v: f64| (v * 100.0).round() as i64;
        Self(q(offset.x), q(offset.y), q(offset.z))
    }
}

impl std::fmt::Display for QuantizedPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (x, y, z) = (self.0 as f64 / 100.0, self.1 as f64 / 100.0, self.2 as f64 / 100.0);
        write!(f, "{x:.2},{y:.2},{z:.2}")
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    color: Option<Color>,
    last_update_tick: u64,
    /// Set by [`ChangeCache::force_update`]; the next check reports a change.
    forced: bool,
}

/// Per-effect map of last-seen colours.
#[derive(Debug, Default)]
pub struct ChangeCache {
    effects: DashMap<EffectId, HashMap<QuantizedPos, CacheEntry>>,
}

impl ChangeCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `template` should be refreshed for `effect` at
    /// `tick`.
    ///
    /// The first check of a position is always `true`. Later checks are
    /// `true` when the colour appeared or disappeared, or moved by more than
    /// [`COLOR_CHANGE_THRESHOLD`]; the stored state is only updated when the
    /// answer is `true`.
    pub fn should_update(&self, effect: EffectId, template: &ParticleTemplate, tick: u64) -> bool {
        let mut entries = self.effects.entry(effect).or_default();
        let fresh = CacheEntry {
            color: template.color,
            last_update_tick: tick,
            forced: false,
        };

        match entries.entry(QuantizedPos::from(template.offset)) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let changed = entry.forced
                    || match (entry.color, template.color) {
                        (None, None) => false,
                        (Some(_), None) | (None, Some(_)) => true,
                        (Some(old), Some(new)) => old.distance(&new) > COLOR_CHANGE_THRESHOLD,
                    };
                if changed {
                    *entry = fresh;
                }
                changed
            }
        }
    }

    /// Make the next check of every position of `effect` report a change.
    pub fn force_update(&self, effect: EffectId) {
        if let Some(mut entries) = self.effects.get_mut(&effect) {
            for entry in entries.values_mut() {
                entry.forced = true;
            }
        }
    }

    /// Evict entries of `effect` last updated more than `max_age` ticks
    /// before `tick`. Drops the effect's map once empty. Returns the number
    /// of evicted entries.
    pub fn sweep(&self, effect: EffectId, tick: u64, max_age: u64) -> usize {
        let evicted = match self.effects.get_mut(&effect) {
            Some(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| tick.saturating_sub(entry.last_update_tick) <= max_age);
                before - entries.len()
            }
            None => return 0,
        };
        self.effects.remove_if(&effect, |_, entries| entries.is_empty());
        evicted
    }

    /// Drop every entry of `effect`.
    pub fn purge(&self, effect: EffectId) {
        self.effects.remove(&effect);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.effects.clear();
    }

    /// Number of tracked positions across all effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.iter().map(|e| e.value().len()).sum()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Number of tracked positions for one effect.
    #[must_use]
    pub fn effect_len(&self, effect: EffectId) -> usize {
        self.effects.get(&effect).map_or(0, |e| e.len())
    }
}
