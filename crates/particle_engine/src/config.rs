//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Tunables for the scheduler, LOD policy, change cache and persistence.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Host tick period in milliseconds. Animated models are re-timed for
    /// it when registered, and recovery offsets are counted in it.
    pub tick_ms: u64,
    /// Models with more particles than this use the Large LOD tier.
    pub large_threshold: usize,
    /// Models with more particles than this use the Very-Large LOD tier.
    pub very_large_threshold: usize,
    /// Per-tick particle cap for viewer-attached effects.
    pub max_particles_per_tick: usize,
    /// Observers further than this from a point do not receive it.
    pub max_render_distance: f64,
    /// Ticks a viewer-attached animation frame keeps being re-emitted
    /// after it changes.
    pub viewer_particle_lifespan: u64,
    /// Anchor movement per tick above which "only when still" effects hide.
    pub still_threshold: f64,
    /// Anchor movement per tick above which a viewer counts as moving.
    pub movement_threshold: f64,
    /// Anchor movement per tick above which a viewer counts as moving fast.
    pub fast_threshold: f64,
    /// Change-cache entries older than this many ticks are swept.
    pub cache_max_age: u64,
    /// How often, in effect ticks, each effect sweeps its cache entries.
    pub cache_sweep_interval: u64,
    /// Whether the scheduler records change statistics while rendering.
    pub track_changes: bool,
    /// Seconds between background snapshot saves.
    pub autosave_interval_secs: u64,
    /// Seconds after startup before saved effects are restored.
    pub recovery_delay_secs: u64,
    /// Where snapshots are written.
    pub snapshot_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: particle_model::TICK_MS,
            large_threshold: 2_000,
            very_large_threshold: 10_000,
            max_particles_per_tick: 1_500,
            max_render_distance: 64.0,
            viewer_particle_lifespan: 3,
            still_threshold: 0.1,
            movement_threshold: 0.05,
            fast_threshold: 0.3,
            cache_max_age: 200,
            cache_sweep_interval: 100,
            track_changes: true,
            autosave_interval_secs: 300,
            recovery_delay_secs: 5,
            snapshot_path: PathBuf::from("effects.json"),
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Override the snapshot path.
    #[must_use]
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Override the LOD thresholds.
    #[must_use]
    pub fn with_lod_thresholds(mut self, large: usize, very_large: usize) -> Self {
        self.large_threshold = large;
        self.very_large_threshold = very_large.max(large);
        self
    }

    /// Override the maximum render distance.
    #[must_use]
    pub fn with_render_distance(mut self, distance: f64) -> Self {
        self.max_render_distance = distance;
        self
    }

    /// Squared render distance for fixed-location effects.
    #[must_use]
    pub fn render_distance_squared(&self) -> f64 {
        self.max_render_distance * self.max_render_distance
    }

    /// Squared render distance for viewer-attached effects (60%).
    #[must_use]
    pub fn viewer_render_distance_squared(&self) -> f64 {
        self.render_distance_squared() * 0.6
    }

    /// The tick period.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// The autosave period.
    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }

    /// The startup recovery delay.
    #[must_use]
    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }
}
