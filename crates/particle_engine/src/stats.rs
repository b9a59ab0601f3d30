//! Usage counters and the memory/usage report.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::scheduler::TickReport;

/// Rough per-particle footprint of a stored template, in bytes.
pub const TEMPLATE_BYTES: u64 = 48;
/// Rough footprint of one change-cache entry, in bytes.
pub const CACHE_ENTRY_BYTES: u64 = 64;
/// Rough footprint of one running effect, in bytes.
pub const EFFECT_BYTES: u64 = 512;

/// Cumulative counters updated by the tick loop.
#[derive(Debug, Default)]
pub struct EngineStats {
    ticks: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
    refreshable: AtomicU64,
}

impl EngineStats {
    /// Fold one driver run into the counters.
    pub fn record(&self, report: &TickReport) {
        self.emitted.fetch_add(report.emitted, Ordering::Relaxed);
        self.failed.fetch_add(report.failed, Ordering::Relaxed);
        self.refreshable.fetch_add(report.refreshable, Ordering::Relaxed);
    }

    /// Count one engine tick.
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn refreshable(&self) -> u64 {
        self.refreshable.load(Ordering::Relaxed)
    }
}

/// Point-in-time memory and usage figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub active_effects: usize,
    pub persistent_effects: usize,
    pub viewer_effects: usize,
    pub models: usize,
    pub animated_models: usize,
    /// Templates held across all models and frames.
    pub total_particles: usize,
    pub cached_points: usize,
    /// Approximate heap use of models, effects and the change cache.
    pub estimated_bytes: u64,
    pub ticks_run: u64,
    pub particles_emitted: u64,
    pub emit_failures: u64,
    pub refreshable_points: u64,
}

impl UsageReport {
    /// Fill `estimated_bytes` from the counts.
    #[must_use]
    pub fn with_estimate(mut self) -> Self {
        self.estimated_bytes = self.total_particles as u64 * TEMPLATE_BYTES
            + self.cached_points as u64 * CACHE_ENTRY_BYTES
            + self.active_effects as u64 * EFFECT_BYTES;
        self
    }
}

impl std::fmt::Display for UsageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} effects ({} persistent, {} on viewers), {} models ({} animated), {} particles, {} cached points, ~{} KiB",
            self.active_effects,
            self.persistent_effects,
            self.viewer_effects,
            self.models,
            self.animated_models,
            self.total_particles,
            self.cached_points,
            self.estimated_bytes / 1024,
        )
    }
}
