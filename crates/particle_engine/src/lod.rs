//! Level-of-detail policy for static models.
//!
//! Per-tick emission work is bounded by picking a subset of a model's
//! particles each tick. The subset algorithm depends on the model's
//! [`LodTier`]:
//!
//! - **Normal**: every particle, gated by its delay and the spawn interval.
//! - **Large**: a 60-tick fade-in, an always-on outline of every
//!   `count/100`-th particle, and half-rate emission for the rest.
//! - **Very large**: 2000-particle sections shown in rotation every 8 ticks
//!   with a cross-fade into the next section, plus a persistent subset of
//!   every 150th particle so the model never blacks out between rotations.
//!
//! Animated frames bypass LOD entirely; they are always emitted whole.

use particle_model::ParticleTemplate;

use crate::config::EngineConfig;
use crate::instance::Lifetime;

/// Ticks the Large tier takes to fade a model in.
pub const FADE_IN_TICKS: u64 = 60;
/// The Large tier outlines every `count / OUTLINE_DIVISOR`-th particle.
pub const OUTLINE_DIVISOR: usize = 100;
/// Width of a Very-Large section, in particles.
pub const SECTION_WIDTH: usize = 2_000;
/// Ticks each Very-Large section stays current.
pub const SECTION_PERIOD: u64 = 8;
/// Final ticks of a section period during which the next section fades in.
pub const CROSSFADE_TICKS: u64 = 4;
/// Every particle whose index is a multiple of this stays visible in the
/// Very-Large tier. This subset prevents full blackouts between section
/// rotations and must not be removed.
pub const PERSISTENT_STRIDE: usize = 150;

/// Spawn interval for static effects without procedural motion.
pub const STATIC_SPAWN_INTERVAL: u64 = 3;

/// Particle-count band of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodTier {
    Normal,
    Large,
    VeryLarge,
}

impl LodTier {
    /// Classify a particle count. Counts equal to a threshold stay in the
    /// lower tier.
    #[must_use]
    pub fn for_count(count: usize, large_threshold: usize, very_large_threshold: usize) -> Self {
        if count > very_large_threshold {
            Self::VeryLarge
        } else if count > large_threshold {
            Self::Large
        } else {
            Self::Normal
        }
    }
}

/// Number of particles the Very-Large tier keeps visible every tick.
#[must_use]
pub fn persistent_subset_len(count: usize) -> usize {
    count.div_ceil(PERSISTENT_STRIDE)
}

/// Delay and cadence gating shared by every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionGate {
    pub tick: u64,
    pub lifetime: Lifetime,
    /// One-shot length, and the cycle length of infinite playback.
    pub max_ticks: u64,
    /// Emit a particle every this many ticks once its delay has passed.
    pub spawn_interval: u64,
}

impl EmissionGate {
    /// Whether a particle with `delay` is spawned this tick.
    ///
    /// Infinite effects replay their delays every `max_ticks`; finite ones
    /// count from the first tick, and one-time effects stop at `max_ticks`.
    #[must_use]
    pub fn allows(&self, delay: u64) -> bool {
        let interval = self.spawn_interval.max(1);
        let tick = match self.lifetime {
            Lifetime::Infinite => self.tick % self.max_ticks.max(1),
            Lifetime::OneTime if self.tick >= self.max_ticks => return false,
            Lifetime::OneTime | Lifetime::Timed(_) => self.tick,
        };
        tick >= delay && (tick - delay) % interval == 0
    }
}

/// Indices of `particles` to emit this tick under `tier`.
#[must_use]
pub fn select(particles: &[ParticleTemplate], tier: LodTier, gate: &EmissionGate) -> Vec<usize> {
    let gated = |i: &usize| gate.allows(u64::from(particles[*i].delay));
    let count = particles.len();
    match tier {
        LodTier::Normal => (0..count).filter(gated).collect(),
        LodTier::Large => large_candidates(count, gate.tick).filter(gated).collect(),
        LodTier::VeryLarge => very_large_candidates(count, gate.tick).into_iter().filter(gated).collect(),
    }
}

fn large_candidates(count: usize, tick: u64) -> impl Iterator<Item = usize> {
    let faded_in = u128::from(tick + 1) * count as u128 / u128::from(FADE_IN_TICKS);
    let visible = usize::try_from(faded_in).unwrap_or(usize::MAX).min(count);
    let outline_stride = (count / OUTLINE_DIVISOR).max(1);
    let even_tick = tick % 2 == 0;

    (0..count).filter(move |&i| i % outline_stride == 0 || (even_tick && i < visible))
}

fn very_large_candidates(count: usize, tick: u64) -> Vec<usize> {
    let section_count = count.div_ceil(SECTION_WIDTH).max(1);
    let current = ((tick / SECTION_PERIOD) % section_count as u64) as usize;
    let next = (current + 1) % section_count;
    let crossfade = section_count > 1 && tick % SECTION_PERIOD >= SECTION_PERIOD - CROSSFADE_TICKS;

    let section = |s: usize| s * SECTION_WIDTH..((s + 1) * SECTION_WIDTH).min(count);
    let mut indices: Vec<usize> = section(current).collect();
    if crossfade {
        indices.extend(section(next).filter(|&i| (i as u64 + tick) % 3 == 0));
    }
    indices.extend((0..count).step_by(PERSISTENT_STRIDE).filter(|&i| i / SECTION_WIDTH != current));
    // Cross-faded points may also be persistent.
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Per-tick work budget for a viewer-attached effect, scaled by how far the
/// viewer moved since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionBudget {
    /// Particles processed this tick at most.
    pub cap: usize,
    /// Spawn interval in ticks.
    pub spawn_interval: u64,
}

impl MotionBudget {
    /// Budget for a model of `count` particles whose anchor moved `speed`
    /// blocks since the last tick.
    #[must_use]
    pub fn for_speed(count: usize, speed: f64, config: &EngineConfig) -> Self {
        let full = count.min(config.max_particles_per_tick);
        if speed > config.fast_threshold {
            Self {
                cap: (count / 3).min(full).max(1),
                spawn_interval: 2,
            }
        } else if speed > config.movement_threshold {
            Self {
                cap: (count / 2).min(full).max(1),
                spawn_interval: 1,
            }
        } else {
            Self {
                cap: full,
                spawn_interval: 1,
            }
        }
    }

    /// Keep at most `cap` of `indices`, rotating the window each tick so
    /// every particle gets its turn.
    #[must_use]
    pub fn apply(&self, indices: Vec<usize>, tick: u64) -> Vec<usize> {
        if indices.len() <= self.cap {
            return indices;
        }
        let len = indices.len();
        let start = ((tick as u128 * self.cap as u128) % len as u128) as usize;
        indices.into_iter().cycle().skip(start).take(self.cap).collect()
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;

    fn particles(count: usize) -> Vec<ParticleTemplate> {
        (0..count)
            .map(|i| ParticleTemplate::new(DVec3::new(i as f64, 0.0, 0.0), None, 0, 1.0))
            .collect()
    }

    fn gate(tick: u64, spawn_interval: u64) -> EmissionGate {
        EmissionGate {
            tick,
            lifetime: Lifetime::Timed(100),
            max_ticks: 60,
            spawn_interval,
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(LodTier::for_count(2_000, 2_000, 10_000), LodTier::Normal);
        assert_eq!(LodTier::for_count(2_001, 2_000, 10_000), LodTier::Large);
        assert_eq!(LodTier::for_count(10_000, 2_000, 10_000), LodTier::Large);
        assert_eq!(LodTier::for_count(10_001, 2_000, 10_000), LodTier::VeryLarge);
    }

    #[test]
    fn test_persistent_subset_size() {
        assert_eq!(persistent_subset_len(10_001), 10_001usize.div_ceil(150));
        // Far into a rotation, every persistent index is still selected.
        let selected = select(&particles(10_001), LodTier::VeryLarge, &gate(37, 1));
        let persistent = selected.iter().filter(|&&i| i % PERSISTENT_STRIDE == 0).count();
        assert_eq!(persistent, persistent_subset_len(10_001));
    }

    #[test]
    fn test_gate_delay_and_interval() {
        let g = |tick| gate(tick, 3);
        assert!(!g(4).allows(5));
        assert!(g(5).allows(5));
        assert!(!g(6).allows(5));
        assert!(g(8).allows(5));
    }

    #[test]
    fn test_gate_infinite_cycles() {
        let g = EmissionGate {
            tick: 65,
            lifetime: Lifetime::Infinite,
            max_ticks: 60,
            spawn_interval: 1,
        };
        // Cycle tick 5.
        assert!(g.allows(5));
        assert!(!g.allows(6));
    }

    #[test]
    fn test_gate_one_time_stops() {
        let g = |tick| EmissionGate {
            tick,
            lifetime: Lifetime::OneTime,
            max_ticks: 60,
            spawn_interval: 1,
        };
        assert!(g(59).allows(0));
        assert!(!g(60).allows(0));
    }

    #[test]
    fn test_normal_tier_respects_interval() {
        let p = particles(10);
        assert_eq!(select(&p, LodTier::Normal, &gate(0, 3)).len(), 10);
        assert!(select(&p, LodTier::Normal, &gate(1, 3)).is_empty());
        assert_eq!(select(&p, LodTier::Normal, &gate(1, 1)).len(), 10);
    }

    #[test]
    fn test_large_tier_fades_in_with_outline() {
        let p = particles(3_000);
        // Tick 0: 3000/60 = 50 faded in, plus every 30th as outline.
        let first = select(&p, LodTier::Large, &gate(0, 1));
        assert!(first.contains(&49));
        assert!(!first.contains(&51));
        assert!(first.contains(&2_970));

        // Odd ticks emit only the outline.
        let odd = select(&p, LodTier::Large, &gate(1, 1));
        assert!(odd.iter().all(|i| i % 30 == 0));
        assert_eq!(odd.len(), 100);

        // Fully faded in after 60 ticks.
        assert_eq!(select(&p, LodTier::Large, &gate(60, 1)).len(), 3_000);
    }

    #[test]
    fn test_very_large_rotates_sections() {
        let p = particles(6_000);
        let at = |tick| select(&p, LodTier::VeryLarge, &gate(tick, 1));

        let t0 = at(0);
        assert!(t0.contains(&0) && t0.contains(&1_999));
        assert!(!t0.contains(&2_001));

        // Section 1 is current from tick 8.
        let t8 = at(8);
        assert!(t8.contains(&2_001));
        assert!(!t8.contains(&1));

        // Cross-fade: during ticks 4..8 part of section 1 shows.
        let t4 = at(4);
        assert!(t4.iter().any(|&i| (2_000..4_000).contains(&i) && i % PERSISTENT_STRIDE != 0));
        assert!(!at(3).iter().any(|&i| (2_000..4_000).contains(&i) && i % PERSISTENT_STRIDE != 0));
    }

    #[test]
    fn test_motion_budget_scales_with_speed() {
        let config = EngineConfig::default();
        let still = MotionBudget::for_speed(9_000, 0.0, &config);
        assert_eq!(still.cap, config.max_particles_per_tick);
        assert_eq!(still.spawn_interval, 1);

        let fast = MotionBudget::for_speed(900, 1.0, &config);
        assert_eq!(fast.cap, 300);
        assert_eq!(fast.spawn_interval, 2);
    }

    #[test]
    fn test_motion_budget_window_rotates() {
        let budget = MotionBudget {
            cap: 3,
            spawn_interval: 1,
        };
        let indices: Vec<usize> = (0..10).collect();
        assert_eq!(budget.apply(indices.clone(), 0), vec![0, 1, 2]);
        assert_eq!(budget.apply(indices.clone(), 1), vec![3, 4, 5]);
        assert_eq!(budget.apply(indices, 3), vec![9, 0, 1]);
    }
}
