//! # particle_math
//!
//! Procedural transform math for particle effects. Re-exports [`glam`] for
//! vector types and defines the effect parameter sets that displace particle
//! offsets over time.
//!
//! This crate provides:
//!
//! - [`ParticleEffects`]: the composable set of motion components.
//! - [`EffectKind`]: named presets (`rotate-xz`, `orbit`, `wave`, ...).
//! - [`EffectSummary`]: the single-effect digest written to snapshots.
//! - [`transform`]: the pure offset displacement function.

pub mod effects;
pub mod transform;

// Re-export glam types for convenience.
pub use glam::{DVec3, Vec3};

pub use effects::{EffectKind, EffectSummary, Motion, ParticleEffects, PresetError, Rotation, RotationAxes};
pub use transform::transform;
