//! # particle_model
//!
//! The data a particle effect plays back. Models are built by external
//! loaders (model files, media ingestion) and handed to the engine fully
//! formed; nothing here mutates a model after construction.
//!
//! This crate provides:
//!
//! - [`ParticleTemplate`] and [`Color`]: one particle's immutable definition.
//! - [`StaticModel`]: a fixed list of templates.
//! - [`AnimatedModel`] and [`Frame`]: timed, self-contained snapshots with
//!   tick-aligned or wall-clock frame selection.
//! - [`Model`]: the tagged union the scheduler matches on.
//! - [`ModelTable`]: the concurrent, case-insensitive model registry.

pub mod animated;
pub mod model;
pub mod table;
pub mod template;

pub use animated::{AnimatedModel, Frame, is_tick_aligned};
pub use model::{Model, ModelMetadata, ModelSource, StaticModel};
pub use table::ModelTable;
pub use template::{Color, ParticleTemplate};

/// Length of one host simulation tick, in milliseconds.
pub const TICK_MS: u64 = 50;
