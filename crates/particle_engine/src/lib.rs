//! # particle_engine
//!
//! Effect scheduling and rendering for particle models.
//!
//! A caller starts an effect for a named model at a fixed location or on a
//! connected viewer. The engine allocates an [`EffectId`], registers the
//! instance with a driver, and every host tick the driver picks the
//! particles to emit (animation frame or level-of-detail subset), displaces
//! them with the effect's procedural motion, and hands each point to the
//! observers in range that may see it. Long-running effects are written to
//! JSON snapshots and resumed after a restart.
//!
//! This crate provides:
//!
//! - [`engine`]: the [`ParticleEngine`] service handle.
//! - [`registry`]: the concurrent effect registry.
//! - [`scheduler`]: per-effect drivers and the per-tick state machine.
//! - [`lod`]: level-of-detail tiers and viewer motion budgets.
//! - [`cache`]: advisory change detection for rendered points.
//! - [`snapshot`] and [`persistence`]: snapshot schema, save and recovery.
//! - [`host`]: the [`Host`] boundary and the in-memory [`MemoryHost`].
//! - [`tick`]: the async [`TickLoop`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use glam::DVec3;
//! use particle_engine::{EngineConfig, Lifetime, Location, MemoryHost, ParticleEngine, TickLoop};
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = Arc::new(MemoryHost::new());
//!     host.add_world("overworld");
//!     let engine = ParticleEngine::new(EngineConfig::default(), host);
//!     // engine.register_model(...);
//!     let _ = engine.play("heart", Location::new("overworld", DVec3::ZERO), Lifetime::Infinite, None);
//!     TickLoop::new(engine).run(std::future::pending()).await.unwrap();
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod ids;
pub mod instance;
pub mod lod;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod stats;
pub mod tick;

pub use cache::ChangeCache;
pub use config::EngineConfig;
pub use engine::{ParticleEngine, ReloadSummary, TickSummary};
pub use error::{ConfigError, EngineError, RestoreError, SnapshotError};
pub use host::{DustEmission, EmitError, Host, MemoryHost, Observer, ViewRights, ViewerId};
pub use ids::EffectId;
pub use instance::{Anchor, EffectInstance, Lifetime, Location, ViewerAnchor, should_be_persistent};
pub use persistence::RestoreReport;
pub use scheduler::{DriverStatus, TerminationReason};
pub use stats::UsageReport;
pub use tick::TickLoop;
