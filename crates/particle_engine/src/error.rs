//! Engine error types.

use crate::host::ViewerId;
use crate::ids::EffectId;

/// Errors returned by engine requests.
///
/// None of these are fatal: a failed request leaves every running effect
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No model is registered under this name.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The model exists but has no particles to emit.
    #[error("model has no particles: {0}")]
    EmptyModel(String),

    /// The host does not know the anchor's world.
    #[error("world not found: {0}")]
    WorldNotFound(String),

    /// The viewer to attach to is not connected.
    #[error("viewer is offline: {0}")]
    ViewerOffline(ViewerId),

    /// No running effect has this id.
    #[error("effect not found: {0}")]
    EffectNotFound(EffectId),

    /// Snapshot I/O failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors reading or writing effect snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Reading or writing the snapshot file failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot is not valid JSON, or could not be encoded.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot was written by a newer schema.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u64),

    /// The snapshot has neither a current nor a legacy layout.
    #[error("unrecognised snapshot layout")]
    UnknownLayout,
}

/// Errors loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema.
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a saved effect was not restored.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    /// The saved model is no longer registered.
    #[error("model no longer exists: {0}")]
    ModelMissing(String),

    /// The saved world is not loaded.
    #[error("world not found: {0}")]
    WorldMissing(String),

    /// A timed effect ran out while the engine was down.
    #[error("lifespan elapsed")]
    Elapsed,

    /// The saved effect summary names an unknown effect.
    #[error("invalid effect summary: {0}")]
    Effects(#[from] particle_math::PresetError),

    /// Starting the effect failed.
    #[error(transparent)]
    Start(#[from] EngineError),
}
