//! The boundary between the engine and the simulation hosting it.
//!
//! The engine never enumerates worlds or viewers itself. It asks a [`Host`]
//! which worlds exist, where viewers are, who may see a model, and hands it
//! [`DustEmission`]s to deliver. Viewer-attached effects hold only a
//! [`ViewerId`] and ask the host for the viewer's location every tick, so a
//! disconnected viewer is noticed on the next tick.
//!
//! [`MemoryHost`] is a complete in-process host used by the demo binary and
//! by tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use glam::DVec3;
use particle_model::Color;
use uuid::Uuid;

use crate::instance::Location;

/// Identifies a connected viewer (observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub Uuid);

impl ViewerId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an observer is entitled to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewRights {
    /// May see every model.
    pub view_all: bool,
    /// Lower-cased names of models this observer may see.
    pub models: HashSet<String>,
    /// Sees effects started with the force-visible flag.
    pub force_exempt: bool,
}

impl ViewRights {
    /// Rights to see everything.
    #[must_use]
    pub fn all() -> Self {
        Self {
            view_all: true,
            ..Self::default()
        }
    }

    /// Rights to see a single model.
    #[must_use]
    pub fn model(name: &str) -> Self {
        Self {
            models: HashSet::from([name.to_lowercase()]),
            ..Self::default()
        }
    }

    /// Returns `true` if these rights allow seeing `model`.
    #[must_use]
    pub fn permits(&self, model: &str, force_visible: bool) -> bool {
        self.view_all || self.models.contains(&model.to_lowercase()) || (force_visible && self.force_exempt)
    }
}

/// A viewer able to receive effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
    pub id: ViewerId,
    pub position: DVec3,
    pub rights: ViewRights,
}

/// One dust-style visual effect instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DustEmission {
    /// World position of the point.
    pub position: DVec3,
    pub color: Color,
    /// Point size, already clamped by the template.
    pub size: f32,
    /// Particles spawned at the point.
    pub count: u32,
    /// Random spread the host applies around `position`.
    pub jitter: DVec3,
}

/// Failure delivering an emission to one observer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmitError {
    /// The observer disconnected between enumeration and delivery.
    #[error("observer {0} is offline")]
    Offline(ViewerId),

    /// The host rejected the emission.
    #[error("emit failed: {0}")]
    Rejected(String),
}

/// The services the engine consumes from its host simulation.
pub trait Host: Send + Sync {
    /// Returns `true` if `world` is loaded.
    fn world_exists(&self, world: &str) -> bool;

    /// Current location of a viewer, or `None` once it has disconnected.
    fn viewer_location(&self, viewer: ViewerId) -> Option<Location>;

    /// Every observer currently in `world`.
    fn observers(&self, world: &str) -> Vec<Observer>;

    /// Whether `observer` may see `model`.
    fn can_view(&self, observer: &Observer, model: &str, force_visible: bool) -> bool {
        observer.rights.permits(model, force_visible)
    }

    /// Deliver one emission to one observer.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] if delivery fails. The engine logs the error and
    /// carries on with the next particle.
    fn emit(&self, observer: &Observer, emission: &DustEmission) -> Result<(), EmitError>;
}

#[derive(Debug, Clone)]
struct ViewerEntry {
    world: String,
    observer: Observer,
}

/// An in-memory [`Host`]: a set of worlds and connected viewers.
///
/// Every emission is counted. With recording enabled, emissions are also
/// kept for inspection via [`MemoryHost::take_emissions`].
#[derive(Debug, Default)]
pub struct MemoryHost {
    worlds: DashSet<String>,
    viewers: DashMap<ViewerId, ViewerEntry>,
    recording: bool,
    emissions: Mutex<Vec<(ViewerId, DustEmission)>>,
    emitted: AtomicU64,
}

impl MemoryHost {
    /// Create a host with no worlds and no viewers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every emission for later inspection.
    #[must_use]
    pub fn with_recording(mut self) -> Self {
        self.recording = true;
        self
    }

    /// Load a world.
    pub fn add_world(&self, world: impl Into<String>) {
        self.worlds.insert(world.into());
    }

    /// Unload a world.
    pub fn remove_world(&self, world: &str) {
        self.worlds.remove(world);
    }

    /// Connect a viewer at `position` in `world`.
    pub fn connect(&self, world: impl Into<String>, position: DVec3, rights: ViewRights) -> ViewerId {
        let id = ViewerId::new();
        let observer = Observer { id, position, rights };
        self.viewers.insert(
            id,
            ViewerEntry {
                world: world.into(),
                observer,
            },
        );
        id
    }

    /// Disconnect a viewer. Returns `false` if it was not connected.
    pub fn disconnect(&self, viewer: ViewerId) -> bool {
        self.viewers.remove(&viewer).is_some()
    }

    /// Move a viewer within its world.
    pub fn move_viewer(&self, viewer: ViewerId, position: DVec3) -> bool {
        match self.viewers.get_mut(&viewer) {
            Some(mut entry) => {
                entry.observer.position = position;
                true
            }
            None => false,
        }
    }

    /// Total emissions delivered.
    #[must_use]
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Drain the recorded emissions.
    pub fn take_emissions(&self) -> Vec<(ViewerId, DustEmission)> {
        let mut emissions = self.emissions.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *emissions)
    }
}

impl Host for MemoryHost {
    fn world_exists(&self, world: &str) -> bool {
        self.worlds.contains(world)
    }

    fn viewer_location(&self, viewer: ViewerId) -> Option<Location> {
        self.viewers.get(&viewer).map(|entry| Location::new(entry.world.clone(), entry.observer.position))
    }

    fn observers(&self, world: &str) -> Vec<Observer> {
        self.viewers
            .iter()
            .filter(|entry| entry.world == world)
            .map(|entry| entry.observer.clone())
            .collect()
    }

    fn emit(&self, observer: &Observer, emission: &DustEmission) -> Result<(), EmitError> {
        if !self.viewers.contains_key(&observer.id) {
            return Err(EmitError::Offline(observer.id));
        }
        self.emitted.fetch_add(1, Ordering::Relaxed);
        if self.recording {
            let mut emissions = self.emissions.lock().unwrap_or_else(PoisonError::into_inner);
            emissions.push((observer.id, *emission));
        }
        Ok(())
    }
}
