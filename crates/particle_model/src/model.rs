//! Static models and the [`Model`] tagged union.

use std::path::PathBuf;

use crate::animated::AnimatedModel;
use crate::template::ParticleTemplate;

/// Extra ticks past the largest particle delay a one-shot effect keeps
/// running, so late particles still get a full showing.
pub const DELAY_TAIL_TICKS: u64 = 60;

/// Descriptive, non-functional information about a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelMetadata {
    pub author: Option<String>,
    pub description: Option<String>,
    /// Creation time, unix milliseconds.
    pub created_at_ms: Option<u64>,
    pub tags: Vec<String>,
}

/// Where an animated model's frames were ingested from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Built in code.
    Generated,
    /// Converted from a local file.
    File(PathBuf),
    /// Downloaded and converted.
    Url(String),
}

/// A model with a single fixed particle list.
#[derive(Debug, Clone)]
pub struct StaticModel {
    name: String,
    particles: Vec<ParticleTemplate>,
    metadata: ModelMetadata,
    duration_ticks: u64,
}

impl StaticModel {
    /// Create a static model. `duration_ticks` sizes one-shot playback.
    #[must_use]
    pub fn new(name: impl Into<String>, particles: Vec<ParticleTemplate>, duration_ticks: u64) -> Self {
        Self {
            name: name.into(),
            particles,
            metadata: ModelMetadata::default(),
            duration_ticks,
        }
    }

    /// Attach descriptive metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fixed template list.
    #[must_use]
    pub fn particles(&self) -> &[ParticleTemplate] {
        &self.particles
    }

    /// Descriptive metadata.
    #[must_use]
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Nominal one-shot duration in ticks.
    #[must_use]
    pub fn duration_ticks(&self) -> u64 {
        self.duration_ticks
    }
}

/// A playable model, either static or animated.
#[derive(Debug, Clone)]
pub enum Model {
    Static(StaticModel),
    Animated(AnimatedModel),
}

impl Model {
    /// The model name as registered.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Static(m) => m.name(),
            Self::Animated(m) => m.name(),
        }
    }

    /// Descriptive metadata.
    #[must_use]
    pub fn metadata(&self) -> &ModelMetadata {
        match self {
            Self::Static(m) => m.metadata(),
            Self::Animated(m) => m.metadata(),
        }
    }

    /// Returns `true` for animated models.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(_))
    }

    /// Re-time an animated model for `tick_ms` ticks. Static models are
    /// returned unchanged.
    #[must_use]
    pub fn with_tick_ms(self, tick_ms: u64) -> Self {
        match self {
            Self::Animated(m) => Self::Animated(m.with_tick_ms(tick_ms)),
            Self::Static(m) => Self::Static(m),
        }
    }

    /// The base particle list: the fixed list, or an animation's first frame.
    #[must_use]
    pub fn particles(&self) -> &[ParticleTemplate] {
        match self {
            Self::Static(m) => m.particles(),
            Self::Animated(m) => m.frames().first().map(|f| f.particles.as_slice()).unwrap_or_default(),
        }
    }

    /// Particles emitted per tick at most: the list length, or the largest
    /// frame.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        match self {
            Self::Static(m) => m.particles().len(),
            Self::Animated(m) => m.max_frame_particles(),
        }
    }

    /// Particles held in memory across all frames.
    #[must_use]
    pub fn stored_particles(&self) -> usize {
        match self {
            Self::Static(m) => m.particles().len(),
            Self::Animated(m) => m.total_particles(),
        }
    }

    /// Nominal duration in ticks.
    #[must_use]
    pub fn duration_ticks(&self) -> u64 {
        match self {
            Self::Static(m) => m.duration_ticks(),
            Self::Animated(m) => m.duration_ticks(),
        }
    }

    /// The largest emission delay of any particle.
    #[must_use]
    pub fn max_delay(&self) -> u64 {
        let delays = |particles: &[ParticleTemplate]| particles.iter().map(|p| u64::from(p.delay)).max();
        match self {
            Self::Static(m) => delays(m.particles()).unwrap_or(0),
            Self::Animated(m) => m
                .frames()
                .iter()
                .filter_map(|f| delays(&f.particles))
                .max()
                .unwrap_or(0),
        }
    }

    /// Ticks a one-shot playback runs for:
    /// `max(duration, max_delay + 60)`. Also the cycle length of infinite
    /// static playback.
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        self.duration_ticks().max(self.max_delay() + DELAY_TAIL_TICKS)
    }
}

impl From<StaticModel> for Model {
    fn from(model: StaticModel) -> Self {
        Self::Static(model)
    }
}

impl From<AnimatedModel> for Model {
    fn from(model: AnimatedModel) -> Self {
        Self::Animated(model)
    }
}
