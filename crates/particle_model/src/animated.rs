//! Animated models and frame selection.
//!
//! An [`AnimatedModel`] is an ordered list of [`Frame`]s, each a complete
//! particle snapshot shown for its own delay. Frames are never blended.
//!
//! Selection has two modes, fixed at construction:
//!
//! - **Tick-aligned** (every delay is a positive multiple of the tick
//!   period): frames last `delay / tick_ms` ticks and are picked by integer
//!   tick.
//!
//! Models are timed against [`TICK_MS`] unless re-timed with
//! [`AnimatedModel::with_tick_ms`].
//! - **Wall-clock**: frames are picked by elapsed milliseconds.
//!
//! Looping models wrap modulo the total duration; others clamp to the last
//! frame.

use crate::TICK_MS;
use crate::model::{ModelMetadata, ModelSource};
use crate::template::ParticleTemplate;

/// One self-contained snapshot of an animated model.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of this frame in its model.
    pub index: usize,
    /// How long the frame is shown, in milliseconds.
    pub delay_ms: u64,
    /// Every particle visible while this frame is active.
    pub particles: Vec<ParticleTemplate>,
}

impl Frame {
    /// Create a frame.
    #[must_use]
    pub fn new(index: usize, delay_ms: u64, particles: Vec<ParticleTemplate>) -> Self {
        Self {
            index,
            delay_ms,
            particles,
        }
    }

    /// Frame duration in whole ticks of `tick_ms`, at least one.
    #[must_use]
    pub fn ticks(&self, tick_ms: u64) -> u64 {
        (self.delay_ms / tick_ms.max(1)).max(1)
    }
}

/// Returns `true` iff every delay is at least one tick and an exact multiple
/// of the `tick_ms` period.
///
/// At 50 ms ticks a delay of 37 ms, or 75 ms, makes the whole model
/// wall-clock driven.
#[must_use]
pub fn is_tick_aligned<I>(delays_ms: I, tick_ms: u64) -> bool
where
    I: IntoIterator<Item = u64>,
{
    let tick_ms = tick_ms.max(1);
    delays_ms
        .into_iter()
        .all(|delay| delay >= tick_ms && delay % tick_ms == 0)
}

/// A particle model whose content changes over time.
#[derive(Debug, Clone)]
pub struct AnimatedModel {
    name: String,
    frames: Vec<Frame>,
    looping: bool,
    tick_aligned: bool,
    /// Tick period the tick durations were computed for.
    tick_ms: u64,
    source: ModelSource,
    metadata: ModelMetadata,
    /// Cumulative end tick of each frame.
    frame_end_ticks: Vec<u64>,
    /// Cumulative end millisecond of each frame.
    frame_end_ms: Vec<u64>,
}

impl AnimatedModel {
    /// Build an animated model timed for [`TICK_MS`] ticks. Tick alignment
    /// and durations are computed here once.
    #[must_use]
    pub fn new(name: impl Into<String>, frames: Vec<Frame>, looping: bool, source: ModelSource) -> Self {
        let frame_end_ms = frames
            .iter()
            .scan(0u64, |ms, frame| {
                *ms += frame.delay_ms.max(1);
                Some(*ms)
            })
            .collect();

        let mut model = Self {
            name: name.into(),
            frames,
            looping,
            tick_aligned: false,
            tick_ms: TICK_MS,
            source,
            metadata: ModelMetadata::default(),
            frame_end_ticks: Vec::new(),
            frame_end_ms,
        };
        model.retime(TICK_MS);
        model
    }

    /// Attach descriptive metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Re-time the model for a host ticking every `tick_ms` milliseconds.
    #[must_use]
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        if tick_ms.max(1) != self.tick_ms {
            self.retime(tick_ms.max(1));
        }
        self
    }

    fn retime(&mut self, tick_ms: u64) {
        self.tick_ms = tick_ms;
        self.tick_aligned = is_tick_aligned(self.frames.iter().map(|f| f.delay_ms), tick_ms);
        self.frame_end_ticks = self
            .frames
            .iter()
            .scan(0u64, |ticks, frame| {
                *ticks += frame.ticks(tick_ms);
                Some(*ticks)
            })
            .collect();
    }

    /// Tick period the model is timed for, in milliseconds.
    #[must_use]
    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// The model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All frames in playback order.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Whether playback wraps after the last frame.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether frames are selected by tick rather than by elapsed time.
    #[must_use]
    pub fn is_tick_aligned(&self) -> bool {
        self.tick_aligned
    }

    /// Where the frames came from.
    #[must_use]
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    /// Total duration in ticks, summing per-frame tick durations.
    #[must_use]
    pub fn total_duration_ticks(&self) -> u64 {
        self.frame_end_ticks.last().copied().unwrap_or(0)
    }

    /// Total duration in milliseconds.
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.frame_end_ms.last().copied().unwrap_or(0)
    }

    /// Duration in ticks under the active selection mode.
    #[must_use]
    pub fn duration_ticks(&self) -> u64 {
        if self.tick_aligned {
            self.total_duration_ticks()
        } else {
            self.total_duration_ms().div_ceil(self.tick_ms)
        }
    }

    /// Descriptive metadata.
    #[must_use]
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Particle count of each frame.
    #[must_use]
    pub fn particle_counts(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.particles.len()).collect()
    }

    /// Particle count summed over all frames.
    #[must_use]
    pub fn total_particles(&self) -> usize {
        self.frames.iter().map(|f| f.particles.len()).sum()
    }

    /// The largest single-frame particle count.
    #[must_use]
    pub fn max_frame_particles(&self) -> usize {
        self.frames.iter().map(|f| f.particles.len()).max().unwrap_or(0)
    }

    /// Index of the frame active at `tick`, by tick accumulation.
    #[must_use]
    pub fn frame_index_at_tick(&self, tick: u64) -> Option<usize> {
        Self::select(&self.frame_end_ticks, tick, self.looping)
    }

    /// The frame active at `tick`, by tick accumulation.
    #[must_use]
    pub fn frame_at_tick(&self, tick: u64) -> Option<&Frame> {
        self.frame_index_at_tick(tick).map(|i| &self.frames[i])
    }

    /// Index of the frame active `elapsed_ms` after playback started.
    #[must_use]
    pub fn frame_index_at_time(&self, elapsed_ms: u64) -> Option<usize> {
        Self::select(&self.frame_end_ms, elapsed_ms, self.looping)
    }

    /// The frame active `elapsed_ms` after playback started.
    #[must_use]
    pub fn frame_at_time(&self, elapsed_ms: u64) -> Option<&Frame> {
        self.frame_index_at_time(elapsed_ms).map(|i| &self.frames[i])
    }

    /// Index of the active frame under this model's selection mode.
    #[must_use]
    pub fn frame_index(&self, tick: u64, elapsed_ms: u64) -> Option<usize> {
        if self.tick_aligned {
            self.frame_index_at_tick(tick)
        } else {
            self.frame_index_at_time(elapsed_ms)
        }
    }

    fn select(ends: &[u64], at: u64, looping: bool) -> Option<usize> {
        match ends.len() {
            0 => None,
            1 => Some(0),
            len => {
                let total = ends[len - 1];
                let t = if looping {
                    at % total
                } else if at >= total {
                    return Some(len - 1);
                } else {
                    at
                };
                Some(ends.partition_point(|&end| end <= t))
            }
        }
    }
}
