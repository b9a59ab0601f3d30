//! Snapshot schema and JSON codec.
//!
//! The current layout (version 2) nests `coordinates`, `lifespan`,
//! `effects` and `meta` objects per effect. Older snapshots, either
//! unversioned arrays or `version: 1` files, store the same facts as flat
//! fields; [`decode`] detects the layout and migrates legacy entries with
//! [`LegacyEffect::migrate`]. Entries are decoded independently, so a
//! corrupt entry is skipped without losing the rest.

use particle_math::EffectSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::SnapshotError;
use crate::instance::{Anchor, EffectInstance, Lifetime};

/// Version written by [`encode`].
pub const SNAPSHOT_VERSION: u64 = 2;

/// A snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub version: u64,
    /// Unix milliseconds.
    pub saved_at: u64,
    pub effects: Vec<SavedEffect>,
}

impl SnapshotFile {
    /// A current-version snapshot.
    #[must_use]
    pub fn new(saved_at: u64, effects: Vec<SavedEffect>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            effects,
        }
    }
}

/// A position rounded to three decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinates {
    /// Round each component to three decimals.
    #[must_use]
    pub fn rounded(x: f64, y: f64, z: f64) -> Self {
        let r = |v: f64| (v * 1_000.0).round() / 1_000.0;
        Self {
            x: r(x),
            y: r(y),
            z: r(z),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifespanKind {
    Infinite,
    OneTime,
    Timed,
}

/// How long a saved effect runs and how much is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifespan {
    pub duration_seconds: i64,
    #[serde(rename = "type")]
    pub kind: LifespanKind,
    /// Unix milliseconds.
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stops_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

impl Lifespan {
    /// Describe `lifetime` for an effect started at `started_at`, as seen at
    /// `now_ms`.
    #[must_use]
    pub fn new(lifetime: Lifetime, started_at: u64, now_ms: u64) -> Self {
        let (kind, stops_at) = match lifetime {
            Lifetime::Infinite => (LifespanKind::Infinite, None),
            Lifetime::OneTime => (LifespanKind::OneTime, None),
            Lifetime::Timed(secs) => (LifespanKind::Timed, Some(started_at.saturating_add(secs.saturating_mul(1_000)))),
        };
        Self {
            duration_seconds: lifetime.seconds(),
            kind,
            started_at,
            stops_at,
            remaining_seconds: stops_at.map(|stop| stop.saturating_sub(now_ms) / 1_000),
        }
    }

    /// The original lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        match self.kind {
            LifespanKind::Infinite => Lifetime::Infinite,
            LifespanKind::OneTime => Lifetime::OneTime,
            LifespanKind::Timed => Lifetime::Timed(u64::try_from(self.duration_seconds).unwrap_or(0).max(1)),
        }
    }

    /// Unix milliseconds at which a timed effect stops.
    #[must_use]
    pub fn stop_time(&self) -> Option<u64> {
        match self.kind {
            LifespanKind::Timed => Some(self.stops_at.unwrap_or_else(|| {
                let secs = u64::try_from(self.duration_seconds).unwrap_or(0);
                self.started_at.saturating_add(secs.saturating_mul(1_000))
            })),
            LifespanKind::Infinite | LifespanKind::OneTime => None,
        }
    }

    /// The lifetime left at `now_ms`: `None` once a timed effect has run
    /// out, otherwise the original lifetime with timed effects shortened to
    /// their remaining whole seconds (rounded up).
    #[must_use]
    pub fn remaining_lifetime(&self, now_ms: u64) -> Option<Lifetime> {
        match self.stop_time() {
            Some(stop) if stop <= now_ms => None,
            Some(stop) => Some(Lifetime::Timed((stop - now_ms).div_ceil(1_000))),
            None => Some(self.lifetime()),
        }
    }
}

/// Bookkeeping carried with a saved effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMeta {
    pub effect_id: u64,
    pub persistent: bool,
    pub expired: bool,
}

/// One effect as written to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEffect {
    pub model: String,
    pub world: String,
    pub coordinates: Coordinates,
    pub lifespan: Lifespan,
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_started_at: Option<u64>,
    #[serde(default)]
    pub effects: EffectSummary,
    #[serde(default)]
    pub meta: SavedMeta,
}

impl SavedEffect {
    /// Capture a fixed-location effect. Viewer-attached effects are not
    /// saved and yield `None`.
    #[must_use]
    pub fn capture(instance: &EffectInstance, animated: bool, now_ms: u64) -> Option<Self> {
        let Anchor::Fixed(location) = &instance.anchor else {
            return None;
        };
        let p = location.position;
        Some(Self {
            model: instance.model.clone(),
            world: location.world.clone(),
            coordinates: Coordinates::rounded(p.x, p.y, p.z),
            lifespan: Lifespan::new(instance.lifetime, instance.started_at_ms, now_ms),
            animated,
            animation_started_at: animated.then_some(instance.animation_started_at_ms),
            effects: instance.effects.map(|e| e.summary()).unwrap_or_default(),
            meta: SavedMeta {
                effect_id: instance.id.id(),
                persistent: instance.persistent,
                expired: instance.has_expired(now_ms),
            },
        })
    }
}

fn infinite() -> i64 {
    -1
}

/// A flat, pre-version-2 snapshot entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyEffect {
    pub model: String,
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Signed seconds: `-1` infinite, `0` one-time, `n` timed.
    #[serde(default = "infinite")]
    pub lifetime: i64,
    #[serde(default)]
    pub started_at: u64,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub animation_started_at: Option<u64>,
    #[serde(default)]
    pub effect_type: Option<String>,
    #[serde(default)]
    pub effect_speed: f64,
    #[serde(default)]
    pub id: u64,
}

impl LegacyEffect {
    /// Convert to the current layout.
    #[must_use]
    pub fn migrate(self, now_ms: u64) -> SavedEffect {
        let lifetime = Lifetime::from_seconds(self.lifetime);
        let effects = match self.effect_type {
            Some(kind) if !kind.eq_ignore_ascii_case("none") => EffectSummary {
                kind,
                speed: self.effect_speed,
            },
            _ => EffectSummary::none(),
        };
        SavedEffect {
            model: self.model,
            world: self.world,
            coordinates: Coordinates::rounded(self.x, self.y, self.z),
            lifespan: Lifespan::new(lifetime, self.started_at, now_ms),
            animated: self.animated,
            animation_started_at: self.animation_started_at,
            effects,
            meta: SavedMeta {
                effect_id: self.id,
                persistent: lifetime.should_be_persistent(),
                expired: false,
            },
        }
    }
}

/// A decoded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Version found in the file; `1` for unversioned files.
    pub version: u64,
    pub effects: Vec<SavedEffect>,
    /// Entries that could not be decoded.
    pub skipped: usize,
}

/// Encode a snapshot as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`SnapshotError::Json`] if serialisation fails.
pub fn encode(file: &SnapshotFile) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(file)?)
}

/// Decode a snapshot of any supported layout.
///
/// # Errors
///
/// Returns [`SnapshotError::Json`] for malformed JSON,
/// [`SnapshotError::UnsupportedVersion`] for files newer than
/// [`SNAPSHOT_VERSION`] and [`SnapshotError::UnknownLayout`] if no effect
/// list is found.
pub fn decode(text: &str, now_ms: u64) -> Result<Decoded, SnapshotError> {
    let root: Value = serde_json::from_str(text)?;
    let (version, entries) = match root {
        Value::Array(entries) => (1, entries),
        Value::Object(mut fields) => {
            let version = fields.get("version").and_then(Value::as_u64).unwrap_or(1);
            match fields.remove("effects") {
                Some(Value::Array(entries)) => (version, entries),
                _ => return Err(SnapshotError::UnknownLayout),
            }
        }
        _ => return Err(SnapshotError::UnknownLayout),
    };
    if version > SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let mut decoded = Decoded {
        version,
        effects: Vec::with_capacity(entries.len()),
        skipped: 0,
    };
    for (index, entry) in entries.into_iter().enumerate() {
        match decode_entry(entry, now_ms) {
            Ok(effect) => decoded.effects.push(effect),
            Err(e) => {
                warn!(index, error = %e, "skipping unreadable snapshot entry");
                decoded.skipped += 1;
            }
        }
    }
    Ok(decoded)
}

fn decode_entry(entry: Value, now_ms: u64) -> Result<SavedEffect, serde_json::Error> {
    if entry.get("coordinates").is_some() {
        serde_json::from_value(entry)
    } else {
        serde_json::from_value::<LegacyEffect>(entry).map(|legacy| legacy.migrate(now_ms))
    }
}
