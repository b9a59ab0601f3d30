//! Effect parameter sets and named presets.
//!
//! A [`ParticleEffects`] value holds up to nine motion components. A
//! component is enabled iff its magnitude (amplitude, height or radius) is
//! non-zero; rotation is enabled iff its speed is non-zero.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default rotation speed in radians per tick, before the speed multiplier.
pub const ROTATION_SPEED: f64 = 0.05;
/// Default oscillation (breathing) amplitude.
pub const OSCILLATION_AMPLITUDE: f64 = 0.3;
/// Default pulse amplitude.
pub const PULSE_AMPLITUDE: f64 = 0.2;
/// Default bounce height in blocks.
pub const BOUNCE_HEIGHT: f64 = 1.5;
/// Default flow amplitude.
pub const FLOW_AMPLITUDE: f64 = 0.5;
/// Default swirl fallback radius.
pub const SWIRL_RADIUS: f64 = 1.0;
/// Default wave amplitude.
pub const WAVE_AMPLITUDE: f64 = 0.5;
/// Default orbit radius.
pub const ORBIT_RADIUS: f64 = 2.0;
/// Default spiral expansion.
pub const SPIRAL_EXPANSION: f64 = 0.5;

/// Errors produced when resolving a preset token.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PresetError {
    /// The token does not name any known effect.
    #[error("unknown effect: {0}")]
    Unknown(String),

    /// A `rotate-<axes>` token contained something other than `x`, `y`, `z`.
    #[error("invalid rotation axes: {0}")]
    InvalidAxes(String),
}

/// Axes a rotation is applied around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RotationAxes {
    /// Rotate in the Y/Z plane.
    pub x: bool,
    /// Rotate in the X/Z plane.
    pub y: bool,
    /// Rotate in the X/Y plane.
    pub z: bool,
}

impl RotationAxes {
    /// Rotation around the vertical axis only.
    pub const Y: Self = Self {
        x: false,
        y: true,
        z: false,
    };

    /// Returns these axes, or [`RotationAxes::Y`] when none is selected.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.x || self.y || self.z { self } else { Self::Y }
    }

    /// Parse an axis list such as `"xz"`.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError::InvalidAxes`] for any character outside `xyz`.
    pub fn parse(axes: &str) -> Result<Self, PresetError> {
        let mut parsed = Self::default();
        for c in axes.chars() {
            match c.to_ascii_lowercase() {
                'x' => parsed.x = true,
                'y' => parsed.y = true,
                'z' => parsed.z = true,
                '-' | '_' => {}
                _ => return Err(PresetError::InvalidAxes(axes.to_string())),
            }
        }
        Ok(parsed.normalized())
    }

    fn suffix(self) -> String {
        let mut out = String::with_capacity(3);
        if self.x {
            out.push('x');
        }
        if self.y {
            out.push('y');
        }
        if self.z {
            out.push('z');
        }
        out
    }
}

/// Rotation component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    /// Radians per tick.
    pub speed: f64,
    /// Axes rotated around, applied X then Y then Z.
    pub axes: RotationAxes,
}

impl Rotation {
    /// Returns `true` if the rotation has a non-zero speed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.speed != 0.0
    }
}

/// A periodic motion component: a magnitude and a speed.
///
/// The magnitude is an amplitude, height, radius or expansion depending on
/// which slot of [`ParticleEffects`] the motion occupies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    /// Amplitude, height, radius or expansion.
    pub magnitude: f64,
    /// Angular speed per tick.
    pub speed: f64,
}

impl Motion {
    /// Create a motion component.
    #[must_use]
    pub const fn new(magnitude: f64, speed: f64) -> Self {
        Self { magnitude, speed }
    }

    /// Returns `true` if the magnitude is non-zero.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.magnitude != 0.0
    }
}

/// The full set of procedural motion parameters attached to an effect.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleEffects {
    /// Rotation around the selected axes.
    pub rotation: Rotation,
    /// Uniform breathing scale, amplitude as magnitude.
    pub oscillation: Motion,
    /// Uniform scale at twice the oscillation frequency.
    pub pulse: Motion,
    /// Vertical hop, height as magnitude.
    pub bounce: Motion,
    /// Horizontal sway along X.
    pub flow: Motion,
    /// Distance-dependent twist, fallback radius as magnitude.
    pub swirl: Motion,
    /// Radial vertical ripple.
    pub wave: Motion,
    /// Circular offset of the whole model, radius as magnitude.
    pub orbit: Motion,
    /// Outward rotation, expansion as magnitude.
    pub spiral: Motion,
}

impl ParticleEffects {
    /// Build the parameter set for a preset token scaled by `speed`.
    ///
    /// Accepted tokens: `rotate`, `rotate-<axes>`, `oscillate`, `breathe`,
    /// `pulse`, `bounce`, `flow`, `swirl`, `wave`, `orbit`, `spiral`.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError`] if the token is not recognised. An unknown
    /// token never falls back to a default effect.
    pub fn preset(token: &str, speed: f64) -> Result<Self, PresetError> {
        let kind: EffectKind = token.parse()?;
        Ok(Self::from_kind(kind, speed))
    }

    /// Build the default parameter set for `kind` with a speed multiplier.
    #[must_use]
    pub fn from_kind(kind: EffectKind, speed: f64) -> Self {
        let mut effects = Self::default();
        match kind {
            EffectKind::Rotate(axes) => {
                effects.rotation = Rotation {
                    speed: ROTATION_SPEED * speed,
                    axes: axes.normalized(),
                };
            }
            EffectKind::Oscillate => effects.oscillation = Motion::new(OSCILLATION_AMPLITUDE, 0.1 * speed),
            EffectKind::Pulse => effects.pulse = Motion::new(PULSE_AMPLITUDE, 0.15 * speed),
            EffectKind::Bounce => effects.bounce = Motion::new(BOUNCE_HEIGHT, 0.1 * speed),
            EffectKind::Flow => effects.flow = Motion::new(FLOW_AMPLITUDE, 0.1 * speed),
            EffectKind::Swirl => effects.swirl = Motion::new(SWIRL_RADIUS, 0.02 * speed),
            EffectKind::Wave => effects.wave = Motion::new(WAVE_AMPLITUDE, 0.2 * speed),
            EffectKind::Orbit => effects.orbit = Motion::new(ORBIT_RADIUS, 0.05 * speed),
            EffectKind::Spiral => effects.spiral = Motion::new(SPIRAL_EXPANSION, 0.05 * speed),
        }
        effects
    }

    /// Returns `true` if no component is enabled.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.dominant().is_none()
    }

    /// Returns `true` if rotation, orbit or spiral is enabled.
    ///
    /// Fixed-location effects with circular motion render at half rate.
    #[must_use]
    pub fn is_circular(&self) -> bool {
        self.rotation.is_enabled() || self.orbit.is_enabled() || self.spiral.is_enabled()
    }

    /// The first enabled component in transform order, with its speed.
    #[must_use]
    pub fn dominant(&self) -> Option<(EffectKind, f64)> {
        if self.rotation.is_enabled() {
            return Some((EffectKind::Rotate(self.rotation.axes.normalized()), self.rotation.speed));
        }
        [
            (EffectKind::Oscillate, self.oscillation),
            (EffectKind::Pulse, self.pulse),
            (EffectKind::Bounce, self.bounce),
            (EffectKind::Flow, self.flow),
            (EffectKind::Swirl, self.swirl),
            (EffectKind::Wave, self.wave),
            (EffectKind::Orbit, self.orbit),
            (EffectKind::Spiral, self.spiral),
        ]
        .into_iter()
        .find(|(_, motion)| motion.is_enabled())
        .map(|(kind, motion)| (kind, motion.speed))
    }

    /// Summarise this set as its dominant component.
    #[must_use]
    pub fn summary(&self) -> EffectSummary {
        match self.dominant() {
            Some((kind, speed)) => EffectSummary {
                kind: kind.to_string(),
                speed,
            },
            None => EffectSummary::none(),
        }
    }

    /// Rebuild a parameter set from a snapshot summary.
    ///
    /// Magnitudes take their preset defaults; the component speed is the
    /// recorded one. Returns `Ok(None)` for a `none` summary.
    ///
    /// # Errors
    ///
    /// Returns [`PresetError`] if the summary names an unknown effect.
    pub fn from_summary(summary: &EffectSummary) -> Result<Option<Self>, PresetError> {
        if summary.is_none() {
            return Ok(None);
        }
        let kind: EffectKind = summary.kind.parse()?;
        let mut effects = Self::from_kind(kind, 1.0);
        match kind {
            EffectKind::Rotate(_) => effects.rotation.speed = summary.speed,
            EffectKind::Oscillate => effects.oscillation.speed = summary.speed,
            EffectKind::Pulse => effects.pulse.speed = summary.speed,
            EffectKind::Bounce => effects.bounce.speed = summary.speed,
            EffectKind::Flow => effects.flow.speed = summary.speed,
            EffectKind::Swirl => effects.swirl.speed = summary.speed,
            EffectKind::Wave => effects.wave.speed = summary.speed,
            EffectKind::Orbit => effects.orbit.speed = summary.speed,
            EffectKind::Spiral => effects.spiral.speed = summary.speed,
        }
        Ok(Some(effects))
    }
}

/// A named effect preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// `rotate` or `rotate-<axes>`.
    Rotate(RotationAxes),
    /// `oscillate`, alias `breathe`.
    Oscillate,
    Pulse,
    Bounce,
    Flow,
    Swirl,
    Wave,
    Orbit,
    Spiral,
}

impl FromStr for EffectKind {
    type Err = PresetError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim().to_ascii_lowercase();
        if let Some(rest) = token.strip_prefix("rotate") {
            return RotationAxes::parse(rest).map(EffectKind::Rotate);
        }
        match token.as_str() {
            "oscillate" | "breathe" => Ok(Self::Oscillate),
            "pulse" => Ok(Self::Pulse),
            "bounce" => Ok(Self::Bounce),
            "flow" => Ok(Self::Flow),
            "swirl" => Ok(Self::Swirl),
            "wave" => Ok(Self::Wave),
            "orbit" => Ok(Self::Orbit),
            "spiral" => Ok(Self::Spiral),
            _ => Err(PresetError::Unknown(token)),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotate(axes) => write!(f, "rotate-{}", axes.normalized().suffix()),
            Self::Oscillate => f.write_str("oscillate"),
            Self::Pulse => f.write_str("pulse"),
            Self::Bounce => f.write_str("bounce"),
            Self::Flow => f.write_str("flow"),
            Self::Swirl => f.write_str("swirl"),
            Self::Wave => f.write_str("wave"),
            Self::Orbit => f.write_str("orbit"),
            Self::Spiral => f.write_str("spiral"),
        }
    }
}

/// Single-effect digest of a [`ParticleEffects`] set, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSummary {
    /// Effect token (`rotate-y`, `orbit`, ...) or `none`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Component speed, `0.0` for `none`.
    #[serde(default)]
    pub speed: f64,
}

impl EffectSummary {
    /// The summary of an effect without procedural motion.
    #[must_use]
    pub fn none() -> Self {
        Self {
            kind: "none".to_string(),
            speed: 0.0,
        }
    }

    /// Returns `true` if this summary carries no effect.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.kind.is_empty() || self.kind.eq_ignore_ascii_case("none")
    }
}

impl Default for EffectSummary {
    fn default() -> Self {
        Self::none()
    }
}
