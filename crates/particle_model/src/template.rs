//! Particle templates and colours.

use glam::DVec3;

/// Smallest point size a template may carry.
pub const MIN_SIZE: f32 = 0.1;
/// Largest point size a template may carry.
pub const MAX_SIZE: f32 = 5.0;

/// An RGB colour with channels normalised to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Opaque white, used when a template carries no colour.
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Create a colour, clamping each channel to `0.0..=1.0`.
    #[must_use]
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Create a colour from 8-bit channels.
    #[must_use]
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0)
    }

    /// Normalised Euclidean distance: `sqrt(Δr²+Δg²+Δb²) / sqrt(3)`.
    ///
    /// `0.0` for identical colours, `1.0` between black and white.
    #[must_use]
    pub fn distance(&self, other: &Color) -> f32 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        (dr * dr + dg * dg + db * db).sqrt() / 3f32.sqrt()
    }
}

/// The immutable definition of one particle in a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleTemplate {
    /// Offset from the effect anchor.
    pub offset: DVec3,
    /// Dust colour; `None` renders as [`Color::WHITE`].
    pub color: Option<Color>,
    /// Ticks after the cycle start before this particle first appears.
    pub delay: u32,
    size: f32,
}

impl ParticleTemplate {
    /// Create a template. `size` is clamped to `0.1..=5.0`.
    #[must_use]
    pub fn new(offset: DVec3, color: Option<Color>, delay: u32, size: f32) -> Self {
        Self {
            offset,
            color,
            delay,
            size: size.clamp(MIN_SIZE, MAX_SIZE),
        }
    }

    /// A coloured, undelayed template of size `1.0`.
    #[must_use]
    pub fn at(offset: DVec3, color: Color) -> Self {
        Self::new(offset, Some(color), 0, 1.0)
    }

    /// The clamped point size.
    #[must_use]
    pub fn size(&self) -> f32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_is_clamped() {
        assert_eq!(ParticleTemplate::new(DVec3::ZERO, None, 0, 0.0).size(), MIN_SIZE);
        assert_eq!(ParticleTemplate::new(DVec3::ZERO, None, 0, 9.0).size(), MAX_SIZE);
        assert_eq!(ParticleTemplate::new(DVec3::ZERO, None, 0, 1.5).size(), 1.5);
    }

    #[test]
    fn test_color_distance_bounds() {
        let black = Color::new(0.0, 0.0, 0.0);
        assert!((black.distance(&Color::WHITE) - 1.0).abs() < 1e-6);
        assert_eq!(Color::WHITE.distance(&Color::WHITE), 0.0);
    }

    #[test]
    fn test_color_channels_clamped() {
        let c = Color::new(-1.0, 0.5, 2.0);
        assert_eq!(c, Color::new(0.0, 0.5, 1.0));
        assert_eq!(Color::from_rgb8(255, 0, 0), Color::new(1.0, 0.0, 0.0));
    }
}
