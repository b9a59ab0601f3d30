//! Procedural offset transform.
//!
//! [`transform`] displaces a particle's local offset for a given tick. It is
//! pure: identical `(offset, tick, effects)` inputs always produce
//! bit-identical output. Components are applied in a fixed order and each
//! one sees the output of the previous one, so composition is
//! order-sensitive.

use std::f64::consts::TAU;

use glam::DVec3;

use crate::effects::{ParticleEffects, RotationAxes};

/// Displace `offset` at `tick` by the enabled components of `effects`.
///
/// Returns `offset` unchanged when `effects` is absent or inert.
#[must_use]
pub fn transform(offset: DVec3, tick: u64, effects: Option<&ParticleEffects>) -> DVec3 {
    match effects {
        Some(effects) => effects.apply(offset, tick),
        None => offset,
    }
}

impl ParticleEffects {
    /// Apply every enabled component to `offset`, in transform order:
    /// rotation, oscillation, pulse, bounce, flow, swirl, wave, orbit, spiral.
    #[must_use]
    pub fn apply(&self, offset: DVec3, tick: u64) -> DVec3 {
        let t = tick as f64;
        let mut p = offset;

        if self.rotation.is_enabled() {
            let angle = (t * self.rotation.speed).rem_euclid(TAU);
            p = rotate(p, angle, self.rotation.axes.normalized());
        }

        if self.oscillation.is_enabled() {
            p *= 1.0 + (t * self.oscillation.speed).sin() * self.oscillation.magnitude;
        }

        if self.pulse.is_enabled() {
            p *= 1.0 + (2.0 * t * self.pulse.speed).sin() * self.pulse.magnitude;
        }

        if self.bounce.is_enabled() {
            p.y += (t * self.bounce.speed).sin().abs() * self.bounce.magnitude;
        }

        if self.flow.is_enabled() {
            p.x += (t * self.flow.speed).sin() * self.flow.magnitude;
        }

        if self.swirl.is_enabled() {
            let mut d = horizontal_distance(p);
            if d == 0.0 {
                d = self.swirl.magnitude;
            }
            let angle = p.z.atan2(p.x) + t * self.swirl.speed * d;
            p.x = angle.cos() * d;
            p.z = angle.sin() * d;
        }

        if self.wave.is_enabled() {
            let d = horizontal_distance(p);
            p.y += (t * self.wave.speed + d * 0.5).sin() * self.wave.magnitude;
        }

        if self.orbit.is_enabled() {
            let angle = t * self.orbit.speed;
            p.x += angle.cos() * self.orbit.magnitude;
            p.z += angle.sin() * self.orbit.magnitude;
        }

        if self.spiral.is_enabled() {
            let d = horizontal_distance(p);
            let angle = p.z.atan2(p.x) + t * self.spiral.speed;
            let radius = d + self.spiral.magnitude;
            p.x = angle.cos() * radius;
            p.z = angle.sin() * radius;
        }

        p
    }
}

fn horizontal_distance(p: DVec3) -> f64 {
    (p.x * p.x + p.z * p.z).sqrt()
}

/// Rotate `p` by `angle` around each selected axis in turn (X, then Y, then Z).
fn rotate(p: DVec3, angle: f64, axes: RotationAxes) -> DVec3 {
    let (sin, cos) = angle.sin_cos();
    let mut p = p;

    if axes.x {
        let (y, z) = (p.y, p.z);
        p.y = y * cos - z * sin;
        p.z = y * sin + z * cos;
    }
    if axes.y {
        let (x, z) = (p.x, p.z);
        p.x = x * cos - z * sin;
        p.z = x * sin + z * cos;
    }
    if axes.z {
        let (x, y) = (p.x, p.y);
        p.x = x * cos - y * sin;
        p.y = x * sin + y * cos;
    }
    p
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;
    use crate::effects::{Motion, Rotation};

    const EPS: f64 = 1e-9;

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < EPS
    }

    #[test]
    fn test_absent_effects_is_identity() {
        let p = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(transform(p, 77, None), p);
        assert_eq!(transform(p, 77, Some(&ParticleEffects::default())), p);
    }

    #[test]
    fn test_orbit_at_tick_zero() {
        let effects = ParticleEffects {
            orbit: Motion::new(2.0, 1.0),
            ..ParticleEffects::default()
        };
        let base = DVec3::new(0.5, 1.25, -0.5);
        let out = transform(base, 0, Some(&effects));
        assert_eq!(out.y, base.y);
        assert!(close(out, base + DVec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_rotation_quarter_turn_around_y() {
        let effects = ParticleEffects {
            rotation: Rotation {
                speed: FRAC_PI_2,
                axes: RotationAxes::Y,
            },
            ..ParticleEffects::default()
        };
        let out = effects.apply(DVec3::new(1.0, 0.0, 0.0), 1);
        assert!(close(out, DVec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_rotation_wraps_full_turn() {
        let mut effects = ParticleEffects::preset("rotate-xyz", 1.0).unwrap();
        effects.rotation.speed = TAU / 100.0;
        let p = DVec3::new(1.0, -2.0, 0.5);
        let out = effects.apply(p, 100);
        assert!((out - p).length() < 1e-6);
    }

    #[test]
    fn test_bounce_only_raises() {
        let effects = ParticleEffects::preset("bounce", 1.0).unwrap();
        for tick in 0..200 {
            let out = effects.apply(DVec3::ZERO, tick);
            assert!(out.y >= 0.0);
            assert!(out.y <= 1.5 + EPS);
        }
    }

    #[test]
    fn test_swirl_uses_radius_at_origin() {
        let effects = ParticleEffects::preset("swirl", 1.0).unwrap();
        let out = effects.apply(DVec3::ZERO, 10);
        let d = (out.x * out.x + out.z * out.z).sqrt();
        assert!((d - effects.swirl.magnitude).abs() < EPS);
    }

    #[test]
    fn test_spiral_expands_radius() {
        let effects = ParticleEffects::preset("spiral", 1.0).unwrap();
        let out = effects.apply(DVec3::new(1.0, 0.0, 0.0), 5);
        let d = (out.x * out.x + out.z * out.z).sqrt();
        assert!((d - 1.5).abs() < EPS);
    }

    #[test]
    fn test_composition_is_order_sensitive_and_deterministic() {
        let effects = ParticleEffects {
            rotation: Rotation {
                speed: 0.3,
                axes: RotationAxes::Y,
            },
            flow: Motion::new(0.5, 0.2),
            ..ParticleEffects::default()
        };
        let p = DVec3::new(1.0, 0.0, 2.0);
        let a = effects.apply(p, 13);
        let b = effects.apply(p, 13);
        assert_eq!(a.to_array(), b.to_array());

        // Flow before rotation would land somewhere else.
        let flowed_first = DVec3::new(p.x + (13.0f64 * 0.2).sin() * 0.5, p.y, p.z);
        let rotated_after = rotate(flowed_first, (13.0f64 * 0.3).rem_euclid(TAU), RotationAxes::Y);
        assert!(!close(a, rotated_after));
    }
}
