//! Zone falloff math
//!
//! Effects use a two-band zone instead of an inverse-square law:
//!
//! ```text
//! intensity
//!   1.0 ┤━━━━━━━━━━╮
//!       │          ╲
//!       │           ╲
//!   0.0 ┤            ╰━━━━━━━━
//!       └──────────┬──────┬───── distance
//!                  r      2r
//! ```

use crate::Vec3;

/// Euclidean distance between two points
#[inline]
pub fn distance(a: &Vec3, b: &Vec3) -> f64 {
    a.distance_to(b)
}

/// How strongly an effect zone applies to a source, in `[0, 1]`
///
/// Full inside `radius`, linear fade over `(radius, 2 * radius]`, silent
/// beyond. A degenerate radius only counts a source sitting exactly on the
/// effect.
pub fn effect_intensity(source: &Vec3, effect: &Vec3, radius: f64) -> f64 {
    let d = distance(source, effect);
    if !d.is_finite() {
        return 0.0;
    }
    if !(radius.is_finite() && radius > 0.0) {
        return if d == 0.0 { 1.0 } else { 0.0 };
    }

    if d <= radius {
        1.0
    } else if d < 2.0 * radius {
        (1.0 - (d - radius) / radius).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Which band of a zone a distance falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneBand {
    Full,
    Transition,
    Outside,
}

pub fn zone_band(distance: f64, radius: f64) -> ZoneBand {
    if distance <= radius {
        ZoneBand::Full
    } else if distance < 2.0 * radius {
        ZoneBand::Transition
    } else {
        ZoneBand::Outside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(d: f64) -> Vec3 {
        Vec3::new(d, 0.0, 0.0)
    }

    #[test]
    fn test_full_band() {
        let e = Vec3::ZERO;
        assert_eq!(effect_intensity(&at(0.0), &e, 2.0), 1.0);
        assert_eq!(effect_intensity(&at(1.0), &e, 2.0), 1.0);
        assert_eq!(effect_intensity(&at(2.0), &e, 2.0), 1.0);
    }

    #[test]
    fn test_transition_band() {
        let e = Vec3::ZERO;
        assert_relative_eq!(effect_intensity(&at(3.0), &e, 2.0), 0.5);
        let v = effect_intensity(&at(2.5), &e, 2.0);
        assert!(v > 0.0 && v < 1.0);
    }

    #[test]
    fn test_outside_band() {
        let e = Vec3::ZERO;
        assert_eq!(effect_intensity(&at(4.0), &e, 2.0), 0.0);
        assert_eq!(effect_intensity(&at(5.0), &e, 2.0), 0.0);
    }

    #[test]
    fn test_continuity_at_band_edges() {
        let e = Vec3::ZERO;
        for r in [0.5, 1.0, 2.0, 7.5] {
            let eps = 1e-9;
            let inner = effect_intensity(&at(r), &e, r);
            let just_out = effect_intensity(&at(r + eps), &e, r);
            assert!((inner - just_out).abs() < 1e-6);

            let before_edge = effect_intensity(&at(2.0 * r - eps), &e, r);
            let at_edge = effect_intensity(&at(2.0 * r), &e, r);
            assert!((before_edge - at_edge).abs() < 1e-6);
        }
    }

    #[test]
    fn test_off_axis_distance() {
        let source = Vec3::new(1.0, 2.0, 2.0);
        assert_relative_eq!(distance(&source, &Vec3::ZERO), 3.0);
        assert_relative_eq!(effect_intensity(&source, &Vec3::ZERO, 2.0), 0.5);
    }

    #[test]
    fn test_degenerate_radius() {
        let e = Vec3::ZERO;
        assert_eq!(effect_intensity(&at(0.0), &e, 0.0), 1.0);
        assert_eq!(effect_intensity(&at(0.1), &e, 0.0), 0.0);
        assert_eq!(effect_intensity(&at(0.1), &e, f64::NAN), 0.0);
    }

    #[test]
    fn test_zone_band() {
        assert_eq!(zone_band(1.0, 2.0), ZoneBand::Full);
        assert_eq!(zone_band(3.0, 2.0), ZoneBand::Transition);
        assert_eq!(zone_band(4.0, 2.0), ZoneBand::Outside);
    }
}
