//! Dry/wet balance from geometry
//!
//! Each zone contributes a send level equal to its falloff intensity at the
//! source position. How the intensities fold into the dry level depends on
//! the [`DryGainPolicy`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sf_core::{DryGainPolicy, RampPolicy, Vec3, effect_intensity};

use crate::backend::AudioBackend;
use crate::source::SoundSource;
use crate::zones::Zone;

/// Gains to write for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixDecision {
    pub dry: f64,
    /// Send level per effect id
    pub sends: BTreeMap<String, f64>,
}

/// Compute dry and send levels for a source at `position`
///
/// `zones` must be in insertion order; `LastZone` depends on it.
pub fn compute_mix(position: Vec3, zones: &[Zone], policy: DryGainPolicy) -> MixDecision {
    let intensities: Vec<f64> = zones
        .iter()
        .map(|z| effect_intensity(&position, &z.position, z.radius))
        .collect();

    let dry = match policy {
        DryGainPolicy::LastZone => intensities.last().map_or(1.0, |i| 1.0 - i),
        DryGainPolicy::MaxIntensity => 1.0 - intensities.iter().copied().fold(0.0, f64::max),
        DryGainPolicy::NormalizedSum => 1.0 - intensities.iter().sum::<f64>().min(1.0),
    };

    let sends = zones
        .iter()
        .zip(&intensities)
        .map(|(z, &i)| (z.id.clone(), i))
        .collect();

    MixDecision {
        dry: dry.clamp(0.0, 1.0),
        sends,
    }
}

/// Write a decision to the source's dry and send gains
///
/// Returns the number of gain writes the engine refused; each is logged.
pub fn apply_mix(
    source: &mut SoundSource,
    decision: &MixDecision,
    ramp: RampPolicy,
    backend: &dyn AudioBackend,
) -> usize {
    let mut failures = 0;
    if let Err(e) = source.set_dry_level(backend, decision.dry, ramp) {
        log::warn!("Failed to set dry level of '{}': {}", source.id(), e);
        failures += 1;
    }
    for (effect_id, &level) in &decision.sends {
        match source.set_send_level(backend, effect_id, level, ramp) {
            Ok(true) => {}
            Ok(false) => log::debug!("Source '{}' has no send to '{}'", source.id(), effect_id),
            Err(e) => {
                log::warn!(
                    "Failed to set send '{}' of '{}': {}",
                    effect_id,
                    source.id(),
                    e
                );
                failures += 1;
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn zone(id: &str, x: f64, radius: f64) -> Zone {
        Zone {
            id: id.to_string(),
            position: Vec3::new(x, 0.0, 0.0),
            radius,
        }
    }

    #[test]
    fn test_no_zones_is_fully_dry() {
        for policy in [
            DryGainPolicy::LastZone,
            DryGainPolicy::MaxIntensity,
            DryGainPolicy::NormalizedSum,
        ] {
            let mix = compute_mix(Vec3::ZERO, &[], policy);
            assert_eq!(mix.dry, 1.0);
            assert!(mix.sends.is_empty());
        }
    }

    #[test]
    fn test_send_levels_follow_distance() {
        let zones = [zone("verb", 0.0, 2.0)];
        for (x, expected) in [(1.0, 1.0), (3.0, 0.5), (5.0, 0.0)] {
            let mix = compute_mix(Vec3::new(x, 0.0, 0.0), &zones, DryGainPolicy::MaxIntensity);
            assert_relative_eq!(mix.sends["verb"], expected);
            assert_relative_eq!(mix.dry, 1.0 - expected);
        }
    }

    // Source at the origin: "near" gives 1.0, "far" gives 0.5
    fn overlapping() -> [Zone; 2] {
        [zone("near", 0.0, 2.0), zone("far", 3.0, 2.0)]
    }

    #[test]
    fn test_last_zone_policy() {
        let mix = compute_mix(Vec3::ZERO, &overlapping(), DryGainPolicy::LastZone);
        assert_relative_eq!(mix.dry, 0.5);

        let mut reversed = overlapping();
        reversed.reverse();
        let mix = compute_mix(Vec3::ZERO, &reversed, DryGainPolicy::LastZone);
        assert_relative_eq!(mix.dry, 0.0);
    }

    #[test]
    fn test_max_intensity_policy() {
        let mix = compute_mix(Vec3::ZERO, &overlapping(), DryGainPolicy::MaxIntensity);
        assert_relative_eq!(mix.dry, 0.0);
        assert_relative_eq!(mix.sends["near"], 1.0);
        assert_relative_eq!(mix.sends["far"], 0.5);

        let zones = [zone("a", 3.0, 2.0), zone("b", -3.5, 2.0)];
        let mix = compute_mix(Vec3::ZERO, &zones, DryGainPolicy::MaxIntensity);
        assert_relative_eq!(mix.dry, 0.5);
    }

    #[test]
    fn test_normalized_sum_policy() {
        let zones = [zone("a", 3.0, 2.0), zone("b", -3.5, 2.0)];
        let mix = compute_mix(Vec3::ZERO, &zones, DryGainPolicy::NormalizedSum);
        assert_relative_eq!(mix.dry, 0.25);

        let mix = compute_mix(Vec3::ZERO, &overlapping(), DryGainPolicy::NormalizedSum);
        assert_relative_eq!(mix.dry, 0.0);
    }
}
