//! Parameter policy: ranges, validation and smoothing
//!
//! Validation and mutation share the same [`ParamBounds`] so the answer to
//! "is this value allowed" can never drift from what an update applies.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_RAMP_TIME;

/// Lowest audible frequency accepted by any pitched parameter
pub const MIN_FREQUENCY: f64 = 20.0;

/// Highest frequency accepted by any pitched parameter
pub const MAX_FREQUENCY: f64 = 20_000.0;

/// Volume above this still applies, but is reported as a warning
pub const RECOMMENDED_VOLUME_CEILING: f64 = 0.8;

/// Clamp a frequency to the audible band
#[inline]
pub fn clamp_frequency(hz: f64) -> f64 {
    if hz.is_nan() {
        return MIN_FREQUENCY;
    }
    hz.clamp(MIN_FREQUENCY, MAX_FREQUENCY)
}

/// Clamp a linear volume to `[0, 1]`
#[inline]
pub fn clamp_volume(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Convert linear volume to engine gain in dB (`-inf` at silence)
#[inline]
pub fn volume_to_db(v: f64) -> f64 {
    let v = clamp_volume(v);
    if v <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * v.log10()
    }
}

/// Convert engine dB back to linear volume
#[inline]
pub fn db_to_volume(db: f64) -> f64 {
    if db == f64::NEG_INFINITY {
        0.0
    } else {
        clamp_volume(10.0_f64.powf(db / 20.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PARAMETER VALUES
// ═══════════════════════════════════════════════════════════════════════════

/// Value written to an engine parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RANGES
// ═══════════════════════════════════════════════════════════════════════════

/// Inclusive numeric range for one named parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

pub const FREQUENCY_RANGE: ParamRange = ParamRange::new(MIN_FREQUENCY, MAX_FREQUENCY);
pub const VOLUME_RANGE: ParamRange = ParamRange::new(0.0, 1.0);
pub const DETUNE_RANGE: ParamRange = ParamRange::new(-1200.0, 1200.0);
pub const ENVELOPE_TIME_RANGE: ParamRange = ParamRange::new(0.001, 10.0);
pub const UNIT_RANGE: ParamRange = ParamRange::new(0.0, 1.0);
pub const HARMONICITY_RANGE: ParamRange = ParamRange::new(0.1, 20.0);
pub const MODULATION_INDEX_RANGE: ParamRange = ParamRange::new(0.0, 100.0);
pub const OCTAVES_RANGE: ParamRange = ParamRange::new(0.5, 8.0);
pub const Q_RANGE: ParamRange = ParamRange::new(0.1, 30.0);
pub const LFO_RATE_RANGE: ParamRange = ParamRange::new(0.01, 20.0);

/// Named bounds table shared by validation and updates
#[derive(Debug, Clone, Default)]
pub struct ParamBounds {
    entries: Vec<(&'static str, ParamRange)>,
}

impl ParamBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, range: ParamRange) -> Self {
        self.entries.push((name, range));
        self
    }

    pub fn range(&self, name: &str) -> Option<ParamRange> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| *r)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// `true` when `name` is known and `value` lies inside its range
    pub fn validate(&self, name: &str, value: f64) -> bool {
        self.range(name).is_some_and(|r| r.contains(value))
    }

    /// Hard validation error message, if any
    pub fn check(&self, name: &str, value: f64) -> Option<String> {
        match self.range(name) {
            None => Some(format!("Unknown parameter '{}'", name)),
            Some(r) if !r.contains(value) => Some(format!(
                "Parameter '{}' out of range: {} (allowed {}..={})",
                name, value, r.min, r.max
            )),
            Some(_) => None,
        }
    }
}

/// Soft recommendations that never block an update
pub fn soft_warnings(name: &str, value: f64, volume_ceiling: f64) -> Option<String> {
    if name == "volume" && value > volume_ceiling && value <= VOLUME_RANGE.max {
        return Some(format!(
            "volume {:.2} is above the recommended ceiling {:.2}",
            value, volume_ceiling
        ));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// SMOOTHING
// ═══════════════════════════════════════════════════════════════════════════

/// Smoothing applied to continuous parameter changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampPolicy {
    /// Ramp duration in seconds
    pub ramp_time: f64,
}

impl RampPolicy {
    pub fn new(ramp_time: f64) -> Self {
        let ramp_time = if ramp_time.is_finite() && ramp_time >= 0.0 {
            ramp_time
        } else {
            DEFAULT_RAMP_TIME
        };
        Self { ramp_time }
    }

    /// Zero-length ramp, used when a value must land instantly
    pub fn immediate() -> Self {
        Self { ramp_time: 0.0 }
    }
}

impl Default for RampPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RAMP_TIME)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE RESULT
// ═══════════════════════════════════════════════════════════════════════════

/// Outcome of one parameter update call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdateResult {
    pub success: bool,
    pub updated_params: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParameterUpdateResult {
    pub fn new() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Result for an update that was refused before touching anything
    pub fn rejected(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            ..Default::default()
        }
    }

    pub fn applied(&mut self, name: impl Into<String>) {
        self.updated_params.push(name.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.success = false;
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn was_applied(&self, name: &str) -> bool {
        self.updated_params.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clamp_frequency() {
        assert_eq!(clamp_frequency(5.0), 20.0);
        assert_eq!(clamp_frequency(25_000.0), 20_000.0);
        assert_eq!(clamp_frequency(440.0), 440.0);
        assert_eq!(clamp_frequency(f64::NAN), 20.0);
    }

    #[test]
    fn test_volume_to_db() {
        assert_eq!(volume_to_db(0.0), f64::NEG_INFINITY);
        assert_relative_eq!(volume_to_db(1.0), 0.0);
        assert_relative_eq!(volume_to_db(0.5), -6.0206, epsilon = 1e-3);
        assert_relative_eq!(db_to_volume(volume_to_db(0.25)), 0.25, epsilon = 1e-12);
        assert_eq!(db_to_volume(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_bounds_match_validation() {
        let bounds = ParamBounds::new()
            .with("frequency", FREQUENCY_RANGE)
            .with("volume", VOLUME_RANGE);

        assert!(bounds.validate("frequency", 440.0));
        assert!(!bounds.validate("frequency", 5.0));
        assert!(!bounds.validate("frequency", 25_000.0));
        assert!(!bounds.validate("unknown", 1.0));
        assert!(bounds.check("volume", 0.5).is_none());
        assert!(bounds.check("volume", 1.5).is_some());
        assert!(!bounds.validate("volume", f64::NAN));
    }

    #[test]
    fn test_soft_volume_warning() {
        assert!(soft_warnings("volume", 0.9, RECOMMENDED_VOLUME_CEILING).is_some());
        assert!(soft_warnings("volume", 0.5, RECOMMENDED_VOLUME_CEILING).is_none());
        assert!(soft_warnings("frequency", 0.9, RECOMMENDED_VOLUME_CEILING).is_none());
    }

    #[test]
    fn test_ramp_policy_rejects_negative() {
        assert_eq!(RampPolicy::new(-1.0).ramp_time, DEFAULT_RAMP_TIME);
        assert_eq!(RampPolicy::new(0.2).ramp_time, 0.2);
    }

    #[test]
    fn test_update_result_error_flips_success() {
        let mut result = ParameterUpdateResult::new();
        result.applied("frequency");
        assert!(result.success);
        result.error("boom");
        assert!(!result.success);
        assert!(result.was_applied("frequency"));
    }
}
