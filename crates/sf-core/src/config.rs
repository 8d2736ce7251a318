//! Mixer configuration

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, DEFAULT_RAMP_TIME, DEFAULT_ZONE_RADIUS, RampPolicy};

/// How a source's dry gain combines the intensities of overlapping zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DryGainPolicy {
    /// `1 - intensity` of the last zone in creation order
    LastZone,
    /// `1 - max(intensities)`
    #[default]
    MaxIntensity,
    /// `1 - min(1, sum(intensities))`
    NormalizedSum,
}

/// Top-level mixer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Smoothing time for continuous parameter changes (seconds)
    pub ramp_time: f64,
    /// Radius given to newly created effect zones
    pub default_zone_radius: f64,
    /// Dry gain combination under overlapping zones
    pub dry_gain_policy: DryGainPolicy,
    /// Feed every live effect with a quiet diagnostic oscillator
    pub probe_tones: bool,
    /// Executed commands kept for undo
    pub command_history_limit: usize,
    /// Prior state snapshots kept by the state manager
    pub state_history_limit: usize,
    /// Source count above which validation warns
    pub source_warning_threshold: usize,
    /// Effect count above which validation warns
    pub effect_warning_threshold: usize,
    /// Poll interval for `wait_for_ready` (milliseconds)
    pub context_poll_interval_ms: u64,
    /// Volume above which updates carry a warning
    pub volume_ceiling: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            ramp_time: DEFAULT_RAMP_TIME,
            default_zone_radius: DEFAULT_ZONE_RADIUS,
            dry_gain_policy: DryGainPolicy::default(),
            probe_tones: true,
            command_history_limit: 100,
            state_history_limit: 20,
            source_warning_threshold: 50,
            effect_warning_threshold: 20,
            context_poll_interval_ms: 100,
            volume_ceiling: crate::RECOMMENDED_VOLUME_CEILING,
        }
    }
}

impl MixerConfig {
    /// Parse from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        log::debug!("Loaded mixer config: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.ramp_time.is_finite() && self.ramp_time >= 0.0) {
            return Err(CoreError::InvalidConfig(format!(
                "ramp_time must be >= 0, got {}",
                self.ramp_time
            )));
        }
        if !(self.default_zone_radius.is_finite() && self.default_zone_radius > 0.0) {
            return Err(CoreError::InvalidConfig(format!(
                "default_zone_radius must be > 0, got {}",
                self.default_zone_radius
            )));
        }
        if self.command_history_limit == 0 {
            return Err(CoreError::InvalidConfig(
                "command_history_limit must be at least 1".into(),
            ));
        }
        if self.context_poll_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "context_poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn ramp(&self) -> RampPolicy {
        RampPolicy::new(self.ramp_time)
    }
}
