//! Effect factory and typed updater

use std::collections::BTreeMap;

use sf_core::{ParameterUpdateResult, RampPolicy};

use super::{EffectConfig, EffectPatch, EffectType, ParamControl, ParamWrite, ProbeSpec};
use crate::backend::{AudioBackend, NodeId};
use crate::error::{EngineError, EngineResult};
use crate::synth::Waveform;

/// Static description of one effect type
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor {
    pub effect_type: EffectType,
    pub display_name: &'static str,
    pub probe: ProbeSpec,
}

/// Effect types the mixer can build, with their probe tones
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    descriptors: BTreeMap<EffectType, EffectDescriptor>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in effect type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins = [
            (EffectType::Reverb, "Reverb", 220.0, Waveform::Triangle, 0.2),
            (EffectType::FeedbackDelay, "Feedback Delay", 330.0, Waveform::Sine, 0.2),
            (EffectType::PingPongDelay, "Ping-Pong Delay", 392.0, Waveform::Sine, 0.2),
            (EffectType::Chorus, "Chorus", 261.63, Waveform::Sawtooth, 0.12),
            (EffectType::Phaser, "Phaser", 196.0, Waveform::Sawtooth, 0.12),
            (EffectType::Distortion, "Distortion", 110.0, Waveform::Sine, 0.15),
            (EffectType::BitCrusher, "Bit Crusher", 440.0, Waveform::Sine, 0.15),
            (EffectType::AutoFilter, "Auto Filter", 130.81, Waveform::Sawtooth, 0.12),
            (EffectType::Tremolo, "Tremolo", 293.66, Waveform::Sine, 0.2),
            (EffectType::Vibrato, "Vibrato", 349.23, Waveform::Triangle, 0.2),
            (EffectType::PitchShift, "Pitch Shift", 440.0, Waveform::Triangle, 0.15),
            (EffectType::Freeverb, "Freeverb", 174.61, Waveform::Triangle, 0.2),
        ];
        for (effect_type, display_name, frequency, waveform, level) in builtins {
            registry.register(EffectDescriptor {
                effect_type,
                display_name,
                probe: ProbeSpec::new(frequency, waveform, level),
            });
        }
        registry
    }

    pub fn register(&mut self, descriptor: EffectDescriptor) {
        self.descriptors.insert(descriptor.effect_type, descriptor);
    }

    pub fn get(&self, effect_type: EffectType) -> Option<&EffectDescriptor> {
        self.descriptors.get(&effect_type)
    }

    pub fn contains(&self, effect_type: EffectType) -> bool {
        self.descriptors.contains_key(&effect_type)
    }

    pub fn types(&self) -> impl Iterator<Item = EffectType> + '_ {
        self.descriptors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Default settings for a registered type
    pub fn create(&self, effect_type: EffectType) -> Option<EffectConfig> {
        self.contains(effect_type)
            .then(|| EffectConfig::defaults(effect_type))
    }

    pub fn validate_param(&self, effect_type: EffectType, name: &str, value: f64) -> bool {
        self.contains(effect_type) && validate_effect_param(effect_type, name, value)
    }

    pub fn probe_spec(&self, effect_type: EffectType) -> Option<ProbeSpec> {
        self.get(effect_type).map(|d| d.probe)
    }
}

/// Whether `value` is acceptable for parameter `name` of `effect_type`
pub fn validate_effect_param(effect_type: EffectType, name: &str, value: f64) -> bool {
    effect_type.bounds().validate(name, value)
}

/// Write one parameter with its declared control
pub fn apply_param_write(
    backend: &dyn AudioBackend,
    node: NodeId,
    write: &ParamWrite,
    ramp: RampPolicy,
) -> EngineResult<()> {
    match (write.control, write.value.as_f64()) {
        (ParamControl::Signal, Some(v)) => backend.ramp_param(node, write.path, v, ramp.ramp_time),
        (ParamControl::Scheduled, Some(v)) => {
            backend.set_param_at(node, write.path, v, ramp.ramp_time)
        }
        _ => backend.set_param(node, write.path, write.value.clone()),
    }
}

/// Apply `patch` to the effect node behind `config`
///
/// The whole patch is validated before any write. A parameter the engine
/// reports as unsupported is skipped without an error.
pub fn update_effect(
    node: NodeId,
    config: &mut EffectConfig,
    patch: &EffectPatch,
    ramp: RampPolicy,
    backend: &dyn AudioBackend,
) -> ParameterUpdateResult {
    if patch.effect_type() != config.effect_type() {
        return ParameterUpdateResult::rejected(vec![format!(
            "Cannot apply {} parameters to a {} effect",
            patch.effect_type(),
            config.effect_type()
        )]);
    }

    let errors = patch.validate();
    if !errors.is_empty() {
        log::debug!("Rejected {} update: {:?}", config.effect_type(), errors);
        return ParameterUpdateResult::rejected(errors);
    }

    let mut result = ParameterUpdateResult::new();
    for write in patch.writes() {
        match apply_param_write(backend, node, &write, ramp) {
            Ok(()) => {
                config.assign(patch, write.name);
                result.applied(write.name);
            }
            Err(EngineError::Unsupported { .. }) => {
                log::debug!(
                    "Effect {} has no settable '{}', skipped",
                    node,
                    write.path
                );
            }
            Err(e) => result.error(format!("Failed to update {}: {}", write.name, e)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EngineEvent, NodeSpec, OfflineBackend};
    use crate::effects::{BitCrusherPatch, FeedbackDelayPatch, ReverbPatch};

    fn effect(backend: &OfflineBackend, ty: EffectType) -> (NodeId, EffectConfig) {
        let config = EffectConfig::defaults(ty);
        let node = backend.create_node(&NodeSpec::Effect(config.clone())).unwrap();
        (node, config)
    }

    #[test]
    fn test_builtins_cover_every_type() {
        let registry = EffectRegistry::with_builtins();
        assert_eq!(registry.len(), EffectType::ALL.len());
        for ty in EffectType::ALL {
            assert_eq!(registry.create(ty).map(|c| c.effect_type()), Some(ty));
            assert!(registry.probe_spec(ty).is_some());
        }
        assert!(EffectRegistry::new().create(EffectType::Reverb).is_none());
    }

    #[test]
    fn test_validate_param() {
        let registry = EffectRegistry::with_builtins();
        assert!(registry.validate_param(EffectType::Reverb, "wet", 0.3));
        assert!(!registry.validate_param(EffectType::Reverb, "wet", 1.3));
        assert!(!registry.validate_param(EffectType::Reverb, "feedback", 0.3));
    }

    #[test]
    fn test_controls_pick_setter() {
        let backend = OfflineBackend::running();
        let (node, mut config) = effect(&backend, EffectType::BitCrusher);
        backend.clear_events();

        let patch = EffectPatch::BitCrusher(BitCrusherPatch {
            bits: Some(8.0),
            wet: Some(0.7),
        });
        let result = update_effect(node, &mut config, &patch, RampPolicy::new(0.05), &backend);

        assert!(result.success);
        assert_eq!(result.updated_params, vec!["bits", "wet"]);
        let events = backend.events();
        assert!(matches!(
            &events[0],
            EngineEvent::SetAt { param, delay, .. } if param == "bits" && *delay == 0.05
        ));
        assert!(matches!(&events[1], EngineEvent::Ramp { param, .. } if param == "wet"));
        match config {
            EffectConfig::BitCrusher(s) => assert_eq!(s.bits, 8.0),
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_param_is_noop() {
        let backend = OfflineBackend::running();
        let (node, mut config) = effect(&backend, EffectType::Reverb);
        backend.mark_unsupported("pre_delay");

        let patch = EffectPatch::Reverb(ReverbPatch {
            decay: Some(3.0),
            pre_delay: Some(0.2),
            ..Default::default()
        });
        let result = update_effect(node, &mut config, &patch, RampPolicy::default(), &backend);

        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.updated_params, vec!["decay"]);
    }

    #[test]
    fn test_invalid_patch_rejected_whole() {
        let backend = OfflineBackend::running();
        let (node, mut config) = effect(&backend, EffectType::FeedbackDelay);
        backend.clear_events();

        let patch = EffectPatch::FeedbackDelay(FeedbackDelayPatch {
            delay_time: Some(0.5),
            feedback: Some(1.2),
            ..Default::default()
        });
        let before = config.clone();
        let result = update_effect(node, &mut config, &patch, RampPolicy::default(), &backend);

        assert!(!result.success);
        assert!(backend.events().is_empty());
        assert_eq!(config, before);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let backend = OfflineBackend::running();
        let (node, mut config) = effect(&backend, EffectType::Chorus);
        let patch = EffectPatch::Reverb(ReverbPatch::default());
        let result = update_effect(node, &mut config, &patch, RampPolicy::default(), &backend);
        assert!(!result.success);
    }
}
