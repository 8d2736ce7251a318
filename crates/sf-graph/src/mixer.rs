//! Spatial mixer facade
//!
//! Owns the source registry, the effect zones and the listener, and keeps
//! the mixing invariants across every graph operation:
//! - every source has exactly one send per live effect
//! - a removed effect leaves no send behind
//! - any geometry change is followed by a gain recompute

use std::collections::BTreeMap;
use std::sync::Arc;

use sf_core::{Listener, MixerConfig, ParameterUpdateResult, RampPolicy, Vec3};

use crate::backend::AudioBackend;
use crate::effects::{EffectConfig, EffectPatch, EffectRegistry, EffectType};
use crate::error::{GraphError, GraphResult};
use crate::mixing::{MixDecision, apply_mix, compute_mix};
use crate::source::SoundSource;
use crate::synth::{SynthConfig, SynthPatch};
use crate::zones::{EffectZoneManager, GlobalEffect};

pub struct SpatialMixer {
    backend: Arc<dyn AudioBackend>,
    config: MixerConfig,
    registry: EffectRegistry,
    sources: BTreeMap<String, SoundSource>,
    zones: EffectZoneManager,
    listener: Listener,
}

impl SpatialMixer {
    pub fn new(backend: Arc<dyn AudioBackend>, config: MixerConfig) -> Self {
        Self {
            backend,
            config,
            registry: EffectRegistry::with_builtins(),
            sources: BTreeMap::new(),
            zones: EffectZoneManager::new(),
            listener: Listener::default(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn ramp(&self) -> RampPolicy {
        self.config.ramp()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LISTENER
    // ═══════════════════════════════════════════════════════════════════════

    pub fn listener(&self) -> Listener {
        self.listener
    }

    /// Apply position and orientation in a single engine call
    pub fn update_listener(&mut self, listener: Listener) -> GraphResult<()> {
        let listener = Listener::checked(listener.position, listener.forward, listener.up)?;
        self.backend.set_listener(&listener)?;
        self.listener = listener;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SOURCES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn source(&self, id: &str) -> Option<&SoundSource> {
        self.sources.get(id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &SoundSource> {
        self.sources.values()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Build a source with a send into every live effect, then mix it
    pub fn create_sound_source(
        &mut self,
        id: &str,
        config: SynthConfig,
        position: Vec3,
    ) -> GraphResult<&SoundSource> {
        if self.sources.contains_key(id) {
            return Err(GraphError::DuplicateSource(id.to_string()));
        }

        let targets = self.zones.send_targets();
        let source = SoundSource::create(self.backend.as_ref(), id, config, position, &targets)?;
        self.sources.insert(id.to_string(), source);
        self.recompute_source(id);
        log::info!("Sound source '{}' created", id);

        self.sources
            .get(id)
            .ok_or_else(|| GraphError::SourceNotFound(id.to_string()))
    }

    /// Release, disconnect and dispose a source; `false` if unknown
    pub fn remove_sound_source(&mut self, id: &str) -> bool {
        let Some(source) = self.sources.remove(id) else {
            return false;
        };
        source.dispose(self.backend.as_ref());
        log::info!("Sound source '{}' removed", id);
        true
    }

    pub fn update_sound_params(
        &mut self,
        id: &str,
        patch: &SynthPatch,
    ) -> GraphResult<ParameterUpdateResult> {
        let ramp = self.ramp();
        let ceiling = self.config.volume_ceiling;
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| GraphError::SourceNotFound(id.to_string()))?;
        Ok(source.update_params(self.backend.as_ref(), patch, ramp, ceiling))
    }

    /// Move a source and recompute its mix
    pub fn update_sound_position(&mut self, id: &str, position: Vec3) -> GraphResult<()> {
        let ramp = self.ramp();
        self.sources
            .get_mut(id)
            .ok_or_else(|| GraphError::SourceNotFound(id.to_string()))?
            .set_position(self.backend.as_ref(), position, ramp)?;
        self.recompute_source(id);
        Ok(())
    }

    pub fn play_sound(&mut self, id: &str) -> GraphResult<()> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| GraphError::SourceNotFound(id.to_string()))?;
        source.play(self.backend.as_ref())?;
        Ok(())
    }

    pub fn stop_sound(&mut self, id: &str) -> GraphResult<()> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| GraphError::SourceNotFound(id.to_string()))?;
        source.stop(self.backend.as_ref())?;
        Ok(())
    }

    /// Release every playing source; returns how many were stopped
    pub fn stop_all_sounds(&mut self) -> usize {
        let mut stopped = 0;
        for source in self.sources.values_mut().filter(|s| s.is_playing()) {
            match source.stop(self.backend.as_ref()) {
                Ok(()) => stopped += 1,
                Err(e) => log::warn!("Failed to stop '{}': {}", source.id(), e),
            }
        }
        stopped
    }

    // ═══════════════════════════════════════════════════════════════════════
    // EFFECTS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn effect(&self, id: &str) -> Option<&GlobalEffect> {
        self.zones.get(id)
    }

    pub fn effects(&self) -> impl Iterator<Item = &GlobalEffect> {
        self.zones.iter()
    }

    pub fn effect_count(&self) -> usize {
        self.zones.len()
    }

    pub fn has_effect(&self, id: &str) -> bool {
        self.zones.contains(id)
    }

    /// Create an effect of `effect_type` with default settings and radius
    pub fn create_global_effect(
        &mut self,
        id: &str,
        effect_type: EffectType,
        position: Vec3,
    ) -> GraphResult<&GlobalEffect> {
        let config = self.registry.create(effect_type).ok_or_else(|| {
            GraphError::InvalidParam(format!("effect type '{}' is not registered", effect_type))
        })?;
        let radius = self.config.default_zone_radius;
        self.create_global_effect_with(id, config, position, radius)
    }

    /// Create an effect from explicit settings, retrofit a send from every
    /// source and recompute the whole mix
    ///
    /// If any retrofit fails, the sends added so far and the effect are torn
    /// down again and the error is returned.
    pub fn create_global_effect_with(
        &mut self,
        id: &str,
        config: EffectConfig,
        position: Vec3,
        radius: f64,
    ) -> GraphResult<&GlobalEffect> {
        let probe = if self.config.probe_tones {
            self.registry.probe_spec(config.effect_type())
        } else {
            None
        };
        let backend = self.backend.as_ref();
        let node = self
            .zones
            .create_global_effect(backend, id, config, position, radius, probe)?
            .node();

        let mut retrofitted = Vec::new();
        let mut failure = None;
        for source in self.sources.values_mut() {
            match source.add_send(backend, id, node) {
                Ok(()) => retrofitted.push(source.id().to_string()),
                Err(e) => {
                    log::error!("Retrofit of '{}' into '{}' failed: {}", source.id(), id, e);
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            for source_id in &retrofitted {
                if let Some(source) = self.sources.get_mut(source_id.as_str()) {
                    source.remove_send(backend, id);
                }
            }
            if let Some(effect) = self.zones.take(id) {
                effect.dispose(backend);
            }
            return Err(e);
        }

        self.recompute_all();
        log::info!("Global effect '{}' created", id);
        self.zones
            .get(id)
            .ok_or_else(|| GraphError::EffectNotFound(id.to_string()))
    }

    /// Sever every source's send, then dispose the effect; `false` if unknown
    pub fn remove_global_effect(&mut self, id: &str) -> bool {
        if !self.zones.contains(id) {
            return false;
        }
        let backend = self.backend.as_ref();
        for source in self.sources.values_mut() {
            source.remove_send(backend, id);
        }
        if let Some(effect) = self.zones.take(id) {
            effect.dispose(backend);
        }
        self.recompute_all();
        log::info!("Global effect '{}' removed", id);
        true
    }

    pub fn update_global_effect(
        &mut self,
        id: &str,
        patch: &EffectPatch,
    ) -> GraphResult<ParameterUpdateResult> {
        let ramp = self.ramp();
        let effect = self
            .zones
            .get_mut(id)
            .ok_or_else(|| GraphError::EffectNotFound(id.to_string()))?;
        Ok(effect.update(self.backend.as_ref(), patch, ramp))
    }

    pub fn refresh_probe(&self, id: &str) -> bool {
        self.zones
            .get(id)
            .is_some_and(|e| e.refresh_probe(self.backend.as_ref(), self.ramp()))
    }

    pub fn update_effect_zone_position(&mut self, id: &str, position: Vec3) -> GraphResult<()> {
        let ramp = self.ramp();
        self.zones
            .update_effect_zone_position(self.backend.as_ref(), id, position, ramp)?;
        self.recompute_all();
        Ok(())
    }

    pub fn set_effect_zone_radius(&mut self, id: &str, radius: f64) -> GraphResult<()> {
        self.zones.set_effect_zone_radius(id, radius)?;
        self.recompute_all();
        Ok(())
    }

    pub fn silence_probes(&mut self) {
        for effect in self.zones.iter_mut() {
            effect.silence_probe(self.backend.as_ref());
        }
    }

    pub fn unsilence_probes(&mut self) {
        for effect in self.zones.iter_mut() {
            effect.unsilence_probe(self.backend.as_ref());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MIXING
    // ═══════════════════════════════════════════════════════════════════════

    /// Gains a source would get right now, without writing them
    pub fn mix_for(&self, id: &str) -> Option<MixDecision> {
        let source = self.sources.get(id)?;
        Some(compute_mix(
            source.position(),
            &self.zones.zones(),
            self.config.dry_gain_policy,
        ))
    }

    /// Recompute and write one source's gains; `false` if unknown
    pub fn recompute_source(&mut self, id: &str) -> bool {
        let zones = self.zones.zones();
        let ramp = self.ramp();
        let Some(source) = self.sources.get_mut(id) else {
            return false;
        };
        let decision = compute_mix(source.position(), &zones, self.config.dry_gain_policy);
        apply_mix(source, &decision, ramp, self.backend.as_ref());
        true
    }

    /// Recompute every source; returns the number of refused gain writes
    pub fn recompute_all(&mut self) -> usize {
        let zones = self.zones.zones();
        let ramp = self.ramp();
        let policy = self.config.dry_gain_policy;
        let backend = self.backend.as_ref();
        self.sources
            .values_mut()
            .map(|source| {
                let decision = compute_mix(source.position(), &zones, policy);
                apply_mix(source, &decision, ramp, backend)
            })
            .sum()
    }

    /// Tear down every source, then every effect
    pub fn clear(&mut self) {
        let ids: Vec<String> = self.sources.keys().cloned().collect();
        for id in ids {
            self.remove_sound_source(&id);
        }
        let effect_ids: Vec<String> = self.zones.iter().map(|e| e.id().to_string()).collect();
        for id in effect_ids {
            self.remove_global_effect(&id);
        }
    }
}

impl std::fmt::Debug for SpatialMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialMixer")
            .field("sources", &self.sources.len())
            .field("effects", &self.zones.len())
            .field("listener", &self.listener)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Endpoint, OfflineBackend};
    use crate::synth::SynthKind;
    use approx::assert_relative_eq;

    fn mixer() -> (Arc<OfflineBackend>, SpatialMixer) {
        let backend = Arc::new(OfflineBackend::running());
        let mixer = SpatialMixer::new(backend.clone(), MixerConfig::default());
        (backend, mixer)
    }

    fn add_source(mixer: &mut SpatialMixer, id: &str, x: f64) {
        mixer
            .create_sound_source(
                id,
                SynthConfig::defaults(SynthKind::Synth),
                Vec3::new(x, 0.0, 0.0),
            )
            .unwrap();
    }

    #[test]
    fn test_retrofit_reaches_existing_sources() {
        let (backend, mut mixer) = mixer();
        add_source(&mut mixer, "a", 0.0);
        add_source(&mut mixer, "b", 10.0);

        let node = mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap()
            .node();

        for source in mixer.sources() {
            let send = source.send("verb").unwrap();
            assert!(backend.is_connected(send.gain, Endpoint::Node(node)));
        }
        assert_relative_eq!(mixer.source("a").unwrap().send("verb").unwrap().level, 1.0);
        assert_relative_eq!(mixer.source("a").unwrap().dry_level(), 0.0);
        assert_relative_eq!(mixer.source("b").unwrap().send("verb").unwrap().level, 0.0);
    }

    #[test]
    fn test_new_source_gets_send_per_effect() {
        let (_backend, mut mixer) = mixer();
        mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap();
        mixer
            .create_global_effect("delay", EffectType::FeedbackDelay, Vec3::new(5.0, 0.0, 0.0))
            .unwrap();
        add_source(&mut mixer, "a", 3.0);

        let source = mixer.source("a").unwrap();
        assert_eq!(source.send_count(), 2);
        assert_relative_eq!(source.send("verb").unwrap().level, 0.5);
        assert_relative_eq!(source.send("delay").unwrap().level, 1.0);
    }

    #[test]
    fn test_remove_effect_leaves_no_sends() {
        let (backend, mut mixer) = mixer();
        add_source(&mut mixer, "a", 0.0);
        let node = mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap()
            .node();

        assert!(mixer.remove_global_effect("verb"));
        assert!(!mixer.remove_global_effect("verb"));
        assert!(!mixer.source("a").unwrap().has_send("verb"));
        assert!(!backend.contains(node));
        assert_eq!(backend.dirty_disposals(), 0);
        assert_relative_eq!(mixer.source("a").unwrap().dry_level(), 1.0);
    }

    #[test]
    fn test_failed_retrofit_rolls_back_effect() {
        let (backend, mut mixer) = mixer();
        add_source(&mut mixer, "a", 0.0);
        add_source(&mut mixer, "b", 0.0);
        let nodes_before = backend.node_count();

        // effect, panner, probe, first send succeed; second send fails
        backend.fail_nth_creation(5);
        let result = mixer.create_global_effect("verb", EffectType::Reverb, Vec3::ZERO);

        assert!(result.is_err());
        assert!(!mixer.has_effect("verb"));
        assert!(mixer.sources().all(|s| s.send_count() == 0));
        assert_eq!(backend.node_count(), nodes_before);
    }

    #[test]
    fn test_moving_source_through_zone() {
        let (_backend, mut mixer) = mixer();
        mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap();
        add_source(&mut mixer, "a", 5.0);

        for (x, expected) in [(5.0, 0.0), (3.0, 0.5), (1.0, 1.0)] {
            mixer
                .update_sound_position("a", Vec3::new(x, 0.0, 0.0))
                .unwrap();
            assert_relative_eq!(
                mixer.source("a").unwrap().send("verb").unwrap().level,
                expected
            );
        }
    }

    #[test]
    fn test_radius_change_recomputes() {
        let (_backend, mut mixer) = mixer();
        mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap();
        add_source(&mut mixer, "a", 3.0);
        mixer.set_effect_zone_radius("verb", 4.0).unwrap();
        assert_relative_eq!(mixer.source("a").unwrap().send("verb").unwrap().level, 1.0);
        assert!(mixer.set_effect_zone_radius("verb", 0.0).is_err());
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let (_backend, mut mixer) = mixer();
        add_source(&mut mixer, "a", 0.0);
        let dup = mixer.create_sound_source("a", SynthConfig::defaults(SynthKind::Synth), Vec3::ZERO);
        assert!(matches!(dup, Err(GraphError::DuplicateSource(_))));
        assert_eq!(mixer.source_count(), 1);
    }

    #[test]
    fn test_listener_applied_atomically() {
        let (backend, mut mixer) = mixer();
        let listener = Listener::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        mixer.update_listener(listener).unwrap();
        assert_eq!(backend.listener(), listener);

        let bad = Listener::new(Vec3::new(f64::NAN, 0.0, 0.0), Vec3::ZERO, Vec3::ZERO);
        assert!(mixer.update_listener(bad).is_err());
        assert_eq!(mixer.listener(), listener);
    }

    #[test]
    fn test_stop_all_and_probe_silencing() {
        let (backend, mut mixer) = mixer();
        add_source(&mut mixer, "a", 0.0);
        add_source(&mut mixer, "b", 0.0);
        mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap();
        mixer.play_sound("a").unwrap();
        mixer.play_sound("b").unwrap();

        assert_eq!(mixer.stop_all_sounds(), 2);
        assert_eq!(mixer.stop_all_sounds(), 0);

        mixer.silence_probes();
        let probe = mixer.effect("verb").unwrap().probe().unwrap();
        assert!(probe.is_silenced());
        assert!(!backend.node(probe.node).unwrap().started);
    }

    #[test]
    fn test_clear_disposes_everything() {
        let (backend, mut mixer) = mixer();
        add_source(&mut mixer, "a", 0.0);
        mixer
            .create_global_effect("verb", EffectType::Reverb, Vec3::ZERO)
            .unwrap();
        mixer.clear();
        assert_eq!(backend.node_count(), 0);
        assert_eq!(backend.dirty_disposals(), 0);
    }
}
