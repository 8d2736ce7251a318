//! Per-source audio graph
//!
//! ```text
//!   synth ──▶ panner ──▶ dry gain ──▶ destination
//!     │
//!     ├──▶ send gain (effect a) ──▶ effect a
//!     └──▶ send gain (effect b) ──▶ effect b
//! ```
//!
//! A source owns exactly one dry path and one send per live global effect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sf_core::{ParameterUpdateResult, RampPolicy, Vec3};

use crate::backend::{AudioBackend, Endpoint, NodeId, NodeSpec, PannerSettings};
use crate::error::{EngineResult, GraphError, GraphResult};
use crate::synth::{self, SynthConfig, SynthHandle, SynthKind, SynthPatch};

/// Gain stage feeding one global effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SendPath {
    pub gain: NodeId,
    pub effect: NodeId,
    /// Last level written
    pub level: f64,
}

/// A live sound source and the nodes it owns
#[derive(Debug, Clone)]
pub struct SoundSource {
    id: String,
    synth: SynthHandle,
    panner: NodeId,
    dry: NodeId,
    dry_level: f64,
    sends: BTreeMap<String, SendPath>,
    position: Vec3,
}

impl SoundSource {
    /// Build and wire the source graph, with a silent send into every
    /// `(effect id, effect node)` in `effects`
    ///
    /// Construction is atomic: on any engine failure every node created so
    /// far is disconnected and disposed before the error is returned.
    pub fn create(
        backend: &dyn AudioBackend,
        id: impl Into<String>,
        config: SynthConfig,
        position: Vec3,
        effects: &[(String, NodeId)],
    ) -> GraphResult<Self> {
        let id = id.into();
        if !position.is_finite() {
            return Err(sf_core::CoreError::InvalidPosition(format!(
                "source '{}' at {:?}",
                id, position
            ))
            .into());
        }

        let mut created = Vec::new();
        match Self::build(backend, &id, config, position, effects, &mut created) {
            Ok(source) => {
                log::debug!(
                    "Created source '{}' ({}) with {} sends",
                    source.id,
                    source.kind(),
                    source.sends.len()
                );
                Ok(source)
            }
            Err(e) => {
                log::warn!("Rolling back source '{}': {}", id, e);
                teardown(backend, &created);
                Err(e.into())
            }
        }
    }

    fn build(
        backend: &dyn AudioBackend,
        id: &str,
        config: SynthConfig,
        position: Vec3,
        effects: &[(String, NodeId)],
        created: &mut Vec<NodeId>,
    ) -> EngineResult<Self> {
        let synth = backend.create_node(&NodeSpec::Synth(config.clone()))?;
        created.push(synth);
        let panner = backend.create_node(&NodeSpec::Panner(PannerSettings::at(position)))?;
        created.push(panner);
        let dry = backend.create_node(&NodeSpec::Gain { gain: 1.0 })?;
        created.push(dry);

        backend.connect(synth, Endpoint::Node(panner))?;
        backend.connect(panner, Endpoint::Node(dry))?;
        backend.connect(dry, Endpoint::Destination)?;

        let mut sends = BTreeMap::new();
        for (effect_id, effect) in effects {
            let gain = backend.create_node(&NodeSpec::Gain { gain: 0.0 })?;
            created.push(gain);
            backend.connect(synth, Endpoint::Node(gain))?;
            backend.connect(gain, Endpoint::Node(*effect))?;
            sends.insert(
                effect_id.clone(),
                SendPath {
                    gain,
                    effect: *effect,
                    level: 0.0,
                },
            );
        }

        Ok(Self {
            id: id.to_string(),
            synth: SynthHandle::new(synth, config),
            panner,
            dry,
            dry_level: 1.0,
            sends,
            position,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SynthKind {
        self.synth.kind()
    }

    pub fn config(&self) -> &SynthConfig {
        &self.synth.config
    }

    pub fn synth(&self) -> &SynthHandle {
        &self.synth
    }

    pub fn panner(&self) -> NodeId {
        self.panner
    }

    pub fn dry_node(&self) -> NodeId {
        self.dry
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.synth.is_playing()
    }

    pub fn dry_level(&self) -> f64 {
        self.dry_level
    }

    pub fn send(&self, effect_id: &str) -> Option<&SendPath> {
        self.sends.get(effect_id)
    }

    pub fn has_send(&self, effect_id: &str) -> bool {
        self.sends.contains_key(effect_id)
    }

    pub fn sends(&self) -> impl Iterator<Item = (&str, &SendPath)> {
        self.sends.iter().map(|(id, send)| (id.as_str(), send))
    }

    pub fn send_count(&self) -> usize {
        self.sends.len()
    }

    /// Every node owned by this source
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = vec![self.synth.node, self.panner, self.dry];
        nodes.extend(self.sends.values().map(|s| s.gain));
        nodes
    }

    /// Retrofit a silent send into a newly created effect
    pub fn add_send(
        &mut self,
        backend: &dyn AudioBackend,
        effect_id: &str,
        effect: NodeId,
    ) -> GraphResult<()> {
        if self.sends.contains_key(effect_id) {
            return Ok(());
        }

        let gain = backend.create_node(&NodeSpec::Gain { gain: 0.0 })?;
        let wired = backend
            .connect(self.synth.node, Endpoint::Node(gain))
            .and_then(|()| backend.connect(gain, Endpoint::Node(effect)));
        if let Err(e) = wired {
            let _ = backend.disconnect_from(self.synth.node, Endpoint::Node(gain));
            teardown(backend, &[gain]);
            return Err(e.into());
        }

        self.sends.insert(
            effect_id.to_string(),
            SendPath {
                gain,
                effect,
                level: 0.0,
            },
        );
        Ok(())
    }

    /// Sever and dispose the send into `effect_id`
    ///
    /// The send is forgotten even if the engine reports a failure, so no
    /// dangling send survives its effect.
    pub fn remove_send(&mut self, backend: &dyn AudioBackend, effect_id: &str) -> bool {
        let Some(send) = self.sends.remove(effect_id) else {
            return false;
        };
        if let Err(e) = backend.disconnect_from(self.synth.node, Endpoint::Node(send.gain)) {
            log::warn!("Failed to detach send {} of '{}': {}", send.gain, self.id, e);
        }
        teardown(backend, &[send.gain]);
        true
    }

    pub fn set_position(
        &mut self,
        backend: &dyn AudioBackend,
        position: Vec3,
        ramp: RampPolicy,
    ) -> GraphResult<()> {
        if !position.is_finite() {
            return Err(GraphError::Core(sf_core::CoreError::InvalidPosition(
                format!("{:?}", position),
            )));
        }
        backend.set_position(self.panner, position, ramp.ramp_time)?;
        self.position = position;
        Ok(())
    }

    pub fn set_dry_level(
        &mut self,
        backend: &dyn AudioBackend,
        level: f64,
        ramp: RampPolicy,
    ) -> EngineResult<()> {
        backend.ramp_param(self.dry, "gain", level, ramp.ramp_time)?;
        self.dry_level = level;
        Ok(())
    }

    pub fn set_send_level(
        &mut self,
        backend: &dyn AudioBackend,
        effect_id: &str,
        level: f64,
        ramp: RampPolicy,
    ) -> EngineResult<bool> {
        let Some(send) = self.sends.get_mut(effect_id) else {
            return Ok(false);
        };
        backend.ramp_param(send.gain, "gain", level, ramp.ramp_time)?;
        send.level = level;
        Ok(true)
    }

    pub fn update_params(
        &mut self,
        backend: &dyn AudioBackend,
        patch: &SynthPatch,
        ramp: RampPolicy,
        volume_ceiling: f64,
    ) -> ParameterUpdateResult {
        synth::update_synth(&mut self.synth, patch, ramp, volume_ceiling, backend)
    }

    pub fn play(&mut self, backend: &dyn AudioBackend) -> EngineResult<()> {
        synth::trigger(&mut self.synth, backend)
    }

    pub fn stop(&mut self, backend: &dyn AudioBackend) -> EngineResult<()> {
        synth::release(&mut self.synth, backend)
    }

    /// Release playback, disconnect every node, then dispose every node
    ///
    /// Best effort: each failure is logged and teardown continues.
    pub fn dispose(mut self, backend: &dyn AudioBackend) {
        if let Err(e) = self.stop(backend) {
            log::warn!("Failed to release source '{}': {}", self.id, e);
        }
        teardown(backend, &self.nodes());
        log::debug!("Disposed source '{}'", self.id);
    }
}

/// Disconnect all `nodes`, then dispose all of them, logging failures
pub(crate) fn teardown(backend: &dyn AudioBackend, nodes: &[NodeId]) {
    for &node in nodes {
        if let Err(e) = backend.disconnect(node) {
            log::warn!("Failed to disconnect {}: {}", node, e);
        }
    }
    for &node in nodes {
        if let Err(e) = backend.dispose(node) {
            log::warn!("Failed to dispose {}: {}", node, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::effects::{EffectConfig, EffectType};
    use crate::synth::SynthKind;

    fn effect(backend: &OfflineBackend, id: &str) -> (String, NodeId) {
        let node = backend
            .create_node(&NodeSpec::Effect(EffectConfig::defaults(EffectType::Reverb)))
            .unwrap();
        (id.to_string(), node)
    }

    #[test]
    fn test_graph_shape() {
        let backend = OfflineBackend::running();
        let effects = vec![effect(&backend, "reverb"), effect(&backend, "delay")];
        let source = SoundSource::create(
            &backend,
            "a",
            SynthConfig::defaults(SynthKind::FmSynth),
            Vec3::new(1.0, 0.0, 0.0),
            &effects,
        )
        .unwrap();

        let synth = source.synth().node;
        assert!(backend.is_connected(synth, Endpoint::Node(source.panner())));
        assert!(backend.is_connected(source.panner(), Endpoint::Node(source.dry_node())));
        assert!(backend.is_connected(source.dry_node(), Endpoint::Destination));
        assert_eq!(backend.number_param(source.dry_node(), "gain"), Some(1.0));

        assert_eq!(source.send_count(), 2);
        for (effect_id, effect_node) in &effects {
            let send = source.send(effect_id).unwrap();
            assert!(backend.is_connected(synth, Endpoint::Node(send.gain)));
            assert!(backend.is_connected(send.gain, Endpoint::Node(*effect_node)));
            assert_eq!(backend.number_param(send.gain, "gain"), Some(0.0));
        }
    }

    #[test]
    fn test_failed_construction_rolls_back() {
        let backend = OfflineBackend::running();
        let effects = vec![effect(&backend, "reverb"), effect(&backend, "delay")];
        let before = backend.node_count();

        // synth, panner, dry, first send succeed; second send fails
        backend.fail_nth_creation(5);
        let result = SoundSource::create(
            &backend,
            "a",
            SynthConfig::defaults(SynthKind::Synth),
            Vec3::ZERO,
            &effects,
        );

        assert!(matches!(result, Err(GraphError::Engine(_))));
        assert_eq!(backend.node_count(), before);
        assert_eq!(backend.edge_count(), 0);
        assert_eq!(backend.dirty_disposals(), 0);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let backend = OfflineBackend::running();
        let result = SoundSource::create(
            &backend,
            "a",
            SynthConfig::defaults(SynthKind::Synth),
            Vec3::new(f64::NAN, 0.0, 0.0),
            &[],
        );
        assert!(matches!(result, Err(GraphError::Core(_))));
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn test_add_and_remove_send() {
        let backend = OfflineBackend::running();
        let mut source = SoundSource::create(
            &backend,
            "a",
            SynthConfig::defaults(SynthKind::Synth),
            Vec3::ZERO,
            &[],
        )
        .unwrap();
        let (effect_id, effect_node) = effect(&backend, "chorus");

        source.add_send(&backend, &effect_id, effect_node).unwrap();
        assert!(source.has_send("chorus"));
        assert_eq!(backend.incoming(effect_node).len(), 1);

        assert!(source.remove_send(&backend, "chorus"));
        assert!(!source.remove_send(&backend, "chorus"));
        assert!(backend.incoming(effect_node).is_empty());
        assert_eq!(backend.dirty_disposals(), 0);
    }

    #[test]
    fn test_dispose_releases_and_cleans_up() {
        let backend = OfflineBackend::running();
        let effects = vec![effect(&backend, "reverb")];
        let mut source = SoundSource::create(
            &backend,
            "a",
            SynthConfig::defaults(SynthKind::PolySynth),
            Vec3::ZERO,
            &effects,
        )
        .unwrap();
        source.play(&backend).unwrap();
        assert!(source.is_playing());

        source.dispose(&backend);
        assert_eq!(backend.node_count(), 1);
        assert_eq!(backend.edge_count(), 0);
        assert_eq!(backend.dirty_disposals(), 0);
    }

    #[test]
    fn test_dispose_continues_past_failures() {
        let backend = OfflineBackend::running();
        let source = SoundSource::create(
            &backend,
            "a",
            SynthConfig::defaults(SynthKind::Synth),
            Vec3::ZERO,
            &[],
        )
        .unwrap();
        backend.fail_disconnect_of(source.panner());
        source.dispose(&backend);
        assert_eq!(backend.node_count(), 0);
    }
}
