//! Global effects and their zones of influence

use serde::{Deserialize, Serialize};
use sf_core::{CoreError, ParameterUpdateResult, RampPolicy, Vec3};

use crate::backend::{AudioBackend, Endpoint, NodeId, NodeSpec, PannerSettings};
use crate::effects::{EffectConfig, EffectPatch, EffectType, ProbeSpec, ProbeTone, update_effect};
use crate::error::{EngineResult, GraphError, GraphResult};
use crate::source::teardown;

/// Geometry of one effect zone, as seen by the mixing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub position: Vec3,
    pub radius: f64,
}

fn check_radius(radius: f64) -> GraphResult<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidParam(format!("zone radius must be positive, got {}", radius)).into())
    }
}

/// A shared effect processor placed in the scene
#[derive(Debug, Clone)]
pub struct GlobalEffect {
    id: String,
    node: NodeId,
    panner: NodeId,
    position: Vec3,
    radius: f64,
    config: EffectConfig,
    probe: Option<ProbeTone>,
}

impl GlobalEffect {
    /// Build `effect -> panner -> destination`, plus a probe tone when
    /// `probe` is given
    ///
    /// A failing probe is logged and left out; the effect itself is
    /// created atomically.
    pub fn create(
        backend: &dyn AudioBackend,
        id: impl Into<String>,
        config: EffectConfig,
        position: Vec3,
        radius: f64,
        probe: Option<ProbeSpec>,
    ) -> GraphResult<Self> {
        let id = id.into();
        check_radius(radius)?;
        if !position.is_finite() {
            return Err(CoreError::InvalidPosition(format!("effect '{}' at {:?}", id, position)).into());
        }

        let mut created = Vec::new();
        let built = Self::build(backend, &config, position, &mut created);
        let (node, panner) = match built {
            Ok(nodes) => nodes,
            Err(e) => {
                log::warn!("Rolling back effect '{}': {}", id, e);
                teardown(backend, &created);
                return Err(e.into());
            }
        };

        let probe = probe.and_then(|spec| match ProbeTone::create(backend, node, spec) {
            Ok(probe) => Some(probe),
            Err(e) => {
                log::warn!("Effect '{}' created without probe tone: {}", id, e);
                None
            }
        });

        log::debug!(
            "Created {} effect '{}' at {:?} (radius {})",
            config.effect_type(),
            id,
            position,
            radius
        );
        Ok(Self {
            id,
            node,
            panner,
            position,
            radius,
            config,
            probe,
        })
    }

    fn build(
        backend: &dyn AudioBackend,
        config: &EffectConfig,
        position: Vec3,
        created: &mut Vec<NodeId>,
    ) -> EngineResult<(NodeId, NodeId)> {
        let node = backend.create_node(&NodeSpec::Effect(config.clone()))?;
        created.push(node);
        let panner = backend.create_node(&NodeSpec::Panner(PannerSettings::at(position)))?;
        created.push(panner);
        backend.connect(node, Endpoint::Node(panner))?;
        backend.connect(panner, Endpoint::Destination)?;
        Ok((node, panner))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn panner(&self) -> NodeId {
        self.panner
    }

    pub fn effect_type(&self) -> EffectType {
        self.config.effect_type()
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn probe(&self) -> Option<&ProbeTone> {
        self.probe.as_ref()
    }

    pub fn zone(&self) -> Zone {
        Zone {
            id: self.id.clone(),
            position: self.position,
            radius: self.radius,
        }
    }

    pub fn set_position(
        &mut self,
        backend: &dyn AudioBackend,
        position: Vec3,
        ramp: RampPolicy,
    ) -> GraphResult<()> {
        if !position.is_finite() {
            return Err(CoreError::InvalidPosition(format!("{:?}", position)).into());
        }
        backend.set_position(self.panner, position, ramp.ramp_time)?;
        self.position = position;
        Ok(())
    }

    pub fn set_radius(&mut self, radius: f64) -> GraphResult<()> {
        check_radius(radius)?;
        self.radius = radius;
        Ok(())
    }

    /// Apply a typed patch; re-sweeps the probe for effects that need it
    pub fn update(
        &mut self,
        backend: &dyn AudioBackend,
        patch: &EffectPatch,
        ramp: RampPolicy,
    ) -> ParameterUpdateResult {
        let result = update_effect(self.node, &mut self.config, patch, ramp, backend);
        if !result.updated_params.is_empty() && self.effect_type().needs_probe_refresh() {
            self.refresh_probe(backend, ramp);
        }
        result
    }

    /// Re-sweep the probe tone; `false` without a probe or on engine error
    pub fn refresh_probe(&self, backend: &dyn AudioBackend, ramp: RampPolicy) -> bool {
        let Some(probe) = &self.probe else {
            return false;
        };
        match probe.refresh(backend, ramp) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to refresh probe of '{}': {}", self.id, e);
                false
            }
        }
    }

    pub fn silence_probe(&mut self, backend: &dyn AudioBackend) {
        if let Some(probe) = &mut self.probe
            && let Err(e) = probe.silence(backend)
        {
            log::warn!("Failed to silence probe of '{}': {}", self.id, e);
        }
    }

    pub fn unsilence_probe(&mut self, backend: &dyn AudioBackend) {
        if let Some(probe) = &mut self.probe
            && let Err(e) = probe.unsilence(backend)
        {
            log::warn!("Failed to restart probe of '{}': {}", self.id, e);
        }
    }

    /// Dispose the probe first, then the effect and its panner
    pub fn dispose(self, backend: &dyn AudioBackend) {
        if let Some(probe) = self.probe {
            probe.dispose(backend);
        }
        teardown(backend, &[self.node, self.panner]);
        log::debug!("Disposed effect '{}'", self.id);
    }
}

/// Insertion-ordered set of live global effects
#[derive(Debug, Clone, Default)]
pub struct EffectZoneManager {
    effects: Vec<GlobalEffect>,
}

impl EffectZoneManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.iter().any(|e| e.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&GlobalEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GlobalEffect> {
        self.effects.iter_mut().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlobalEffect> {
        self.effects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GlobalEffect> {
        self.effects.iter_mut()
    }

    /// Zone geometry in insertion order
    pub fn zones(&self) -> Vec<Zone> {
        self.effects.iter().map(GlobalEffect::zone).collect()
    }

    /// `(effect id, effect node)` pairs a new source must send into
    pub fn send_targets(&self) -> Vec<(String, NodeId)> {
        self.effects
            .iter()
            .map(|e| (e.id.clone(), e.node))
            .collect()
    }

    /// Build a global effect and register it
    pub fn create_global_effect(
        &mut self,
        backend: &dyn AudioBackend,
        id: &str,
        config: EffectConfig,
        position: Vec3,
        radius: f64,
        probe: Option<ProbeSpec>,
    ) -> GraphResult<&GlobalEffect> {
        if self.contains(id) {
            return Err(GraphError::DuplicateEffect(id.to_string()));
        }
        let effect = GlobalEffect::create(backend, id, config, position, radius, probe)?;
        self.effects.push(effect);
        Ok(&self.effects[self.effects.len() - 1])
    }

    pub fn update_effect_zone_position(
        &mut self,
        backend: &dyn AudioBackend,
        id: &str,
        position: Vec3,
        ramp: RampPolicy,
    ) -> GraphResult<()> {
        self.get_mut(id)
            .ok_or_else(|| GraphError::EffectNotFound(id.to_string()))?
            .set_position(backend, position, ramp)
    }

    pub fn set_effect_zone_radius(&mut self, id: &str, radius: f64) -> GraphResult<()> {
        self.get_mut(id)
            .ok_or_else(|| GraphError::EffectNotFound(id.to_string()))?
            .set_radius(radius)
    }

    /// Unregister an effect, handing it back for teardown
    ///
    /// Sends into the effect must be severed before it is disposed.
    pub fn take(&mut self, id: &str) -> Option<GlobalEffect> {
        let index = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::effects::{PitchShiftPatch, ReverbPatch};
    use crate::synth::Waveform;

    const PROBE: ProbeSpec = ProbeSpec::new(220.0, Waveform::Sine, 0.2);

    fn manager_with(backend: &OfflineBackend, ids: &[&str]) -> EffectZoneManager {
        let mut zones = EffectZoneManager::new();
        for (i, id) in ids.iter().enumerate() {
            zones
                .create_global_effect(
                    backend,
                    id,
                    EffectConfig::defaults(EffectType::Reverb),
                    Vec3::new(i as f64, 0.0, 0.0),
                    2.0,
                    Some(PROBE),
                )
                .unwrap();
        }
        zones
    }

    #[test]
    fn test_effect_wiring() {
        let backend = OfflineBackend::running();
        let zones = manager_with(&backend, &["verb"]);
        let effect = zones.get("verb").unwrap();

        assert!(backend.is_connected(effect.node(), Endpoint::Node(effect.panner())));
        assert!(backend.is_connected(effect.panner(), Endpoint::Destination));
        let probe = effect.probe().unwrap();
        assert!(backend.is_connected(probe.node, Endpoint::Node(effect.node())));
        assert_eq!(effect.radius(), 2.0);
    }

    #[test]
    fn test_insertion_order_and_duplicates() {
        let backend = OfflineBackend::running();
        let mut zones = manager_with(&backend, &["c", "a", "b"]);
        let ids: Vec<_> = zones.zones().into_iter().map(|z| z.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let dup = zones.create_global_effect(
            &backend,
            "a",
            EffectConfig::defaults(EffectType::Chorus),
            Vec3::ZERO,
            2.0,
            None,
        );
        assert!(matches!(dup, Err(GraphError::DuplicateEffect(_))));
    }

    #[test]
    fn test_radius_validation() {
        let backend = OfflineBackend::running();
        let mut zones = manager_with(&backend, &["verb"]);
        assert!(zones.set_effect_zone_radius("verb", 0.0).is_err());
        assert!(zones.set_effect_zone_radius("verb", -1.0).is_err());
        assert!(zones.set_effect_zone_radius("verb", f64::INFINITY).is_err());
        assert!(zones.set_effect_zone_radius("verb", 3.5).is_ok());
        assert_eq!(zones.get("verb").unwrap().radius(), 3.5);
        assert!(matches!(
            zones.set_effect_zone_radius("missing", 1.0),
            Err(GraphError::EffectNotFound(_))
        ));
    }

    #[test]
    fn test_position_moves_panner() {
        let backend = OfflineBackend::running();
        let mut zones = manager_with(&backend, &["verb"]);
        let target = Vec3::new(4.0, 1.0, -2.0);
        zones
            .update_effect_zone_position(&backend, "verb", target, RampPolicy::default())
            .unwrap();
        let effect = zones.get("verb").unwrap();
        assert_eq!(effect.position(), target);
        assert_eq!(backend.node(effect.panner()).unwrap().position, Some(target));
    }

    #[test]
    fn test_update_refreshes_probe_for_reverb() {
        let backend = OfflineBackend::running();
        let mut zones = manager_with(&backend, &["verb"]);
        let effect = zones.get_mut("verb").unwrap();
        let probe_node = effect.probe().unwrap().node;
        backend.clear_events();

        let patch = EffectPatch::Reverb(ReverbPatch {
            wet: Some(0.9),
            ..Default::default()
        });
        assert!(effect.update(&backend, &patch, RampPolicy::default()).success);
        assert_eq!(backend.number_param(probe_node, "frequency"), Some(220.0));
        assert!(
            backend
                .events()
                .iter()
                .any(|e| matches!(e, crate::backend::EngineEvent::Set { node, .. } if *node == probe_node))
        );
    }

    #[test]
    fn test_mismatched_patch_does_not_refresh() {
        let backend = OfflineBackend::running();
        let mut zones = manager_with(&backend, &["verb"]);
        backend.clear_events();
        let patch = EffectPatch::PitchShift(PitchShiftPatch {
            pitch: Some(3.0),
            ..Default::default()
        });
        let result = zones
            .get_mut("verb")
            .unwrap()
            .update(&backend, &patch, RampPolicy::default());
        assert!(!result.success);
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_dispose_leaves_no_nodes() {
        let backend = OfflineBackend::running();
        let mut zones = manager_with(&backend, &["verb"]);
        let effect = zones.take("verb").unwrap();
        effect.dispose(&backend);
        assert!(zones.is_empty());
        assert_eq!(backend.node_count(), 0);
        assert_eq!(backend.dirty_disposals(), 0);
    }
}
