//! Audio engine boundary
//!
//! SpatialForge never renders audio itself. Every oscillator, filter, panner
//! and gain stage lives inside an external synthesis engine and is reached
//! through an opaque [`NodeId`]. The [`AudioBackend`] trait is the whole
//! contract with that engine.

mod offline;

pub use offline::{EngineEvent, OfflineBackend, OfflineNode};

use std::fmt;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sf_core::{Listener, ParamValue, Vec3};

use crate::context::ContextState;
use crate::effects::EffectConfig;
use crate::error::EngineResult;
use crate::synth::{SynthConfig, Waveform};

/// Opaque handle to a node owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Node(NodeId),
    /// The engine's master output
    Destination,
}

/// Spatialization model of a 3D panner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanningModel {
    #[default]
    Hrtf,
    EqualPower,
}

/// Distance attenuation curve of a 3D panner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceModel {
    Linear,
    #[default]
    Inverse,
    Exponential,
}

/// 3D panner construction settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PannerSettings {
    pub position: Vec3,
    pub panning_model: PanningModel,
    pub distance_model: DistanceModel,
    pub ref_distance: f64,
    pub max_distance: f64,
    pub rolloff_factor: f64,
}

impl PannerSettings {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

impl Default for PannerSettings {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            panning_model: PanningModel::Hrtf,
            distance_model: DistanceModel::Inverse,
            ref_distance: 1.0,
            max_distance: 10_000.0,
            rolloff_factor: 1.0,
        }
    }
}

/// Everything the engine needs to instantiate a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    Synth(SynthConfig),
    Effect(EffectConfig),
    Panner(PannerSettings),
    Gain { gain: f64 },
    Oscillator {
        frequency: f64,
        waveform: Waveform,
        volume_db: f64,
    },
}

impl NodeSpec {
    /// Short label used in logs and engine traces
    pub fn label(&self) -> String {
        match self {
            Self::Synth(config) => format!("synth:{}", config.kind()),
            Self::Effect(config) => format!("effect:{}", config.effect_type()),
            Self::Panner(_) => "panner".to_string(),
            Self::Gain { .. } => "gain".to_string(),
            Self::Oscillator { .. } => "oscillator".to_string(),
        }
    }
}

/// Contract with the external synthesis engine
///
/// All methods take `&self`; implementations use interior mutability so a
/// single backend can be shared as `Arc<dyn AudioBackend>`.
pub trait AudioBackend: Send + Sync {
    // ── Graph ────────────────────────────────────────────────────────────
    fn create_node(&self, spec: &NodeSpec) -> EngineResult<NodeId>;
    fn connect(&self, from: NodeId, to: Endpoint) -> EngineResult<()>;
    /// Remove every outgoing connection of `node`
    fn disconnect(&self, node: NodeId) -> EngineResult<()>;
    /// Remove the single connection `from -> to`
    fn disconnect_from(&self, from: NodeId, to: Endpoint) -> EngineResult<()>;
    fn dispose(&self, node: NodeId) -> EngineResult<()>;

    // ── Parameters ───────────────────────────────────────────────────────
    /// Smoothly move a signal parameter to `value` over `ramp_time` seconds
    fn ramp_param(&self, node: NodeId, param: &str, value: f64, ramp_time: f64)
    -> EngineResult<()>;
    /// Schedule a value change `delay` seconds from now
    fn set_param_at(&self, node: NodeId, param: &str, value: f64, delay: f64) -> EngineResult<()>;
    /// Assign a value immediately
    fn set_param(&self, node: NodeId, param: &str, value: ParamValue) -> EngineResult<()>;
    fn set_position(&self, node: NodeId, position: Vec3, ramp_time: f64) -> EngineResult<()>;
    /// Apply position and orientation of the listener in one step
    fn set_listener(&self, listener: &Listener) -> EngineResult<()>;

    // ── Playback ─────────────────────────────────────────────────────────
    /// Start notes; unpitched sources pass an empty slice
    fn trigger_attack(&self, node: NodeId, notes: &[f64]) -> EngineResult<()>;
    fn trigger_release(&self, node: NodeId, notes: &[f64]) -> EngineResult<()>;
    fn release_all(&self, node: NodeId) -> EngineResult<()>;
    fn start_node(&self, node: NodeId) -> EngineResult<()>;
    fn stop_node(&self, node: NodeId) -> EngineResult<()>;

    // ── Context ──────────────────────────────────────────────────────────
    fn context_state(&self) -> ContextState;
    /// Unlock/resume audio; may wait for an external gesture
    fn resume(&self) -> BoxFuture<'_, EngineResult<()>>;
    fn suspend(&self) -> EngineResult<()>;
    fn close(&self) -> EngineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_labels() {
        assert_eq!(NodeSpec::Gain { gain: 1.0 }.label(), "gain");
        assert_eq!(
            NodeSpec::Panner(PannerSettings::default()).label(),
            "panner"
        );
        assert_eq!(format!("{}", NodeId(7)), "#7");
    }

    #[test]
    fn test_panner_defaults() {
        let p = PannerSettings::at(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.panning_model, PanningModel::Hrtf);
        assert_eq!(p.ref_distance, 1.0);
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
