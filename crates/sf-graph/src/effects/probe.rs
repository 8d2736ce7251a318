//! Diagnostic probe tones
//!
//! A probe is a quiet oscillator wired straight into an effect so the effect
//! is audible before any source reaches its zone.

use serde::{Deserialize, Serialize};
use sf_core::{RampPolicy, volume_to_db};

use crate::backend::{AudioBackend, Endpoint, NodeId, NodeSpec};
use crate::error::EngineResult;
use crate::synth::Waveform;

/// Ratio the probe jumps to before sweeping back on refresh
pub const PROBE_SWEEP_RATIO: f64 = 1.5;

/// Tone parameters of one effect type's probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub frequency: f64,
    pub waveform: Waveform,
    /// Linear level, 0-1
    pub level: f64,
}

impl ProbeSpec {
    pub const fn new(frequency: f64, waveform: Waveform, level: f64) -> Self {
        Self {
            frequency,
            waveform,
            level,
        }
    }
}

/// A live probe oscillator
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeTone {
    pub node: NodeId,
    pub spec: ProbeSpec,
    silenced: bool,
}

impl ProbeTone {
    /// Create the oscillator, feed it into `effect` and start it
    pub fn create(
        backend: &dyn AudioBackend,
        effect: NodeId,
        spec: ProbeSpec,
    ) -> EngineResult<Self> {
        let node = backend.create_node(&NodeSpec::Oscillator {
            frequency: spec.frequency,
            waveform: spec.waveform,
            volume_db: volume_to_db(spec.level),
        })?;

        let wired = backend
            .connect(node, Endpoint::Node(effect))
            .and_then(|()| backend.start_node(node));
        if let Err(e) = wired {
            let _ = backend.disconnect(node);
            if let Err(dispose_err) = backend.dispose(node) {
                log::warn!("Failed to dispose probe {}: {}", node, dispose_err);
            }
            return Err(e);
        }

        log::debug!(
            "Probe {} at {:.1} Hz feeding effect {}",
            node,
            spec.frequency,
            effect
        );
        Ok(Self {
            node,
            spec,
            silenced: false,
        })
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// Jump to `PROBE_SWEEP_RATIO` times the base pitch and ramp back
    pub fn refresh(&self, backend: &dyn AudioBackend, ramp: RampPolicy) -> EngineResult<()> {
        if self.silenced {
            return Ok(());
        }
        let base = self.spec.frequency;
        backend.set_param(self.node, "frequency", (base * PROBE_SWEEP_RATIO).into())?;
        backend.ramp_param(self.node, "frequency", base, ramp.ramp_time)
    }

    /// Stop the oscillator without tearing it down
    pub fn silence(&mut self, backend: &dyn AudioBackend) -> EngineResult<()> {
        if self.silenced {
            return Ok(());
        }
        backend.stop_node(self.node)?;
        self.silenced = true;
        Ok(())
    }

    /// Restart a silenced probe
    pub fn unsilence(&mut self, backend: &dyn AudioBackend) -> EngineResult<()> {
        if !self.silenced {
            return Ok(());
        }
        backend.start_node(self.node)?;
        self.silenced = false;
        Ok(())
    }

    /// Stop, disconnect and dispose; failures are logged and skipped
    pub fn dispose(self, backend: &dyn AudioBackend) {
        if !self.silenced
            && let Err(e) = backend.stop_node(self.node)
        {
            log::warn!("Failed to stop probe {}: {}", self.node, e);
        }
        if let Err(e) = backend.disconnect(self.node) {
            log::warn!("Failed to disconnect probe {}: {}", self.node, e);
        }
        if let Err(e) = backend.dispose(self.node) {
            log::warn!("Failed to dispose probe {}: {}", self.node, e);
        }
    }
}
