//! Applying patches and playback to live synth nodes

use sf_core::{ParamValue, ParameterUpdateResult, RampPolicy, soft_warnings, volume_to_db};

use super::patch::{ENVELOPE_PATHS, FILTER_ENVELOPE_PATHS, MODULATION_ENVELOPE_PATHS};
use super::{Envelope, EnvelopePatch, SynthConfig, SynthKind, SynthPatch, chord_frequencies};
use crate::backend::{AudioBackend, NodeId};
use crate::error::{EngineError, EngineResult};

/// A synth node together with the settings last written to it
#[derive(Debug, Clone, PartialEq)]
pub struct SynthHandle {
    pub node: NodeId,
    pub config: SynthConfig,
    playing: bool,
    active_notes: Vec<f64>,
}

impl SynthHandle {
    pub fn new(node: NodeId, config: SynthConfig) -> Self {
        Self {
            node,
            config,
            playing: false,
            active_notes: Vec::new(),
        }
    }

    pub fn kind(&self) -> SynthKind {
        self.config.kind()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn active_notes(&self) -> &[f64] {
        &self.active_notes
    }

    /// Notes a trigger would start with the current settings
    pub fn notes(&self) -> Vec<f64> {
        match &self.config {
            SynthConfig::NoiseSynth(_) => Vec::new(),
            SynthConfig::PolySynth(s) => chord_frequencies(s.frequency, s.chord, s.max_polyphony),
            other => other.frequency().into_iter().collect(),
        }
    }
}

/// Writes single parameters and records the outcome
struct ParamWriter<'a> {
    backend: &'a dyn AudioBackend,
    node: NodeId,
    ramp: RampPolicy,
    result: &'a mut ParameterUpdateResult,
}

impl ParamWriter<'_> {
    fn record(&mut self, name: &str, outcome: EngineResult<()>) -> bool {
        match outcome {
            Ok(()) => {
                self.result.applied(name);
                true
            }
            Err(e) => {
                log::debug!("Synth {} rejected '{}': {}", self.node, name, e);
                self.result.error(format!("Failed to update {}: {}", name, e));
                false
            }
        }
    }

    /// Smoothed change of a signal parameter
    fn ramp(&mut self, name: &str, path: &str, value: f64) -> bool {
        let outcome = self
            .backend
            .ramp_param(self.node, path, value, self.ramp.ramp_time);
        self.record(name, outcome)
    }

    /// Immediate assignment of a field
    fn set(&mut self, name: &str, path: &str, value: impl Into<ParamValue>) -> bool {
        let outcome = self.backend.set_param(self.node, path, value.into());
        self.record(name, outcome)
    }

    fn volume(&mut self, volume: Option<f64>, target: &mut f64) {
        if let Some(v) = volume
            && self.ramp("volume", "volume", volume_to_db(v))
        {
            *target = v;
        }
    }

    fn envelope(&mut self, paths: [&str; 4], patch: &EnvelopePatch, target: &mut Envelope) {
        let fields = [
            (patch.attack, &mut target.attack),
            (patch.decay, &mut target.decay),
            (patch.sustain, &mut target.sustain),
            (patch.release, &mut target.release),
        ];
        for (path, (value, slot)) in paths.into_iter().zip(fields) {
            if let Some(v) = value
                && self.set(path, path, v)
            {
                *slot = v;
            }
        }
    }
}

/// Ramp a numeric field named like its engine parameter
macro_rules! ramp_field {
    ($w:expr, $patch:expr, $settings:expr, $field:ident) => {
        if let Some(v) = $patch.$field
            && $w.ramp(stringify!($field), stringify!($field), v)
        {
            $settings.$field = v;
        }
    };
    ($w:expr, $patch:expr, $settings:expr, $field:ident, $path:literal) => {
        if let Some(v) = $patch.$field
            && $w.ramp($path, $path, v)
        {
            $settings.$field = v;
        }
    };
}

/// Assign a field immediately
macro_rules! set_field {
    ($w:expr, $patch:expr, $settings:expr, $field:ident, $path:literal) => {
        if let Some(v) = $patch.$field
            && $w.set(stringify!($field), $path, v)
        {
            $settings.$field = v;
        }
    };
}

/// Apply `patch` to the synth behind `handle`
///
/// Every present field is validated first; a single violation, or a patch
/// for a different kind, rejects the whole update before any engine write.
pub fn update_synth(
    handle: &mut SynthHandle,
    patch: &SynthPatch,
    ramp: RampPolicy,
    volume_ceiling: f64,
    backend: &dyn AudioBackend,
) -> ParameterUpdateResult {
    if patch.kind() != handle.kind() {
        return ParameterUpdateResult::rejected(vec![format!(
            "Cannot apply {} parameters to a {} source",
            patch.kind(),
            handle.kind()
        )]);
    }

    let errors = patch.validate();
    if !errors.is_empty() {
        log::debug!("Rejected {} update: {:?}", handle.kind(), errors);
        return ParameterUpdateResult::rejected(errors);
    }

    let mut result = ParameterUpdateResult::new();
    for (name, value) in patch.numeric_entries() {
        if let Some(warning) = soft_warnings(name, value, volume_ceiling) {
            result.warning(warning);
        }
    }

    let node = handle.node;
    let mut regenerate_chord = false;
    {
        let mut w = ParamWriter {
            backend,
            node,
            ramp,
            result: &mut result,
        };

        match (&mut handle.config, patch) {
            (SynthConfig::Synth(s), SynthPatch::Synth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                ramp_field!(w, p, s, detune);
                set_field!(w, p, s, portamento, "portamento");
                if let Some(wave) = p.waveform
                    && w.set("waveform", "oscillator.type", wave.as_str())
                {
                    s.waveform = wave;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::AmSynth(s), SynthPatch::AmSynth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                ramp_field!(w, p, s, detune);
                ramp_field!(w, p, s, harmonicity);
                if let Some(wave) = p.waveform
                    && w.set("waveform", "oscillator.type", wave.as_str())
                {
                    s.waveform = wave;
                }
                if let Some(wave) = p.modulation_waveform
                    && w.set("modulation_waveform", "modulation.type", wave.as_str())
                {
                    s.modulation_waveform = wave;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
                w.envelope(
                    MODULATION_ENVELOPE_PATHS,
                    &p.modulation_envelope,
                    &mut s.modulation_envelope,
                );
            }
            (SynthConfig::FmSynth(s), SynthPatch::FmSynth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                ramp_field!(w, p, s, detune);
                ramp_field!(w, p, s, harmonicity);
                ramp_field!(w, p, s, modulation_index);
                if let Some(wave) = p.waveform
                    && w.set("waveform", "oscillator.type", wave.as_str())
                {
                    s.waveform = wave;
                }
                if let Some(wave) = p.modulation_waveform
                    && w.set("modulation_waveform", "modulation.type", wave.as_str())
                {
                    s.modulation_waveform = wave;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
                w.envelope(
                    MODULATION_ENVELOPE_PATHS,
                    &p.modulation_envelope,
                    &mut s.modulation_envelope,
                );
            }
            (SynthConfig::DuoSynth(s), SynthPatch::DuoSynth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                ramp_field!(w, p, s, harmonicity);
                ramp_field!(w, p, s, vibrato_amount);
                ramp_field!(w, p, s, vibrato_rate);
                if let Some(wave) = p.voice0_waveform
                    && w.set("voice0_waveform", "voice0.oscillator.type", wave.as_str())
                {
                    s.voice0_waveform = wave;
                }
                if let Some(wave) = p.voice1_waveform
                    && w.set("voice1_waveform", "voice1.oscillator.type", wave.as_str())
                {
                    s.voice1_waveform = wave;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::MembraneSynth(s), SynthPatch::MembraneSynth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                set_field!(w, p, s, pitch_decay, "pitch_decay");
                set_field!(w, p, s, octaves, "octaves");
                if let Some(wave) = p.waveform
                    && w.set("waveform", "oscillator.type", wave.as_str())
                {
                    s.waveform = wave;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::MonoSynth(s), SynthPatch::MonoSynth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                ramp_field!(w, p, s, detune);
                ramp_field!(w, p, s, filter_q, "filter.Q");
                ramp_field!(w, p, s, filter_frequency, "filter.frequency");
                if let Some(wave) = p.waveform
                    && w.set("waveform", "oscillator.type", wave.as_str())
                {
                    s.waveform = wave;
                }
                if let Some(filter_type) = p.filter_type
                    && w.set("filter.type", "filter.type", filter_type.as_str())
                {
                    s.filter_type = filter_type;
                }

                let fe = &p.filter_envelope;
                if let Some(v) = fe.base_frequency
                    && w.set(
                        "filter_envelope.base_frequency",
                        "filter_envelope.base_frequency",
                        v,
                    )
                {
                    s.filter_envelope.base_frequency = v;
                }
                if let Some(v) = fe.octaves
                    && w.set("filter_envelope.octaves", "filter_envelope.octaves", v)
                {
                    s.filter_envelope.octaves = v;
                }
                let mut adsr = Envelope::new(
                    s.filter_envelope.attack,
                    s.filter_envelope.decay,
                    s.filter_envelope.sustain,
                    s.filter_envelope.release,
                );
                w.envelope(FILTER_ENVELOPE_PATHS, &fe.adsr(), &mut adsr);
                s.filter_envelope.attack = adsr.attack;
                s.filter_envelope.decay = adsr.decay;
                s.filter_envelope.sustain = adsr.sustain;
                s.filter_envelope.release = adsr.release;

                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::MetalSynth(s), SynthPatch::MetalSynth(p)) => {
                ramp_field!(w, p, s, frequency);
                w.volume(p.volume, &mut s.volume);
                set_field!(w, p, s, harmonicity, "harmonicity");
                set_field!(w, p, s, modulation_index, "modulation_index");
                ramp_field!(w, p, s, resonance);
                set_field!(w, p, s, octaves, "octaves");
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::NoiseSynth(s), SynthPatch::NoiseSynth(p)) => {
                w.volume(p.volume, &mut s.volume);
                if let Some(color) = p.noise
                    && w.set("noise", "noise.type", color.as_str())
                {
                    s.noise = color;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::PluckSynth(s), SynthPatch::PluckSynth(p)) => {
                // Pitch lands on the next pluck
                if let Some(v) = p.frequency {
                    s.frequency = v;
                    w.result.applied("frequency");
                }
                w.volume(p.volume, &mut s.volume);
                set_field!(w, p, s, attack_noise, "attack_noise");
                ramp_field!(w, p, s, dampening);
                set_field!(w, p, s, resonance, "resonance");
            }
            (SynthConfig::PolySynth(s), SynthPatch::PolySynth(p)) => {
                if let Some(v) = p.frequency {
                    s.frequency = v;
                    w.result.applied("frequency");
                    regenerate_chord = true;
                }
                if let Some(shape) = p.chord {
                    s.chord = shape;
                    w.result.applied("chord");
                    regenerate_chord = true;
                }
                if let Some(n) = p.max_polyphony
                    && w.set("max_polyphony", "max_polyphony", n as f64)
                {
                    s.max_polyphony = n;
                    regenerate_chord = true;
                }
                w.volume(p.volume, &mut s.volume);
                ramp_field!(w, p, s, detune);
                if let Some(wave) = p.waveform
                    && w.set("waveform", "oscillator.type", wave.as_str())
                {
                    s.waveform = wave;
                }
                w.envelope(ENVELOPE_PATHS, &p.envelope, &mut s.envelope);
            }
            (SynthConfig::Sampler(s), SynthPatch::Sampler(p)) => {
                if let Some(v) = p.frequency {
                    s.frequency = v;
                    w.result.applied("frequency");
                    regenerate_chord = true;
                }
                w.volume(p.volume, &mut s.volume);
                set_field!(w, p, s, attack, "attack");
                set_field!(w, p, s, release, "release");
                if let Some(set) = &p.sample_set
                    && w.set("sample_set", "sample_set", set.as_str())
                {
                    s.sample_set = set.clone();
                }
            }
            (config, patch) => {
                w.result.error(format!(
                    "Cannot apply {} parameters to a {} source",
                    patch.kind(),
                    config.kind()
                ));
            }
        }
    }

    if regenerate_chord && handle.playing {
        retrigger(handle, backend, &mut result);
    }

    result
}

/// Release whatever is sounding and start the current notes again
fn retrigger(
    handle: &mut SynthHandle,
    backend: &dyn AudioBackend,
    result: &mut ParameterUpdateResult,
) {
    if let Err(e) = backend.release_all(handle.node) {
        result.error(format!("Failed to release voices: {}", e));
        return;
    }
    handle.active_notes.clear();
    handle.playing = false;

    let notes = handle.notes();
    match backend.trigger_attack(handle.node, &notes) {
        Ok(()) => {
            log::debug!("Retriggered {} with {:?}", handle.node, notes);
            handle.active_notes = notes;
            handle.playing = true;
        }
        Err(e) => result.error(format!("Failed to retrigger voices: {}", e)),
    }
}

/// Start the synth with its current settings
pub fn trigger(handle: &mut SynthHandle, backend: &dyn AudioBackend) -> EngineResult<()> {
    if handle.playing {
        return Ok(());
    }
    let notes = handle.notes();
    backend.trigger_attack(handle.node, &notes)?;
    handle.active_notes = notes;
    handle.playing = true;
    Ok(())
}

/// Release every note the synth is holding
pub fn release(handle: &mut SynthHandle, backend: &dyn AudioBackend) -> EngineResult<()> {
    if !handle.playing {
        return Ok(());
    }
    let outcome = match handle.kind() {
        SynthKind::PolySynth => backend.release_all(handle.node),
        _ => backend.trigger_release(handle.node, &handle.active_notes),
    };
    match outcome {
        // A node the engine already dropped is silent either way
        Ok(()) | Err(EngineError::NodeNotFound(_)) => {
            handle.active_notes.clear();
            handle.playing = false;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
