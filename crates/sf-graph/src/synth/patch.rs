//! Partial synth updates and their validation bounds
//!
//! Every numeric patch entry is named by the engine parameter it drives
//! (`"frequency"`, `"envelope.attack"`, `"filter.Q"` ...). The same names key
//! the per-kind [`ParamBounds`], so validation and dispatch agree by
//! construction.

use serde::{Deserialize, Serialize};
use sf_core::{
    DETUNE_RANGE, ENVELOPE_TIME_RANGE, FREQUENCY_RANGE, HARMONICITY_RANGE, LFO_RATE_RANGE,
    MODULATION_INDEX_RANGE, OCTAVES_RANGE, ParamBounds, ParamRange, Q_RANGE, UNIT_RANGE,
    VOLUME_RANGE,
};

use super::{ChordShape, EnvelopePatch, FilterType, NoiseColor, SynthKind, Waveform};

/// Decay may collapse to zero, unlike attack and release
const DECAY_RANGE: ParamRange = ParamRange::new(0.0, 10.0);
const PORTAMENTO_RANGE: ParamRange = ParamRange::new(0.0, 5.0);
const PITCH_DECAY_RANGE: ParamRange = ParamRange::new(0.0, 0.5);
const POLYPHONY_RANGE: ParamRange = ParamRange::new(1.0, 32.0);
const SAMPLE_FADE_RANGE: ParamRange = ParamRange::new(0.0, 10.0);

pub(crate) const ENVELOPE_PATHS: [&str; 4] = [
    "envelope.attack",
    "envelope.decay",
    "envelope.sustain",
    "envelope.release",
];

pub(crate) const MODULATION_ENVELOPE_PATHS: [&str; 4] = [
    "modulation_envelope.attack",
    "modulation_envelope.decay",
    "modulation_envelope.sustain",
    "modulation_envelope.release",
];

pub(crate) const FILTER_ENVELOPE_PATHS: [&str; 4] = [
    "filter_envelope.attack",
    "filter_envelope.decay",
    "filter_envelope.sustain",
    "filter_envelope.release",
];

fn with_envelope(bounds: ParamBounds, paths: [&'static str; 4]) -> ParamBounds {
    bounds
        .with(paths[0], ENVELOPE_TIME_RANGE)
        .with(paths[1], DECAY_RANGE)
        .with(paths[2], UNIT_RANGE)
        .with(paths[3], ENVELOPE_TIME_RANGE)
}

fn push_envelope(
    entries: &mut Vec<(&'static str, f64)>,
    paths: [&'static str; 4],
    patch: &EnvelopePatch,
) {
    let values = [patch.attack, patch.decay, patch.sustain, patch.release];
    for (path, value) in paths.into_iter().zip(values) {
        if let Some(v) = value {
            entries.push((path, v));
        }
    }
}

fn push(entries: &mut Vec<(&'static str, f64)>, name: &'static str, value: Option<f64>) {
    if let Some(v) = value {
        entries.push((name, v));
    }
}

impl SynthKind {
    /// Accepted range of every numeric parameter of this kind
    pub fn bounds(&self) -> ParamBounds {
        let base = ParamBounds::new().with("volume", VOLUME_RANGE);
        match self {
            Self::Synth => with_envelope(
                base.with("frequency", FREQUENCY_RANGE)
                    .with("detune", DETUNE_RANGE)
                    .with("portamento", PORTAMENTO_RANGE),
                ENVELOPE_PATHS,
            ),
            Self::AmSynth => with_envelope(
                with_envelope(
                    base.with("frequency", FREQUENCY_RANGE)
                        .with("detune", DETUNE_RANGE)
                        .with("harmonicity", HARMONICITY_RANGE),
                    ENVELOPE_PATHS,
                ),
                MODULATION_ENVELOPE_PATHS,
            ),
            Self::FmSynth => with_envelope(
                with_envelope(
                    base.with("frequency", FREQUENCY_RANGE)
                        .with("detune", DETUNE_RANGE)
                        .with("harmonicity", HARMONICITY_RANGE)
                        .with("modulation_index", MODULATION_INDEX_RANGE),
                    ENVELOPE_PATHS,
                ),
                MODULATION_ENVELOPE_PATHS,
            ),
            Self::DuoSynth => with_envelope(
                base.with("frequency", FREQUENCY_RANGE)
                    .with("harmonicity", HARMONICITY_RANGE)
                    .with("vibrato_amount", UNIT_RANGE)
                    .with("vibrato_rate", LFO_RATE_RANGE),
                ENVELOPE_PATHS,
            ),
            Self::MembraneSynth => with_envelope(
                base.with("frequency", FREQUENCY_RANGE)
                    .with("pitch_decay", PITCH_DECAY_RANGE)
                    .with("octaves", OCTAVES_RANGE),
                ENVELOPE_PATHS,
            ),
            Self::MonoSynth => with_envelope(
                with_envelope(
                    base.with("frequency", FREQUENCY_RANGE)
                        .with("detune", DETUNE_RANGE)
                        .with("filter.Q", Q_RANGE)
                        .with("filter.frequency", FREQUENCY_RANGE)
                        .with("filter_envelope.base_frequency", FREQUENCY_RANGE)
                        .with("filter_envelope.octaves", OCTAVES_RANGE),
                    ENVELOPE_PATHS,
                ),
                FILTER_ENVELOPE_PATHS,
            ),
            Self::MetalSynth => with_envelope(
                base.with("frequency", FREQUENCY_RANGE)
                    .with("harmonicity", HARMONICITY_RANGE)
                    .with("modulation_index", MODULATION_INDEX_RANGE)
                    .with("resonance", FREQUENCY_RANGE)
                    .with("octaves", OCTAVES_RANGE),
                ENVELOPE_PATHS,
            ),
            Self::NoiseSynth => with_envelope(base, ENVELOPE_PATHS),
            Self::PluckSynth => base
                .with("frequency", FREQUENCY_RANGE)
                .with("attack_noise", ParamRange::new(0.1, 20.0))
                .with("dampening", FREQUENCY_RANGE)
                .with("resonance", UNIT_RANGE),
            Self::PolySynth => with_envelope(
                base.with("frequency", FREQUENCY_RANGE)
                    .with("detune", DETUNE_RANGE)
                    .with("max_polyphony", POLYPHONY_RANGE),
                ENVELOPE_PATHS,
            ),
            Self::Sampler => base
                .with("frequency", FREQUENCY_RANGE)
                .with("attack", SAMPLE_FADE_RANGE)
                .with("release", SAMPLE_FADE_RANGE),
        }
    }
}

/// Whether `value` is acceptable for parameter `name` of a `kind` synth
pub fn validate_synth_param(kind: SynthKind, name: &str, value: f64) -> bool {
    kind.bounds().validate(name, value)
}

// ═══════════════════════════════════════════════════════════════════════════
// PATCHES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub detune: Option<f64>,
    pub portamento: Option<f64>,
    pub waveform: Option<Waveform>,
    pub envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub detune: Option<f64>,
    pub harmonicity: Option<f64>,
    pub waveform: Option<Waveform>,
    pub modulation_waveform: Option<Waveform>,
    pub envelope: EnvelopePatch,
    pub modulation_envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub detune: Option<f64>,
    pub harmonicity: Option<f64>,
    pub modulation_index: Option<f64>,
    pub waveform: Option<Waveform>,
    pub modulation_waveform: Option<Waveform>,
    pub envelope: EnvelopePatch,
    pub modulation_envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub harmonicity: Option<f64>,
    pub vibrato_amount: Option<f64>,
    pub vibrato_rate: Option<f64>,
    pub voice0_waveform: Option<Waveform>,
    pub voice1_waveform: Option<Waveform>,
    pub envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembraneSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub pitch_decay: Option<f64>,
    pub octaves: Option<f64>,
    pub waveform: Option<Waveform>,
    pub envelope: EnvelopePatch,
}

/// Partial filter-envelope change
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEnvelopePatch {
    pub base_frequency: Option<f64>,
    pub octaves: Option<f64>,
    pub attack: Option<f64>,
    pub decay: Option<f64>,
    pub sustain: Option<f64>,
    pub release: Option<f64>,
}

impl FilterEnvelopePatch {
    /// ADSR part as a plain envelope patch
    pub fn adsr(&self) -> EnvelopePatch {
        EnvelopePatch {
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub detune: Option<f64>,
    pub waveform: Option<Waveform>,
    pub filter_type: Option<FilterType>,
    pub filter_q: Option<f64>,
    pub filter_frequency: Option<f64>,
    pub filter_envelope: FilterEnvelopePatch,
    pub envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub harmonicity: Option<f64>,
    pub modulation_index: Option<f64>,
    pub resonance: Option<f64>,
    pub octaves: Option<f64>,
    pub envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSynthPatch {
    pub volume: Option<f64>,
    pub noise: Option<NoiseColor>,
    pub envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluckSynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub attack_noise: Option<f64>,
    pub dampening: Option<f64>,
    pub resonance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolySynthPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub detune: Option<f64>,
    pub waveform: Option<Waveform>,
    pub chord: Option<ChordShape>,
    pub max_polyphony: Option<usize>,
    pub envelope: EnvelopePatch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerPatch {
    pub frequency: Option<f64>,
    pub volume: Option<f64>,
    pub attack: Option<f64>,
    pub release: Option<f64>,
    pub sample_set: Option<String>,
}

/// Partial parameter change for one synth kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthPatch {
    Synth(SimpleSynthPatch),
    AmSynth(AmSynthPatch),
    FmSynth(FmSynthPatch),
    DuoSynth(DuoSynthPatch),
    MembraneSynth(MembraneSynthPatch),
    MonoSynth(MonoSynthPatch),
    MetalSynth(MetalSynthPatch),
    NoiseSynth(NoiseSynthPatch),
    PluckSynth(PluckSynthPatch),
    PolySynth(PolySynthPatch),
    Sampler(SamplerPatch),
}

impl SynthPatch {
    pub fn kind(&self) -> SynthKind {
        match self {
            Self::Synth(_) => SynthKind::Synth,
            Self::AmSynth(_) => SynthKind::AmSynth,
            Self::FmSynth(_) => SynthKind::FmSynth,
            Self::DuoSynth(_) => SynthKind::DuoSynth,
            Self::MembraneSynth(_) => SynthKind::MembraneSynth,
            Self::MonoSynth(_) => SynthKind::MonoSynth,
            Self::MetalSynth(_) => SynthKind::MetalSynth,
            Self::NoiseSynth(_) => SynthKind::NoiseSynth,
            Self::PluckSynth(_) => SynthKind::PluckSynth,
            Self::PolySynth(_) => SynthKind::PolySynth,
            Self::Sampler(_) => SynthKind::Sampler,
        }
    }

    /// Patch that only changes the volume, for any kind
    pub fn volume(kind: SynthKind, volume: f64) -> Self {
        let v = Some(volume);
        match kind {
            SynthKind::Synth => Self::Synth(SimpleSynthPatch { volume: v, ..Default::default() }),
            SynthKind::AmSynth => Self::AmSynth(AmSynthPatch { volume: v, ..Default::default() }),
            SynthKind::FmSynth => Self::FmSynth(FmSynthPatch { volume: v, ..Default::default() }),
            SynthKind::DuoSynth => {
                Self::DuoSynth(DuoSynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::MembraneSynth => {
                Self::MembraneSynth(MembraneSynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::MonoSynth => {
                Self::MonoSynth(MonoSynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::MetalSynth => {
                Self::MetalSynth(MetalSynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::NoiseSynth => {
                Self::NoiseSynth(NoiseSynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::PluckSynth => {
                Self::PluckSynth(PluckSynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::PolySynth => {
                Self::PolySynth(PolySynthPatch { volume: v, ..Default::default() })
            }
            SynthKind::Sampler => Self::Sampler(SamplerPatch { volume: v, ..Default::default() }),
        }
    }

    /// Every numeric value present in the patch, keyed by parameter name
    pub fn numeric_entries(&self) -> Vec<(&'static str, f64)> {
        let mut e = Vec::new();
        match self {
            Self::Synth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "detune", p.detune);
                push(&mut e, "portamento", p.portamento);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::AmSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "detune", p.detune);
                push(&mut e, "harmonicity", p.harmonicity);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
                push_envelope(&mut e, MODULATION_ENVELOPE_PATHS, &p.modulation_envelope);
            }
            Self::FmSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "detune", p.detune);
                push(&mut e, "harmonicity", p.harmonicity);
                push(&mut e, "modulation_index", p.modulation_index);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
                push_envelope(&mut e, MODULATION_ENVELOPE_PATHS, &p.modulation_envelope);
            }
            Self::DuoSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "harmonicity", p.harmonicity);
                push(&mut e, "vibrato_amount", p.vibrato_amount);
                push(&mut e, "vibrato_rate", p.vibrato_rate);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::MembraneSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "pitch_decay", p.pitch_decay);
                push(&mut e, "octaves", p.octaves);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::MonoSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "detune", p.detune);
                push(&mut e, "filter.Q", p.filter_q);
                push(&mut e, "filter.frequency", p.filter_frequency);
                push(
                    &mut e,
                    "filter_envelope.base_frequency",
                    p.filter_envelope.base_frequency,
                );
                push(&mut e, "filter_envelope.octaves", p.filter_envelope.octaves);
                push_envelope(&mut e, FILTER_ENVELOPE_PATHS, &p.filter_envelope.adsr());
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::MetalSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "harmonicity", p.harmonicity);
                push(&mut e, "modulation_index", p.modulation_index);
                push(&mut e, "resonance", p.resonance);
                push(&mut e, "octaves", p.octaves);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::NoiseSynth(p) => {
                push(&mut e, "volume", p.volume);
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::PluckSynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "attack_noise", p.attack_noise);
                push(&mut e, "dampening", p.dampening);
                push(&mut e, "resonance", p.resonance);
            }
            Self::PolySynth(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "detune", p.detune);
                push(&mut e, "max_polyphony", p.max_polyphony.map(|n| n as f64));
                push_envelope(&mut e, ENVELOPE_PATHS, &p.envelope);
            }
            Self::Sampler(p) => {
                push(&mut e, "frequency", p.frequency);
                push(&mut e, "volume", p.volume);
                push(&mut e, "attack", p.attack);
                push(&mut e, "release", p.release);
            }
        }
        e
    }

    /// Hard range violations; empty when the whole patch may be applied
    pub fn validate(&self) -> Vec<String> {
        let bounds = self.kind().bounds();
        self.numeric_entries()
            .into_iter()
            .filter_map(|(name, value)| bounds.check(name, value))
            .collect()
    }
}
