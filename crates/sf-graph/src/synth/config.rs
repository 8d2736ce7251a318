//! Full per-kind synth settings with defaults

use serde::{Deserialize, Serialize};

use super::{ChordShape, Envelope, FilterType, NoiseColor, SynthKind, Waveform};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    /// Cents
    pub detune: f64,
    /// Glide time between notes (seconds)
    pub portamento: f64,
    pub waveform: Waveform,
    pub envelope: Envelope,
}

impl Default for SimpleSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            volume: 0.5,
            detune: 0.0,
            portamento: 0.0,
            waveform: Waveform::Triangle,
            envelope: Envelope::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    pub detune: f64,
    pub harmonicity: f64,
    pub waveform: Waveform,
    pub modulation_waveform: Waveform,
    pub envelope: Envelope,
    pub modulation_envelope: Envelope,
}

impl Default for AmSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            volume: 0.5,
            detune: 0.0,
            harmonicity: 3.0,
            waveform: Waveform::Sine,
            modulation_waveform: Waveform::Square,
            envelope: Envelope::new(0.01, 0.01, 1.0, 0.5),
            modulation_envelope: Envelope::new(0.5, 0.0, 1.0, 0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    pub detune: f64,
    pub harmonicity: f64,
    pub modulation_index: f64,
    pub waveform: Waveform,
    pub modulation_waveform: Waveform,
    pub envelope: Envelope,
    pub modulation_envelope: Envelope,
}

impl Default for FmSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            volume: 0.5,
            detune: 0.0,
            harmonicity: 3.0,
            modulation_index: 10.0,
            waveform: Waveform::Sine,
            modulation_waveform: Waveform::Square,
            envelope: Envelope::new(0.01, 0.01, 1.0, 0.5),
            modulation_envelope: Envelope::new(0.5, 0.0, 1.0, 0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    /// Frequency ratio between the two voices
    pub harmonicity: f64,
    pub vibrato_amount: f64,
    /// Hz
    pub vibrato_rate: f64,
    pub voice0_waveform: Waveform,
    pub voice1_waveform: Waveform,
    pub envelope: Envelope,
}

impl Default for DuoSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            volume: 0.5,
            harmonicity: 1.5,
            vibrato_amount: 0.5,
            vibrato_rate: 5.0,
            voice0_waveform: Waveform::Sine,
            voice1_waveform: Waveform::Sine,
            envelope: Envelope::new(0.01, 0.0, 1.0, 0.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembraneSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    /// Seconds for the pitch sweep to settle
    pub pitch_decay: f64,
    /// Sweep span in octaves
    pub octaves: f64,
    pub waveform: Waveform,
    pub envelope: Envelope,
}

impl Default for MembraneSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 55.0,
            volume: 0.6,
            pitch_decay: 0.05,
            octaves: 8.0,
            waveform: Waveform::Sine,
            envelope: Envelope::new(0.001, 0.4, 0.01, 1.4),
        }
    }
}

/// Envelope driving the mono synth's filter cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEnvelope {
    pub base_frequency: f64,
    pub octaves: f64,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for FilterEnvelope {
    fn default() -> Self {
        Self {
            base_frequency: 200.0,
            octaves: 3.0,
            attack: 0.06,
            decay: 0.2,
            sustain: 0.5,
            release: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    pub detune: f64,
    pub waveform: Waveform,
    pub filter_type: FilterType,
    pub filter_q: f64,
    pub filter_frequency: f64,
    pub filter_envelope: FilterEnvelope,
    pub envelope: Envelope,
}

impl Default for MonoSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 220.0,
            volume: 0.5,
            detune: 0.0,
            waveform: Waveform::Sawtooth,
            filter_type: FilterType::Lowpass,
            filter_q: 1.0,
            filter_frequency: 1_000.0,
            filter_envelope: FilterEnvelope::default(),
            envelope: Envelope::new(0.005, 0.1, 0.9, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    pub harmonicity: f64,
    pub modulation_index: f64,
    /// Highpass cutoff shaping the ring (Hz)
    pub resonance: f64,
    pub octaves: f64,
    pub envelope: Envelope,
}

impl Default for MetalSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 200.0,
            volume: 0.4,
            harmonicity: 5.1,
            modulation_index: 32.0,
            resonance: 4_000.0,
            octaves: 1.5,
            envelope: Envelope::new(0.001, 1.4, 0.0, 0.2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSynthSettings {
    pub volume: f64,
    pub noise: NoiseColor,
    pub envelope: Envelope,
}

impl Default for NoiseSynthSettings {
    fn default() -> Self {
        Self {
            volume: 0.3,
            noise: NoiseColor::White,
            envelope: Envelope::new(0.005, 0.1, 0.0, 0.3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluckSynthSettings {
    pub frequency: f64,
    pub volume: f64,
    pub attack_noise: f64,
    /// Lowpass cutoff inside the feedback loop (Hz)
    pub dampening: f64,
    /// Feedback amount, 0-1
    pub resonance: f64,
}

impl Default for PluckSynthSettings {
    fn default() -> Self {
        Self {
            frequency: 330.0,
            volume: 0.6,
            attack_noise: 1.0,
            dampening: 4_000.0,
            resonance: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolySynthSettings {
    /// Chord root
    pub frequency: f64,
    pub volume: f64,
    pub detune: f64,
    pub waveform: Waveform,
    pub chord: ChordShape,
    pub max_polyphony: usize,
    pub envelope: Envelope,
}

impl Default for PolySynthSettings {
    fn default() -> Self {
        Self {
            frequency: 261.63,
            volume: 0.4,
            detune: 0.0,
            waveform: Waveform::Triangle,
            chord: ChordShape::Major,
            max_polyphony: 8,
            envelope: Envelope::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Pitch the sample is played at
    pub frequency: f64,
    pub volume: f64,
    pub attack: f64,
    pub release: f64,
    /// Identifier of the sample set, resolved by the engine
    pub sample_set: String,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            frequency: 261.63,
            volume: 0.6,
            attack: 0.0,
            release: 1.0,
            sample_set: "default".to_string(),
        }
    }
}

/// Construction settings for any synth kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthConfig {
    Synth(SimpleSynthSettings),
    AmSynth(AmSynthSettings),
    FmSynth(FmSynthSettings),
    DuoSynth(DuoSynthSettings),
    MembraneSynth(MembraneSynthSettings),
    MonoSynth(MonoSynthSettings),
    MetalSynth(MetalSynthSettings),
    NoiseSynth(NoiseSynthSettings),
    PluckSynth(PluckSynthSettings),
    PolySynth(PolySynthSettings),
    Sampler(SamplerSettings),
}

impl SynthConfig {
    /// Default settings for `kind`
    pub fn defaults(kind: SynthKind) -> Self {
        match kind {
            SynthKind::Synth => Self::Synth(Default::default()),
            SynthKind::AmSynth => Self::AmSynth(Default::default()),
            SynthKind::FmSynth => Self::FmSynth(Default::default()),
            SynthKind::DuoSynth => Self::DuoSynth(Default::default()),
            SynthKind::MembraneSynth => Self::MembraneSynth(Default::default()),
            SynthKind::MonoSynth => Self::MonoSynth(Default::default()),
            SynthKind::MetalSynth => Self::MetalSynth(Default::default()),
            SynthKind::NoiseSynth => Self::NoiseSynth(Default::default()),
            SynthKind::PluckSynth => Self::PluckSynth(Default::default()),
            SynthKind::PolySynth => Self::PolySynth(Default::default()),
            SynthKind::Sampler => Self::Sampler(Default::default()),
        }
    }

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

    /// Pitch used when the synth is triggered; `None` for unpitched kinds
    pub fn frequency(&self) -> Option<f64> {
        match self {
            Self::Synth(s) => Some(s.frequency),
            Self::AmSynth(s) => Some(s.frequency),
            Self::FmSynth(s) => Some(s.frequency),
            Self::DuoSynth(s) => Some(s.frequency),
            Self::MembraneSynth(s) => Some(s.frequency),
            Self::MonoSynth(s) => Some(s.frequency),
            Self::MetalSynth(s) => Some(s.frequency),
            Self::NoiseSynth(_) => None,
            Self::PluckSynth(s) => Some(s.frequency),
            Self::PolySynth(s) => Some(s.frequency),
            Self::Sampler(s) => Some(s.frequency),
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            Self::Synth(s) => s.volume,
            Self::AmSynth(s) => s.volume,
            Self::FmSynth(s) => s.volume,
            Self::DuoSynth(s) => s.volume,
            Self::MembraneSynth(s) => s.volume,
            Self::MonoSynth(s) => s.volume,
            Self::MetalSynth(s) => s.volume,
            Self::NoiseSynth(s) => s.volume,
            Self::PluckSynth(s) => s.volume,
            Self::PolySynth(s) => s.volume,
            Self::Sampler(s) => s.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_kind() {
        for kind in SynthKind::ALL {
            assert_eq!(SynthConfig::defaults(kind).kind(), kind);
        }
    }

    #[test]
    fn test_tagged_json() {
        let config: SynthConfig =
            serde_json::from_str(r#"{ "kind": "fm_synth", "modulation_index": 4.0 }"#).unwrap();
        match config {
            SynthConfig::FmSynth(s) => {
                assert_eq!(s.modulation_index, 4.0);
                assert_eq!(s.harmonicity, 3.0);
            }
            other => panic!("unexpected config: {:?}", other),
        }
    }

    #[test]
    fn test_noise_has_no_pitch() {
        assert!(SynthConfig::defaults(SynthKind::NoiseSynth).frequency().is_none());
        assert_eq!(
            SynthConfig::defaults(SynthKind::Synth).frequency(),
            Some(440.0)
        );
    }
}
