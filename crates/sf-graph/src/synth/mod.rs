//! Synthesizer kinds and typed parameter dispatch
//!
//! Every synth kind is a variant of one closed enum. Configs carry the full
//! settings of a kind, patches carry a partial delta, and updates dispatch by
//! exhaustive match on the pair, so a parameter a kind does not support
//! cannot even be expressed.

mod chord;
mod config;
mod dispatch;
mod patch;

pub use chord::*;
pub use config::*;
pub use dispatch::*;
pub use patch::*;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The synthesizer families the engine can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthKind {
    /// Single oscillator + amplitude envelope
    Synth,
    /// Amplitude-modulated pair
    AmSynth,
    /// Frequency-modulated pair
    FmSynth,
    /// Two detuned voices with shared vibrato
    DuoSynth,
    /// Pitch-swept percussive membrane
    MembraneSynth,
    /// Oscillator + resonant filter with its own envelope
    MonoSynth,
    /// Inharmonic FM cluster for metallic hits
    MetalSynth,
    /// Coloured noise through an envelope
    NoiseSynth,
    /// Karplus-Strong plucked string
    PluckSynth,
    /// Chord-playing polyphonic voice pool
    PolySynth,
    /// Pitched sample playback
    Sampler,
}

impl SynthKind {
    pub const ALL: [SynthKind; 11] = [
        Self::Synth,
        Self::AmSynth,
        Self::FmSynth,
        Self::DuoSynth,
        Self::MembraneSynth,
        Self::MonoSynth,
        Self::MetalSynth,
        Self::NoiseSynth,
        Self::PluckSynth,
        Self::PolySynth,
        Self::Sampler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synth => "synth",
            Self::AmSynth => "am_synth",
            Self::FmSynth => "fm_synth",
            Self::DuoSynth => "duo_synth",
            Self::MembraneSynth => "membrane_synth",
            Self::MonoSynth => "mono_synth",
            Self::MetalSynth => "metal_synth",
            Self::NoiseSynth => "noise_synth",
            Self::PluckSynth => "pluck_synth",
            Self::PolySynth => "poly_synth",
            Self::Sampler => "sampler",
        }
    }

    /// Whether triggering takes a pitch
    pub fn is_pitched(&self) -> bool {
        !matches!(self, Self::NoiseSynth)
    }
}

impl fmt::Display for SynthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
        }
    }
}

/// Noise colour for the noise synth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    #[default]
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Pink => "pink",
            Self::Brown => "brown",
        }
    }
}

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Notch => "notch",
        }
    }
}

/// ADSR amplitude envelope (times in seconds, sustain as level)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Envelope {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(0.005, 0.1, 0.3, 1.0)
    }
}

/// Partial envelope change
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopePatch {
    pub attack: Option<f64>,
    pub decay: Option<f64>,
    pub sustain: Option<f64>,
    pub release: Option<f64>,
}

impl EnvelopePatch {
    pub fn is_empty(&self) -> bool {
        self.attack.is_none()
            && self.decay.is_none()
            && self.sustain.is_none()
            && self.release.is_none()
    }
}
