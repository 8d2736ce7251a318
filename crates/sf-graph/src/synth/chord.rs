//! Chord shapes for the polyphonic synth

use serde::{Deserialize, Serialize};
use sf_core::clamp_frequency;

/// Chord voiced on top of the poly synth's base frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordShape {
    Single,
    #[default]
    Major,
    Minor,
    Sus2,
    Sus4,
    Diminished,
    Augmented,
    Major7,
    Minor7,
    Dominant7,
}

impl ChordShape {
    /// Semitone offsets from the root
    pub fn intervals(&self) -> &'static [i32] {
        match self {
            Self::Single => &[0],
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Sus2 => &[0, 2, 7],
            Self::Sus4 => &[0, 5, 7],
            Self::Diminished => &[0, 3, 6],
            Self::Augmented => &[0, 4, 8],
            Self::Major7 => &[0, 4, 7, 11],
            Self::Minor7 => &[0, 3, 7, 10],
            Self::Dominant7 => &[0, 4, 7, 10],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Sus2 => "sus2",
            Self::Sus4 => "sus4",
            Self::Diminished => "diminished",
            Self::Augmented => "augmented",
            Self::Major7 => "major7",
            Self::Minor7 => "minor7",
            Self::Dominant7 => "dominant7",
        }
    }
}

/// Transpose a semitone interval onto a base frequency
#[inline]
pub fn transpose(base_hz: f64, semitones: i32) -> f64 {
    base_hz * 2.0_f64.powf(semitones as f64 / 12.0)
}

/// Member frequencies of `shape` rooted at `base_hz`, capped at `max_voices`
pub fn chord_frequencies(base_hz: f64, shape: ChordShape, max_voices: usize) -> Vec<f64> {
    shape
        .intervals()
        .iter()
        .take(max_voices.max(1))
        .map(|&st| clamp_frequency(transpose(base_hz, st)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_major_triad() {
        let notes = chord_frequencies(440.0, ChordShape::Major, 8);
        assert_eq!(notes.len(), 3);
        assert_relative_eq!(notes[0], 440.0);
        assert_relative_eq!(notes[1], 554.365, epsilon = 1e-3);
        assert_relative_eq!(notes[2], 659.255, epsilon = 1e-3);
    }

    #[test]
    fn test_voice_cap() {
        assert_eq!(chord_frequencies(220.0, ChordShape::Dominant7, 2).len(), 2);
        assert_eq!(chord_frequencies(220.0, ChordShape::Dominant7, 0).len(), 1);
    }

    #[test]
    fn test_members_stay_audible() {
        let notes = chord_frequencies(19_000.0, ChordShape::Augmented, 8);
        assert!(notes.iter().all(|&f| f <= 20_000.0));
    }
}
