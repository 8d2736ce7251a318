//! Parameter tables of the built-in effect types

use serde::{Deserialize, Serialize};
use sf_core::{
    FREQUENCY_RANGE, LFO_RATE_RANGE, OCTAVES_RANGE, ParamBounds, ParamRange, ParamValue, Q_RANGE,
    UNIT_RANGE,
};

use super::{ParamControl, ParamWrite, effect_params};
use crate::synth::FilterType;

const WET_RANGE: ParamRange = UNIT_RANGE;
const DELAY_TIME_RANGE: ParamRange = ParamRange::new(0.0, 1.0);
/// Above this a delay line rings forever
const FEEDBACK_RANGE: ParamRange = ParamRange::new(0.0, 0.95);
const SPREAD_RANGE: ParamRange = ParamRange::new(0.0, 180.0);

impl From<FilterType> for ParamValue {
    fn from(filter_type: FilterType) -> Self {
        ParamValue::from(filter_type.as_str())
    }
}

/// Waveshaper oversampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Oversample {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "4x")]
    X4,
}

impl Oversample {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::X2 => "2x",
            Self::X4 => "4x",
        }
    }
}

impl From<Oversample> for ParamValue {
    fn from(oversample: Oversample) -> Self {
        ParamValue::from(oversample.as_str())
    }
}

effect_params! {
    /// Convolution reverb; the impulse is regenerated when decay changes
    ReverbSettings / ReverbPatch {
        decay = 1.5 => "decay", Field, ParamRange::new(0.1, 20.0);
        pre_delay = 0.01 => "pre_delay", Field, ParamRange::new(0.0, 1.0);
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    FeedbackDelaySettings / FeedbackDelayPatch {
        delay_time = 0.25 => "delay_time", Signal, DELAY_TIME_RANGE;
        feedback = 0.5 => "feedback", Signal, FEEDBACK_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    /// Delay bouncing between the left and right channels
    PingPongDelaySettings / PingPongDelayPatch {
        delay_time = 0.25 => "delay_time", Signal, DELAY_TIME_RANGE;
        feedback = 0.4 => "feedback", Signal, FEEDBACK_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    ChorusSettings / ChorusPatch {
        frequency = 1.5 => "frequency", Signal, LFO_RATE_RANGE;
        /// Milliseconds
        delay_time = 3.5 => "delay_time", Field, ParamRange::new(2.0, 20.0);
        depth = 0.7 => "depth", Field, UNIT_RANGE;
        spread = 180.0 => "spread", Field, SPREAD_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    PhaserSettings / PhaserPatch {
        frequency = 0.5 => "frequency", Signal, LFO_RATE_RANGE;
        octaves = 3.0 => "octaves", Field, OCTAVES_RANGE;
        base_frequency = 350.0 => "base_frequency", Field, FREQUENCY_RANGE;
        q = 10.0 => "Q", Signal, Q_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    DistortionSettings / DistortionPatch {
        distortion = 0.4 => "distortion", Field, UNIT_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
    discrete {
        oversample: Oversample = Oversample::None => "oversample";
    }
}

effect_params! {
    BitCrusherSettings / BitCrusherPatch {
        bits = 4.0 => "bits", Scheduled, ParamRange::new(1.0, 16.0);
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    /// LFO-swept filter
    AutoFilterSettings / AutoFilterPatch {
        frequency = 1.0 => "frequency", Signal, LFO_RATE_RANGE;
        depth = 1.0 => "depth", Signal, UNIT_RANGE;
        base_frequency = 200.0 => "base_frequency", Field, FREQUENCY_RANGE;
        octaves = 2.6 => "octaves", Field, OCTAVES_RANGE;
        q = 1.0 => "filter.Q", Signal, Q_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
    discrete {
        filter_type: FilterType = FilterType::Lowpass => "filter.type";
    }
}

effect_params! {
    TremoloSettings / TremoloPatch {
        frequency = 10.0 => "frequency", Signal, LFO_RATE_RANGE;
        depth = 0.5 => "depth", Signal, UNIT_RANGE;
        spread = 180.0 => "spread", Field, SPREAD_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    VibratoSettings / VibratoPatch {
        frequency = 5.0 => "frequency", Signal, LFO_RATE_RANGE;
        depth = 0.1 => "depth", Signal, UNIT_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    PitchShiftSettings / PitchShiftPatch {
        /// Semitones
        pitch = 0.0 => "pitch", Field, ParamRange::new(-24.0, 24.0);
        window_size = 0.1 => "window_size", Field, ParamRange::new(0.01, 1.0);
        delay_time = 0.0 => "delay_time", Signal, DELAY_TIME_RANGE;
        feedback = 0.0 => "feedback", Signal, FEEDBACK_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}

effect_params! {
    /// Schroeder/Moorer reverb
    FreeverbSettings / FreeverbPatch {
        room_size = 0.7 => "room_size", Signal, ParamRange::new(0.0, 0.99);
        dampening = 3_000.0 => "dampening", Scheduled, FREQUENCY_RANGE;
        wet = 0.5 => "wet", Signal, WET_RANGE;
    }
}
