//! Shared effect processors
//!
//! Each effect type has a typed settings struct (full parameter set with
//! defaults) and a typed patch (partial delta). Every field declares the
//! engine path it drives and how that path must be written:
//!
//! | Control     | Engine call                      | Used for                |
//! |-------------|----------------------------------|-------------------------|
//! | `Signal`    | `ramp_param` over the ramp time  | audio-rate parameters   |
//! | `Scheduled` | `set_param_at` now + ramp time   | timed value changes     |
//! | `Field`     | `set_param`                      | plain properties        |

use std::fmt;

use serde::{Deserialize, Serialize};
use sf_core::{ParamBounds, ParamValue};

/// How a parameter is written to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamControl {
    /// Smoothed ramp
    Signal,
    /// Set at a scheduled time (now + ramp)
    Scheduled,
    /// Direct assignment
    Field,
}

/// One pending engine write produced from settings or a patch
#[derive(Debug, Clone, PartialEq)]
pub struct ParamWrite {
    /// Field name, as reported in update results
    pub name: &'static str,
    /// Engine parameter path
    pub path: &'static str,
    pub value: ParamValue,
    pub control: ParamControl,
}

/// Declares a settings struct, its patch and their engine write tables
///
/// Numeric fields carry a default, an engine path, a control and a range;
/// the optional `discrete` block lists non-numeric fields, always written
/// as plain fields.
macro_rules! effect_params {
    (
        $(#[$doc:meta])*
        $settings:ident / $patch:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident = $default:expr => $path:literal, $control:ident, $range:expr;
            )*
        }
        $( discrete {
            $( $dfield:ident : $dty:ty = $ddefault:expr => $dpath:literal; )*
        } )?
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $settings {
            $( $(#[$fmeta])* pub $field: f64, )*
            $( $( pub $dfield: $dty, )* )?
        }

        impl Default for $settings {
            fn default() -> Self {
                Self {
                    $( $field: $default, )*
                    $( $( $dfield: $ddefault, )* )?
                }
            }
        }

        impl $settings {
            /// Accepted range of every numeric field
            pub fn bounds() -> ParamBounds {
                ParamBounds::new() $( .with(stringify!($field), $range) )*
            }

            /// The complete parameter set as engine writes
            pub fn writes(&self) -> Vec<ParamWrite> {
                #[allow(unused_mut)]
                let mut writes = vec![
                    $( ParamWrite {
                        name: stringify!($field),
                        path: $path,
                        value: ParamValue::from(self.$field),
                        control: ParamControl::$control,
                    }, )*
                ];
                $( $( writes.push(ParamWrite {
                    name: stringify!($dfield),
                    path: $dpath,
                    value: ParamValue::from(self.$dfield.clone()),
                    control: ParamControl::Field,
                }); )* )?
                writes
            }

            /// Copy field `name` from `patch` if present
            pub fn assign(&mut self, patch: &$patch, name: &str) {
                $( if name == stringify!($field) {
                    if let Some(v) = patch.$field {
                        self.$field = v;
                    }
                    return;
                } )*
                $( $( if name == stringify!($dfield) {
                    if let Some(v) = &patch.$dfield {
                        self.$dfield = v.clone();
                    }
                    return;
                } )* )?
            }
        }

        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $patch {
            $( pub $field: Option<f64>, )*
            $( $( pub $dfield: Option<$dty>, )* )?
        }

        impl $patch {
            /// Present numeric values keyed by field name
            pub fn numeric_entries(&self) -> Vec<(&'static str, f64)> {
                #[allow(unused_mut)]
                let mut entries = Vec::new();
                $( if let Some(v) = self.$field {
                    entries.push((stringify!($field), v));
                } )*
                entries
            }

            /// Engine writes for the present fields only
            pub fn writes(&self) -> Vec<ParamWrite> {
                #[allow(unused_mut)]
                let mut writes = Vec::new();
                $( if let Some(v) = self.$field {
                    writes.push(ParamWrite {
                        name: stringify!($field),
                        path: $path,
                        value: ParamValue::from(v),
                        control: ParamControl::$control,
                    });
                } )*
                $( $( if let Some(v) = &self.$dfield {
                    writes.push(ParamWrite {
                        name: stringify!($dfield),
                        path: $dpath,
                        value: ParamValue::from(v.clone()),
                        control: ParamControl::Field,
                    });
                } )* )?
                writes
            }
        }
    };
}

pub(crate) use effect_params;

mod probe;
mod registry;
mod types;

pub use probe::*;
pub use registry::*;
pub use types::*;

/// The effect processors the engine can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Reverb,
    FeedbackDelay,
    PingPongDelay,
    Chorus,
    Phaser,
    Distortion,
    BitCrusher,
    AutoFilter,
    Tremolo,
    Vibrato,
    PitchShift,
    Freeverb,
}

impl EffectType {
    pub const ALL: [EffectType; 12] = [
        Self::Reverb,
        Self::FeedbackDelay,
        Self::PingPongDelay,
        Self::Chorus,
        Self::Phaser,
        Self::Distortion,
        Self::BitCrusher,
        Self::AutoFilter,
        Self::Tremolo,
        Self::Vibrato,
        Self::PitchShift,
        Self::Freeverb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reverb => "reverb",
            Self::FeedbackDelay => "feedback_delay",
            Self::PingPongDelay => "ping_pong_delay",
            Self::Chorus => "chorus",
            Self::Phaser => "phaser",
            Self::Distortion => "distortion",
            Self::BitCrusher => "bit_crusher",
            Self::AutoFilter => "auto_filter",
            Self::Tremolo => "tremolo",
            Self::Vibrato => "vibrato",
            Self::PitchShift => "pitch_shift",
            Self::Freeverb => "freeverb",
        }
    }

    /// Whether the effect only reacts audibly to parameter writes once its
    /// input changes, so the probe tone has to be re-swept after an update
    pub fn needs_probe_refresh(&self) -> bool {
        matches!(self, Self::Reverb | Self::Freeverb | Self::PitchShift)
    }

    /// Accepted range of every numeric parameter of this type
    pub fn bounds(&self) -> ParamBounds {
        match self {
            Self::Reverb => ReverbSettings::bounds(),
            Self::FeedbackDelay => FeedbackDelaySettings::bounds(),
            Self::PingPongDelay => PingPongDelaySettings::bounds(),
            Self::Chorus => ChorusSettings::bounds(),
            Self::Phaser => PhaserSettings::bounds(),
            Self::Distortion => DistortionSettings::bounds(),
            Self::BitCrusher => BitCrusherSettings::bounds(),
            Self::AutoFilter => AutoFilterSettings::bounds(),
            Self::Tremolo => TremoloSettings::bounds(),
            Self::Vibrato => VibratoSettings::bounds(),
            Self::PitchShift => PitchShiftSettings::bounds(),
            Self::Freeverb => FreeverbSettings::bounds(),
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch an expression over every variant of a type-tagged enum
macro_rules! per_type {
    ($value:expr, $enum:ident, $inner:ident => $body:expr) => {
        match $value {
            $enum::Reverb($inner) => $body,
            $enum::FeedbackDelay($inner) => $body,
            $enum::PingPongDelay($inner) => $body,
            $enum::Chorus($inner) => $body,
            $enum::Phaser($inner) => $body,
            $enum::Distortion($inner) => $body,
            $enum::BitCrusher($inner) => $body,
            $enum::AutoFilter($inner) => $body,
            $enum::Tremolo($inner) => $body,
            $enum::Vibrato($inner) => $body,
            $enum::PitchShift($inner) => $body,
            $enum::Freeverb($inner) => $body,
        }
    };
}

/// Full settings of one effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectConfig {
    Reverb(ReverbSettings),
    FeedbackDelay(FeedbackDelaySettings),
    PingPongDelay(PingPongDelaySettings),
    Chorus(ChorusSettings),
    Phaser(PhaserSettings),
    Distortion(DistortionSettings),
    BitCrusher(BitCrusherSettings),
    AutoFilter(AutoFilterSettings),
    Tremolo(TremoloSettings),
    Vibrato(VibratoSettings),
    PitchShift(PitchShiftSettings),
    Freeverb(FreeverbSettings),
}

impl EffectConfig {
    /// Default settings for `effect_type`
    pub fn defaults(effect_type: EffectType) -> Self {
        match effect_type {
            EffectType::Reverb => Self::Reverb(Default::default()),
            EffectType::FeedbackDelay => Self::FeedbackDelay(Default::default()),
            EffectType::PingPongDelay => Self::PingPongDelay(Default::default()),
            EffectType::Chorus => Self::Chorus(Default::default()),
            EffectType::Phaser => Self::Phaser(Default::default()),
            EffectType::Distortion => Self::Distortion(Default::default()),
            EffectType::BitCrusher => Self::BitCrusher(Default::default()),
            EffectType::AutoFilter => Self::AutoFilter(Default::default()),
            EffectType::Tremolo => Self::Tremolo(Default::default()),
            EffectType::Vibrato => Self::Vibrato(Default::default()),
            EffectType::PitchShift => Self::PitchShift(Default::default()),
            EffectType::Freeverb => Self::Freeverb(Default::default()),
        }
    }

    pub fn effect_type(&self) -> EffectType {
        match self {
            Self::Reverb(_) => EffectType::Reverb,
            Self::FeedbackDelay(_) => EffectType::FeedbackDelay,
            Self::PingPongDelay(_) => EffectType::PingPongDelay,
            Self::Chorus(_) => EffectType::Chorus,
            Self::Phaser(_) => EffectType::Phaser,
            Self::Distortion(_) => EffectType::Distortion,
            Self::BitCrusher(_) => EffectType::BitCrusher,
            Self::AutoFilter(_) => EffectType::AutoFilter,
            Self::Tremolo(_) => EffectType::Tremolo,
            Self::Vibrato(_) => EffectType::Vibrato,
            Self::PitchShift(_) => EffectType::PitchShift,
            Self::Freeverb(_) => EffectType::Freeverb,
        }
    }

    pub fn writes(&self) -> Vec<ParamWrite> {
        per_type!(self, EffectConfig, s => s.writes())
    }

    /// Copy field `name` from a patch of the same type
    ///
    /// Returns `false` when the patch is for another effect type.
    pub fn assign(&mut self, patch: &EffectPatch, name: &str) -> bool {
        match (self, patch) {
            (Self::Reverb(s), EffectPatch::Reverb(p)) => s.assign(p, name),
            (Self::FeedbackDelay(s), EffectPatch::FeedbackDelay(p)) => s.assign(p, name),
            (Self::PingPongDelay(s), EffectPatch::PingPongDelay(p)) => s.assign(p, name),
            (Self::Chorus(s), EffectPatch::Chorus(p)) => s.assign(p, name),
            (Self::Phaser(s), EffectPatch::Phaser(p)) => s.assign(p, name),
            (Self::Distortion(s), EffectPatch::Distortion(p)) => s.assign(p, name),
            (Self::BitCrusher(s), EffectPatch::BitCrusher(p)) => s.assign(p, name),
            (Self::AutoFilter(s), EffectPatch::AutoFilter(p)) => s.assign(p, name),
            (Self::Tremolo(s), EffectPatch::Tremolo(p)) => s.assign(p, name),
            (Self::Vibrato(s), EffectPatch::Vibrato(p)) => s.assign(p, name),
            (Self::PitchShift(s), EffectPatch::PitchShift(p)) => s.assign(p, name),
            (Self::Freeverb(s), EffectPatch::Freeverb(p)) => s.assign(p, name),
            _ => return false,
        }
        true
    }
}

/// Partial parameter change for one effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectPatch {
    Reverb(ReverbPatch),
    FeedbackDelay(FeedbackDelayPatch),
    PingPongDelay(PingPongDelayPatch),
    Chorus(ChorusPatch),
    Phaser(PhaserPatch),
    Distortion(DistortionPatch),
    BitCrusher(BitCrusherPatch),
    AutoFilter(AutoFilterPatch),
    Tremolo(TremoloPatch),
    Vibrato(VibratoPatch),
    PitchShift(PitchShiftPatch),
    Freeverb(FreeverbPatch),
}

impl EffectPatch {
    pub fn effect_type(&self) -> EffectType {
        match self {
            Self::Reverb(_) => EffectType::Reverb,
            Self::FeedbackDelay(_) => EffectType::FeedbackDelay,
            Self::PingPongDelay(_) => EffectType::PingPongDelay,
            Self::Chorus(_) => EffectType::Chorus,
            Self::Phaser(_) => EffectType::Phaser,
            Self::Distortion(_) => EffectType::Distortion,
            Self::BitCrusher(_) => EffectType::BitCrusher,
            Self::AutoFilter(_) => EffectType::AutoFilter,
            Self::Tremolo(_) => EffectType::Tremolo,
            Self::Vibrato(_) => EffectType::Vibrato,
            Self::PitchShift(_) => EffectType::PitchShift,
            Self::Freeverb(_) => EffectType::Freeverb,
        }
    }

    pub fn numeric_entries(&self) -> Vec<(&'static str, f64)> {
        per_type!(self, EffectPatch, p => p.numeric_entries())
    }

    pub fn writes(&self) -> Vec<ParamWrite> {
        per_type!(self, EffectPatch, p => p.writes())
    }

    /// Hard range violations; empty when the whole patch may be applied
    pub fn validate(&self) -> Vec<String> {
        let bounds = self.effect_type().bounds();
        self.numeric_entries()
            .into_iter()
            .filter_map(|(name, value)| bounds.check(name, value))
            .collect()
    }
}
