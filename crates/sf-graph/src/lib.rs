//! sf-graph: Audio graph control for SpatialForge
//!
//! Engine boundary, context lifecycle, synth dispatch, effect zones and
//! spatial mixing.

pub mod backend;
mod context;
pub mod effects;
mod error;
mod mixer;
mod mixing;
mod source;
pub mod synth;
mod zones;

pub use backend::{AudioBackend, Endpoint, NodeId, NodeSpec, OfflineBackend, PannerSettings};
pub use context::*;
pub use effects::{EffectConfig, EffectPatch, EffectRegistry, EffectType};
pub use error::*;
pub use mixer::*;
pub use mixing::*;
pub use source::*;
pub use synth::{SynthConfig, SynthHandle, SynthKind, SynthPatch};
pub use zones::*;
