//! sf-core: Shared types for SpatialForge
//!
//! Spatial math, parameter policy, mixer configuration and the base error
//! type used by every other SpatialForge crate.

mod config;
mod error;
mod params;
mod position;
mod spatial;

pub use config::*;
pub use error::*;
pub use params::*;
pub use position::*;
pub use spatial::*;

/// Zone radius assigned to a freshly created global effect
pub const DEFAULT_ZONE_RADIUS: f64 = 2.0;

/// Default smoothing time for continuous parameter changes (seconds)
pub const DEFAULT_RAMP_TIME: f64 = 0.05;
