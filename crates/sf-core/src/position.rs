//! 3D vector and listener types

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// 3D position or direction in scene space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate (left/right, positive = right)
    pub x: f64,
    /// Y coordinate (down/up, positive = up)
    pub y: f64,
    /// Z coordinate (front/back, negative = forward)
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Origin position
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Get magnitude (distance from origin)
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance to another point
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Normalize to unit vector
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len < 1e-12 {
            return Self::new(0.0, 0.0, -1.0);
        }
        Self::new(self.x / len, self.y / len, self.z / len)
    }

    /// Linear interpolation
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    /// Dot product
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// True when no component is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

/// The spatial audio origin (usually the virtual camera)
///
/// Position and orientation always travel together so the engine never sees
/// a half-updated frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Listener {
    pub fn new(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        Self {
            position,
            forward,
            up,
        }
    }

    /// Build a listener frame, rejecting non-finite components
    pub fn checked(position: Vec3, forward: Vec3, up: Vec3) -> CoreResult<Self> {
        let listener = Self::new(position, forward, up);
        if !listener.is_finite() {
            return Err(CoreError::InvalidPosition(format!(
                "listener frame has non-finite components: {:?}",
                listener
            )));
        }
        Ok(listener)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.forward.is_finite() && self.up.is_finite()
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}
