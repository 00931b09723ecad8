//! 2D Vector
//!
//! Small float vector used by the movement simulator.
//! World coordinates are `f32` to match the wire format bit for bit.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// 2D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    /// X component (grows to the right)
    pub x: f32,
    /// Y component (grows downwards, screen space)
    pub y: f32,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector pointing left (-X)
    pub const LEFT: Self = Self { x: -1.0, y: 0.0 };

    /// Unit vector pointing right (+X)
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };

    /// Unit vector pointing up (-Y, screen space)
    pub const UP: Self = Self { x: 0.0, y: -1.0 };

    /// Unit vector pointing down (+Y, screen space)
    pub const DOWN: Self = Self { x: 0.0, y: 1.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::ZERO;
        }
        Self {
            x: self.x / len,
            y: self.y / len,
        }
    }

    /// Wrap both components into `[0, width) x [0, height)`.
    ///
    /// Uses Euclidean remainder, so negative coordinates come back in
    /// from the far edge instead of producing negative remainders.
    #[inline]
    pub fn wrap(self, width: f32, height: f32) -> Self {
        Self {
            x: wrap_coord(self.x, width),
            y: wrap_coord(self.y, height),
        }
    }

    /// Check if position lies within `[0, width) x [0, height)`.
    #[inline]
    pub fn is_within(self, width: f32, height: f32) -> bool {
        self.x >= 0.0 && self.x < width && self.y >= 0.0 && self.y < height
    }
}

/// Euclidean modulo for a single coordinate.
///
/// `rem_euclid` can round up to exactly `bound` for tiny negative inputs
/// (e.g. `-1e-9 % 800.0`), which would break the half-open interval.
#[inline]
fn wrap_coord(value: f32, bound: f32) -> f32 {
    let wrapped = value.rem_euclid(bound);
    if wrapped >= bound {
        0.0
    } else {
        wrapped
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        self.scale(rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.3}, {:.3})", self.x, self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================
