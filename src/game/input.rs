//! Movement Intent
//!
//! The four movement directions and the bitmask that packs them.
//! This is the only place the direction-to-bit mapping is defined;
//! the codec, the simulator and the tests all go through it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::vec2::Vec2;

/// A movement direction.
///
/// The discriminant is both the wire value and the bit index in [`MoveMask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Direction {
    /// Move towards -X
    Left = 0,
    /// Move towards +X
    Right = 1,
    /// Move towards -Y (screen space)
    Up = 2,
    /// Move towards +Y (screen space)
    Down = 3,
}

impl Direction {
    /// Every direction, in bit order.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    /// Get direction from its wire value (0-3).
    pub fn from_index(index: u8) -> Option<Direction> {
        match index {
            0 => Some(Direction::Left),
            1 => Some(Direction::Right),
            2 => Some(Direction::Up),
            3 => Some(Direction::Down),
            _ => None,
        }
    }

    /// Bit in a [`MoveMask`] for this direction.
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Unit vector for this direction.
    #[inline]
    pub fn unit_vector(self) -> Vec2 {
        match self {
            Direction::Left => Vec2::LEFT,
            Direction::Right => Vec2::RIGHT,
            Direction::Up => Vec2::UP,
            Direction::Down => Vec2::DOWN,
        }
    }
}

/// Direction byte outside 0..=3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("invalid direction {0}")]
pub struct InvalidDirection(pub u8);

impl TryFrom<u8> for Direction {
    type Error = InvalidDirection;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Direction::from_index(value).ok_or(InvalidDirection(value))
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> u8 {
        direction as u8
    }
}

/// Set of currently active movement directions.
///
/// Bit `i` is set while [`Direction`] `i` is held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveMask(u8);

impl MoveMask {
    /// No movement.
    pub const NONE: MoveMask = MoveMask(0);

    /// Build from raw bits.
    ///
    /// Bits above the four directions are kept so a received mask
    /// re-encodes byte for byte.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask with exactly the given directions set.
    pub fn of(directions: &[Direction]) -> Self {
        directions
            .iter()
            .fold(Self::NONE, |mask, dir| mask.with(*dir, true))
    }

    /// Check if a direction is active.
    #[inline]
    pub fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Set or clear a direction.
    #[inline]
    pub fn set(&mut self, direction: Direction, active: bool) {
        if active {
            self.0 |= direction.bit();
        } else {
            self.0 &= !direction.bit();
        }
    }

    /// Copy with a direction set or cleared.
    #[inline]
    pub fn with(mut self, direction: Direction, active: bool) -> Self {
        self.set(direction, active);
        self
    }

    /// Check if no direction is active.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over active directions in bit order.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Sum of unit vectors of all active directions (not normalized).
    pub fn raw_vector(self) -> Vec2 {
        self.directions()
            .fold(Vec2::ZERO, |acc, dir| acc + dir.unit_vector())
    }
}

impl fmt::Display for MoveMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06b}", self.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_bits() {
        assert_eq!(Direction::Left.bit(), 0b0001);
        assert_eq!(Direction::Right.bit(), 0b0010);
        assert_eq!(Direction::Up.bit(), 0b0100);
        assert_eq!(Direction::Down.bit(), 0b1000);
    }

    #[test]
    fn test_direction_from_index() {
        for dir in Direction::ALL {
            assert_eq!(Direction::from_index(dir as u8), Some(dir));
        }
        assert_eq!(Direction::from_index(4), None);
        assert_eq!(Direction::from_index(255), None);
        assert_eq!(Direction::try_from(3), Ok(Direction::Down));
        assert_eq!(Direction::try_from(4), Err(InvalidDirection(4)));
    }

    #[test]
    fn test_mask_set_and_clear() {
        let mut mask = MoveMask::NONE;
        mask.set(Direction::Right, true);
        assert_eq!(mask.bits(), 0b0010);
        assert!(mask.contains(Direction::Right));

        // Setting twice is idempotent
        mask.set(Direction::Right, true);
        assert_eq!(mask.bits(), 0b0010);

        mask.set(Direction::Right, false);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_mask_directions() {
        let mask = MoveMask::of(&[Direction::Down, Direction::Left]);
        let dirs: Vec<_> = mask.directions().collect();
        assert_eq!(dirs, vec![Direction::Left, Direction::Down]);
    }

    #[test]
    fn test_opposite_directions_cancel() {
        let mask = MoveMask::of(&[Direction::Left, Direction::Right]);
        assert_eq!(mask.raw_vector(), Vec2::ZERO);
    }

    #[test]
    fn test_mask_display() {
        let mask = MoveMask::of(&[Direction::Right]);
        assert_eq!(mask.to_string(), "0b0010");
    }
}
