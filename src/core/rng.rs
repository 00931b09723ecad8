//! Seedable Random Number Generator
//!
//! Uses the Xorshift128+ family for fast, good-quality randomness.
//! Spawn positions and hues come from here, so a world built from a
//! fixed seed hands out the same players every run (handy for tests).

use super::vec2::Vec2;

/// Seedable PRNG using the Xorshift128+ algorithm.
///
/// Given the same seed, this RNG produces the exact same sequence
/// of values on any platform.
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a uniform float in [0, 1).
    ///
    /// Takes the top 24 bits so every value is exactly representable.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u32 << 24) as f32;
        (self.next_u64() >> 40) as f32 * SCALE
    }

    /// Generate a uniform float in [0, max).
    #[inline]
    pub fn next_f32_below(&mut self, max: f32) -> f32 {
        if max <= 0.0 {
            return 0.0;
        }
        self.next_f32() * max
    }

    /// Generate a uniformly random position inside `[0, width) x [0, height)`.
    pub fn random_position(&mut self, width: f32, height: f32) -> Vec2 {
        let x = self.next_f32_below(width);
        let y = self.next_f32_below(height);
        // Multiplication may round up onto the far edge
        Vec2::new(x, y).wrap(width, height)
    }

    /// Generate a random hue in whole degrees, 0..=359.
    #[inline]
    pub fn random_hue(&mut self) -> u16 {
        self.next_int(360) as u16
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// TESTS
// =============================================================================
