//! Movement Simulator
//!
//! Integrates positions from the committed movement mask.
//! Diagonals are normalized so they are never faster than a single axis,
//! and positions wrap around the world edges instead of clamping.

use crate::core::vec2::Vec2;
use crate::game::input::MoveMask;
use crate::game::state::Player;
use crate::{PLAYER_SPEED, WORLD_HEIGHT, WORLD_WIDTH};

/// Unit-length heading for a mask, or zero when the directions cancel out.
#[inline]
pub fn heading(mask: MoveMask) -> Vec2 {
    mask.raw_vector().normalize()
}

/// Displacement produced by moving with `mask` for `dt` seconds, before wrapping.
#[inline]
pub fn displacement(mask: MoveMask, dt: f32) -> Vec2 {
    heading(mask) * (PLAYER_SPEED * dt)
}

/// New position after moving with `mask` for `dt` seconds.
pub fn integrate(position: Vec2, mask: MoveMask, dt: f32) -> Vec2 {
    if mask.is_empty() {
        return position;
    }
    (position + displacement(mask, dt)).wrap(WORLD_WIDTH, WORLD_HEIGHT)
}

/// Advance one player by `dt` seconds using its committed mask.
#[inline]
pub fn step(player: &mut Player, dt: f32) {
    player.position = integrate(player.position, player.moving, dt);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Direction;
    use crate::game::state::PlayerId;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 30.0;

    #[test]
    fn test_idle_player_does_not_move() {
        let pos = Vec2::new(100.0, 100.0);
        assert_eq!(integrate(pos, MoveMask::NONE, DT), pos);
    }

    #[test]
    fn test_move_right_one_tick() {
        let pos = Vec2::new(100.0, 100.0);
        let next = integrate(pos, MoveMask::of(&[Direction::Right]), DT);
        assert!((next.x - (100.0 + PLAYER_SPEED * DT)).abs() < 1e-3);
        assert_eq!(next.y, 100.0);
    }

    #[test]
    fn test_up_is_negative_y() {
        let pos = Vec2::new(100.0, 100.0);
        let next = integrate(pos, MoveMask::of(&[Direction::Up]), DT);
        assert!(next.y < 100.0);
    }

    #[test]
    fn test_opposite_directions_stand_still() {
        let pos = Vec2::new(10.0, 20.0);
        let mask = MoveMask::of(&[Direction::Up, Direction::Down]);
        assert_eq!(integrate(pos, mask, DT), pos);
    }

    #[test]
    fn test_wrap_left_edge() {
        let pos = Vec2::new(1.0, 300.0);
        let next = integrate(pos, MoveMask::of(&[Direction::Left]), DT);
        let expected = 1.0 - PLAYER_SPEED * DT + WORLD_WIDTH;
        assert!((next.x - expected).abs() < 1e-3, "{:?}", next);
    }

    #[test]
    fn test_wrap_bottom_edge() {
        let pos = Vec2::new(400.0, WORLD_HEIGHT - 1.0);
        let next = integrate(pos, MoveMask::of(&[Direction::Down]), DT);
        let expected = PLAYER_SPEED * DT - 1.0;
        assert!((next.y - expected).abs() < 1e-3, "{:?}", next);
    }

    #[test]
    fn test_step_uses_committed_mask_only() {
        let mut player = Player::new(PlayerId(0), Vec2::new(50.0, 50.0), 0);
        player.pending = MoveMask::of(&[Direction::Right]);
        step(&mut player, DT);
        assert_eq!(player.position, Vec2::new(50.0, 50.0));

        player.moving = player.pending;
        step(&mut player, DT);
        assert!(player.position.x > 50.0);
    }

    proptest! {
        #[test]
        fn test_position_stays_in_world(
            x in 0.0f32..WORLD_WIDTH,
            y in 0.0f32..WORLD_HEIGHT,
            bits in any::<u8>(),
            dt in 0.0f32..1000.0,
        ) {
            let next = integrate(Vec2::new(x, y), MoveMask::from_bits(bits), dt);
            prop_assert!(next.is_within(WORLD_WIDTH, WORLD_HEIGHT), "{:?}", next);
        }

        #[test]
        fn test_diagonal_not_faster_than_axis(dt in 0.0f32..10.0) {
            let diagonal = displacement(MoveMask::of(&[Direction::Up, Direction::Right]), dt);
            let axis = displacement(MoveMask::of(&[Direction::Right]), dt);
            let tolerance = 1e-5 * axis.length().max(1.0);
            prop_assert!((diagonal.length() - axis.length()).abs() <= tolerance);
        }

        #[test]
        fn test_heading_is_unit_or_zero(bits in any::<u8>()) {
            let h = heading(MoveMask::from_bits(bits));
            let len = h.length();
            prop_assert!(len == 0.0 || (len - 1.0).abs() < 1e-6);
        }
    }
}
