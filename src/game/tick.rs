//! Authoritative Simulation Tick
//!
//! One fixed-duration step of the world. Pure over `World`: the caller
//! feeds intents in between ticks, this function decides what everyone
//! is told and advances positions. Step order matters:
//!
//! 1. greet joiners (`Hello` + catch-up of everyone already present)
//! 2. announce joiners to everyone else
//! 3. announce leavers
//! 4. commit changed movement masks and broadcast them
//! 5. integrate positions
//! 6. answer latency probes
//! 7. reset the tick window

use crate::game::events::{Audience, GameEvent};
use crate::game::movement;
use crate::game::state::World;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, in emission order
    pub events: Vec<GameEvent>,
    /// Players greeted this tick
    pub joined: usize,
    /// Players announced as gone this tick
    pub left: usize,
    /// Players whose committed movement changed
    pub moved: usize,
    /// Probes answered
    pub pongs: usize,
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `world` - The world (will be mutated)
/// * `tick` - Tick number, stamped on every event
/// * `dt` - Fixed tick duration in seconds
pub fn tick(world: &mut World, tick: u64, dt: f32) -> TickResult {
    let mut result = TickResult::default();
    let window = world.take_pending();

    // 1. Greeting and world-state catch-up. Co-joiners are skipped here,
    //    they hear about each other in step 2.
    for &id in window.joined() {
        let Some(joiner) = world.player(id) else {
            continue;
        };
        result.events.push(GameEvent::hello(tick, joiner));

        for other in world.players() {
            if other.id == id || window.joined().contains(&other.id) {
                continue;
            }
            result
                .events
                .push(GameEvent::player_joined(tick, Audience::Only(id), other));
        }
        result.joined += 1;
    }

    // 2. Join notices, never echoed to the joiner
    for &id in window.joined() {
        if let Some(joiner) = world.player(id) {
            result
                .events
                .push(GameEvent::player_joined(tick, Audience::AllExcept(id), joiner));
        }
    }

    // 3. Leave notices
    for &id in window.left() {
        result.events.push(GameEvent::player_left(tick, id));
        result.left += 1;
    }

    // 4. Commit movement changes, broadcast with pre-integration position
    for player in world.players_mut() {
        if player.has_pending_change() {
            player.moving = player.pending;
            result.events.push(GameEvent::player_moving(tick, player));
            result.moved += 1;
        }
    }

    // 5. Simulate
    for player in world.players_mut() {
        movement::step(player, dt);
    }

    // 6. Pongs for players still around
    for (&id, &timestamp) in window.pings() {
        if world.contains(id) {
            result.events.push(GameEvent::pong(tick, id, timestamp));
            result.pongs += 1;
        }
    }

    // 7. The window was taken up front, nothing carries over.
    debug_assert!(world.pending().is_empty());

    result
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::events::GameEventData;
    use crate::game::input::{Direction, MoveMask};
    use crate::game::state::PlayerId;
    use crate::{PLAYER_SPEED, WORLD_HEIGHT, WORLD_WIDTH};

    const DT: f32 = 1.0 / 30.0;

    /// Everything `id` would receive from a tick, in order.
    fn received(result: &TickResult, id: PlayerId) -> Vec<GameEventData> {
        result
            .events
            .iter()
            .filter(|e| e.audience.includes(id))
            .map(|e| e.data.clone())
            .collect()
    }

    fn joined_ids(data: &[GameEventData]) -> Vec<PlayerId> {
        data.iter()
            .filter_map(|d| match d {
                GameEventData::PlayerJoined { player_id, .. } => Some(*player_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_world_tick() {
        let mut world = World::new(4, 0);
        let result = tick(&mut world, 0, DT);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut world = World::new(8, 7);
        let a = world.join().unwrap();
        assert_eq!(a, PlayerId(0));
        let spawn_a = world.player(a).unwrap().clone();

        // Tick 0: A is greeted
        let result = tick(&mut world, 0, DT);
        assert_eq!(
            received(&result, a),
            vec![GameEventData::Hello {
                player_id: a,
                position: spawn_a.position,
                hue: spawn_a.hue,
            }]
        );

        // Tick 1: B joins
        let b = world.join().unwrap();
        assert_eq!(b, PlayerId(1));
        let spawn_b = world.player(b).unwrap().clone();
        let result = tick(&mut world, 1, DT);

        let to_b = received(&result, b);
        assert_eq!(
            to_b,
            vec![
                GameEventData::Hello {
                    player_id: b,
                    position: spawn_b.position,
                    hue: spawn_b.hue,
                },
                GameEventData::PlayerJoined {
                    player_id: a,
                    position: spawn_a.position,
                    hue: spawn_a.hue,
                    moving: MoveMask::NONE,
                },
            ]
        );
        assert_eq!(joined_ids(&received(&result, a)), vec![b]);

        // Tick 2: A starts moving right, broadcast to both with unchanged position
        world.submit_intent(a, Direction::Right, true);
        let result = tick(&mut world, 2, DT);
        let expected = GameEventData::PlayerMoving {
            player_id: a,
            position: spawn_a.position,
            moving: MoveMask::from_bits(0b0000_0010),
        };
        assert_eq!(received(&result, a), vec![expected.clone()]);
        assert_eq!(received(&result, b), vec![expected]);

        // Tick 3: A stops; the broadcast x has advanced by one tick of travel
        world.submit_intent(a, Direction::Right, false);
        let result = tick(&mut world, 3, DT);
        let advanced = Vec2::new(spawn_a.position.x + PLAYER_SPEED * DT, spawn_a.position.y)
            .wrap(WORLD_WIDTH, WORLD_HEIGHT);
        match &received(&result, b)[..] {
            [GameEventData::PlayerMoving { player_id, position, moving }] => {
                assert_eq!(*player_id, a);
                assert!(moving.is_empty());
                assert!((position.x - advanced.x).abs() < 1e-3, "{:?}", position);
                assert_eq!(position.y, spawn_a.position.y);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_hello_precedes_catch_up() {
        let mut world = World::new(8, 1);
        world.join().unwrap();
        world.join().unwrap();
        tick(&mut world, 0, DT);

        let c = world.join().unwrap();
        let result = tick(&mut world, 1, DT);
        let to_c = received(&result, c);

        assert!(matches!(to_c[0], GameEventData::Hello { player_id, .. } if player_id == c));
        assert_eq!(joined_ids(&to_c), vec![PlayerId(0), PlayerId(1)]);
    }

    #[test]
    fn test_co_joiners_hear_about_each_other_once() {
        let mut world = World::new(8, 2);
        let a = world.join().unwrap();
        let b = world.join().unwrap();
        let result = tick(&mut world, 0, DT);

        assert_eq!(joined_ids(&received(&result, a)), vec![b]);
        assert_eq!(joined_ids(&received(&result, b)), vec![a]);
    }

    #[test]
    fn test_join_and_leave_same_tick_is_invisible() {
        let mut world = World::new(8, 3);
        let a = world.join().unwrap();
        tick(&mut world, 0, DT);

        let ghost = world.join().unwrap();
        world.submit_ping(ghost, 5.0);
        world.leave(ghost);
        let result = tick(&mut world, 1, DT);

        assert!(result.events.is_empty(), "{:?}", result.events);
        assert!(received(&result, a).is_empty());
        assert_eq!(result.joined, 0);
        assert_eq!(result.left, 0);
    }

    #[test]
    fn test_leave_is_broadcast() {
        let mut world = World::new(8, 4);
        let a = world.join().unwrap();
        let b = world.join().unwrap();
        tick(&mut world, 0, DT);

        world.leave(b);
        let result = tick(&mut world, 1, DT);

        assert_eq!(
            received(&result, a),
            vec![GameEventData::PlayerLeft { player_id: b }]
        );
        assert_eq!(result.left, 1);

        // Not repeated on the next tick
        let result = tick(&mut world, 2, DT);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_movement_gating() {
        let mut world = World::new(8, 5);
        let a = world.join().unwrap();
        tick(&mut world, 0, DT);

        // Same bit twice, then nothing new
        world.submit_intent(a, Direction::Down, true);
        world.submit_intent(a, Direction::Down, true);
        assert_eq!(tick(&mut world, 1, DT).moved, 1);

        world.submit_intent(a, Direction::Down, true);
        assert_eq!(tick(&mut world, 2, DT).moved, 0);

        // Toggle on and back off inside one window nets to nothing
        world.submit_intent(a, Direction::Left, true);
        world.submit_intent(a, Direction::Left, false);
        assert_eq!(tick(&mut world, 3, DT).moved, 0);

        // Real toggle broadcasts
        world.submit_intent(a, Direction::Down, false);
        assert_eq!(tick(&mut world, 4, DT).moved, 1);
    }

    #[test]
    fn test_pong_echoes_latest_timestamp() {
        let mut world = World::new(8, 6);
        let a = world.join().unwrap();
        tick(&mut world, 0, DT);

        world.submit_ping(a, 1234.5);
        world.submit_ping(a, 1300.25);
        let result = tick(&mut world, 1, DT);

        assert_eq!(
            received(&result, a),
            vec![GameEventData::Pong { timestamp: 1300.25 }]
        );
    }

    #[test]
    fn test_no_pong_for_departed_player() {
        let mut world = World::new(8, 6);
        let a = world.join().unwrap();
        let b = world.join().unwrap();
        tick(&mut world, 0, DT);

        world.submit_ping(b, 10.0);
        world.leave(b);
        let result = tick(&mut world, 1, DT);

        assert_eq!(result.pongs, 0);
        assert!(result
            .events
            .iter()
            .all(|e| !matches!(e.data, GameEventData::Pong { .. })));
        assert_eq!(received(&result, a).len(), 1);
    }

    #[test]
    fn test_scratch_cleared_after_tick() {
        let mut world = World::new(8, 8);
        let a = world.join().unwrap();
        world.submit_ping(a, 1.0);
        tick(&mut world, 0, DT);

        assert!(world.pending().is_empty());
        let result = tick(&mut world, 1, DT);
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_positions_wrap_after_many_ticks() {
        let mut world = World::new(8, 9);
        let a = world.join().unwrap();
        world.submit_intent(a, Direction::Left, true);
        world.submit_intent(a, Direction::Up, true);

        for t in 0..1000 {
            tick(&mut world, t, DT);
            let pos = world.player(a).unwrap().position;
            assert!(pos.is_within(WORLD_WIDTH, WORLD_HEIGHT), "{:?}", pos);
        }
    }
}
