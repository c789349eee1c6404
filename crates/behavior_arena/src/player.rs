//! Player behavior.
//!
//! Players walk at [`PLAYER_SPEED`] in the directions of their latest input.
//! `SHOOT` spawns a projectile just below the player, falling down;
//! `SHIELD_UP` spawns a shield hugging the player; `DIE` removes it.

use crate::input::{DIE, DOWN, SHIELD_UP, SHOOT};
use crate::motion::{extrapolate, predicted_region};
use crate::object_type::{PROJECTILE, SHIELD};
use crate::PLAYER_SPEED;
use colyseus_core::{GameEvent, GameObject, Rect};
use replication::{EventEffects, ObjectBehavior};

/// Interest margin around a player.
pub const PLAYER_MARGIN: f32 = 3.0;

/// Gap between a player and the shield it raises.
pub const SHIELD_GAP: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerBehavior;

impl PlayerBehavior {
    fn projectile_for(player: &GameObject, event: GameEvent) -> GameObject {
        // one unit below the player so the two never overlap at birth
        let rect = Rect::new(player.rect.x, player.rect.bottom() + 1.0, 1.0, 1.0);
        GameObject::new(player.owner, rect, PROJECTILE, GameEvent::new(DOWN, event.timestamp_ms))
    }

    fn shield_for(player: &GameObject, event: GameEvent) -> GameObject {
        GameObject::new(
            player.owner,
            player.rect.expand(SHIELD_GAP),
            SHIELD,
            GameEvent::new(0, event.timestamp_ms),
        )
    }
}

impl ObjectBehavior for PlayerBehavior {
    fn location(&self, object: &GameObject, now: i64) -> Rect {
        let elapsed = now - object.latest_event.timestamp_ms;
        extrapolate(object.rect, object.latest_event.input, PLAYER_SPEED, elapsed)
    }

    fn interest(&self, object: &GameObject, now: i64, prediction_ms: i64, publish_buffer_ms: i64) -> Rect {
        predicted_region(
            self.location(object, now),
            object.latest_event.input,
            PLAYER_SPEED,
            PLAYER_MARGIN,
            prediction_ms + publish_buffer_ms,
        )
    }

    fn apply_event(&self, object: &mut GameObject, event: GameEvent, effects: &mut EventEffects) {
        object.rect = self.location(object, event.timestamp_ms);
        object.latest_event = event;

        if event.has(SHOOT) {
            effects.created.push(Self::projectile_for(object, event));
        }
        if event.has(SHIELD_UP) {
            effects.created.push(Self::shield_for(object, event));
        }
        if event.has(DIE) {
            effects.deleted.push(object.guid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{LEFT, RIGHT};
    use crate::object_type::PLAYER;
    use colyseus_core::{Guid, NodeId};

    fn player_at(x: f32, y: f32) -> GameObject {
        let mut player = GameObject::new(NodeId(1), Rect::new(x, y, 10.0, 10.0), PLAYER, GameEvent::new(0, 0));
        player.guid = Guid::new();
        player
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_apply_event_settles_previous_motion() {
        let behavior = PlayerBehavior;
        let mut player = player_at(0.0, 0.0);
        let mut effects = EventEffects::default();

        behavior.apply_event(&mut player, GameEvent::new(RIGHT, 100), &mut effects);
        assert_eq!(player.rect.x, 0.0);

        behavior.apply_event(&mut player, GameEvent::new(RIGHT, 200), &mut effects);
        assert!(close(player.rect.x, 0.1));

        behavior.apply_event(&mut player, GameEvent::new(SHOOT, 300), &mut effects);
        assert!(close(player.rect.x, 0.2));
        assert_eq!(effects.created.len(), 1);

        let projectile = &effects.created[0];
        assert_eq!(projectile.object_type, PROJECTILE);
        assert!(close(projectile.rect.x, 0.2));
        assert_eq!(projectile.rect.y, 11.0);
        assert_eq!(projectile.latest_event, GameEvent::new(DOWN, 300));
        assert!(projectile.guid.is_nil());
        assert!(effects.deleted.is_empty());
    }

    #[test]
    fn test_shield_and_die() {
        let behavior = PlayerBehavior;
        let mut player = player_at(20.0, 20.0);
        let mut effects = EventEffects::default();

        behavior.apply_event(&mut player, GameEvent::new(SHIELD_UP | DIE, 50), &mut effects);
        assert_eq!(effects.created.len(), 1);
        assert_eq!(effects.created[0].object_type, SHIELD);
        assert_eq!(effects.created[0].rect, Rect::new(19.5, 19.5, 11.0, 11.0));
        assert_eq!(effects.deleted, vec![player.guid]);
    }

    #[test]
    fn test_location_and_interest_follow_latest_input() {
        let behavior = PlayerBehavior;
        let mut player = player_at(50.0, 50.0);
        player.latest_event = GameEvent::new(LEFT, 1000);

        let location = behavior.location(&player, 2000);
        assert!(close(location.x, 49.0));
        assert_eq!(location.y, 50.0);

        let interest = behavior.interest(&player, 1000, 500, 100);
        assert!(close(interest.x, 50.0 - 3.0 - 0.6));
        assert!(close(interest.width, 10.0 + 6.0 + 0.6));
        assert_eq!(interest.height, 16.0);
    }
}
