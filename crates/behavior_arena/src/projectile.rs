//! Projectile behavior: fast straight-line motion that ends at the world
//! edge.

use crate::input::DIE;
use crate::motion::{at_world_edge, extrapolate, predicted_region};
use crate::PROJECTILE_SPEED;
use colyseus_core::{GameEvent, GameObject, Rect};
use replication::{EventEffects, ObjectBehavior};

pub const PROJECTILE_MARGIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectileBehavior;

impl ObjectBehavior for ProjectileBehavior {
    fn location(&self, object: &GameObject, now: i64) -> Rect {
        let elapsed = now - object.latest_event.timestamp_ms;
        extrapolate(object.rect, object.latest_event.input, PROJECTILE_SPEED, elapsed)
    }

    fn interest(&self, object: &GameObject, now: i64, prediction_ms: i64, publish_buffer_ms: i64) -> Rect {
        predicted_region(
            self.location(object, now),
            object.latest_event.input,
            PROJECTILE_SPEED,
            PROJECTILE_MARGIN,
            prediction_ms + publish_buffer_ms,
        )
    }

    fn apply_event(&self, object: &mut GameObject, event: GameEvent, effects: &mut EventEffects) {
        object.rect = self.location(object, event.timestamp_ms);
        object.latest_event = event;

        if event.has(DIE) {
            effects.deleted.push(object.guid);
        } else if at_world_edge(&object.rect) {
            effects.reactions.push(GameEvent::new(DIE, event.timestamp_ms));
        }
    }
}
