//! Shield behavior: a static barrier that blocks projectiles.

use crate::input::DIE;
use colyseus_core::{GameEvent, GameObject, Rect};
use replication::{EventEffects, ObjectBehavior};

pub const SHIELD_MARGIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShieldBehavior;

impl ObjectBehavior for ShieldBehavior {
    fn location(&self, object: &GameObject, _now: i64) -> Rect {
        object.rect
    }

    fn interest(&self, object: &GameObject, _now: i64, _prediction_ms: i64, _publish_buffer_ms: i64) -> Rect {
        object.rect.expand(SHIELD_MARGIN)
    }

    fn apply_event(&self, object: &mut GameObject, event: GameEvent, effects: &mut EventEffects) {
        object.latest_event = event;
        if event.has(DIE) {
            effects.deleted.push(object.guid);
        }
    }
}
