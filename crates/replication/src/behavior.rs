//! Object behavior model.
//!
//! The engine never interprets object state itself. Everything it needs to
//! know about an object (where it is now, what region it cares about, how an
//! input event changes it) comes from the [`ObjectBehavior`] registered for
//! the object's type.

use colyseus_core::{GameEvent, GameObject, Guid, ObjectType, Rect};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Side effects produced while applying an event to a primary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventEffects {
    /// Follow-up events for the same object, applied after the current one.
    pub reactions: Vec<GameEvent>,
    /// New objects to spawn on the node that owns the current object.
    pub created: Vec<GameObject>,
    /// Objects (usually the current one) that stop existing.
    pub deleted: Vec<Guid>,
}

impl EventEffects {
    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty() && self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Per-type capability contract used by the replication engine.
pub trait ObjectBehavior: Send + Sync + Debug {
    /// Location of `object` at `now`, extrapolated from its latest event.
    fn location(&self, object: &GameObject, now: i64) -> Rect;

    /// Region `object` needs to see until the next publication arrives.
    fn interest(&self, object: &GameObject, now: i64, prediction_ms: i64, publish_buffer_ms: i64) -> Rect;

    /// Advances `object` to the event's timestamp and records the event.
    ///
    /// Replicas apply events with a throwaway `effects` value; only primaries
    /// act on what is pushed into it.
    fn apply_event(&self, object: &mut GameObject, event: GameEvent, effects: &mut EventEffects);
}

/// Behavior for objects that never move: location is the stored rectangle,
/// interest is that rectangle grown by a fixed margin.
#[derive(Debug, Clone, Copy)]
pub struct StaticBehavior {
    pub margin: f32,
}

impl StaticBehavior {
    pub const fn new(margin: f32) -> Self {
        Self { margin }
    }
}

impl Default for StaticBehavior {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ObjectBehavior for StaticBehavior {
    fn location(&self, object: &GameObject, _now: i64) -> Rect {
        object.rect
    }

    fn interest(&self, object: &GameObject, now: i64, _prediction_ms: i64, _publish_buffer_ms: i64) -> Rect {
        self.location(object, now).expand(self.margin)
    }

    fn apply_event(&self, object: &mut GameObject, event: GameEvent, _effects: &mut EventEffects) {
        object.latest_event = event;
    }
}

/// Maps object types to their behaviors.
#[derive(Debug, Clone)]
pub struct BehaviorRegistry {
    behaviors: HashMap<ObjectType, Arc<dyn ObjectBehavior>>,
    fallback: Arc<dyn ObjectBehavior>,
}

impl BehaviorRegistry {
    /// Creates a registry where every type falls back to [`StaticBehavior`].
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(StaticBehavior::default()))
    }

    pub fn with_fallback(fallback: Arc<dyn ObjectBehavior>) -> Self {
        Self {
            behaviors: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, object_type: ObjectType, behavior: Arc<dyn ObjectBehavior>) {
        self.behaviors.insert(object_type, behavior);
    }

    /// Builder-style variant of [`BehaviorRegistry::register`].
    pub fn with(mut self, object_type: ObjectType, behavior: Arc<dyn ObjectBehavior>) -> Self {
        self.register(object_type, behavior);
        self
    }

    pub fn get(&self, object_type: ObjectType) -> &dyn ObjectBehavior {
        self.behaviors
            .get(&object_type)
            .map(Arc::as_ref)
            .unwrap_or_else(|| self.fallback.as_ref())
    }

    pub fn is_registered(&self, object_type: ObjectType) -> bool {
        self.behaviors.contains_key(&object_type)
    }

    pub fn location(&self, object: &GameObject, now: i64) -> Rect {
        self.get(object.object_type).location(object, now)
    }

    pub fn interest(&self, object: &GameObject, now: i64, prediction_ms: i64, publish_buffer_ms: i64) -> Rect {
        self.get(object.object_type)
            .interest(object, now, prediction_ms, publish_buffer_ms)
    }

    pub fn apply_event(&self, object: &mut GameObject, event: GameEvent, effects: &mut EventEffects) {
        self.get(object.object_type).apply_event(object, event, effects);
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colyseus_core::NodeId;

    #[derive(Debug)]
    struct Doomed;

    impl ObjectBehavior for Doomed {
        fn location(&self, object: &GameObject, _now: i64) -> Rect {
            object.rect
        }

        fn interest(&self, object: &GameObject, _now: i64, _prediction_ms: i64, _publish_buffer_ms: i64) -> Rect {
            object.rect
        }

        fn apply_event(&self, object: &mut GameObject, event: GameEvent, effects: &mut EventEffects) {
            object.latest_event = event;
            effects.deleted.push(object.guid);
        }
    }

    #[test]
    fn test_unregistered_type_uses_fallback() {
        let registry = BehaviorRegistry::new().with(ObjectType(7), Arc::new(Doomed));
        let mut object = GameObject::new(NodeId(0), Rect::new(10.0, 10.0, 2.0, 2.0), ObjectType(1), GameEvent::default());
        object.guid = Guid::new();

        assert!(!registry.is_registered(ObjectType(1)));
        assert_eq!(registry.interest(&object, 0, 500, 100), Rect::new(9.0, 9.0, 4.0, 4.0));

        let mut effects = EventEffects::default();
        registry.apply_event(&mut object, GameEvent::new(3, 50), &mut effects);
        assert_eq!(object.latest_event, GameEvent::new(3, 50));
        assert!(effects.is_empty());

        object.object_type = ObjectType(7);
        registry.apply_event(&mut object, GameEvent::new(1, 60), &mut effects);
        assert_eq!(effects.deleted, vec![object.guid]);
    }
}
