//! Wire messages for the locator and replication RPC services.
//!
//! `initial_states` and `latest_updates` are parallel arrays: entry `i` of one
//! describes the same object as entry `i` of the other.

use crate::types::{GameEvent, GameObject, Guid, NodeId, ObjectType, Rect};
use serde::{Deserialize, Serialize};

/// Static description of an object sent when a peer first learns about it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub guid: Guid,
    pub rect: Rect,
    pub object_type: ObjectType,
}

impl ObjectState {
    pub fn of(object: &GameObject) -> Self {
        Self {
            guid: object.guid,
            rect: object.rect,
            object_type: object.object_type,
        }
    }

    /// Materializes the state as an object owned by `owner`.
    pub fn into_object(self, owner: NodeId, latest_event: GameEvent) -> GameObject {
        GameObject {
            guid: self.guid,
            owner,
            rect: self.rect,
            object_type: self.object_type,
            latest_event,
        }
    }
}

/// A publication or subscription handed to the locator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorableMsg {
    pub guid: Guid,
    pub owner: NodeId,
    pub rect: Rect,
    pub ttl_ms: i64,
}

/// An object (guid and owning node) matched by the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchMsg {
    pub guid: Guid,
    pub owner: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub publications: Vec<StorableMsg>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub subscriptions: Vec<StorableMsg>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub matches: Vec<MatchMsg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub rect: Rect,
    pub object_type: ObjectType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnResponse {
    pub guid: Guid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub target_guid: Guid,
    pub event: GameEvent,
    #[serde(default)]
    pub initial_states: Vec<ObjectState>,
    #[serde(default)]
    pub latest_updates: Vec<GameEvent>,
    #[serde(default)]
    pub deleted_guids: Vec<Guid>,
}

impl UpdateRequest {
    /// An update carrying only an input event.
    pub fn input(target_guid: Guid, event: GameEvent) -> Self {
        Self {
            target_guid,
            event,
            initial_states: Vec::new(),
            latest_updates: Vec::new(),
            deleted_guids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterInterestRequest {
    pub target_guids: Vec<Guid>,
    pub requester: NodeId,
    #[serde(default)]
    pub is_renewal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterInterestResponse {
    pub initial_states: Vec<ObjectState>,
    pub latest_updates: Vec<GameEvent>,
}

impl RegisterInterestResponse {
    /// Pairs each initial state with its latest event.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectState, GameEvent)> + '_ {
        self.initial_states
            .iter()
            .copied()
            .zip(self.latest_updates.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifySubscriberRequest {
    pub publications: Vec<MatchMsg>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifySubscriberResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_optional_lists_default_to_empty() {
        let guid = Guid::new();
        let json = serde_json::json!({
            "target_guid": guid,
            "event": { "input": 8, "timestamp_ms": 0 },
        });

        let request: UpdateRequest = serde_json::from_value(json).expect("minimal update should decode");
        assert_eq!(request, UpdateRequest::input(guid, GameEvent::new(8, 0)));
    }

    #[test]
    fn test_register_interest_objects_are_index_aligned() {
        let a = ObjectState { guid: Guid::new(), rect: Rect::new(0.0, 0.0, 1.0, 1.0), object_type: ObjectType(1) };
        let b = ObjectState { guid: Guid::new(), rect: Rect::new(5.0, 5.0, 1.0, 1.0), object_type: ObjectType(2) };
        let response = RegisterInterestResponse {
            initial_states: vec![a, b],
            latest_updates: vec![GameEvent::new(1, 10), GameEvent::new(2, 20)],
        };

        let paired: Vec<_> = response.objects().collect();
        assert_eq!(paired, vec![(a, GameEvent::new(1, 10)), (b, GameEvent::new(2, 20))]);
    }

    #[test]
    fn test_object_state_materializes_with_owner() {
        let state = ObjectState { guid: Guid::new(), rect: Rect::new(1.0, 2.0, 3.0, 4.0), object_type: ObjectType(1) };
        let object = state.into_object(NodeId(7), GameEvent::new(4, 99));
        assert_eq!(object.owner, NodeId(7));
        assert_eq!(object.guid, state.guid);
        assert_eq!(ObjectState::of(&object), state);
    }
}
