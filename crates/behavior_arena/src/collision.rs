//! Collision pass run by a node's frame loop.
//!
//! Only projectiles this node owns are checked, so every hit is detected by
//! exactly one node. Targets may be primaries or replicas; inputs for
//! replicas are forwarded to their owners by the engine.

use crate::input::DIE;
use crate::motion::at_world_edge;
use crate::object_type::{PLAYER, PROJECTILE, SHIELD};
use colyseus_core::{Guid, ObjectType};
use replication::ObjectView;
use std::collections::HashSet;
use tracing::debug;

/// Returns the `DIE` inputs produced by the current frame.
///
/// A projectile dies when it reaches the world edge or touches a shield.
/// Otherwise, when it touches a player, both die.
pub fn collision_inputs(views: &[ObjectView]) -> Vec<(Guid, u32)> {
    let mut doomed: Vec<Guid> = Vec::new();
    let mut seen = HashSet::new();
    let mut kill = |guid: Guid, doomed: &mut Vec<Guid>| {
        if seen.insert(guid) {
            doomed.push(guid);
        }
    };

    let projectiles = views
        .iter()
        .filter(|view| view.is_primary && view.object.object_type == PROJECTILE);

    for projectile in projectiles {
        let guid = projectile.object.guid;
        if at_world_edge(&projectile.location) {
            kill(guid, &mut doomed);
            continue;
        }

        let touching = |object_type: ObjectType| {
            views.iter().filter(move |view| {
                view.object.object_type == object_type && view.location.intersects(&projectile.location)
            })
        };

        if touching(SHIELD).next().is_some() {
            debug!(projectile = %guid, "Projectile blocked by shield");
            kill(guid, &mut doomed);
            continue;
        }

        if let Some(player) = touching(PLAYER).next() {
            debug!(projectile = %guid, player = %player.object.guid, "Projectile hit player");
            kill(guid, &mut doomed);
            kill(player.object.guid, &mut doomed);
        }
    }

    doomed.into_iter().map(|guid| (guid, DIE)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use colyseus_core::{GameEvent, GameObject, NodeId, Rect};

    fn view(object_type: ObjectType, rect: Rect, is_primary: bool) -> ObjectView {
        let mut object = GameObject::new(NodeId(1), rect, object_type, GameEvent::default());
        object.guid = Guid::new();
        ObjectView {
            object,
            location: rect,
            is_primary,
        }
    }

    #[test]
    fn test_projectile_hitting_replica_player_kills_both() {
        let projectile = view(PROJECTILE, Rect::new(20.0, 20.0, 1.0, 1.0), true);
        let player = view(PLAYER, Rect::new(19.0, 20.5, 5.0, 5.0), false);
        let bystander = view(PLAYER, Rect::new(60.0, 60.0, 5.0, 5.0), true);

        let inputs = collision_inputs(&[projectile.clone(), player.clone(), bystander]);
        assert_eq!(
            inputs,
            vec![(projectile.object.guid, DIE), (player.object.guid, DIE)]
        );
    }

    #[test]
    fn test_shield_blocks_projectile() {
        let projectile = view(PROJECTILE, Rect::new(20.0, 20.0, 1.0, 1.0), true);
        let shield = view(SHIELD, Rect::new(18.0, 18.0, 6.0, 6.0), false);
        let player = view(PLAYER, Rect::new(19.0, 19.0, 4.0, 4.0), false);

        let inputs = collision_inputs(&[projectile.clone(), shield, player]);
        assert_eq!(inputs, vec![(projectile.object.guid, DIE)]);
    }

    #[test]
    fn test_only_own_projectiles_are_checked() {
        let replica_projectile = view(PROJECTILE, Rect::new(20.0, 20.0, 1.0, 1.0), false);
        let player = view(PLAYER, Rect::new(19.0, 19.0, 4.0, 4.0), true);
        assert!(collision_inputs(&[replica_projectile, player]).is_empty());
    }

    #[test]
    fn test_projectile_at_edge_dies() {
        let projectile = view(PROJECTILE, Rect::new(40.0, 99.0, 1.0, 1.0), true);
        assert_eq!(collision_inputs(&[projectile.clone()]), vec![(projectile.object.guid, DIE)]);
    }
}
