//! # Arena Behaviors
//!
//! A small top-down arena: players walk around, shoot projectiles that fall
//! straight down, and raise shields that stop projectiles. Everything lives
//! in a 100 x 100 world with its origin at the top-left corner.
//!
//! Objects move at a constant speed in the directions of their latest input
//! bits, so a node can extrapolate any object's position from its rectangle
//! and latest event alone. That is what makes these types replicable with
//! [`replication::ReplicationEngine`]: peers only ever exchange input events.
//!
//! Use [`arena_registry`] to get a [`BehaviorRegistry`] with every arena type
//! registered.

use colyseus_core::ObjectType;
use replication::{BehaviorRegistry, StaticBehavior};
use std::sync::Arc;

pub mod collision;
pub mod motion;
pub mod player;
pub mod projectile;
pub mod shield;

pub use collision::collision_inputs;
pub use player::PlayerBehavior;
pub use projectile::ProjectileBehavior;
pub use shield::ShieldBehavior;

/// Object type tags.
pub mod object_type {
    use super::ObjectType;

    pub const PLAYER: ObjectType = ObjectType(1);
    pub const PROJECTILE: ObjectType = ObjectType(2);
    pub const SHIELD: ObjectType = ObjectType(4);
}

/// Input bits carried in [`colyseus_core::GameEvent::input`].
pub mod input {
    pub const UP: u32 = 1;
    pub const DOWN: u32 = 1 << 1;
    pub const LEFT: u32 = 1 << 2;
    pub const RIGHT: u32 = 1 << 3;
    pub const SHOOT: u32 = 1 << 4;
    pub const SHIELD_UP: u32 = 1 << 5;
    pub const DIE: u32 = 1 << 6;
}

/// Player speed in world units per millisecond.
pub const PLAYER_SPEED: f32 = 0.001;
/// Projectile speed in world units per millisecond.
pub const PROJECTILE_SPEED: f32 = 0.01;

pub const MIN_X: f32 = 0.0;
pub const MIN_Y: f32 = 0.0;
pub const MAX_X: f32 = 100.0;
pub const MAX_Y: f32 = 100.0;

/// Interest margin for types without a registered behavior.
pub const DEFAULT_MARGIN: f32 = 1.0;

/// Registry with every arena type registered and a static fallback.
pub fn arena_registry() -> BehaviorRegistry {
    BehaviorRegistry::with_fallback(Arc::new(StaticBehavior::new(DEFAULT_MARGIN)))
        .with(object_type::PLAYER, Arc::new(PlayerBehavior))
        .with(object_type::PROJECTILE, Arc::new(ProjectileBehavior))
        .with(object_type::SHIELD, Arc::new(ShieldBehavior))
}
