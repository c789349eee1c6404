//! # Replication
//!
//! Primary/replica object replication for one node of a cluster.
//!
//! A node owns its primaries outright and holds read-mostly replicas of
//! objects owned by peers, but only of objects that overlap the interest
//! region of one of its own primaries. How objects move and react to input is
//! supplied per object type through [`ObjectBehavior`].
//!
//! ```rust,no_run
//! use replication::{BehaviorRegistry, ReplicationConfig, ReplicationEngine};
//! use colyseus_core::{NodeId, ObjectType, Rect};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let engine = ReplicationEngine::new(NodeId(1), ReplicationConfig::default(), Arc::new(BehaviorRegistry::new()));
//! let guid = engine.spawn_object(Rect::new(10.0, 10.0, 1.0, 1.0), ObjectType(1)).await;
//! engine.advance(vec![(guid, 8)]).await;
//! # }
//! ```

pub mod behavior;
pub mod config;
pub mod engine;

pub use behavior::{BehaviorRegistry, EventEffects, ObjectBehavior, StaticBehavior};
pub use config::ReplicationConfig;
pub use engine::{InterestRecord, NodeState, ObjectView, ReplicationEngine};
