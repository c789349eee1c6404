//! # Colyseus Core
//!
//! Shared vocabulary for the interest-scoped replication workspace: identifiers,
//! geometry, game objects and events, the wire messages exchanged between nodes,
//! and the two RPC seams ([`LocatorClient`] and [`ReplicationClient`]) that the
//! locator and the replication engines talk through.
//!
//! ## Architecture Overview
//!
//! - **Locator** - keeps a soft-state spatial index of publications (object
//!   locations) and subscriptions (areas of interest) and tells nodes which
//!   remote objects they should replicate.
//! - **Replication engine** - one per node; owns primaries, holds replicas of
//!   objects owned elsewhere and pushes updates to interested peers.
//! - **Transport** - anything implementing the client traits. In-process
//!   implementations are provided by the locator and engine themselves, remote
//!   ones by the `rpc_transport` crate.
//!
//! ## Soft State
//!
//! Nothing here is durable. Spatial entries and interest records carry absolute
//! expiry timestamps in milliseconds (see [`current_timestamp_ms`]) and are
//! forgotten when they are not renewed.

pub mod messages;
pub mod rpc;
pub mod shutdown;
pub mod types;
pub mod utils;

pub use messages::*;
pub use rpc::{LocatorClient, ReplicationClient, RpcError};
pub use shutdown::ShutdownState;
pub use types::{GameEvent, GameObject, Guid, NodeId, ObjectType, Rect};
pub use utils::current_timestamp_ms;

pub use async_trait::async_trait;
