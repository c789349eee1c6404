//! # RPC Transport
//!
//! Carries the locator and replication calls between processes as JSON text
//! frames over WebSocket.
//!
//! - [`RemoteLocator`] and [`RemoteReplica`] implement the client traits from
//!   `colyseus_core`, so engines and the locator cannot tell a remote peer
//!   from an in-process one.
//! - [`RpcServer`] accepts connections and hands every frame to an
//!   [`RpcHandler`]; [`LocatorService`] and [`ReplicationService`] adapt any
//!   client-trait implementation into a handler.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{RemoteLocator, RemoteReplica, RpcChannel, DEFAULT_CALL_TIMEOUT};
pub use error::TransportError;
pub use protocol::{LocatorCall, ReplicationCall, RpcReply};
pub use server::{LocatorService, ReplicationService, RpcHandler, RpcServer};
