//! # RPC Seams
//!
//! The locator and the replication engines only ever talk to each other
//! through these two traits. Whether a call crosses a socket or stays inside
//! the process is the implementor's business.
//!
//! Callers on fire-and-forget paths log an [`RpcError`] and move on; nothing in
//! the replication protocol retries.

use crate::messages::*;
use async_trait::async_trait;
use std::fmt::Debug;

/// Errors surfaced by an RPC transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Call timed out after {0} ms")]
    Timeout(u64),

    #[error("Connection closed before a reply arrived")]
    Closed,
}

/// Client side of the locator service.
#[async_trait]
pub trait LocatorClient: Send + Sync + Debug {
    /// Stores object locations and notifies nodes whose subscriptions match.
    async fn publish(&self, request: PublishRequest) -> Result<PublishResponse, RpcError>;

    /// Stores areas of interest and returns the publications they match.
    async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscribeResponse, RpcError>;
}

/// Client side of a node's replication service.
#[async_trait]
pub trait ReplicationClient: Send + Sync + Debug {
    async fn spawn(&self, request: SpawnRequest) -> Result<SpawnResponse, RpcError>;

    async fn update(&self, request: UpdateRequest) -> Result<UpdateResponse, RpcError>;

    async fn register_interest(
        &self,
        request: RegisterInterestRequest,
    ) -> Result<RegisterInterestResponse, RpcError>;

    async fn notify_subscriber(
        &self,
        request: NotifySubscriberRequest,
    ) -> Result<NotifySubscriberResponse, RpcError>;
}
