//! Client side: [`LocatorClient`] and [`ReplicationClient`] implementations
//! that reach a remote node over WebSocket.

use crate::protocol::{LocatorCall, ReplicationCall, RpcReply};
use async_trait::async_trait;
use colyseus_core::{
    LocatorClient, NotifySubscriberRequest, NotifySubscriberResponse, PublishRequest, PublishResponse,
    RegisterInterestRequest, RegisterInterestResponse, ReplicationClient, RpcError, SpawnRequest, SpawnResponse,
    SubscribeRequest, SubscribeResponse, UpdateRequest, UpdateResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::trace;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// One-shot call channel to a WebSocket endpoint.
///
/// Every call opens its own connection, so a node that is down only fails
/// the calls made while it is down.
#[derive(Debug, Clone)]
pub struct RpcChannel {
    url: String,
    timeout: Duration,
}

impl RpcChannel {
    /// Creates a channel to `addr`, given either as `host:port` or as a full
    /// `ws://` URL.
    pub fn new(addr: &str) -> Self {
        let url = if addr.starts_with("ws://") || addr.starts_with("wss://") {
            addr.to_string()
        } else {
            format!("ws://{addr}")
        };
        Self {
            url,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<C, R>(&self, call: &C) -> Result<R, RpcError>
    where
        C: Serialize + Sync,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_string(call).map_err(|e| RpcError::Codec(e.to_string()))?;
        let reply = tokio::time::timeout(self.timeout, self.exchange(payload))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout.as_millis() as u64))??;
        reply.into_result()
    }

    async fn exchange(&self, payload: String) -> Result<RpcReply, RpcError> {
        let (mut ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| RpcError::Connection(format!("{}: {e}", self.url)))?;

        ws.send(Message::Text(payload.into()))
            .await
            .map_err(|e| RpcError::Connection(e.to_string()))?;

        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let reply = serde_json::from_str::<RpcReply>(text.as_str())
                        .map_err(|e| RpcError::Codec(e.to_string()));
                    let _ = ws.close(None).await;
                    return reply;
                }
                Ok(Message::Close(_)) => break,
                Ok(other) => trace!(url = %self.url, "Ignoring non-text frame: {:?}", other),
                Err(e) => return Err(RpcError::Connection(e.to_string())),
            }
        }

        Err(RpcError::Closed)
    }
}

/// Locator reached over the network.
#[derive(Debug, Clone)]
pub struct RemoteLocator {
    channel: RpcChannel,
}

impl RemoteLocator {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn connect(addr: &str) -> Self {
        Self::new(RpcChannel::new(addr))
    }
}

#[async_trait]
impl LocatorClient for RemoteLocator {
    async fn publish(&self, request: PublishRequest) -> Result<PublishResponse, RpcError> {
        self.channel.call(&LocatorCall::Publish(request)).await
    }

    async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscribeResponse, RpcError> {
        self.channel.call(&LocatorCall::Subscribe(request)).await
    }
}

/// Replication engine of a peer node reached over the network.
#[derive(Debug, Clone)]
pub struct RemoteReplica {
    channel: RpcChannel,
}

impl RemoteReplica {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn connect(addr: &str) -> Self {
        Self::new(RpcChannel::new(addr))
    }
}

#[async_trait]
impl ReplicationClient for RemoteReplica {
    async fn spawn(&self, request: SpawnRequest) -> Result<SpawnResponse, RpcError> {
        self.channel.call(&ReplicationCall::Spawn(request)).await
    }

    async fn update(&self, request: UpdateRequest) -> Result<UpdateResponse, RpcError> {
        self.channel.call(&ReplicationCall::Update(request)).await
    }

    async fn register_interest(
        &self,
        request: RegisterInterestRequest,
    ) -> Result<RegisterInterestResponse, RpcError> {
        self.channel.call(&ReplicationCall::RegisterInterest(request)).await
    }

    async fn notify_subscriber(
        &self,
        request: NotifySubscriberRequest,
    ) -> Result<NotifySubscriberResponse, RpcError> {
        self.channel.call(&ReplicationCall::NotifySubscriber(request)).await
    }
}
