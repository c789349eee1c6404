//! Server side: a WebSocket accept loop dispatching JSON calls to an
//! [`RpcHandler`].

use crate::error::TransportError;
use crate::protocol::{decode_call, LocatorCall, ReplicationCall, RpcReply};
use async_trait::async_trait;
use colyseus_core::{LocatorClient, ReplicationClient, ShutdownState};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, trace};

/// Turns one decoded text frame into a reply.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Short name used in logs.
    fn service_name(&self) -> &'static str;

    async fn dispatch(&self, payload: &str) -> RpcReply;
}

/// Serves the locator calls of any [`LocatorClient`].
#[derive(Debug, Clone)]
pub struct LocatorService {
    inner: Arc<dyn LocatorClient>,
}

impl LocatorService {
    pub fn new(inner: Arc<dyn LocatorClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RpcHandler for LocatorService {
    fn service_name(&self) -> &'static str {
        "locator"
    }

    async fn dispatch(&self, payload: &str) -> RpcReply {
        let call = match decode_call::<LocatorCall>(payload) {
            Ok(call) => call,
            Err(reply) => return reply,
        };
        match call {
            LocatorCall::Publish(request) => RpcReply::from_result(self.inner.publish(request).await),
            LocatorCall::Subscribe(request) => RpcReply::from_result(self.inner.subscribe(request).await),
        }
    }
}

/// Serves the replication calls of any [`ReplicationClient`].
#[derive(Debug, Clone)]
pub struct ReplicationService {
    inner: Arc<dyn ReplicationClient>,
}

impl ReplicationService {
    pub fn new(inner: Arc<dyn ReplicationClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RpcHandler for ReplicationService {
    fn service_name(&self) -> &'static str {
        "replication"
    }

    async fn dispatch(&self, payload: &str) -> RpcReply {
        let call = match decode_call::<ReplicationCall>(payload) {
            Ok(call) => call,
            Err(reply) => return reply,
        };
        match call {
            ReplicationCall::Spawn(request) => RpcReply::from_result(self.inner.spawn(request).await),
            ReplicationCall::Update(request) => RpcReply::from_result(self.inner.update(request).await),
            ReplicationCall::RegisterInterest(request) => {
                RpcReply::from_result(self.inner.register_interest(request).await)
            }
            ReplicationCall::NotifySubscriber(request) => {
                RpcReply::from_result(self.inner.notify_subscriber(request).await)
            }
        }
    }
}

/// Bound WebSocket server.
pub struct RpcServer {
    listener: TcpListener,
    handler: Arc<dyn RpcHandler>,
    shutdown: ShutdownState,
}

impl RpcServer {
    pub async fn bind(
        addr: &str,
        handler: Arc<dyn RpcHandler>,
        shutdown: ShutdownState,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Network(format!("Failed to bind {addr}: {e}")))?;
        Ok(Self {
            listener,
            handler,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::Internal(e.to_string()))
    }

    /// Accepts connections until shutdown is initiated.
    pub async fn run(self) {
        let service = self.handler.service_name();
        if let Ok(addr) = self.local_addr() {
            info!("🌐 {} service listening on {}", service, addr);
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let handler = self.handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, handler).await {
                                debug!(peer = %addr, "Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = self.shutdown.wait() => break,
            }
        }

        info!("🛑 {} service stopped", service);
    }

    /// Runs the accept loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handler: Arc<dyn RpcHandler>,
) -> Result<(), TransportError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| TransportError::Network(format!("WebSocket handshake failed: {e}")))?;
    let (mut sender, mut receiver) = ws_stream.split();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                trace!(peer = %addr, service = handler.service_name(), "Dispatching call");
                let reply = handler.dispatch(text.as_str()).await;
                let body = serde_json::to_string(&reply).map_err(|e| TransportError::Internal(e.to_string()))?;
                sender
                    .send(Message::Text(body.into()))
                    .await
                    .map_err(|e| TransportError::Network(e.to_string()))?;
            }
            Ok(Message::Ping(data)) => {
                let _ = sender.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => return Err(TransportError::Network(e.to_string())),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RemoteLocator, RemoteReplica, RpcChannel};
    use colyseus_core::{
        GameEvent, Guid, NodeId, ObjectType, PublishRequest, Rect, RegisterInterestRequest, RpcError,
        SpawnRequest, StorableMsg, SubscribeRequest, UpdateRequest,
    };
    use locator::Locator;
    use replication::{BehaviorRegistry, ReplicationConfig, ReplicationEngine};
    use std::time::Duration;

    async fn serve(handler: Arc<dyn RpcHandler>, shutdown: &ShutdownState) -> String {
        let server = RpcServer::bind("127.0.0.1:0", handler, shutdown.clone())
            .await
            .expect("loopback bind should succeed");
        let addr = server.local_addr().expect("bound address").to_string();
        server.spawn();
        addr
    }

    #[tokio::test]
    async fn test_locator_over_websocket() {
        let shutdown = ShutdownState::new();
        let addr = serve(Arc::new(LocatorService::new(Arc::new(Locator::default()))), &shutdown).await;
        let remote = RemoteLocator::connect(&addr);

        let published = Guid::new();
        remote
            .publish(PublishRequest {
                publications: vec![StorableMsg {
                    guid: published,
                    owner: NodeId(1),
                    rect: Rect::new(10.0, 10.0, 2.0, 2.0),
                    ttl_ms: 10_000,
                }],
            })
            .await
            .expect("publish should succeed");

        let response = remote
            .subscribe(SubscribeRequest {
                subscriptions: vec![StorableMsg {
                    guid: Guid::new(),
                    owner: NodeId(2),
                    rect: Rect::new(0.0, 0.0, 20.0, 20.0),
                    ttl_ms: 10_000,
                }],
            })
            .await
            .expect("subscribe should succeed");

        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.matches[0].guid, published);
        shutdown.initiate_shutdown();
    }

    #[tokio::test]
    async fn test_replication_over_websocket() {
        let shutdown = ShutdownState::new();
        let engine = ReplicationEngine::new(
            NodeId(1),
            ReplicationConfig::without_delay(),
            Arc::new(BehaviorRegistry::new()),
        );
        let addr = serve(Arc::new(ReplicationService::new(Arc::new(engine.clone()))), &shutdown).await;
        let remote = RemoteReplica::connect(&addr);

        let spawned = remote
            .spawn(SpawnRequest {
                rect: Rect::new(10.0, 20.0, 30.0, 40.0),
                object_type: ObjectType(1),
            })
            .await
            .expect("spawn should succeed");
        assert!(engine.primary(spawned.guid).await.is_some());

        remote
            .update(UpdateRequest::input(spawned.guid, GameEvent::new(42, 7)))
            .await
            .expect("update should succeed");

        let response = remote
            .register_interest(RegisterInterestRequest {
                target_guids: vec![spawned.guid],
                requester: NodeId(2),
                is_renewal: false,
            })
            .await
            .expect("register interest should succeed");
        assert_eq!(response.initial_states[0].rect, Rect::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(response.latest_updates[0].input, 42);
        assert_ne!(response.latest_updates[0].timestamp_ms, 7);
        shutdown.initiate_shutdown();
    }

    #[tokio::test]
    async fn test_malformed_payload_gets_error_reply() {
        let service = LocatorService::new(Arc::new(Locator::default()));
        let reply = service.dispatch("not json").await;
        assert!(matches!(reply, RpcReply::Err(message) if message.starts_with("Malformed call")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_connection_error() {
        // bind and drop to find a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let channel = RpcChannel::new(&format!("127.0.0.1:{port}")).with_timeout(Duration::from_secs(2));
        let result = RemoteLocator::new(channel).subscribe(SubscribeRequest::default()).await;
        assert!(matches!(result, Err(RpcError::Connection(_))));
    }
}
