//! The locator service: one shared [`Quadtree`] answering Publish and
//! Subscribe calls, and pushing NotifySubscriber to nodes whose stored
//! subscriptions match a new publication.

use crate::quadtree::{Quadtree, QuadtreeStats, Role, SpatialEntry, Storable, DEFAULT_BOUNDARY, DEFAULT_CAPACITY};
use async_trait::async_trait;
use colyseus_core::{
    LocatorClient, MatchMsg, NodeId, NotifySubscriberRequest, PublishRequest, PublishResponse, Rect,
    ReplicationClient, RpcError, ShutdownState, SubscribeRequest, SubscribeResponse,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Locator tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorConfig {
    pub boundary: Rect,
    pub capacity: usize,
    pub cleanup_interval_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            boundary: DEFAULT_BOUNDARY,
            capacity: DEFAULT_CAPACITY,
            cleanup_interval_ms: 2000,
        }
    }
}

#[derive(Debug)]
struct LocatorInner {
    index: Quadtree,
    nodes: DashMap<NodeId, Arc<dyn ReplicationClient>>,
    config: LocatorConfig,
    shutdown: ShutdownState,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheaply cloneable handle to a running locator.
#[derive(Debug, Clone)]
pub struct Locator {
    inner: Arc<LocatorInner>,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        Self::with_shutdown(config, ShutdownState::new())
    }

    /// Creates a locator whose background tasks stop with `shutdown`.
    pub fn with_shutdown(config: LocatorConfig, shutdown: ShutdownState) -> Self {
        Self {
            inner: Arc::new(LocatorInner {
                index: Quadtree::new(config.boundary, config.capacity),
                nodes: DashMap::new(),
                config,
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Quadtree {
        &self.inner.index
    }

    /// Registers the endpoint used to notify `node_id`.
    pub fn connect_node(&self, node_id: NodeId, client: Arc<dyn ReplicationClient>) {
        debug!(node_id = %node_id, "Registered replication endpoint");
        self.inner.nodes.insert(node_id, client);
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Stores publications and notifies the owners of matching subscriptions.
    ///
    /// Items are handled in order, each one querying before it is inserted,
    /// so a publication never matches itself but can be matched by later
    /// items of the same batch. Notification failures are only logged.
    pub async fn publish(&self, request: PublishRequest) -> PublishResponse {
        trace!(count = request.publications.len(), "Received publish request");

        let mut matches: HashMap<NodeId, Vec<MatchMsg>> = HashMap::new();
        let mut found: Vec<SpatialEntry> = Vec::new();

        for publication in &request.publications {
            let item = Storable::from_msg(publication, Role::Publication);
            found.clear();
            self.inner.index.query(&item, &mut found);

            let matched = MatchMsg {
                guid: publication.guid,
                owner: publication.owner,
            };
            for subscription in &found {
                let batch = matches.entry(subscription.owner).or_default();
                if !batch.contains(&matched) {
                    batch.push(matched);
                }
            }

            if !self.inner.index.insert(item, publication.ttl_ms) {
                trace!(guid = %publication.guid, "Publication outside locator boundary");
            }
        }

        self.notify_subscribers(matches).await;
        PublishResponse {}
    }

    async fn notify_subscribers(&self, matches: HashMap<NodeId, Vec<MatchMsg>>) {
        let calls = matches.into_iter().filter_map(|(node_id, publications)| {
            let Some(client) = self.inner.nodes.get(&node_id).map(|entry| entry.value().clone()) else {
                warn!(node_id = %node_id, "No endpoint registered for matched node");
                return None;
            };
            trace!(node_id = %node_id, count = publications.len(), "Notifying subscriber");
            Some(async move {
                let result = client.notify_subscriber(NotifySubscriberRequest { publications }).await;
                (node_id, result)
            })
        });

        for (node_id, result) in futures::future::join_all(calls).await {
            if let Err(e) = result {
                warn!(node_id = %node_id, error = %e, "Failed to notify subscriber");
            }
        }
    }

    /// Stores subscriptions and returns every publication they match.
    pub fn subscribe(&self, request: SubscribeRequest) -> SubscribeResponse {
        trace!(count = request.subscriptions.len(), "Received subscribe request");

        let mut found = Vec::new();
        for subscription in &request.subscriptions {
            let item = Storable::from_msg(subscription, Role::Subscription);
            self.inner.index.query(&item, &mut found);
            if !self.inner.index.insert(item, subscription.ttl_ms) {
                trace!(guid = %subscription.guid, "Subscription outside locator boundary");
            }
        }

        SubscribeResponse {
            matches: found
                .into_iter()
                .map(|entry| MatchMsg {
                    guid: entry.guid,
                    owner: entry.owner,
                })
                .collect(),
        }
    }

    /// Runs one cleanup pass over the index.
    pub fn cleanup_once(&self) -> QuadtreeStats {
        self.inner.index.cleanup();
        let stats = self.inner.index.stats();
        trace!(
            entries = stats.total_entries,
            depth = stats.max_depth,
            leaves = stats.leaf_nodes,
            "Locator cleanup pass"
        );
        stats
    }

    /// Spawns the periodic cleanup loop.
    pub fn start(&self) {
        let locator = self.clone();
        let period = Duration::from_millis(self.inner.config.cleanup_interval_ms.max(1));
        let shutdown = self.inner.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        locator.cleanup_once();
                    }
                    _ = shutdown.wait() => break,
                }
            }
            debug!("Locator cleanup loop stopped");
        });

        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        info!(interval_ms = self.inner.config.cleanup_interval_ms, "🧹 Locator cleanup loop started");
    }

    /// Stops background tasks and waits for them to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.initiate_shutdown();
        let handles: Vec<_> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}

#[async_trait]
impl LocatorClient for Locator {
    async fn publish(&self, request: PublishRequest) -> Result<PublishResponse, RpcError> {
        Ok(Locator::publish(self, request).await)
    }

    async fn subscribe(&self, request: SubscribeRequest) -> Result<SubscribeResponse, RpcError> {
        Ok(Locator::subscribe(self, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colyseus_core::{
        Guid, NotifySubscriberResponse, RegisterInterestRequest, RegisterInterestResponse, SpawnRequest,
        SpawnResponse, StorableMsg, UpdateRequest, UpdateResponse,
    };

    /// Replication endpoint that records every notification it receives.
    #[derive(Debug, Default)]
    struct RecordingNode {
        notifications: Mutex<Vec<Vec<MatchMsg>>>,
        fail: bool,
    }

    impl RecordingNode {
        fn received(&self) -> Vec<Vec<MatchMsg>> {
            self.notifications.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ReplicationClient for RecordingNode {
        async fn spawn(&self, _request: SpawnRequest) -> Result<SpawnResponse, RpcError> {
            Err(RpcError::Remote("unsupported".into()))
        }

        async fn update(&self, _request: UpdateRequest) -> Result<UpdateResponse, RpcError> {
            Err(RpcError::Remote("unsupported".into()))
        }

        async fn register_interest(
            &self,
            _request: RegisterInterestRequest,
        ) -> Result<RegisterInterestResponse, RpcError> {
            Err(RpcError::Remote("unsupported".into()))
        }

        async fn notify_subscriber(
            &self,
            request: NotifySubscriberRequest,
        ) -> Result<NotifySubscriberResponse, RpcError> {
            self.notifications.lock().expect("lock").push(request.publications);
            if self.fail {
                return Err(RpcError::Connection("refused".into()));
            }
            Ok(NotifySubscriberResponse {})
        }
    }

    fn msg(guid: Guid, owner: u32, rect: Rect, ttl_ms: i64) -> StorableMsg {
        StorableMsg {
            guid,
            owner: NodeId(owner),
            rect,
            ttl_ms,
        }
    }

    #[tokio::test]
    async fn test_subscribe_returns_published_objects() {
        let locator = Locator::default();

        let mut publications: Vec<StorableMsg> = (0..10)
            .map(|_| msg(Guid::new(), 1, Rect::new(10.0, 20.0, 4.0, 4.0), 1_000_010))
            .collect();
        publications.push(msg(Guid::new(), 1, Rect::new(41.0, 20.0, 4.0, 4.0), 1_000_110));
        let first = publications[0].guid;

        locator.publish(PublishRequest { publications }).await;

        let response = locator.subscribe(SubscribeRequest {
            subscriptions: vec![msg(Guid::new(), 2, Rect::new(10.0, 20.0, 30.0, 40.0), 10_000)],
        });

        assert_eq!(response.matches.len(), 10);
        assert_eq!(response.matches[0], MatchMsg { guid: first, owner: NodeId(1) });
    }

    #[tokio::test]
    async fn test_publish_notifies_matching_subscriber_once_per_node() {
        let locator = Locator::default();
        let node_two = Arc::new(RecordingNode::default());
        let node_three = Arc::new(RecordingNode::default());
        locator.connect_node(NodeId(2), node_two.clone());
        locator.connect_node(NodeId(3), node_three.clone());

        // two overlapping subscriptions from node 2, one far away from node 3
        let response = locator.subscribe(SubscribeRequest {
            subscriptions: vec![
                msg(Guid::new(), 2, Rect::new(0.0, 0.0, 30.0, 30.0), 10_000),
                msg(Guid::new(), 2, Rect::new(5.0, 5.0, 30.0, 30.0), 10_000),
                msg(Guid::new(), 3, Rect::new(80.0, 80.0, 10.0, 10.0), 10_000),
            ],
        });
        assert!(response.matches.is_empty());

        let published = Guid::new();
        locator
            .publish(PublishRequest {
                publications: vec![msg(published, 1, Rect::new(10.0, 10.0, 2.0, 2.0), 10_000)],
            })
            .await;

        assert_eq!(
            node_two.received(),
            vec![vec![MatchMsg { guid: published, owner: NodeId(1) }]]
        );
        assert!(node_three.received().is_empty());
    }

    #[tokio::test]
    async fn test_publish_survives_failing_and_missing_endpoints() {
        let locator = Locator::default();
        let failing = Arc::new(RecordingNode {
            fail: true,
            ..Default::default()
        });
        locator.connect_node(NodeId(2), failing.clone());

        locator.subscribe(SubscribeRequest {
            subscriptions: vec![
                msg(Guid::new(), 2, Rect::new(0.0, 0.0, 50.0, 50.0), 10_000),
                // node 4 has no registered endpoint
                msg(Guid::new(), 4, Rect::new(0.0, 0.0, 50.0, 50.0), 10_000),
            ],
        });

        let response = LocatorClient::publish(
            &locator,
            PublishRequest {
                publications: vec![msg(Guid::new(), 1, Rect::new(10.0, 10.0, 2.0, 2.0), 10_000)],
            },
        )
        .await;

        assert!(response.is_ok());
        assert_eq!(failing.received().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_items_match_earlier_items() {
        let locator = Locator::default();
        let rect = Rect::new(60.0, 60.0, 5.0, 5.0);

        let response = locator.subscribe(SubscribeRequest {
            subscriptions: vec![msg(Guid::new(), 1, rect, 10_000), msg(Guid::new(), 2, rect, 10_000)],
        });
        // both are subscriptions, so neither matches the other
        assert!(response.matches.is_empty());

        locator
            .publish(PublishRequest {
                publications: vec![msg(Guid::new(), 3, rect, 10_000)],
            })
            .await;

        let response = locator.subscribe(SubscribeRequest {
            subscriptions: vec![msg(Guid::new(), 1, rect, 10_000)],
        });
        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.matches[0].owner, NodeId(3));
    }

    #[tokio::test]
    async fn test_cleanup_loop_stops_on_shutdown() {
        let locator = Locator::new(LocatorConfig {
            cleanup_interval_ms: 5,
            ..Default::default()
        });
        locator.subscribe(SubscribeRequest {
            subscriptions: vec![msg(Guid::new(), 1, Rect::new(1.0, 1.0, 1.0, 1.0), 1)],
        });

        locator.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(locator.index().stats().total_entries, 0);

        tokio::time::timeout(Duration::from_secs(1), locator.shutdown())
            .await
            .expect("cleanup loop should stop promptly");
    }
}
