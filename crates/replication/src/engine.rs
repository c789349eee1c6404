//! # Replication Engine
//!
//! One engine runs per node. It is authoritative for its primaries, keeps
//! replicas of objects owned elsewhere and tracks which peers are interested
//! in each primary.
//!
//! ## Update flow
//!
//! An input for a primary is timestamped here, applied through the object's
//! behavior and pushed to every peer holding a live interest record. Objects
//! created by the event are spawned locally and, with proactive replication,
//! shipped along with the update. Reactions are applied to the same object
//! afterwards, one after another, while the state lock is still held.
//!
//! ## Discovery
//!
//! The publish loop tells the locator where every primary is and what region
//! it cares about. The locator answers with NotifySubscriber calls naming
//! remote objects worth replicating; the engine then registers interest with
//! their owners. The cleanup loop drops replicas no primary cares about any
//! more and renews interest in the rest.
//!
//! No lock is held while awaiting another node.

use crate::behavior::{BehaviorRegistry, EventEffects};
use crate::config::ReplicationConfig;
use async_trait::async_trait;
use colyseus_core::{
    current_timestamp_ms, GameEvent, GameObject, Guid, LocatorClient, NodeId, NotifySubscriberRequest,
    NotifySubscriberResponse, ObjectState, ObjectType, PublishRequest, Rect, RegisterInterestRequest,
    RegisterInterestResponse, ReplicationClient, RpcError, ShutdownState, SpawnRequest, SpawnResponse,
    StorableMsg, SubscribeRequest, UpdateRequest, UpdateResponse,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// A peer's interest in one of this node's primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestRecord {
    pub subscriber: NodeId,
    pub expires_at: i64,
}

impl InterestRecord {
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// Everything an engine knows about objects. A guid lives in at most one of
/// `primaries` and `replicas`.
#[derive(Debug, Default)]
pub struct NodeState {
    pub primaries: HashMap<Guid, GameObject>,
    pub replicas: HashMap<Guid, GameObject>,
    pub interest: HashMap<Guid, Vec<InterestRecord>>,
}

impl NodeState {
    /// Stores `object` as a primary under a fresh guid.
    fn insert_primary(&mut self, mut object: GameObject, owner: NodeId) -> Guid {
        let guid = Guid::new();
        object.guid = guid;
        object.owner = owner;
        self.primaries.insert(guid, object);
        self.interest.insert(guid, Vec::new());
        guid
    }

    fn remove(&mut self, guid: &Guid) {
        self.primaries.remove(guid);
        self.replicas.remove(guid);
        self.interest.remove(guid);
    }

    /// Keeps one record per subscriber, moving its expiry forward.
    fn refresh_interest(&mut self, guid: Guid, subscriber: NodeId, expires_at: i64) {
        let records = self.interest.entry(guid).or_default();
        match records.iter_mut().find(|record| record.subscriber == subscriber) {
            Some(record) => record.expires_at = expires_at,
            None => records.push(InterestRecord { subscriber, expires_at }),
        }
    }

    /// Inserts a replica unless the guid is already one of our primaries.
    fn materialize_replica(&mut self, state: ObjectState, owner: NodeId, latest_event: GameEvent) {
        if self.primaries.contains_key(&state.guid) {
            return;
        }
        self.replicas
            .insert(state.guid, state.into_object(owner, latest_event));
    }
}

/// An object as seen by local game logic.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectView {
    pub object: GameObject,
    /// Extrapolated location at the time of the snapshot.
    pub location: Rect,
    pub is_primary: bool,
}

#[derive(Debug)]
struct EngineInner {
    node_id: NodeId,
    config: RwLock<ReplicationConfig>,
    behaviors: Arc<BehaviorRegistry>,
    state: tokio::sync::RwLock<NodeState>,
    peers: DashMap<NodeId, Arc<dyn ReplicationClient>>,
    locator: RwLock<Option<Arc<dyn LocatorClient>>>,
    shutdown: ShutdownState,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheaply cloneable handle to a node's replication engine.
#[derive(Debug, Clone)]
pub struct ReplicationEngine {
    inner: Arc<EngineInner>,
}

impl ReplicationEngine {
    pub fn new(node_id: NodeId, config: ReplicationConfig, behaviors: Arc<BehaviorRegistry>) -> Self {
        Self::with_shutdown(node_id, config, behaviors, ShutdownState::new())
    }

    pub fn with_shutdown(
        node_id: NodeId,
        config: ReplicationConfig,
        behaviors: Arc<BehaviorRegistry>,
        shutdown: ShutdownState,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                node_id,
                config: RwLock::new(config),
                behaviors,
                state: tokio::sync::RwLock::new(NodeState::default()),
                peers: DashMap::new(),
                locator: RwLock::new(None),
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.inner.node_id
    }

    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.inner.behaviors
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn config(&self) -> ReplicationConfig {
        *self.inner.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn modify_config(&self, change: impl FnOnce(&mut ReplicationConfig)) {
        change(&mut self.inner.config.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn set_config(&self, config: ReplicationConfig) {
        self.modify_config(|current| *current = config);
    }

    pub fn set_frame_rate(&self, frame_rate: u32) {
        self.modify_config(|config| config.frame_rate = frame_rate);
    }

    pub fn set_prediction_ms(&self, prediction_ms: i64) {
        self.modify_config(|config| config.prediction_ms = prediction_ms);
    }

    pub fn set_publish_buffer_ms(&self, publish_buffer_ms: i64) {
        self.modify_config(|config| config.publish_buffer_ms = publish_buffer_ms);
    }

    pub fn set_cleanup_interval_ms(&self, cleanup_interval_ms: i64) {
        self.modify_config(|config| config.cleanup_interval_ms = cleanup_interval_ms);
    }

    pub fn set_interest_ttl_ms(&self, interest_ttl_ms: i64) {
        self.modify_config(|config| config.interest_ttl_ms = interest_ttl_ms);
    }

    pub fn set_test_delay_ms(&self, test_delay_ms: i64) {
        self.modify_config(|config| config.test_delay_ms = test_delay_ms);
    }

    pub fn set_proactive_replication(&self, enabled: bool) {
        self.modify_config(|config| config.proactive_replication = enabled);
    }

    // ------------------------------------------------------------------
    // Endpoints
    // ------------------------------------------------------------------

    pub fn connect_locator(&self, locator: Arc<dyn LocatorClient>) {
        *self.inner.locator.write().unwrap_or_else(PoisonError::into_inner) = Some(locator);
        debug!(node_id = %self.inner.node_id, "Connected to locator");
    }

    pub fn connect_peer(&self, peer_id: NodeId, peer: Arc<dyn ReplicationClient>) {
        self.inner.peers.insert(peer_id, peer);
        debug!(node_id = %self.inner.node_id, peer = %peer_id, "Connected to peer");
    }

    fn locator(&self) -> Option<Arc<dyn LocatorClient>> {
        self.inner
            .locator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn peer(&self, peer_id: NodeId) -> Option<Arc<dyn ReplicationClient>> {
        self.inner.peers.get(&peer_id).map(|entry| entry.value().clone())
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn primary(&self, guid: Guid) -> Option<GameObject> {
        self.inner.state.read().await.primaries.get(&guid).cloned()
    }

    pub async fn replica(&self, guid: Guid) -> Option<GameObject> {
        self.inner.state.read().await.replicas.get(&guid).cloned()
    }

    pub async fn primary_count(&self) -> usize {
        self.inner.state.read().await.primaries.len()
    }

    pub async fn replica_count(&self) -> usize {
        self.inner.state.read().await.replicas.len()
    }

    pub async fn interest_records(&self, guid: Guid) -> Vec<InterestRecord> {
        self.inner
            .state
            .read()
            .await
            .interest
            .get(&guid)
            .cloned()
            .unwrap_or_default()
    }

    /// Copies every known object together with its current location.
    pub async fn snapshot(&self) -> Vec<ObjectView> {
        let now = current_timestamp_ms();
        let state = self.inner.state.read().await;
        let behaviors = &self.inner.behaviors;

        let primaries = state.primaries.values().map(|object| (object, true));
        let replicas = state.replicas.values().map(|object| (object, false));
        primaries
            .chain(replicas)
            .map(|(object, is_primary)| ObjectView {
                location: behaviors.location(object, now),
                object: object.clone(),
                is_primary,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Inbound operations
    // ------------------------------------------------------------------

    async fn simulate_latency(&self) {
        let delay = self.config().test_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
    }

    /// Creates a primary owned by this node.
    pub async fn spawn(&self, request: SpawnRequest) -> SpawnResponse {
        self.simulate_latency().await;
        let mut state = self.inner.state.write().await;
        let now = current_timestamp_ms();

        let object = GameObject::new(
            self.inner.node_id,
            request.rect,
            request.object_type,
            GameEvent::new(0, now),
        );
        let guid = state.insert_primary(object, self.inner.node_id);
        trace!(guid = %guid, object_type = %request.object_type, "Created primary");

        SpawnResponse { guid }
    }

    /// Convenience wrapper around [`ReplicationEngine::spawn`].
    pub async fn spawn_object(&self, rect: Rect, object_type: ObjectType) -> Guid {
        self.spawn(SpawnRequest { rect, object_type }).await.guid
    }

    /// Records interest of `requester` in the requested primaries and returns
    /// their current state. Unknown guids are skipped.
    pub async fn register_interest(&self, request: RegisterInterestRequest) -> RegisterInterestResponse {
        self.simulate_latency().await;
        let ttl = self.config().interest_ttl_ms;
        let mut state = self.inner.state.write().await;
        let expires_at = current_timestamp_ms() + ttl;

        let mut response = RegisterInterestResponse::default();
        for guid in &request.target_guids {
            let Some(primary) = state.primaries.get(guid) else {
                continue;
            };
            response.initial_states.push(ObjectState::of(primary));
            response.latest_updates.push(primary.latest_event);
            state.refresh_interest(*guid, request.requester, expires_at);
        }

        if request.is_renewal {
            trace!(requester = %request.requester, count = response.initial_states.len(), "Renewed interest");
        } else {
            debug!(requester = %request.requester, count = response.initial_states.len(), "Registered interest");
        }
        response
    }

    /// Applies an update pushed by a peer.
    ///
    /// For a primary this is a request to modify it: the input is applied
    /// here at this node's time. For a replica it is the owner's
    /// authoritative update. Unknown guids are ignored.
    pub async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        self.simulate_latency().await;
        let proactive = self.config().proactive_replication;
        let mut state = self.inner.state.write().await;
        let guid = request.target_guid;

        if state.primaries.contains_key(&guid) {
            debug!(guid = %guid, input = request.event.input, "Peer asked to modify primary");
            self.handle_update(&mut state, guid, request.event.input);
        } else if let Some(replica) = state.replicas.get_mut(&guid) {
            let owner = replica.owner;
            // Replicas never produce side effects of their own.
            let mut scratch = EventEffects::default();
            self.inner
                .behaviors
                .apply_event(replica, request.event, &mut scratch);

            if proactive {
                for (initial, latest) in request.initial_states.iter().zip(&request.latest_updates) {
                    state.materialize_replica(*initial, owner, *latest);
                }
            }

            for deleted in &request.deleted_guids {
                state.remove(deleted);
            }
            trace!(guid = %guid, owner = %owner, "Primary pushed update to replica");
        } else {
            trace!(guid = %guid, "Update for unknown object ignored");
        }

        UpdateResponse {}
    }

    /// Handles objects the locator matched against our interest regions by
    /// registering interest with their owners.
    pub async fn notify_subscriber(&self, request: NotifySubscriberRequest) -> NotifySubscriberResponse {
        self.simulate_latency().await;
        let node_id = self.inner.node_id;

        let mut needed: HashMap<NodeId, Vec<Guid>> = HashMap::new();
        {
            let state = self.inner.state.read().await;
            for matched in &request.publications {
                if matched.owner == node_id {
                    debug!(guid = %matched.guid, "Ignoring match for own object");
                    continue;
                }
                if state.replicas.contains_key(&matched.guid) || state.primaries.contains_key(&matched.guid) {
                    continue;
                }
                let guids = needed.entry(matched.owner).or_default();
                if !guids.contains(&matched.guid) {
                    guids.push(matched.guid);
                }
            }
        }

        let fetches = needed.into_iter().filter_map(|(owner, target_guids)| {
            let Some(peer) = self.peer(owner) else {
                warn!(peer = %owner, "No endpoint for owner of matched objects");
                return None;
            };
            Some(async move {
                let result = peer
                    .register_interest(RegisterInterestRequest {
                        target_guids,
                        requester: node_id,
                        is_renewal: false,
                    })
                    .await;
                (owner, result)
            })
        });
        let results = futures::future::join_all(fetches).await;

        let mut state = self.inner.state.write().await;
        for (owner, result) in results {
            match result {
                Ok(response) => {
                    for (initial, latest) in response.objects() {
                        state.materialize_replica(initial, owner, latest);
                    }
                    debug!(peer = %owner, count = response.initial_states.len(), "Replicated remote objects");
                }
                Err(e) => warn!(peer = %owner, error = %e, "Failed to register interest"),
            }
        }

        NotifySubscriberResponse {}
    }

    // ------------------------------------------------------------------
    // Local game loop
    // ------------------------------------------------------------------

    /// Feeds inputs from this node's game logic into the engine.
    ///
    /// Inputs for primaries are applied immediately. Inputs for replicas are
    /// forwarded to the owner without a timestamp; the owner decides when the
    /// event happened.
    pub async fn advance(&self, inputs: Vec<(Guid, u32)>) {
        if inputs.is_empty() {
            return;
        }

        let mut state = self.inner.state.write().await;
        for (guid, input) in inputs {
            if state.primaries.contains_key(&guid) {
                self.handle_update(&mut state, guid, input);
            } else if let Some(replica) = state.replicas.get(&guid) {
                let owner = replica.owner;
                match self.peer(owner) {
                    Some(peer) => {
                        let request = UpdateRequest::input(guid, GameEvent::new(input, 0));
                        tokio::spawn(async move {
                            if let Err(e) = peer.update(request).await {
                                warn!(guid = %guid, peer = %owner, error = %e, "Failed to forward input to owner");
                            }
                        });
                    }
                    None => debug!(guid = %guid, peer = %owner, "No endpoint for replica owner"),
                }
            } else {
                trace!(guid = %guid, "Input for unknown object ignored");
            }
        }
    }

    /// Applies `input` to a primary and everything that follows from it.
    ///
    /// Reactions are handled depth first: an event's reactions, and theirs,
    /// all run before the next reaction of its parent.
    fn handle_update(&self, state: &mut NodeState, guid: Guid, input: u32) {
        let config = self.config();
        let mut pending = vec![input];

        while let Some(input) = pending.pop() {
            let Some(primary) = state.primaries.get_mut(&guid) else {
                trace!(guid = %guid, "Object removed before its remaining reactions");
                break;
            };

            let now = current_timestamp_ms();
            let event = GameEvent::new(input, now);
            let mut effects = EventEffects::default();
            self.inner.behaviors.apply_event(primary, event, &mut effects);

            let mut initial_states = Vec::new();
            let mut latest_updates = Vec::new();
            for created in effects.created {
                let latest = created.latest_event;
                let created_guid = state.insert_primary(created, self.inner.node_id);
                if config.proactive_replication {
                    if let Some(object) = state.primaries.get(&created_guid) {
                        initial_states.push(ObjectState::of(object));
                        latest_updates.push(latest);
                    }
                }
                trace!(guid = %created_guid, parent = %guid, "Spawned object from event");
            }

            self.propagate(state, guid, event, initial_states, latest_updates, &effects.deleted, now);

            for deleted in &effects.deleted {
                state.remove(deleted);
            }
            if !effects.deleted.is_empty() {
                debug!(guid = %guid, count = effects.deleted.len(), "Deleted primaries");
            }

            pending.extend(effects.reactions.iter().rev().map(|reaction| reaction.input));
        }
    }

    /// Sends an applied event to every peer with a live interest in `guid`.
    #[allow(clippy::too_many_arguments)]
    fn propagate(
        &self,
        state: &NodeState,
        guid: Guid,
        event: GameEvent,
        initial_states: Vec<ObjectState>,
        latest_updates: Vec<GameEvent>,
        deleted_guids: &[Guid],
        now: i64,
    ) {
        let Some(records) = state.interest.get(&guid) else {
            return;
        };

        for record in records {
            // Expired records are left in place and refreshed on renewal.
            if record.subscriber == self.inner.node_id || !record.is_live(now) {
                continue;
            }
            let Some(peer) = self.peer(record.subscriber) else {
                debug!(peer = %record.subscriber, "No endpoint for interested peer");
                continue;
            };

            let request = UpdateRequest {
                target_guid: guid,
                event,
                initial_states: initial_states.clone(),
                latest_updates: latest_updates.clone(),
                deleted_guids: deleted_guids.to_vec(),
            };
            let subscriber = record.subscriber;
            trace!(guid = %guid, peer = %subscriber, "Propagating update");
            tokio::spawn(async move {
                if let Err(e) = peer.update(request).await {
                    warn!(guid = %guid, peer = %subscriber, error = %e, "Failed to update peer");
                }
            });
        }
    }

    // ------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------

    /// Publishes every primary's location and interest region to the locator.
    ///
    /// Both calls run on their own tasks, so a slow locator never holds up
    /// the publish loop.
    pub async fn publish_once(&self) {
        let Some(locator) = self.locator() else {
            trace!("No locator connected; skipping publish");
            return;
        };

        let config = self.config();
        let node_id = self.inner.node_id;
        let (publications, subscriptions): (Vec<StorableMsg>, Vec<StorableMsg>) = {
            let now = current_timestamp_ms();
            let state = self.inner.state.read().await;
            let behaviors = &self.inner.behaviors;
            state
                .primaries
                .values()
                .map(|primary| {
                    let location = StorableMsg {
                        guid: primary.guid,
                        owner: node_id,
                        rect: behaviors.location(primary, now),
                        ttl_ms: config.prediction_ms,
                    };
                    let interest = StorableMsg {
                        rect: behaviors.interest(primary, now, config.prediction_ms, config.publish_buffer_ms),
                        ..location
                    };
                    (location, interest)
                })
                .unzip()
        };

        if publications.is_empty() {
            return;
        }

        trace!(count = publications.len(), "Publishing to locator");
        let publisher = locator.clone();
        tokio::spawn(async move {
            if let Err(e) = publisher.publish(PublishRequest { publications }).await {
                warn!(error = %e, "Failed to publish to locator");
            }
        });
        tokio::spawn(async move {
            match locator.subscribe(SubscribeRequest { subscriptions }).await {
                Ok(response) => trace!(matches = response.matches.len(), "Subscribed with locator"),
                Err(e) => warn!(error = %e, "Failed to subscribe to locator"),
            }
        });
    }

    /// Drops replicas outside every primary's interest region and renews
    /// interest in the others. Returns the number of dropped replicas.
    pub async fn cleanup_once(&self) -> usize {
        let config = self.config();
        let mut renewals: HashMap<NodeId, Vec<Guid>> = HashMap::new();
        let mut dropped = Vec::new();

        {
            let now = current_timestamp_ms();
            let mut state = self.inner.state.write().await;
            let behaviors = &self.inner.behaviors;

            let regions: Vec<Rect> = state
                .primaries
                .values()
                .map(|primary| behaviors.interest(primary, now, config.prediction_ms, config.publish_buffer_ms))
                .collect();

            for (guid, replica) in &state.replicas {
                let location = behaviors.location(replica, now);
                if regions.iter().any(|region| region.intersects(&location)) {
                    renewals.entry(replica.owner).or_default().push(*guid);
                } else {
                    dropped.push(*guid);
                }
            }

            for guid in &dropped {
                debug!(guid = %guid, "Cleaning up replica");
                state.replicas.remove(guid);
            }
        }

        for (owner, target_guids) in renewals {
            let Some(peer) = self.peer(owner) else {
                continue;
            };
            let request = RegisterInterestRequest {
                target_guids,
                requester: self.inner.node_id,
                is_renewal: true,
            };
            tokio::spawn(async move {
                if let Err(e) = peer.register_interest(request).await {
                    warn!(peer = %owner, error = %e, "Failed to renew interest");
                }
            });
        }

        dropped.len()
    }

    /// Starts the publish and cleanup loops.
    ///
    /// Both loops read their period from the current configuration before
    /// every iteration, so setters take effect without a restart.
    pub fn start(&self) {
        let publisher = self.clone();
        let publish_loop = tokio::spawn(async move {
            let shutdown = publisher.inner.shutdown.clone();
            loop {
                let period = Duration::from_millis(publisher.config().publish_interval_ms());
                tokio::select! {
                    _ = tokio::time::sleep(period) => publisher.publish_once().await,
                    _ = shutdown.wait() => break,
                }
            }
            debug!(node_id = %publisher.inner.node_id, "Publish loop stopped");
        });

        let cleaner = self.clone();
        let cleanup_loop = tokio::spawn(async move {
            let shutdown = cleaner.inner.shutdown.clone();
            loop {
                let period = Duration::from_millis(cleaner.config().cleanup_interval_ms.max(1) as u64);
                tokio::select! {
                    _ = tokio::time::sleep(period) => {
                        cleaner.cleanup_once().await;
                    }
                    _ = shutdown.wait() => break,
                }
            }
            debug!(node_id = %cleaner.inner.node_id, "Cleanup loop stopped");
        });

        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([publish_loop, cleanup_loop]);
        info!(node_id = %self.inner.node_id, "🔁 Replication loops started");
    }

    /// Stops the background loops and waits for them to finish.
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

#[async_trait]
impl ReplicationClient for ReplicationEngine {
    async fn spawn(&self, request: SpawnRequest) -> Result<SpawnResponse, RpcError> {
        Ok(ReplicationEngine::spawn(self, request).await)
    }

    async fn update(&self, request: UpdateRequest) -> Result<UpdateResponse, RpcError> {
        Ok(ReplicationEngine::update(self, request).await)
    }

    async fn register_interest(
        &self,
        request: RegisterInterestRequest,
    ) -> Result<RegisterInterestResponse, RpcError> {
        Ok(ReplicationEngine::register_interest(self, request).await)
    }

    async fn notify_subscriber(
        &self,
        request: NotifySubscriberRequest,
    ) -> Result<NotifySubscriberResponse, RpcError> {
        Ok(ReplicationEngine::notify_subscriber(self, request).await)
    }
}
