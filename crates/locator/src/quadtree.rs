//! Concurrent region quadtree holding soft-state publications and
//! subscriptions.
//!
//! Entries are rectangles tagged with an owning node, an object guid, a
//! [`Role`] and an absolute expiry. Nothing is ever removed explicitly: an
//! entry disappears once its expiry passes or once a newer entry for the same
//! guid and role has been inserted somewhere in the tree. Stale entries are
//! filtered lazily whenever a node is visited by `insert` or `query`, and
//! eagerly by `cleanup`, which also collapses subtrees that became empty.
//!
//! An entry lands in the first quadrant it touches, so its rectangle may
//! reach past that quadrant's boundary. Each node therefore keeps a `reach`
//! covering its boundary and every rectangle stored beneath it, and queries
//! prune on the reach instead of the boundary.
//!
//! Every node carries its own lock. Locks are only ever taken parent before
//! child, never on two siblings at once, and the shared [`ExpiryTable`] lock
//! is always taken last.

use colyseus_core::{current_timestamp_ms, Guid, NodeId, Rect, StorableMsg};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Default boundary of the locator's index.
pub const DEFAULT_BOUNDARY: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

/// Default number of entries a node holds before it subdivides.
pub const DEFAULT_CAPACITY: usize = 4;

/// Whether an entry describes where an object is or what a node wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publication,
    Subscription,
}

/// Item handed to the index, before an expiry has been assigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Storable {
    pub guid: Guid,
    pub owner: NodeId,
    pub rect: Rect,
    pub role: Role,
}

impl Storable {
    pub fn from_msg(msg: &StorableMsg, role: Role) -> Self {
        Self {
            guid: msg.guid,
            owner: msg.owner,
            rect: msg.rect,
            role,
        }
    }
}

/// An entry stored in the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub guid: Guid,
    pub owner: NodeId,
    pub rect: Rect,
    pub role: Role,
    /// Absolute expiry in Unix milliseconds.
    pub expires_at: i64,
}

impl SpatialEntry {
    /// A stored entry matches a probe when the rectangles overlap, the roles
    /// differ and the two belong to different nodes.
    pub fn matches(&self, probe: &Storable) -> bool {
        self.role != probe.role && self.owner != probe.owner && self.rect.intersects(&probe.rect)
    }
}

/// Last expiry handed out per (guid, role).
///
/// Publications and subscriptions of the same guid are tracked separately so
/// that an object's interest region never hides its own location.
#[derive(Debug, Default)]
pub struct ExpiryTable {
    latest: HashMap<(Guid, Role), i64>,
}

impl ExpiryTable {
    pub fn record(&mut self, guid: Guid, role: Role, expires_at: i64) {
        self.latest.insert((guid, role), expires_at);
    }

    pub fn latest(&self, guid: Guid, role: Role) -> Option<i64> {
        self.latest.get(&(guid, role)).copied()
    }

    /// An entry is stale once its expiry has passed, or when a newer entry for
    /// the same guid and role has been inserted since.
    pub fn is_stale(&self, entry: &SpatialEntry, now: i64) -> bool {
        if now >= entry.expires_at {
            return true;
        }
        matches!(self.latest(entry.guid, entry.role), Some(latest) if latest > 0 && latest > entry.expires_at)
    }

    /// Forgets records that can no longer supersede a live entry.
    pub fn prune(&mut self, now: i64) -> usize {
        let before = self.latest.len();
        self.latest.retain(|_, expires_at| *expires_at > now);
        before - self.latest.len()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

/// Shape of the tree at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadtreeStats {
    pub total_entries: usize,
    pub max_depth: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
}

#[derive(Debug)]
struct NodeInner {
    entries: Vec<SpatialEntry>,
    /// Only grows until the subtree is collapsed or cleaned as a leaf.
    reach: Rect,
    children: Option<Box<[QuadNode; 4]>>,
}

#[derive(Debug)]
struct QuadNode {
    boundary: Rect,
    capacity: usize,
    inner: Mutex<NodeInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl QuadNode {
    fn new(boundary: Rect, capacity: usize) -> Self {
        Self {
            boundary,
            capacity,
            inner: Mutex::new(NodeInner {
                entries: Vec::with_capacity(capacity),
                reach: boundary,
                children: None,
            }),
        }
    }

    fn subdivide(&self) -> Box<[QuadNode; 4]> {
        let [nw, ne, sw, se] = self.boundary.quadrants();
        Box::new([
            QuadNode::new(nw, self.capacity),
            QuadNode::new(ne, self.capacity),
            QuadNode::new(sw, self.capacity),
            QuadNode::new(se, self.capacity),
        ])
    }

    fn drop_stale(entries: &mut Vec<SpatialEntry>, expiry: &Mutex<ExpiryTable>, now: i64) {
        let table = lock(expiry);
        entries.retain(|entry| !table.is_stale(entry, now));
    }

    fn insert(&self, item: &Storable, ttl_ms: i64, expiry: &Mutex<ExpiryTable>, now: i64) -> bool {
        if !self.boundary.intersects(&item.rect) {
            return false;
        }

        let mut inner = lock(&self.inner);
        {
            let mut table = lock(expiry);
            inner.entries.retain(|entry| !table.is_stale(entry, now));

            if inner.entries.len() < self.capacity {
                let entry = SpatialEntry {
                    guid: item.guid,
                    owner: item.owner,
                    rect: item.rect,
                    role: item.role,
                    expires_at: now + ttl_ms,
                };
                table.record(entry.guid, entry.role, entry.expires_at);
                inner.reach = inner.reach.union(&entry.rect);
                inner.entries.push(entry);
                trace!(guid = %item.guid, owner = %item.owner, role = ?item.role, "Inserted entry");
                return true;
            }
        }

        if inner.children.is_none() {
            inner.children = Some(self.subdivide());
        }

        let stored = inner
            .children
            .as_deref()
            .is_some_and(|children| children.iter().any(|child| child.insert(item, ttl_ms, expiry, now)));
        if stored {
            inner.reach = inner.reach.union(&item.rect);
        }
        stored
    }

    fn query(&self, probe: &Storable, results: &mut Vec<SpatialEntry>, expiry: &Mutex<ExpiryTable>, now: i64) {
        let mut inner = lock(&self.inner);
        if !inner.reach.intersects(&probe.rect) {
            return;
        }

        Self::drop_stale(&mut inner.entries, expiry, now);
        results.extend(inner.entries.iter().filter(|entry| entry.matches(probe)).copied());

        if let Some(children) = inner.children.as_deref() {
            for child in children.iter() {
                child.query(probe, results, expiry, now);
            }
        }
    }

    fn cleanup(&self, expiry: &Mutex<ExpiryTable>, now: i64) {
        let mut inner = lock(&self.inner);

        let collapse = match inner.children.as_deref() {
            Some(children) => {
                for child in children.iter() {
                    child.cleanup(expiry, now);
                }
                children.iter().all(|child| {
                    let child_inner = lock(&child.inner);
                    child_inner.entries.is_empty() && child_inner.children.is_none()
                })
            }
            None => false,
        };

        if collapse {
            inner.children = None;
        }

        Self::drop_stale(&mut inner.entries, expiry, now);
        if inner.children.is_none() {
            let boundary = self.boundary;
            inner.reach = inner.entries.iter().fold(boundary, |reach, entry| reach.union(&entry.rect));
        }
    }

    fn collect_stats(&self, depth: usize, stats: &mut QuadtreeStats) {
        let inner = lock(&self.inner);
        stats.total_entries += inner.entries.len();
        stats.max_depth = stats.max_depth.max(depth);

        match inner.children.as_deref() {
            Some(children) => {
                stats.internal_nodes += 1;
                for child in children.iter() {
                    child.collect_stats(depth + 1, stats);
                }
            }
            None => stats.leaf_nodes += 1,
        }
    }
}

/// Spatial index of publications and subscriptions.
#[derive(Debug)]
pub struct Quadtree {
    root: QuadNode,
    expiry: Mutex<ExpiryTable>,
}

impl Quadtree {
    pub fn new(boundary: Rect, capacity: usize) -> Self {
        Self {
            root: QuadNode::new(boundary, capacity.max(1)),
            expiry: Mutex::new(ExpiryTable::default()),
        }
    }

    pub fn boundary(&self) -> Rect {
        self.root.boundary
    }

    /// Stores `item` until `ttl_ms` from now.
    ///
    /// Returns false when the item lies outside the tree's boundary.
    pub fn insert(&self, item: Storable, ttl_ms: i64) -> bool {
        self.insert_at(item, ttl_ms, current_timestamp_ms())
    }

    pub fn insert_at(&self, item: Storable, ttl_ms: i64, now: i64) -> bool {
        self.root.insert(&item, ttl_ms, &self.expiry, now)
    }

    /// Appends every live entry matching `probe` to `results`.
    pub fn query(&self, probe: &Storable, results: &mut Vec<SpatialEntry>) {
        self.query_at(probe, results, current_timestamp_ms());
    }

    pub fn query_at(&self, probe: &Storable, results: &mut Vec<SpatialEntry>, now: i64) {
        self.root.query(probe, results, &self.expiry, now);
    }

    /// Removes stale entries everywhere and collapses empty subtrees.
    pub fn cleanup(&self) {
        self.cleanup_at(current_timestamp_ms());
    }

    pub fn cleanup_at(&self, now: i64) {
        self.root.cleanup(&self.expiry, now);
        let pruned = lock(&self.expiry).prune(now);
        if pruned > 0 {
            trace!(pruned, "Pruned expiry records");
        }
    }

    pub fn stats(&self) -> QuadtreeStats {
        let mut stats = QuadtreeStats::default();
        self.root.collect_stats(0, &mut stats);
        stats
    }
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDARY, DEFAULT_CAPACITY)
    }
}
