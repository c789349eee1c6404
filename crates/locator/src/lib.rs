//! # Locator
//!
//! Matches object locations against areas of interest for a cluster of
//! replication nodes.
//!
//! Nodes periodically publish where their objects are and subscribe to the
//! regions their objects care about. Both are soft state: every entry carries
//! a TTL and is forgotten unless it is renewed. When a publication overlaps a
//! stored subscription of another node, that node is told about the object
//! so it can start replicating it.

pub mod quadtree;
pub mod service;

pub use quadtree::{
    ExpiryTable, Quadtree, QuadtreeStats, Role, SpatialEntry, Storable, DEFAULT_BOUNDARY, DEFAULT_CAPACITY,
};
pub use service::{Locator, LocatorConfig};
