//! # Core Type Definitions
//!
//! Fundamental types shared by every node: object and node identifiers,
//! axis-aligned rectangles in screen coordinates (origin at the top-left
//! corner), input events and the replicated game object itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Globally unique identifier of a replicated object.
///
/// Assigned by the node that spawns the object. Backed by a random UUID so
/// that independently running nodes never hand out the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub Uuid);

impl Guid {
    /// Creates a new random object id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The placeholder id carried by objects that have not been spawned yet.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true for the placeholder id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl std::str::FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::nil()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a server node taking part in replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque object type tag. The replication engine never interprets it; it
/// only uses it to look up the behavior registered for the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ObjectType(pub u32);

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Axis-aligned rectangle with its origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Returns true if the two rectangles overlap. Touching edges count as an
    /// overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(other.x > self.right()
            || other.right() < self.x
            || other.y > self.bottom()
            || other.bottom() < self.y)
    }

    /// Grows the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Splits the rectangle into four equal quadrants, ordered nw, ne, sw, se.
    pub fn quadrants(&self) -> [Rect; 4] {
        let (x, y) = (self.x, self.y);
        let (w, h) = (self.width / 2.0, self.height / 2.0);
        [
            Rect::new(x, y, w, h),
            Rect::new(x + w, y, w, h),
            Rect::new(x, y + h, w, h),
            Rect::new(x + w, y + h, w, h),
        ]
    }
}

// ============================================================================
// Events and Objects
// ============================================================================

/// A single input event applied to an object.
///
/// `input` is a bitfield whose meaning belongs to the object behaviors;
/// `timestamp_ms` is assigned by the primary when it serializes the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GameEvent {
    pub input: u32,
    pub timestamp_ms: i64,
}

impl GameEvent {
    pub const fn new(input: u32, timestamp_ms: i64) -> Self {
        Self { input, timestamp_ms }
    }

    pub fn has(&self, bits: u32) -> bool {
        self.input & bits != 0
    }
}

/// A replicated game object.
///
/// Held either as a primary (this node is authoritative) or as a replica
/// (`owner` is the authoritative node). The rectangle is the object's state as
/// of `latest_event`; the current position is extrapolated by its behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    pub guid: Guid,
    pub owner: NodeId,
    pub rect: Rect,
    pub object_type: ObjectType,
    pub latest_event: GameEvent,
}

impl GameObject {
    /// Creates an object that has not been assigned a guid yet.
    pub fn new(owner: NodeId, rect: Rect, object_type: ObjectType, latest_event: GameEvent) -> Self {
        Self {
            guid: Guid::nil(),
            owner,
            rect,
            object_type,
            latest_event,
        }
    }
}
