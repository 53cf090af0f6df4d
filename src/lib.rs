//! # archetable
//!
//! Archetype-based entity-component storage with stable generational
//! handles.
//!
//! ## Design Goals
//! - Archetype storage: entities with identical component sets share one
//!   dense row-major table, so bulk iteration is cache-friendly
//! - Stable handles: entity IDs survive swap-remove compaction and
//!   archetype migration through a generational entry table
//! - Runtime layout: table stride and per-component offsets are derived
//!   from a component-set bitmask when an archetype is first needed
//! - Explicit errors: duplicate additions, stale handles, and exhausted
//!   capacity are reported, never papered over
//!
//! ## Example
//! ```
//! use archetable::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: f32, y: f32 }
//! #[derive(Debug, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//! let id = world.spawn((Position { x: 1.0, y: 2.0 }, Velocity { dx: 0.5, dy: 0.0 }))?;
//!
//! assert!(world.is_alive(id));
//! assert_eq!(world.get::<Position>(id), Some(&Position { x: 1.0, y: 2.0 }));
//!
//! for (position, velocity) in world.iter::<(Position, Velocity)>() {
//!     let _ = (position, velocity);
//! }
//!
//! world.despawn(id);
//! assert!(!world.is_alive(id));
//! # Ok::<(), archetable::WorldError>(())
//! ```
//!
//! ## Concurrency
//! The world is a single-threaded, synchronous container. References and
//! iterators borrow it, so the borrow checker rules out structural mutation
//! while component data is held.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::world::World;

pub use engine::entity::EntityId;

pub use engine::component::{
    component_desc,
    component_id_of,
    register_component,
    Component,
    ComponentDesc,
};

pub use engine::bundle::{Bundle, Query};

pub use engine::query::{QueryIter, QueryIterMut};

pub use engine::archetype::ArchetypeTable;

pub use engine::error::{RegistryError, WorldError, WorldResult};

pub use engine::types::{ArchetypeIndex, ComponentId, Mask, COMPONENT_CAP};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used types.
///
/// Import with:
/// ```rust
/// use archetable::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        component_id_of,
        register_component,
        Bundle,
        Component,
        EntityId,
        Mask,
        Query,
        World,
        WorldError,
        WorldResult,
    };
}
