//! Error types for entity storage operations.
//!
//! This module declares focused, composable error types used across the
//! registry, archetype storage, and world mutation paths. Each error carries
//! enough context to make failures actionable while remaining small and cheap
//! to pass around or convert into the aggregate [`WorldError`].
//!
//! ## Goals
//! * **Specificity:** Each variant models a single failure mode (stale
//!   handles, duplicate component additions, exhausted component universe,
//!   failed allocations).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From` conversions into [`WorldError`] so
//!   call sites can use `?`.
//!
//! ## Policy
//! Errors are reported to the caller; nothing is retried. Invariant
//! violations (misordered projection fields, mask mismatches) are programming
//! errors and trip assertions instead of surfacing here.

use std::fmt;

/// Result alias for world and storage operations.
pub type WorldResult<T> = Result<T, WorldError>;

/// Errors raised by the component registry.
///
/// ## Context
/// The registry assigns each component type a dense integer ID on first
/// observation. Registration can fail when the fixed-size component universe
/// is exhausted or when a type cannot be stored at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// More distinct component types were observed than the universe holds.
    ///
    /// This is fatal for the requesting operation; the registry never grows
    /// past its capacity.
    UniverseFull {
        /// The fixed capacity of the component universe.
        cap: usize,
    },

    /// A zero-sized type was offered as a component.
    ///
    /// Zero-sized components would produce zero-stride rows, which the
    /// storage engine rules out structurally.
    ZeroSized {
        /// Rust type name of the rejected component.
        name: &'static str,
    },

    /// The registry lock was poisoned by a panic in another thread.
    PoisonedLock,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UniverseFull { cap } => {
                write!(f, "component universe full (capacity {cap})")
            }
            RegistryError::ZeroSized { name } => {
                write!(f, "zero-sized component type rejected: {name}")
            }
            RegistryError::PoisonedLock => f.write_str("component registry lock poisoned"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Aggregate error for world mutations.
///
/// ## Variants
/// * `EntityDead`: a supplied handle's generation no longer matches its
///   slot; the entity was deleted (or never existed).
/// * `ComponentAlreadyPresent`: `add` of a component the entity already
///   carries.
/// * `ComponentMissing`: `remove` of a component the entity does not carry.
/// * `OutOfMemory`: an allocation or buffer growth failed. Multi-step
///   mutations fail atomically; no entity is left partially migrated.
/// * `Registry`: component registration failed (see [`RegistryError`]).
///
/// ### Display
/// Human-readable, single-line messages suitable for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldError {
    /// The entity handle is stale or was never issued.
    EntityDead,

    /// The component is already present on the entity.
    ComponentAlreadyPresent {
        /// Rust type name of the duplicate component.
        name: &'static str,
    },

    /// The component is not present on the entity.
    ComponentMissing {
        /// Rust type name of the absent component.
        name: &'static str,
    },

    /// An allocation request could not be satisfied.
    OutOfMemory {
        /// Size in bytes of the failed request.
        bytes: usize,
    },

    /// Component registration failed.
    Registry(RegistryError),
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::EntityDead => f.write_str("stale or dead entity reference"),
            WorldError::ComponentAlreadyPresent { name } => {
                write!(f, "component already present: {name}")
            }
            WorldError::ComponentMissing { name } => {
                write!(f, "component missing: {name}")
            }
            WorldError::OutOfMemory { bytes } => {
                write!(f, "allocation of {bytes} bytes failed")
            }
            WorldError::Registry(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WorldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorldError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for WorldError {
    fn from(e: RegistryError) -> Self {
        WorldError::Registry(e)
    }
}
