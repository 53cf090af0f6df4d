//! Component trait and the global type registry.
//!
//! This module provides a process-wide registry that assigns stable
//! [`ComponentId`] values to Rust component types and records the metadata
//! (size, alignment, destructor) that archetype layout computation and row
//! teardown depend on.
//!
//! ## Purpose
//! The registry decouples component type identity (`TypeId`, name, size,
//! alignment) from storage, so archetype tables can hold heterogeneous rows
//! behind computed byte offsets.
//!
//! ## Design
//! - Components are registered lazily on first structural observation and
//!   assigned a dense `ComponentId` in `[0, COMPONENT_CAP)`.
//! - `id_of` is a pure function of the type within one process: the same type
//!   always resolves to the same ID, distinct types to distinct IDs.
//! - The registry is grow-only; component types are never unregistered.
//!
//! ## Invariants
//! - Every entry in `by_type` has a matching descriptor in `by_id`.
//! - IDs are always in bounds of `COMPONENT_CAP`.
//! - A registered component has nonzero size.
//!
//! ## Concurrency
//! The registry is protected by an `RwLock` for concurrent reads and
//! serialized writes. The storage engine itself is single-threaded; the lock
//! exists so multiple worlds (and parallel test binaries' threads) can share
//! one component universe safely.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::mem::{align_of, needs_drop, size_of};
use std::ptr;
use std::sync::{OnceLock, RwLock};

use crate::engine::error::{RegistryError, WorldError, WorldResult};
use crate::engine::types::{ComponentId, COMPONENT_CAP};

/// Marker trait for component types.
///
/// Components are plain data records. They must be `'static` (no borrowed
/// data) and `Send + Sync` so type-erased storage stays sound if a world is
/// moved across threads.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Type-erased destructor for a component value in place.
unsafe fn drop_erased<T>(ptr: *mut u8) {
    unsafe { ptr::drop_in_place(ptr.cast::<T>()) }
}

/// Describes a registered component type.
///
/// ## Fields
/// - `component_id`: The runtime identifier assigned by the registry.
/// - `name`: The Rust type name, for diagnostics.
/// - `type_id`: The runtime `TypeId` for the component.
/// - `size` / `align`: Memory layout of one value.
/// - `needs_drop` / `drop_fn`: Destructor metadata; rows holding components
///   with owned resources must run `drop_fn` before their bytes are
///   discarded or overwritten.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to clone freely for layout computation
/// and reporting.
#[derive(Copy, Clone, Debug)]
pub struct ComponentDesc {
    /// Runtime identifier assigned to this component type.
    pub component_id: ComponentId,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes. Never zero.
    pub size: usize,

    /// Alignment of the component type in bytes. A power of two.
    pub align: usize,

    /// `true` if values of this type have a destructor.
    pub needs_drop: bool,

    /// Runs the destructor for a value of this type in place.
    ///
    /// ## Safety
    /// The pointer must address a valid, initialized value of this type that
    /// is not used again afterwards.
    pub drop_fn: unsafe fn(*mut u8),
}

impl ComponentDesc {
    /// Constructs a descriptor for type `T` with `component_id = 0`.
    ///
    /// ## Notes
    /// The ID is assigned by the registry via [`ComponentDesc::with_id`].
    #[inline]
    fn of<T: Component>() -> Self {
        Self {
            component_id: 0,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            needs_drop: needs_drop::<T>(),
            drop_fn: drop_erased::<T>,
        }
    }

    /// Returns a copy of this descriptor with `component_id` set.
    #[inline]
    fn with_id(mut self, component_id: ComponentId) -> Self {
        self.component_id = component_id;
        self
    }
}

/// Global mapping between Rust component types and compact IDs.
///
/// ## Invariants
/// - `next_id` equals the number of registered types.
/// - `by_id[id]` is `Some` iff some type registered with that ID.
struct ComponentRegistry {
    next_id: ComponentId,
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<Option<ComponentDesc>>,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

fn registry() -> &'static RwLock<ComponentRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(ComponentRegistry {
            next_id: 0,
            by_type: HashMap::new(),
            by_id: vec![None; COMPONENT_CAP],
        })
    })
}

impl ComponentRegistry {
    fn alloc_id(&mut self) -> Result<ComponentId, RegistryError> {
        let component_id = self.next_id;
        if (component_id as usize) >= COMPONENT_CAP {
            return Err(RegistryError::UniverseFull { cap: COMPONENT_CAP });
        }
        self.next_id += 1;
        Ok(component_id)
    }

    fn register<T: Component>(&mut self) -> Result<ComponentId, RegistryError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }

        let id = self.alloc_id()?;
        self.by_type.insert(type_id, id);
        self.by_id[id as usize] = Some(ComponentDesc::of::<T>().with_id(id));
        Ok(id)
    }
}

/// Registers component type `T` and returns its assigned ID.
///
/// ## Behavior
/// - Idempotent: if `T` is already registered, returns the existing ID
///   without taking the write lock.
/// - Otherwise allocates the next dense ID and records the descriptor.
///
/// ## Errors
/// - `UniverseFull` once `COMPONENT_CAP` distinct types were observed.
/// - `ZeroSized` for zero-sized types; rows must have nonzero stride.
pub fn register_component<T: Component>() -> WorldResult<ComponentId> {
    if size_of::<T>() == 0 {
        return Err(WorldError::Registry(RegistryError::ZeroSized {
            name: type_name::<T>(),
        }));
    }

    {
        let registry = registry()
            .read()
            .map_err(|_| RegistryError::PoisonedLock)?;
        if let Some(&id) = registry.by_type.get(&TypeId::of::<T>()) {
            return Ok(id);
        }
    }

    let mut registry = registry()
        .write()
        .map_err(|_| RegistryError::PoisonedLock)?;
    Ok(registry.register::<T>()?)
}

/// Returns the registered ID for type `T`, if any.
pub fn component_id_of<T: Component>() -> Option<ComponentId> {
    match registry().read() {
        Ok(registry) => registry.by_type.get(&TypeId::of::<T>()).copied(),
        Err(_) => None,
    }
}

/// Returns a copy of the descriptor for `component_id`, if registered.
pub fn component_desc(component_id: ComponentId) -> Option<ComponentDesc> {
    match registry().read() {
        Ok(registry) => registry
            .by_id
            .get(component_id as usize)
            .and_then(|slot| *slot),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha(#[allow(dead_code)] u64);
    struct Beta(#[allow(dead_code)] u8);

    #[test]
    fn registration_is_idempotent_and_ordered() {
        let a = register_component::<Alpha>().unwrap();
        let b = register_component::<Beta>().unwrap();

        assert!(a < b, "first-observed type must mint the lower id");
        assert_eq!(register_component::<Alpha>().unwrap(), a);
        assert_eq!(component_id_of::<Alpha>(), Some(a));

        let desc = component_desc(a).unwrap();
        assert_eq!(desc.size, 8);
        assert_eq!(desc.type_id, TypeId::of::<Alpha>());
        assert!(!desc.needs_drop);
    }

    #[test]
    fn zero_sized_components_are_rejected() {
        struct Marker;
        let err = register_component::<Marker>().unwrap_err();
        assert!(matches!(
            err,
            WorldError::Registry(RegistryError::ZeroSized { .. })
        ));
    }

    #[test]
    fn drop_metadata_tracks_owned_resources() {
        struct Owned(#[allow(dead_code)] String);
        let id = register_component::<Owned>().unwrap();
        let desc = component_desc(id).unwrap();
        assert!(desc.needs_drop);
    }
}
