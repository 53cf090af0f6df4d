//! World orchestration.
//!
//! The [`World`] owns every archetype table, the mask-to-archetype map, and
//! the entry table, and coordinates all lifecycle operations: spawning,
//! despawning, component addition and removal, lookup, and iteration.
//!
//! ## Data flow
//! A typed row comes in, its mask is derived, the archetype for that mask is
//! found or created, the row's bytes land in the table, and an entry slot is
//! claimed to point at `(archetype, row)`. Every later operation routes
//! through that entry.
//!
//! ## Concurrency model
//! Single-threaded and synchronous. Nothing here locks or suspends; the
//! borrow checker serializes mutation against the references and iterators
//! handed out.
//!
//! ## Failure atomicity
//! Allocation failures during multi-step mutations leave the world in its
//! pre-call state: a destination archetype may have been created and left
//! empty (unreachable through any entity), but no entity is partially
//! migrated and no row is orphaned. Despawning cannot fail.

use ahash::AHashMap;
use log::{debug, trace};
use std::any::type_name;

use crate::engine::archetype::ArchetypeTable;
use crate::engine::bundle::{Bundle, IdList, Query};
use crate::engine::component::{component_id_of, register_component, Component};
use crate::engine::entity::{Entries, EntityId};
use crate::engine::error::{WorldError, WorldResult};
use crate::engine::query::{QueryIter, QueryIterMut};
use crate::engine::types::{ArchetypeIndex, Mask};

/// Container for all entities and their component data.
///
/// ## Design
/// - Entities with identical component sets share one dense
///   [`ArchetypeTable`]; the map from [`Mask`] to table index is hashed.
/// - Handles are indirected through the entry table, so rows may move
///   (swap-remove, migration) without invalidating handles.
/// - Archetypes live until the world is dropped; entity slots are recycled
///   and never physically freed.
pub struct World {
    archetypes: Vec<ArchetypeTable>,
    archetype_map: AHashMap<Mask, ArchetypeIndex>,
    entries: Entries,
    live: usize,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self {
            archetypes: Vec::new(),
            archetype_map: AHashMap::new(),
            entries: Entries::default(),
            live: 0,
        }
    }

    /// Returns the number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no entity is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns the number of archetypes created so far.
    #[inline]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Returns the total number of entity slots ever created, live or free.
    ///
    /// Slots are recycled indefinitely, so this is a high-water mark, not a
    /// live count.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.entries.slot_count()
    }

    /// Finds the archetype for `mask`, creating it on first demand.
    fn archetype_index_for(&mut self, mask: Mask) -> WorldResult<ArchetypeIndex> {
        if let Some(&index) = self.archetype_map.get(&mask) {
            return Ok(index);
        }

        let table = ArchetypeTable::new(mask)?;
        let index = self.archetypes.len() as ArchetypeIndex;
        debug!(
            "created archetype {} for mask {:#018x} (stride {})",
            index,
            mask.bits(),
            table.stride()
        );
        self.archetypes.push(table);
        self.archetype_map.insert(mask, index);
        Ok(index)
    }

    /// Mutably borrows two distinct archetypes at once.
    fn archetype_pair_mut(
        &mut self,
        a: ArchetypeIndex,
        b: ArchetypeIndex,
    ) -> (&mut ArchetypeTable, &mut ArchetypeTable) {
        assert!(a != b, "source and destination archetype must differ");
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        let (head, tail) = self.archetypes.split_at_mut(high as usize);
        let low_ref = &mut head[low as usize];
        let high_ref = &mut tail[0];
        if a < b {
            (low_ref, high_ref)
        } else {
            (high_ref, low_ref)
        }
    }

    /// Creates an entity from a typed row and returns its handle.
    ///
    /// ## Behavior
    /// 1. Registers the row's component types and derives its mask.
    /// 2. Finds or creates the archetype for that mask.
    /// 3. Writes the row, claims an entry slot (recycling the most recently
    ///    freed one), and wires the back reference.
    ///
    /// The returned handle carries the slot's current generation; a recycled
    /// slot hands out the generation installed when its previous entity was
    /// despawned.
    ///
    /// ## Errors
    /// - `Registry(UniverseFull)` if a new component type exceeds the
    ///   component universe.
    /// - `OutOfMemory` if buffer growth fails; the world is unchanged.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> WorldResult<EntityId> {
        let mask = B::mask()?;
        let archetype = self.archetype_index_for(mask)?;

        let row = self.archetypes[archetype as usize].write_row(bundle, 0)?;
        let (slot, generation) = self.entries.allocate(archetype, row);
        self.archetypes[archetype as usize].set_back_ref(row, slot);
        self.live += 1;

        trace!("spawned {:?} in archetype {archetype} row {row}", EntityId::new(slot, generation));
        Ok(EntityId::new(slot, generation))
    }

    /// Deletes an entity.
    ///
    /// ## Behavior
    /// Runs the row's destructors, swap-removes the row (patching the entry
    /// of whichever row moved into its place), bumps the slot's generation,
    /// and links the slot into the free list.
    ///
    /// Silently returns when the handle is stale, so a double despawn is a
    /// no-op.
    pub fn despawn(&mut self, entity: EntityId) {
        let Some((archetype, row)) = self.entries.location(entity) else {
            return;
        };

        let table = &mut self.archetypes[archetype as usize];
        table.drop_row_in_place(row);
        let moved = table.delete(row);
        self.entries.set_row(moved, row);
        self.entries.release(entity.slot());
        self.live -= 1;

        trace!("despawned {entity:?} from archetype {archetype} row {row}");
    }

    /// Returns `true` if the handle refers to a live entity.
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entries.is_live(entity)
    }

    /// Returns `true` if the entity is live and carries component `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        let Some((archetype, _)) = self.entries.location(entity) else {
            return false;
        };
        match component_id_of::<T>() {
            Some(id) => self.archetypes[archetype as usize].has(id),
            None => false,
        }
    }

    /// Returns the entity's `T` value, or `None` if the handle is stale or
    /// the component absent.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let (archetype, row) = self.entries.location(entity)?;
        self.archetypes[archetype as usize].component::<T>(row)
    }

    /// Mutable variant of [`World::get`].
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let (archetype, row) = self.entries.location(entity)?;
        self.archetypes[archetype as usize].component_mut::<T>(row)
    }

    fn resolve_query<Q: Query>() -> Option<(IdList, Mask)> {
        let mut ids = IdList::new();
        if Q::component_ids(&mut ids) {
            let mask = Mask::from_ids(&ids);
            Some((ids, mask))
        } else {
            None
        }
    }

    /// Borrows the entity's full row as a typed projection.
    ///
    /// The projection's component set must equal the entity's archetype mask
    /// exactly; a mismatch is a programming error and trips an assertion.
    ///
    /// ## Errors
    /// `EntityDead` if the handle is stale.
    pub fn get_row<Q: Query>(&self, entity: EntityId) -> WorldResult<Q::Item<'_>> {
        let (archetype, row) = self.entries.location(entity).ok_or(WorldError::EntityDead)?;
        let table = &self.archetypes[archetype as usize];

        let (ids, mask) =
            Self::resolve_query::<Q>().expect("row projection names unregistered component types");
        debug_assert!(
            table.has_exact(mask),
            "row projection must match the archetype exactly"
        );

        let offsets = table.offsets_for(&ids);
        Ok(unsafe { Q::fetch(table, row, &offsets) })
    }

    /// Mutable variant of [`World::get_row`].
    pub fn get_row_mut<Q: Query>(&mut self, entity: EntityId) -> WorldResult<Q::ItemMut<'_>> {
        let (archetype, row) = self.entries.location(entity).ok_or(WorldError::EntityDead)?;
        let table = &self.archetypes[archetype as usize];

        let (ids, mask) =
            Self::resolve_query::<Q>().expect("row projection names unregistered component types");
        debug_assert!(
            table.has_exact(mask),
            "row projection must match the archetype exactly"
        );

        let offsets = table.offsets_for(&ids);
        // Exclusive access for the returned bundle is guaranteed by the
        // `&mut self` borrow held for its lifetime.
        Ok(unsafe { Q::fetch_mut(table, row, &offsets) })
    }

    /// Borrows a subset of the entity's components as a typed projection.
    ///
    /// The entity's archetype mask must be a superset of the projection's
    /// component set; a mismatch is a programming error and trips an
    /// assertion.
    ///
    /// ## Errors
    /// `EntityDead` if the handle is stale.
    pub fn get_many<Q: Query>(&self, entity: EntityId) -> WorldResult<Q::Item<'_>> {
        let (archetype, row) = self.entries.location(entity).ok_or(WorldError::EntityDead)?;
        let table = &self.archetypes[archetype as usize];

        let (ids, mask) =
            Self::resolve_query::<Q>().expect("projection names unregistered component types");
        debug_assert!(
            table.has_all(mask),
            "archetype must contain every projected component"
        );

        let offsets = table.offsets_for(&ids);
        Ok(unsafe { Q::fetch(table, row, &offsets) })
    }

    /// Mutable variant of [`World::get_many`].
    pub fn get_many_mut<Q: Query>(&mut self, entity: EntityId) -> WorldResult<Q::ItemMut<'_>> {
        let (archetype, row) = self.entries.location(entity).ok_or(WorldError::EntityDead)?;
        let table = &self.archetypes[archetype as usize];

        let (ids, mask) =
            Self::resolve_query::<Q>().expect("projection names unregistered component types");
        debug_assert!(
            table.has_all(mask),
            "archetype must contain every projected component"
        );

        let offsets = table.offsets_for(&ids);
        Ok(unsafe { Q::fetch_mut(table, row, &offsets) })
    }

    /// Adds component `T` to an entity, migrating it to the wider archetype.
    ///
    /// ## Behavior
    /// 1. Liveness and duplicate checks.
    /// 2. Finds or creates the archetype for `old_mask | {T}`.
    /// 3. Copies the overlapping columns into a fresh destination row, then
    ///    writes `value` into the new column.
    /// 4. Swap-removes the source row and patches the moved entry.
    /// 5. Repoints the entity's entry at its new location.
    ///
    /// A failure at step 2 or 3 leaves the world unchanged.
    ///
    /// ## Errors
    /// `EntityDead`, `ComponentAlreadyPresent`, `Registry(..)`,
    /// `OutOfMemory`.
    pub fn add<T: Component>(&mut self, entity: EntityId, value: T) -> WorldResult<()> {
        let (src_index, src_row) = self.entries.location(entity).ok_or(WorldError::EntityDead)?;

        let id = register_component::<T>()?;
        let old_mask = self.archetypes[src_index as usize].mask();
        if old_mask.is_set(id) {
            return Err(WorldError::ComponentAlreadyPresent {
                name: type_name::<T>(),
            });
        }

        let dst_index = self.archetype_index_for(old_mask.with(id))?;
        let (src, dst) = self.archetype_pair_mut(src_index, dst_index);

        let dst_row = dst.copy_from(src, src_row)?;
        unsafe {
            dst.write_component(dst_row, value);
        }

        let moved = src.delete(src_row);
        self.entries.set_row(moved, src_row);
        self.entries.set_location(entity.slot(), dst_index, dst_row);

        trace!("{entity:?} moved to archetype {dst_index} (added {})", type_name::<T>());
        Ok(())
    }

    /// Removes component `T` from an entity, migrating it to the narrower
    /// archetype.
    ///
    /// ## Behavior
    /// The overlap copy naturally leaves the removed column behind; its
    /// value is dropped in the source row before the swap-remove. Removing
    /// the entity's final component despawns it, since componentless rows
    /// are not storable.
    ///
    /// A migration failure leaves the world unchanged.
    ///
    /// ## Errors
    /// `EntityDead`, `ComponentMissing`, `OutOfMemory`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> WorldResult<()> {
        let (src_index, src_row) = self.entries.location(entity).ok_or(WorldError::EntityDead)?;

        let missing = WorldError::ComponentMissing {
            name: type_name::<T>(),
        };
        let id = component_id_of::<T>().ok_or(missing)?;
        let old_mask = self.archetypes[src_index as usize].mask();
        if !old_mask.is_set(id) {
            return Err(missing);
        }

        let new_mask = old_mask.without(id);
        if new_mask.is_empty() {
            self.despawn(entity);
            return Ok(());
        }

        let dst_index = self.archetype_index_for(new_mask)?;
        let (src, dst) = self.archetype_pair_mut(src_index, dst_index);

        let dst_row = dst.copy_from(src, src_row)?;
        src.drop_component_in_place(src_row, id);

        let moved = src.delete(src_row);
        self.entries.set_row(moved, src_row);
        self.entries.set_location(entity.slot(), dst_index, dst_row);

        trace!("{entity:?} moved to archetype {dst_index} (removed {})", type_name::<T>());
        Ok(())
    }

    /// Iterates shared projections over every live entity whose archetype
    /// mask is a superset of the projection's component set.
    ///
    /// Archetypes are visited in insertion order, rows in ascending order.
    /// A projection naming a component type that was never stored anywhere
    /// matches nothing.
    pub fn iter<Q: Query>(&self) -> QueryIter<'_, Q> {
        match Self::resolve_query::<Q>() {
            Some((ids, mask)) => QueryIter::new(&self.archetypes, mask, ids),
            None => QueryIter::empty(&self.archetypes),
        }
    }

    /// Mutable variant of [`World::iter`].
    pub fn iter_mut<Q: Query>(&mut self) -> QueryIterMut<'_, Q> {
        match Self::resolve_query::<Q>() {
            Some((ids, mask)) => QueryIterMut::new(&mut self.archetypes, mask, ids),
            None => QueryIterMut::empty(&mut self.archetypes),
        }
    }

    /// Fast path over homogeneous archetypes: invokes `f` once per entity
    /// whose archetype stores exactly the single component `T`, reading the
    /// table as a contiguous slice.
    pub fn each<T: Component>(&self, mut f: impl FnMut(&T)) {
        let Some(id) = component_id_of::<T>() else {
            return;
        };
        let mask = Mask::from_ids(&[id]);

        for table in &self.archetypes {
            if table.has_exact(mask) {
                if let Some(values) = table.values::<T>() {
                    for value in values {
                        f(value);
                    }
                }
            }
        }
    }

    /// Mutable variant of [`World::each`].
    pub fn each_mut<T: Component>(&mut self, mut f: impl FnMut(&mut T)) {
        let Some(id) = component_id_of::<T>() else {
            return;
        };
        let mask = Mask::from_ids(&[id]);

        for table in &mut self.archetypes {
            if table.has_exact(mask) {
                if let Some(values) = table.values_mut::<T>() {
                    for value in values {
                        f(value);
                    }
                }
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
