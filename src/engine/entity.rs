//! Entity handles and the entry table.
//!
//! This module defines entity identity and the indirection layer between
//! stable handles and physical storage.
//!
//! ## Entity Model
//! An [`EntityId`] is a compact, versioned handle composed of:
//!
//! - A **slot**, indexing into the entry table
//! - A **generation**, incremented when the slot's entity is deleted
//!
//! The entry at a slot records the entity's current `(archetype, row)`
//! location, which migration and swap-remove keep up to date. Handles stay
//! valid across both; only deletion invalidates them.
//!
//! ## Slot recycling
//! Freed slots form an intrusive free list threaded through the entries
//! themselves: a free entry's `row` field stores the index of the next free
//! slot, and the tail of the chain stores its own index as a terminator.
//! Slots are never physically freed.
//!
//! ## Generation discipline
//! The generation is incremented once per delete, before the slot is linked
//! into the free list; reuse installs the already-bumped value unchanged. A
//! handle is live iff its generation equals the entry's. Counters wrap, so a
//! collision after 2^32 reuses of one slot is possible and accepted.

use std::fmt;

use crate::engine::types::{ArchetypeIndex, Generation, RowIndex, SlotIndex};

/// Opaque, versioned identifier for an entity.
///
/// ## Representation
/// Packs the slot into the low 32 bits and the generation into the high 32
/// bits of a single `u64`. Values are cheap to copy and compare; the
/// accessors exist for diagnostics and tests, not for navigation.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub(crate) fn new(slot: SlotIndex, generation: Generation) -> Self {
        Self(((generation as u64) << 32) | slot as u64)
    }

    /// Returns the entry-table slot this handle refers to.
    #[inline]
    pub fn slot(self) -> SlotIndex {
        self.0 as u32
    }

    /// Returns the generation this handle was issued with.
    #[inline]
    pub fn generation(self) -> Generation {
        (self.0 >> 32) as u32
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.slot(), self.generation())
    }
}

/// One record of the entry table.
///
/// ## Invariants
/// When the slot is live, `archetypes[archetype].back_ref(row)` equals this
/// slot's index. When the slot is free, `archetype` is meaningless and `row`
/// holds the free-list link.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry {
    pub archetype: ArchetypeIndex,
    pub row: RowIndex,
    pub generation: Generation,
}

/// Grow-only entry table with embedded free-slot recycling.
#[derive(Default)]
pub(crate) struct Entries {
    entries: Vec<Entry>,
    free_head: Option<SlotIndex>,
}

impl Entries {
    /// Pops the most recently freed slot, if any.
    fn pop_free(&mut self) -> Option<SlotIndex> {
        let head = self.free_head?;
        let next = self.entries[head as usize].row;
        self.free_head = if next == head { None } else { Some(next) };
        Some(head)
    }

    /// Claims a slot for a new entity at `(archetype, row)`.
    ///
    /// ## Behavior
    /// Reuses the free-list head when available, otherwise appends a fresh
    /// entry with generation 0. The generation installed at the previous
    /// delete is carried unchanged.
    ///
    /// Returns the slot and the generation the new handle must carry.
    pub fn allocate(
        &mut self,
        archetype: ArchetypeIndex,
        row: RowIndex,
    ) -> (SlotIndex, Generation) {
        match self.pop_free() {
            Some(slot) => {
                let entry = &mut self.entries[slot as usize];
                entry.archetype = archetype;
                entry.row = row;
                (slot, entry.generation)
            }
            None => {
                let slot = self.entries.len() as SlotIndex;
                self.entries.push(Entry {
                    archetype,
                    row,
                    generation: 0,
                });
                (slot, 0)
            }
        }
    }

    /// Retires a slot: bumps its generation and links it into the free list.
    ///
    /// The generation increment happens first, so every handle issued before
    /// this call reads as dead from here on.
    pub fn release(&mut self, slot: SlotIndex) {
        let link = self.free_head.unwrap_or(slot);
        let entry = &mut self.entries[slot as usize];
        entry.generation = entry.generation.wrapping_add(1);
        entry.row = link;
        self.free_head = Some(slot);
    }

    /// Returns `true` if `id` refers to a live entity.
    #[inline]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.entries
            .get(id.slot() as usize)
            .is_some_and(|entry| entry.generation == id.generation())
    }

    /// Returns the `(archetype, row)` location of a live entity.
    #[inline]
    pub fn location(&self, id: EntityId) -> Option<(ArchetypeIndex, RowIndex)> {
        let entry = self.entries.get(id.slot() as usize)?;
        if entry.generation != id.generation() {
            return None;
        }
        Some((entry.archetype, entry.row))
    }

    /// Rewrites the row index of a slot after a swap-remove moved its row.
    #[inline]
    pub fn set_row(&mut self, slot: SlotIndex, row: RowIndex) {
        self.entries[slot as usize].row = row;
    }

    /// Rewrites a slot's location after migration.
    #[inline]
    pub fn set_location(&mut self, slot: SlotIndex, archetype: ArchetypeIndex, row: RowIndex) {
        let entry = &mut self.entries[slot as usize];
        entry.archetype = archetype;
        entry.row = row;
    }

    /// Number of slots ever created (live plus free).
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }
}
