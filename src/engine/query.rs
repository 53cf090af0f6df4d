//! Query iteration over archetypes.
//!
//! An iterator visits every archetype whose mask is a superset of the query
//! mask and whose length is nonzero, yielding one projection bundle per row.
//! Archetypes are visited in insertion order; within an archetype, rows are
//! visited in ascending index order.
//!
//! ## Progression
//! The iterator is a small state machine: it *scans* forward over the
//! archetype vector until a matching, non-empty table is found, *yields*
//! that table's rows one by one, then resumes scanning at the next table.
//! When the vector is exhausted, further pulls return `None`.
//!
//! ## Invalidation
//! The shared iterator borrows the world for its whole lifetime, and the
//! mutable iterator borrows it exclusively, so structural mutation during
//! iteration is rejected by the borrow checker instead of invalidating
//! pointers at runtime.

use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::engine::archetype::ArchetypeTable;
use crate::engine::bundle::{IdList, Query};
use crate::engine::types::{Mask, RowIndex};

/// Per-archetype projection offsets, refreshed when a new table is entered.
type OffsetList = SmallVec<[usize; 8]>;

/// Iterator over shared projections of all rows matching a query.
///
/// Created by `World::iter`.
pub struct QueryIter<'w, Q: Query> {
    archetypes: &'w [ArchetypeTable],
    mask: Mask,
    ids: IdList,
    archetype_index: usize,
    row: usize,
    offsets: OffsetList,
    _marker: PhantomData<fn() -> Q>,
}

impl<'w, Q: Query> QueryIter<'w, Q> {
    pub(crate) fn new(archetypes: &'w [ArchetypeTable], mask: Mask, ids: IdList) -> Self {
        Self {
            archetypes,
            mask,
            ids,
            archetype_index: 0,
            row: 0,
            offsets: OffsetList::new(),
            _marker: PhantomData,
        }
    }

    /// An iterator that yields nothing, for projections no archetype can
    /// match.
    pub(crate) fn empty(archetypes: &'w [ArchetypeTable]) -> Self {
        Self {
            archetype_index: archetypes.len(),
            ..Self::new(archetypes, Mask::EMPTY, IdList::new())
        }
    }
}

impl<'w, Q: Query> Iterator for QueryIter<'w, Q> {
    type Item = Q::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        let archetypes = self.archetypes;
        loop {
            let table = archetypes.get(self.archetype_index)?;

            if self.row < table.len() && table.has_all(self.mask) {
                if self.row == 0 {
                    self.offsets = table.offsets_for(&self.ids);
                }
                let item = unsafe { Q::fetch(table, self.row as RowIndex, &self.offsets) };
                self.row += 1;
                return Some(item);
            }

            self.archetype_index += 1;
            self.row = 0;
        }
    }
}

/// Iterator over mutable projections of all rows matching a query.
///
/// Created by `World::iter_mut`; holds the world's archetypes exclusively
/// for `'w`.
pub struct QueryIterMut<'w, Q: Query> {
    archetypes: *mut ArchetypeTable,
    count: usize,
    mask: Mask,
    ids: IdList,
    archetype_index: usize,
    row: usize,
    offsets: OffsetList,
    _marker: PhantomData<(&'w mut ArchetypeTable, fn() -> Q)>,
}

impl<'w, Q: Query> QueryIterMut<'w, Q> {
    pub(crate) fn new(archetypes: &'w mut [ArchetypeTable], mask: Mask, ids: IdList) -> Self {
        Self {
            archetypes: archetypes.as_mut_ptr(),
            count: archetypes.len(),
            mask,
            ids,
            archetype_index: 0,
            row: 0,
            offsets: OffsetList::new(),
            _marker: PhantomData,
        }
    }

    /// An iterator that yields nothing.
    pub(crate) fn empty(archetypes: &'w mut [ArchetypeTable]) -> Self {
        let mut iter = Self::new(archetypes, Mask::EMPTY, IdList::new());
        iter.archetype_index = iter.count;
        iter
    }
}

impl<'w, Q: Query> Iterator for QueryIterMut<'w, Q> {
    type Item = Q::ItemMut<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.archetype_index >= self.count {
                return None;
            }
            // The iterator owns the exclusive borrow of the archetype slice
            // for 'w; each row is visited at most once, so the mutable
            // bundles handed out never alias.
            let table: &'w ArchetypeTable =
                unsafe { &*self.archetypes.add(self.archetype_index) };

            if self.row < table.len() && table.has_all(self.mask) {
                if self.row == 0 {
                    self.offsets = table.offsets_for(&self.ids);
                }
                let item = unsafe { Q::fetch_mut(table, self.row as RowIndex, &self.offsets) };
                self.row += 1;
                return Some(item);
            }

            self.archetype_index += 1;
            self.row = 0;
        }
    }
}
