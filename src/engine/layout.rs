//! Row layout computation.
//!
//! Given a component [`Mask`], this module derives the byte layout of one
//! table row: the per-component offsets, the row alignment, and the stride
//! between consecutive rows.
//!
//! ## Placement rule
//! Components are placed in **ascending component-ID order**. Each component
//! lands at the least offset at or past the running cursor that satisfies its
//! alignment. Row alignment is the maximum component alignment, and the
//! stride is the end of the last component rounded up to the row alignment,
//! so that every row base (and therefore every component within it) stays
//! aligned when rows are addressed as `base + index * stride`.
//!
//! Because placement depends on ascending-ID traversal, typed row and
//! projection tuples must list their components in the order their IDs were
//! minted; that contract is checked where tuples are resolved.

use std::any::TypeId;

use smallvec::SmallVec;

use crate::engine::component::component_desc;
use crate::engine::error::WorldResult;
use crate::engine::types::{ComponentId, Mask};

/// Placement of a single component column within a row.
#[derive(Clone, Copy, Debug)]
pub struct ColumnInfo {
    /// Component this column stores.
    pub component: ComponentId,

    /// Runtime type of the stored values, for debug verification of typed
    /// accessors.
    pub type_id: TypeId,

    /// Byte offset of the column within a row.
    pub offset: usize,

    /// Size of one value in bytes.
    pub size: usize,

    /// `true` if values in this column have a destructor.
    pub needs_drop: bool,

    /// Destructor for one value in place.
    pub drop_fn: unsafe fn(*mut u8),
}

/// Byte layout of one table row, derived from a component mask.
///
/// ## Invariants
/// - `columns` is sorted by ascending component ID.
/// - `stride > 0` and `stride` is a multiple of `align`.
/// - Column offsets respect each component's alignment, and
///   `offset + size <= stride` for every column.
#[derive(Clone, Debug)]
pub struct RowLayout {
    columns: SmallVec<[ColumnInfo; 8]>,
    stride: usize,
    align: usize,
    any_drop: bool,
}

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

impl RowLayout {
    /// Computes the row layout for `mask`.
    ///
    /// ## Behavior
    /// Walks the set component IDs in ascending order, replaying the
    /// placement rule described in the module docs.
    ///
    /// ## Panics
    /// Panics if a set bit refers to an unregistered component. Masks are
    /// only ever built from registered IDs, so this indicates internal
    /// corruption rather than a caller mistake.
    pub fn for_mask(mask: Mask) -> WorldResult<RowLayout> {
        debug_assert!(!mask.is_empty(), "row layout requires a non-empty mask");

        let mut columns: SmallVec<[ColumnInfo; 8]> = SmallVec::new();
        let mut cursor = 0usize;
        let mut align = 1usize;
        let mut any_drop = false;

        for id in mask.iter() {
            let Some(desc) = component_desc(id) else {
                unreachable!("mask bit {id} does not match a registered component");
            };

            let offset = align_up(cursor, desc.align);
            columns.push(ColumnInfo {
                component: id,
                type_id: desc.type_id,
                offset,
                size: desc.size,
                needs_drop: desc.needs_drop,
                drop_fn: desc.drop_fn,
            });

            cursor = offset + desc.size;
            align = align.max(desc.align);
            any_drop |= desc.needs_drop;
        }

        Ok(RowLayout {
            columns,
            stride: align_up(cursor, align),
            align,
            any_drop,
        })
    }

    /// Returns the byte distance between consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the required alignment of the row buffer base.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Returns `true` if any column requires destructor calls.
    #[inline]
    pub fn any_drop(&self) -> bool {
        self.any_drop
    }

    /// Returns the column table, sorted by ascending component ID.
    #[inline]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Returns the column for `component_id`, if present.
    #[inline]
    pub fn column(&self, component_id: ComponentId) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.component == component_id)
    }

    /// Returns the byte offset of `component_id` within a row, if present.
    #[inline]
    pub fn offset_of(&self, component_id: ComponentId) -> Option<usize> {
        self.column(component_id).map(|c| c.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::component::register_component;

    // Registered in this order so the relative IDs (and therefore the
    // placement order) are known: Wide < Narrow < Mid.
    struct Wide(#[allow(dead_code)] u64);
    struct Narrow(#[allow(dead_code)] u8);
    struct Mid(#[allow(dead_code)] u32);

    fn ids() -> (ComponentId, ComponentId, ComponentId) {
        let w = register_component::<Wide>().unwrap();
        let n = register_component::<Narrow>().unwrap();
        let m = register_component::<Mid>().unwrap();
        (w, n, m)
    }

    #[test]
    fn offsets_follow_ascending_id_placement() {
        let (w, n, m) = ids();
        let layout = RowLayout::for_mask(Mask::from_ids(&[m, w, n])).unwrap();

        // Wide at 0, Narrow right behind it, Mid rounded up to 4 bytes.
        assert_eq!(layout.offset_of(w), Some(0));
        assert_eq!(layout.offset_of(n), Some(8));
        assert_eq!(layout.offset_of(m), Some(12));
        assert_eq!(layout.align(), 8);
        assert_eq!(layout.stride(), 16);
        assert_eq!(layout.stride() % layout.align(), 0);
    }

    #[test]
    fn single_column_stride_equals_size() {
        let (w, _, _) = ids();
        let layout = RowLayout::for_mask(Mask::from_ids(&[w])).unwrap();
        assert_eq!(layout.stride(), std::mem::size_of::<Wide>());
        assert_eq!(layout.columns().len(), 1);
    }

    #[test]
    fn absent_component_has_no_offset() {
        let (w, n, _) = ids();
        let layout = RowLayout::for_mask(Mask::from_ids(&[w])).unwrap();
        assert_eq!(layout.offset_of(n), None);
    }
}
