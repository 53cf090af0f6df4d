//! Typed rows and projections.
//!
//! Rows handed to the world and projections borrowed back from it are plain
//! tuples of component types. This module defines the two traits behind
//! that surface and implements them for tuples of up to eight components:
//!
//! - [`Bundle`]: a spawnable row. Registers its component types, reports the
//!   row mask, and moves its fields into a reserved table row.
//! - [`Query`]: a projection. Resolves component IDs without registering and
//!   materializes reference bundles from a row at precomputed offsets.
//!
//! ## Ordering contract
//! Row layout places components in ascending component-ID order, and
//! projections are resolved against that order. Tuple fields must therefore
//! be listed in the order their component IDs were minted (first structural
//! observation order). Both traits check this with a debug assertion; the
//! same check rules out duplicate components in a tuple, which is what makes
//! the mutable reference bundles alias-free.

use smallvec::SmallVec;

use crate::engine::archetype::ArchetypeTable;
use crate::engine::component::{component_id_of, register_component, Component};
use crate::engine::error::WorldResult;
use crate::engine::types::{ComponentId, Mask, RowIndex};

/// Scratch list of component IDs for one row or projection.
pub type IdList = SmallVec<[ComponentId; 8]>;

/// A typed row that can be spawned into the world.
///
/// Implemented for tuples `(A,)` through 8-ary tuples of component types.
/// Fields must be listed in ascending component-ID order.
pub trait Bundle: 'static {
    /// Registers every component type of this row and appends their IDs to
    /// `out`, in declaration order.
    ///
    /// ## Errors
    /// Propagates registry failures (`UniverseFull`, `ZeroSized`).
    fn component_ids(out: &mut IdList) -> WorldResult<()>;

    /// Registers the row's component types and returns the row mask.
    fn mask() -> WorldResult<Mask>
    where
        Self: Sized,
    {
        let mut ids = IdList::new();
        Self::component_ids(&mut ids)?;
        Ok(Mask::from_ids(&ids))
    }

    /// Moves every field into its column of `row`.
    ///
    /// ## Safety
    /// The table's mask must equal this bundle's mask, `row` must be a
    /// reserved row of the table, and the destination slots must not hold
    /// live values that still need dropping.
    unsafe fn write(self, table: &mut ArchetypeTable, row: RowIndex);
}

/// A typed projection borrowed from rows.
///
/// Implemented for tuples `(A,)` through 8-ary tuples of component types.
/// Fields must be listed in ascending component-ID order.
pub trait Query: 'static {
    /// Shared reference bundle for one row.
    type Item<'a>
    where
        Self: 'a;

    /// Mutable reference bundle for one row.
    type ItemMut<'a>
    where
        Self: 'a;

    /// Appends the projection's component IDs to `out`, in declaration
    /// order. Returns `false` if any component type was never registered,
    /// in which case no archetype can match the projection.
    fn component_ids(out: &mut IdList) -> bool;

    /// Builds the shared reference bundle for `row`.
    ///
    /// ## Safety
    /// `offsets` must be the table's layout offsets for this projection's
    /// components in declaration order, `row < table.len()`, and the table
    /// must outlive `'a`.
    unsafe fn fetch<'a>(table: &ArchetypeTable, row: RowIndex, offsets: &[usize])
        -> Self::Item<'a>;

    /// Builds the mutable reference bundle for `row`.
    ///
    /// ## Safety
    /// As [`Query::fetch`], and the caller must guarantee exclusive access
    /// to the table for `'a`.
    unsafe fn fetch_mut<'a>(
        table: &ArchetypeTable,
        row: RowIndex,
        offsets: &[usize],
    ) -> Self::ItemMut<'a>;
}

macro_rules! row_tuple_impl {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> Bundle for ($($ty,)+) {
            fn component_ids(out: &mut IdList) -> WorldResult<()> {
                $( out.push(register_component::<$ty>()?); )+
                debug_assert!(
                    out.windows(2).all(|w| w[0] < w[1]),
                    "row components must be listed in ascending registration order, without duplicates"
                );
                Ok(())
            }

            unsafe fn write(self, table: &mut ArchetypeTable, row: RowIndex) {
                #[allow(non_snake_case)]
                let ($($ty,)+) = self;
                $( unsafe { table.write_component(row, $ty); } )+
            }
        }

        impl<$($ty: Component),+> Query for ($($ty,)+) {
            type Item<'a> = ($(&'a $ty,)+) where Self: 'a;
            type ItemMut<'a> = ($(&'a mut $ty,)+) where Self: 'a;

            fn component_ids(out: &mut IdList) -> bool {
                $(
                    match component_id_of::<$ty>() {
                        Some(id) => out.push(id),
                        None => return false,
                    }
                )+
                debug_assert!(
                    out.windows(2).all(|w| w[0] < w[1]),
                    "projection components must be listed in ascending registration order, without duplicates"
                );
                true
            }

            #[allow(unused_assignments)]
            unsafe fn fetch<'a>(
                table: &ArchetypeTable,
                row: RowIndex,
                offsets: &[usize],
            ) -> Self::Item<'a> {
                let mut next = 0usize;
                ($(
                    {
                        let offset = offsets[next];
                        next += 1;
                        unsafe { &*table.typed_at::<$ty>(row, offset) }
                    },
                )+)
            }

            #[allow(unused_assignments)]
            unsafe fn fetch_mut<'a>(
                table: &ArchetypeTable,
                row: RowIndex,
                offsets: &[usize],
            ) -> Self::ItemMut<'a> {
                let mut next = 0usize;
                ($(
                    {
                        let offset = offsets[next];
                        next += 1;
                        unsafe { &mut *table.typed_at::<$ty>(row, offset) }
                    },
                )+)
            }
        }
    };
}

row_tuple_impl!(A);
row_tuple_impl!(A, B);
row_tuple_impl!(A, B, C);
row_tuple_impl!(A, B, C, D);
row_tuple_impl!(A, B, C, D, E);
row_tuple_impl!(A, B, C, D, E, F);
row_tuple_impl!(A, B, C, D, E, F, G);
row_tuple_impl!(A, B, C, D, E, F, G, H);
