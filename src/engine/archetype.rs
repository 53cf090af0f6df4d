//! Archetype tables.
//!
//! An [`ArchetypeTable`] stores every entity whose component set equals the
//! table's [`Mask`], packed row-major in one byte buffer: row `i` occupies
//! `buffer[i * stride .. (i + 1) * stride]`, and within a row each component
//! sits at the offset computed by the layout calculator.
//!
//! ## Design
//! - Rows are dense; deletion swap-removes the last row into the vacated
//!   slot so iteration never skips holes.
//! - `back_refs[i]` records the entry-table slot that currently points at
//!   row `i`, so a swap-remove can report which entry needs its row index
//!   patched.
//! - Entity migration between tables copies only the columns present in both
//!   masks; the bytes move, no destructor runs.
//!
//! ## Invariants
//! - `len <= capacity` and `back_refs.len() == len`.
//! - The buffer holds `capacity * stride` bytes aligned to the row alignment
//!   once any row was inserted.
//! - Rows `0..len` are fully initialized for every column.
//!
//! ## Unsafe code
//! This module contains `unsafe` code for offset-based access into the row
//! buffer. All pointers derive from the table's own allocation, and every
//! typed access is preceded by a column lookup that fixes offset, size, and
//! (in debug builds) the stored `TypeId`.

use std::any::TypeId;
use std::ptr;

use log::debug;
use smallvec::SmallVec;

use crate::engine::bundle::Bundle;
use crate::engine::component::{component_id_of, Component};
use crate::engine::error::WorldResult;
use crate::engine::layout::RowLayout;
use crate::engine::storage::RowBuffer;
use crate::engine::types::{ComponentId, Mask, RowIndex, SlotIndex};

/// Row capacity allocated by the first insert.
const INITIAL_CAPACITY: usize = 8;

/// Byte written over vacated rows in debug builds to catch use-after-delete.
const DEBUG_POISON: u8 = 0xDD;

/// Dense row-major table of all entities sharing one component mask.
pub struct ArchetypeTable {
    mask: Mask,
    layout: RowLayout,
    len: usize,
    capacity: usize,
    buffer: RowBuffer,
    back_refs: Vec<SlotIndex>,
}

impl ArchetypeTable {
    /// Creates an empty table for `mask`, deriving stride and alignment.
    ///
    /// No memory is allocated until the first row is inserted.
    pub fn new(mask: Mask) -> WorldResult<Self> {
        let layout = RowLayout::for_mask(mask)?;
        debug_assert!(layout.stride() > 0);

        Ok(Self {
            mask,
            layout,
            len: 0,
            capacity: 0,
            buffer: RowBuffer::new(),
            back_refs: Vec::new(),
        })
    }

    /// Returns the component mask identifying this table.
    #[inline]
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the number of rows currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of rows the buffer can hold before growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the byte distance between consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    /// Returns `true` if the table stores `component_id`.
    #[inline]
    pub fn has(&self, component_id: ComponentId) -> bool {
        self.mask.is_set(component_id)
    }

    /// Returns `true` if the table stores every component in `mask`.
    #[inline]
    pub fn has_all(&self, mask: Mask) -> bool {
        self.mask.contains_all(mask)
    }

    /// Returns `true` if the table's component set equals `mask` exactly.
    #[inline]
    pub fn has_exact(&self, mask: Mask) -> bool {
        self.mask == mask
    }

    /// Returns the entry slot owning row `row`.
    #[inline]
    pub fn back_ref(&self, row: RowIndex) -> SlotIndex {
        self.back_refs[row as usize]
    }

    /// Points row `row` at entry slot `slot`.
    #[inline]
    pub(crate) fn set_back_ref(&mut self, row: RowIndex, slot: SlotIndex) {
        self.back_refs[row as usize] = slot;
    }

    /// Base pointer of row `row`.
    ///
    /// ## Safety
    /// `row` must be within the allocated capacity.
    #[inline]
    unsafe fn row_ptr(&self, row: RowIndex) -> *mut u8 {
        unsafe { self.buffer.as_ptr().add(row as usize * self.layout.stride()) }
    }

    /// Typed pointer to a component at a precomputed offset within a row.
    ///
    /// ## Safety
    /// `row < len` and `offset` must be the layout offset of a column whose
    /// stored type is `T`.
    #[inline]
    pub(crate) unsafe fn typed_at<T: Component>(&self, row: RowIndex, offset: usize) -> *mut T {
        debug_assert!((row as usize) < self.len);
        unsafe { self.row_ptr(row).add(offset).cast::<T>() }
    }

    fn ensure_capacity(&mut self, rows: usize) -> WorldResult<()> {
        if rows <= self.capacity {
            return Ok(());
        }

        let mut target = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity * 2
        };
        while target < rows {
            target *= 2;
        }

        self.buffer
            .grow(target * self.layout.stride(), self.layout.align())?;
        debug!(
            "archetype {:#018x} grew {} -> {} rows",
            self.mask.bits(),
            self.capacity,
            target
        );
        self.capacity = target;
        Ok(())
    }

    /// Reserves a zeroed row and records its back reference.
    ///
    /// ## Behavior
    /// Grows the buffer if needed (initial capacity 8, then doubling). On
    /// growth failure nothing is reserved and the table is unchanged.
    pub fn new_row(&mut self, back_ref: SlotIndex) -> WorldResult<RowIndex> {
        self.ensure_capacity(self.len + 1)?;

        let row = self.len;
        let stride = self.layout.stride();
        unsafe {
            self.buffer.fill(row * stride, stride, 0);
        }
        self.back_refs.push(back_ref);
        self.len += 1;
        Ok(row as RowIndex)
    }

    /// Reserves a row and moves the bundle's component values into it.
    ///
    /// The bundle's component set must equal this table's mask, with fields
    /// declared in ascending component-ID order.
    pub fn write_row<B: Bundle>(&mut self, bundle: B, back_ref: SlotIndex) -> WorldResult<RowIndex> {
        debug_assert!(
            B::mask().map_or(false, |m| self.has_exact(m)),
            "bundle component set must match the archetype exactly"
        );

        let row = self.new_row(back_ref)?;
        unsafe {
            bundle.write(self, row);
        }
        Ok(row)
    }

    /// Moves `value` into the component column of `row`.
    ///
    /// ## Safety
    /// `row < len`, `T` must be a column of this table, and the destination
    /// slot must not hold a live value that still needs dropping.
    pub(crate) unsafe fn write_component<T: Component>(&mut self, row: RowIndex, value: T) {
        let id = component_id_of::<T>().expect("component type not registered");
        let column = self
            .layout
            .column(id)
            .expect("component not present in archetype");
        debug_assert_eq!(column.type_id, TypeId::of::<T>());

        unsafe {
            self.row_ptr(row).add(column.offset).cast::<T>().write(value);
        }
    }

    /// Returns a reference to the `T` value of `row`, if the table stores `T`.
    pub fn component<T: Component>(&self, row: RowIndex) -> Option<&T> {
        if (row as usize) >= self.len {
            return None;
        }
        let column = self.layout.column(component_id_of::<T>()?)?;
        debug_assert_eq!(column.type_id, TypeId::of::<T>());
        unsafe { Some(&*self.typed_at::<T>(row, column.offset)) }
    }

    /// Returns a mutable reference to the `T` value of `row`, if present.
    pub fn component_mut<T: Component>(&mut self, row: RowIndex) -> Option<&mut T> {
        if (row as usize) >= self.len {
            return None;
        }
        let column = self.layout.column(component_id_of::<T>()?)?;
        debug_assert_eq!(column.type_id, TypeId::of::<T>());
        unsafe { Some(&mut *self.typed_at::<T>(row, column.offset)) }
    }

    /// Views the whole table as a contiguous slice of `T`.
    ///
    /// Only valid for tables storing exactly one component, `T`; the
    /// single-column stride then equals `size_of::<T>()` and rows form a
    /// plain array. Used by the homogeneous fast path.
    pub fn values<T: Component>(&self) -> Option<&[T]> {
        let [column] = self.layout.columns() else {
            return None;
        };
        if column.type_id != TypeId::of::<T>() {
            return None;
        }
        debug_assert_eq!(self.layout.stride(), std::mem::size_of::<T>());

        if self.len == 0 {
            return Some(&[]);
        }
        unsafe {
            Some(std::slice::from_raw_parts(
                self.buffer.as_ptr().cast::<T>(),
                self.len,
            ))
        }
    }

    /// Mutable variant of [`ArchetypeTable::values`].
    pub fn values_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        let [column] = self.layout.columns() else {
            return None;
        };
        if column.type_id != TypeId::of::<T>() {
            return None;
        }
        debug_assert_eq!(self.layout.stride(), std::mem::size_of::<T>());

        if self.len == 0 {
            return Some(&mut []);
        }
        unsafe {
            Some(std::slice::from_raw_parts_mut(
                self.buffer.as_ptr().cast::<T>(),
                self.len,
            ))
        }
    }

    /// Resolves layout offsets for a projection's component IDs.
    ///
    /// ## Panics
    /// Panics if an ID is not a column of this table; callers check the
    /// subset relation first.
    pub(crate) fn offsets_for(&self, ids: &[ComponentId]) -> SmallVec<[usize; 8]> {
        ids.iter()
            .map(|&id| {
                self.layout
                    .offset_of(id)
                    .expect("component not present in archetype")
            })
            .collect()
    }

    /// Reserves a row in `self` and copies the overlapping columns of
    /// `src_row` from `src` into it.
    ///
    /// ## Behavior
    /// - Only components present in **both** masks are copied; columns new
    ///   to `self` stay zeroed, columns only in `src` are left behind.
    /// - The bytes move; no destructor runs on either side.
    /// - The back reference is inherited from the source row.
    ///
    /// On growth failure `self` is unchanged and `src` is untouched.
    pub fn copy_from(&mut self, src: &ArchetypeTable, src_row: RowIndex) -> WorldResult<RowIndex> {
        debug_assert!((src_row as usize) < src.len);

        let dst_row = self.new_row(src.back_ref(src_row))?;
        for column in self.layout.columns() {
            let Some(src_offset) = src.layout.offset_of(column.component) else {
                continue;
            };
            unsafe {
                ptr::copy_nonoverlapping(
                    src.row_ptr(src_row).add(src_offset),
                    self.row_ptr(dst_row).add(column.offset),
                    column.size,
                );
            }
        }
        Ok(dst_row)
    }

    /// Swap-removes row `row` and returns the back reference of the row that
    /// moved into its place.
    ///
    /// ## Behavior
    /// - If `row` was not the last row, the last row's bytes and back
    ///   reference are copied over it; the returned slot is the moved row's
    ///   owner and the caller patches that entry's row index.
    /// - If `row` was the last row, the returned slot is the row's own back
    ///   reference and nothing moved.
    /// - In debug builds the vacated tail row is poisoned.
    ///
    /// No destructor runs; callers drop values first when deletion (rather
    /// than migration) is the intent.
    pub fn delete(&mut self, row: RowIndex) -> SlotIndex {
        let index = row as usize;
        debug_assert!(index < self.len);

        let last = self.len - 1;
        let moved = self.back_refs[last];
        if index != last {
            let stride = self.layout.stride();
            unsafe {
                ptr::copy_nonoverlapping(
                    self.row_ptr(last as RowIndex),
                    self.row_ptr(row),
                    stride,
                );
            }
        }
        self.back_refs.swap_remove(index);

        if cfg!(debug_assertions) {
            let stride = self.layout.stride();
            unsafe {
                self.buffer.fill(last * stride, stride, DEBUG_POISON);
            }
        }

        self.len -= 1;
        moved
    }

    /// Runs the destructor of every droppable column in `row`.
    ///
    /// The row's bytes stay in place and must not be read as live values
    /// afterwards; callers follow up with [`ArchetypeTable::delete`].
    pub(crate) fn drop_row_in_place(&mut self, row: RowIndex) {
        debug_assert!((row as usize) < self.len);
        for column in self.layout.columns() {
            if column.needs_drop {
                unsafe {
                    (column.drop_fn)(self.row_ptr(row).add(column.offset));
                }
            }
        }
    }

    /// Runs the destructor of one column in `row`, if it needs one.
    pub(crate) fn drop_component_in_place(&mut self, row: RowIndex, component_id: ComponentId) {
        debug_assert!((row as usize) < self.len);
        if let Some(column) = self.layout.column(component_id) {
            if column.needs_drop {
                unsafe {
                    (column.drop_fn)(self.row_ptr(row).add(column.offset));
                }
            }
        }
    }
}

impl Drop for ArchetypeTable {
    fn drop(&mut self) {
        if !self.layout.any_drop() {
            return;
        }
        for row in 0..self.len {
            for column in self.layout.columns() {
                if column.needs_drop {
                    unsafe {
                        (column.drop_fn)(self.row_ptr(row as RowIndex).add(column.offset));
                    }
                }
            }
        }
    }
}
