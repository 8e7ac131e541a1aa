/*
 * Created on Mon Feb 10 2025
 *
 * This file is a part of hdag
 * hdag is a free and open-source hash-addressed DAG store that turns raw
 * adjacency streams into compact, queryable, memory-mapped graph bundles
 * without compromising on correctness or performance.
 *
 * Copyright (c) 2025, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use {
    super::unsafe_apis,
    core::{
        cmp::Ordering,
        fmt,
        ptr::{self, NonNull},
        slice,
    },
};

/// Maximum occupancy of any slot array. Occupied counts must stay
/// representable in the 31-bit direct/indirect target index regions
pub const SLOTS_MAX: usize = (1 << 31) - 1;

/// Spans at or below this length are insertion-sorted
const SORT_INSERTION_MAX: usize = 12;

/// An untyped growable buffer of fixed-size slots
///
/// The slot size is a *runtime* value: node records are `16 + hash_len`
/// bytes and hashes are `hash_len` bytes, neither of which a compile-time
/// element type can express. A `slot_size` of zero denotes the void array:
/// it never allocates and rejects non-empty growth.
///
/// Growth is on demand, doubling from `slots_preallocate` until the
/// requested occupancy is covered. Allocation is lazy; a fresh array owns
/// no memory until the first append.
pub struct SlotArray {
    p: NonNull<u8>,
    slot_size: usize,
    slots_allocated: usize,
    slots_occupied: usize,
    slots_preallocate: usize,
}

unsafe impl Send for SlotArray {}
unsafe impl Sync for SlotArray {}

impl SlotArray {
    pub const fn new(slot_size: usize, slots_preallocate: usize) -> Self {
        Self {
            p: NonNull::dangling(),
            slot_size,
            slots_allocated: 0,
            slots_occupied: 0,
            slots_preallocate,
        }
    }
    #[inline(always)]
    pub const fn is_void(&self) -> bool {
        self.slot_size == 0
    }
    #[inline(always)]
    pub const fn slot_size(&self) -> usize {
        self.slot_size
    }
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.slots_occupied
    }
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.slots_occupied == 0
    }
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        self.slots_allocated
    }
    /// The occupied region as one contiguous byte run
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            // UNSAFE(@ohsayan): ptr and byte length are tracked exactly by
            // the append/truncate impls
            slice::from_raw_parts(self.p.as_ptr(), self.byte_len())
        }
    }
    #[inline(always)]
    const fn byte_len(&self) -> usize {
        self.slot_size * self.slots_occupied
    }
}

impl SlotArray {
    #[inline(always)]
    fn slot_ptr(&self, idx: usize) -> *const u8 {
        unsafe {
            // UNSAFE(@ohsayan): callers stay within the allocated region
            self.p.as_ptr().add(idx * self.slot_size)
        }
    }
    #[inline(always)]
    fn slot_ptr_mut(&mut self, idx: usize) -> *mut u8 {
        unsafe {
            // UNSAFE(@ohsayan): callers stay within the allocated region
            self.p.as_ptr().add(idx * self.slot_size)
        }
    }
    /// Ensure capacity for `new_occupied` slots. Allocation doubles from
    /// `slots_preallocate` until it covers the request
    fn grow(&mut self, new_occupied: usize) {
        assert!(new_occupied <= SLOTS_MAX, "slot array is full");
        if new_occupied <= self.slots_allocated {
            return;
        }
        assert!(!self.is_void(), "void arrays cannot hold slots");
        let mut target = if self.slots_allocated == 0 {
            self.slots_preallocate.max(1)
        } else {
            self.slots_allocated
        };
        while target < new_occupied {
            target *= 2;
        }
        unsafe {
            // UNSAFE(@ohsayan): sizes are tracked exactly; the old block is
            // never touched again after realloc
            let p = unsafe_apis::realloc_bytes(
                self.p.as_ptr(),
                self.slots_allocated * self.slot_size,
                target * self.slot_size,
            );
            self.p = NonNull::new_unchecked(p);
        }
        self.slots_allocated = target;
    }
    /// Append a copy of the given slot, returning its index
    pub fn append(&mut self, slot: &[u8]) -> usize {
        assert_eq!(slot.len(), self.slot_size, "bad slot size");
        let idx = self.slots_occupied;
        self.grow(idx + 1);
        unsafe {
            // UNSAFE(@ohsayan): grow made room for exactly one more slot
            ptr::copy_nonoverlapping(slot.as_ptr(), self.slot_ptr_mut(idx), self.slot_size);
        }
        self.slots_occupied += 1;
        idx
    }
    /// Append an uninitialized slot and hand it to the caller to fill. The
    /// slot contents are unspecified until every byte is written
    pub fn append_uninit(&mut self) -> &mut [u8] {
        let idx = self.slots_occupied;
        self.grow(idx + 1);
        self.slots_occupied += 1;
        unsafe {
            // UNSAFE(@ohsayan): freshly grown, in-bounds slot
            slice::from_raw_parts_mut(self.slot_ptr_mut(idx), self.slot_size)
        }
    }
    /// Append an all-zero slot, returning its index
    pub fn append_zeroed(&mut self) -> usize {
        let idx = self.slots_occupied;
        self.append_uninit().fill(0);
        idx
    }
    /// Append a whole block of slots (length must be a slot-size multiple)
    pub fn extend_raw(&mut self, block: &[u8]) {
        if block.is_empty() {
            return;
        }
        assert!(!self.is_void(), "void arrays cannot hold slots");
        assert_eq!(block.len() % self.slot_size, 0, "bad block size");
        let extra = block.len() / self.slot_size;
        let idx = self.slots_occupied;
        self.grow(idx + extra);
        unsafe {
            // UNSAFE(@ohsayan): grow made room for `extra` more slots
            ptr::copy_nonoverlapping(block.as_ptr(), self.slot_ptr_mut(idx), block.len());
        }
        self.slots_occupied += extra;
    }
    pub fn slot(&self, idx: usize) -> &[u8] {
        assert!(idx < self.slots_occupied, "slot index out of range");
        unsafe {
            // UNSAFE(@ohsayan): verified occupied slot
            slice::from_raw_parts(self.slot_ptr(idx), self.slot_size)
        }
    }
    pub fn slot_mut(&mut self, idx: usize) -> &mut [u8] {
        assert!(idx < self.slots_occupied, "slot index out of range");
        unsafe {
            // UNSAFE(@ohsayan): verified occupied slot
            slice::from_raw_parts_mut(self.slot_ptr_mut(idx), self.slot_size)
        }
    }
    /// Overwrite slot `to` with the contents of slot `from`
    pub fn copy_slot(&mut self, from: usize, to: usize) {
        assert!(from < self.slots_occupied && to < self.slots_occupied);
        if from == to {
            return;
        }
        unsafe {
            // UNSAFE(@ohsayan): distinct occupied slots never overlap
            ptr::copy_nonoverlapping(self.slot_ptr(from), self.slot_ptr_mut(to), self.slot_size);
        }
    }
    /// Exchange the contents of two slots
    pub fn swap_slots(&mut self, a: usize, b: usize) {
        assert!(a < self.slots_occupied && b < self.slots_occupied);
        if a == b {
            return;
        }
        unsafe {
            // UNSAFE(@ohsayan): distinct occupied slots never overlap
            ptr::swap_nonoverlapping(self.slot_ptr_mut(a), self.slot_ptr_mut(b), self.slot_size);
        }
    }
    /// Remove `count` slots starting at `start`, closing the gap with a
    /// single memmove
    pub fn remove_span(&mut self, start: usize, count: usize) {
        assert!(start + count <= self.slots_occupied, "span out of range");
        if count == 0 {
            return;
        }
        let tail = self.slots_occupied - start - count;
        unsafe {
            // UNSAFE(@ohsayan): source and destination are in-bounds; copy
            // handles the overlap
            ptr::copy(
                self.slot_ptr(start + count),
                self.slot_ptr_mut(start),
                tail * self.slot_size,
            );
        }
        self.slots_occupied -= count;
    }
    pub fn truncate(&mut self, slots_occupied: usize) {
        assert!(slots_occupied <= self.slots_occupied);
        self.slots_occupied = slots_occupied;
    }
    /// Drop all slots, keeping the allocation
    pub fn clear(&mut self) {
        self.slots_occupied = 0;
    }
    /// Shrink the allocation to the exact occupancy (freeing it entirely at
    /// zero occupancy)
    pub fn deflate(&mut self) {
        if self.slots_allocated == self.slots_occupied {
            return;
        }
        unsafe {
            // UNSAFE(@ohsayan): shrinking realloc; occupied prefix is
            // preserved
            let p = unsafe_apis::realloc_bytes(
                self.p.as_ptr(),
                self.slots_allocated * self.slot_size,
                self.slots_occupied * self.slot_size,
            );
            self.p = NonNull::new_unchecked(p);
        }
        self.slots_allocated = self.slots_occupied;
    }
}

impl SlotArray {
    /// Sort the half-open slot range `[from, to)` in place with a 3-way
    /// comparator. Insertion sort below a fixed threshold, explicit-stack
    /// 3-way quicksort above it: duplicate-heavy inputs stay O(n log n) and
    /// no input can exhaust the native stack
    pub fn sort_range<F>(&mut self, from: usize, to: usize, mut cmp: F)
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        assert!(from <= to && to <= self.slots_occupied, "range out of bounds");
        if to - from < 2 {
            return;
        }
        let mut pivot = vec![0u8; self.slot_size];
        let mut spans = vec![(from, to)];
        while let Some((lo, hi)) = spans.pop() {
            if hi - lo <= SORT_INSERTION_MAX {
                self.insertion_sort(lo, hi, &mut cmp, &mut pivot);
                continue;
            }
            let (lt, gt) = self.partition3(lo, hi, &mut cmp, &mut pivot);
            if lt - lo > 1 {
                spans.push((lo, lt));
            }
            if hi - gt > 1 {
                spans.push((gt, hi));
            }
        }
    }
    fn insertion_sort<F>(&mut self, lo: usize, hi: usize, cmp: &mut F, hold: &mut [u8])
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        for i in (lo + 1)..hi {
            hold.copy_from_slice(self.slot(i));
            let mut j = i;
            while j > lo && cmp(self.slot(j - 1), hold) == Ordering::Greater {
                self.copy_slot(j - 1, j);
                j -= 1;
            }
            if j != i {
                self.slot_mut(j).copy_from_slice(hold);
            }
        }
    }
    /// Dutch-flag partition of `[lo, hi)` around a median-of-three pivot.
    /// Returns `(lt, gt)` such that `[lo, lt)` sorts below the pivot,
    /// `[lt, gt)` equals it and `[gt, hi)` sorts above it
    fn partition3<F>(&mut self, lo: usize, hi: usize, cmp: &mut F, pivot: &mut [u8]) -> (usize, usize)
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        let mid = lo + (hi - lo) / 2;
        let last = hi - 1;
        if cmp(self.slot(mid), self.slot(lo)) == Ordering::Less {
            self.swap_slots(mid, lo);
        }
        if cmp(self.slot(last), self.slot(lo)) == Ordering::Less {
            self.swap_slots(last, lo);
        }
        if cmp(self.slot(last), self.slot(mid)) == Ordering::Less {
            self.swap_slots(last, mid);
        }
        pivot.copy_from_slice(self.slot(mid));
        let (mut lt, mut i, mut gt) = (lo, lo, hi);
        while i < gt {
            match cmp(self.slot(i), pivot) {
                Ordering::Less => {
                    self.swap_slots(lt, i);
                    lt += 1;
                    i += 1;
                }
                Ordering::Greater => {
                    gt -= 1;
                    self.swap_slots(i, gt);
                }
                Ordering::Equal => i += 1,
            }
        }
        (lt, gt)
    }
    /// Binary search of the sorted half-open range `[from, to)`. `probe`
    /// returns the ordering of the probed slot relative to the needle.
    /// `Ok(index)` on a hit, `Err(insertion_index)` on a miss
    pub fn binary_search_range<F>(&self, from: usize, to: usize, mut probe: F) -> Result<usize, usize>
    where
        F: FnMut(&[u8]) -> Ordering,
    {
        assert!(from <= to && to <= self.slots_occupied, "range out of bounds");
        let (mut lo, mut hi) = (from, to);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match probe(self.slot(mid)) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }
}

impl Drop for SlotArray {
    fn drop(&mut self) {
        unsafe {
            // UNSAFE(@ohsayan): dealloc of the tracked allocation
            unsafe_apis::dealloc_bytes(self.p.as_ptr(), self.slots_allocated * self.slot_size);
        }
    }
}

impl PartialEq for SlotArray {
    fn eq(&self, other: &Self) -> bool {
        self.slot_size == other.slot_size && self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for SlotArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotArray")
            .field("slot_size", &self.slot_size)
            .field("slots_occupied", &self.slots_occupied)
            .field("slots_allocated", &self.slots_allocated)
            .finish()
    }
}
