/*
 * Created on Sat Feb 08 2025
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

/*!
    # Unsafe APIs

    This module provides abstractions (unsafe, still) over the global
    allocator for raw byte buffers. Zero-sized requests never reach the
    allocator; a dangling aligned pointer is returned instead.

*/

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

#[inline(always)]
unsafe fn byte_layout(size: usize) -> Layout {
    Layout::array::<u8>(size).unwrap_unchecked()
}

/// Allocate a byte block of the given size. Panics if the allocator returns
/// an error
#[inline(always)]
pub unsafe fn alloc_bytes(size: usize) -> *mut u8 {
    if size == 0 {
        return NonNull::dangling().as_ptr();
    }
    let ptr = alloc::alloc(byte_layout(size));
    assert!(!ptr.is_null(), "malloc failed");
    ptr
}

/// Grow or shrink a byte block previously obtained from [`alloc_bytes`] or
/// [`realloc_bytes`]. The old block must not be used again. A zero
/// `new_size` frees the block and returns a dangling pointer
#[inline(always)]
pub unsafe fn realloc_bytes(ptr: *mut u8, old_size: usize, new_size: usize) -> *mut u8 {
    if old_size == 0 {
        return self::alloc_bytes(new_size);
    }
    if new_size == 0 {
        self::dealloc_bytes(ptr, old_size);
        return NonNull::dangling().as_ptr();
    }
    let ptr = alloc::realloc(ptr, byte_layout(old_size), new_size);
    assert!(!ptr.is_null(), "realloc failed");
    ptr
}

/// Deallocate a byte block. This function will ensure that only nonzero
/// blocks reach the allocator
#[inline(always)]
pub unsafe fn dealloc_bytes(ptr: *mut u8, size: usize) {
    if size != 0 {
        alloc::dealloc(ptr, byte_layout(size))
    }
}

/// Copy exactly `N` bytes from `src` into a new array of size `N`
#[inline(always)]
pub unsafe fn memcpy<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut dst = [0u8; N];
    src.as_ptr().copy_to_nonoverlapping(dst.as_mut_ptr(), N);
    dst
}
