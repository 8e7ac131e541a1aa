/*
 * Created on Wed Feb 12 2025
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
    super::SlotArray,
    rand::{rngs::StdRng, Rng, SeedableRng},
};

fn u32_array(values: &[u32]) -> SlotArray {
    let mut a = SlotArray::new(sizeof!(u32), 4);
    for v in values {
        a.append(&v.to_ne_bytes());
    }
    a
}

fn u32_at(a: &SlotArray, idx: usize) -> u32 {
    u32::from_ne_bytes(a.slot(idx).try_into().unwrap())
}

#[test]
fn empty() {
    let a = SlotArray::new(8, 16);
    assert_eq!(a.len(), 0);
    assert_eq!(a.capacity(), 0);
    assert!(a.is_empty());
    assert!(a.as_bytes().is_empty());
}

#[test]
fn append_and_get() {
    let mut a = u32_array(&[10, 20, 30]);
    assert_eq!(a.len(), 3);
    assert_eq!(u32_at(&a, 0), 10);
    assert_eq!(u32_at(&a, 2), 30);
    a.slot_mut(1).copy_from_slice(&99u32.to_ne_bytes());
    assert_eq!(u32_at(&a, 1), 99);
}

#[test]
fn growth_doubles_from_preallocate() {
    let mut a = SlotArray::new(1, 4);
    a.append(&[0]);
    assert_eq!(a.capacity(), 4);
    for i in 1..5u8 {
        a.append(&[i]);
    }
    assert_eq!(a.capacity(), 8);
    assert_eq!(a.as_bytes(), &[0, 1, 2, 3, 4]);
}

#[test]
fn append_zeroed_and_uninit() {
    let mut a = SlotArray::new(4, 2);
    let z = a.append_zeroed();
    assert_eq!(a.slot(z), &[0; 4]);
    a.append_uninit().copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(a.slot(1), &[1, 2, 3, 4]);
}

#[test]
fn extend_raw_block() {
    let mut a = u32_array(&[1]);
    let b = u32_array(&[2, 3]);
    a.extend_raw(b.as_bytes());
    assert_eq!(a.len(), 3);
    assert_eq!(u32_at(&a, 2), 3);
}

#[test]
fn remove_span_middle() {
    let mut a = u32_array(&[1, 2, 3, 4, 5]);
    a.remove_span(1, 3);
    assert_eq!(a.len(), 2);
    assert_eq!(u32_at(&a, 0), 1);
    assert_eq!(u32_at(&a, 1), 5);
}

#[test]
fn remove_span_noop_and_tail() {
    let mut a = u32_array(&[1, 2, 3]);
    a.remove_span(1, 0);
    assert_eq!(a.len(), 3);
    a.remove_span(1, 2);
    assert_eq!(a.len(), 1);
    assert_eq!(u32_at(&a, 0), 1);
}

#[test]
fn clear_keeps_allocation_deflate_frees_it() {
    let mut a = u32_array(&[1, 2, 3, 4, 5]);
    let cap = a.capacity();
    a.clear();
    assert_eq!(a.len(), 0);
    assert_eq!(a.capacity(), cap);
    a.deflate();
    assert_eq!(a.capacity(), 0);
}

#[test]
fn deflate_to_occupancy() {
    let mut a = u32_array(&[1, 2, 3]);
    assert!(a.capacity() > 3);
    a.deflate();
    assert_eq!(a.capacity(), 3);
    assert_eq!(u32_at(&a, 2), 3);
}

#[test]
fn void_array_allocates_nothing() {
    let a = SlotArray::new(0, 64);
    assert!(a.is_void());
    assert_eq!(a.len(), 0);
    assert!(a.as_bytes().is_empty());
}

#[test]
#[should_panic(expected = "void arrays cannot hold slots")]
fn void_array_rejects_growth() {
    let mut a = SlotArray::new(0, 64);
    a.append(&[]);
}

#[test]
fn swap_and_copy_slots() {
    let mut a = u32_array(&[7, 8]);
    a.swap_slots(0, 1);
    assert_eq!((u32_at(&a, 0), u32_at(&a, 1)), (8, 7));
    a.copy_slot(0, 1);
    assert_eq!((u32_at(&a, 0), u32_at(&a, 1)), (8, 8));
    // self-copy and self-swap are no-ops
    a.copy_slot(0, 0);
    a.swap_slots(1, 1);
    assert_eq!((u32_at(&a, 0), u32_at(&a, 1)), (8, 8));
}

#[test]
fn sort_small_and_reverse() {
    let mut a = SlotArray::new(4, 4);
    for v in [5u32, 1, 4, 2, 3] {
        a.append(&v.to_be_bytes());
    }
    let n = a.len();
    a.sort_range(0, n, |x, y| x.cmp(y));
    for (i, v) in [1u32, 2, 3, 4, 5].iter().enumerate() {
        assert_eq!(a.slot(i), v.to_be_bytes());
    }
}

#[test]
fn sort_large_random_with_duplicates() {
    let mut rng = StdRng::seed_from_u64(0xda6);
    let mut values: Vec<[u8; 4]> = (0..1000)
        .map(|_| {
            let v: u32 = rng.gen_range(0..64);
            v.to_be_bytes()
        })
        .collect();
    let mut a = SlotArray::new(4, 8);
    for v in &values {
        a.append(v);
    }
    let n = a.len();
    a.sort_range(0, n, |x, y| x.cmp(y));
    values.sort();
    for (i, v) in values.iter().enumerate() {
        assert_eq!(a.slot(i), v);
    }
}

#[test]
fn sort_subrange_leaves_rest_alone() {
    let mut a = SlotArray::new(1, 8);
    for b in [9u8, 3, 2, 1, 9] {
        a.append(&[b]);
    }
    a.sort_range(1, 4, |x, y| x.cmp(y));
    assert_eq!(a.as_bytes(), &[9, 1, 2, 3, 9]);
}

#[test]
fn binary_search_hits_and_misses() {
    let mut a = SlotArray::new(1, 8);
    for b in [10u8, 20, 30, 40] {
        a.append(&[b]);
    }
    assert_eq!(a.binary_search_range(0, 4, |s| s[0].cmp(&30)), Ok(2));
    assert_eq!(a.binary_search_range(0, 4, |s| s[0].cmp(&15)), Err(1));
    assert_eq!(a.binary_search_range(0, 4, |s| s[0].cmp(&5)), Err(0));
    assert_eq!(a.binary_search_range(0, 4, |s| s[0].cmp(&99)), Err(4));
    // window search
    assert_eq!(a.binary_search_range(1, 3, |s| s[0].cmp(&40)), Err(3));
}

#[test]
fn eq_compares_size_and_contents() {
    let a = u32_array(&[1, 2]);
    let b = u32_array(&[1, 2]);
    let c = u32_array(&[2, 1]);
    assert_eq!(a, b);
    assert_ne!(a, c);
    let d = SlotArray::new(2, 4);
    let e = SlotArray::new(4, 4);
    assert_ne!(d, e);
}
