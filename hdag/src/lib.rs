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

//! # hdag
//!
//! Storage and manipulation of hash-addressed directed acyclic graphs:
//! graphs whose nodes are identified by fixed-length opaque hashes and whose
//! edges connect parent hashes to target hashes.
//!
//! The crate provides:
//! - [`Bundle`]: the in-memory mutable working set. [`Bundle::ingest_node_seq`]
//!   takes a possibly ugly stream of `(hash, targets…)` records and produces a
//!   sorted, deduplicated, cycle-checked, generation- and component-enumerated,
//!   index-compacted graph
//! - [`HdagFile`]: the dense single-file encoding of an organized bundle,
//!   memory-mapped for O(log n) hash lookup and O(1) edge traversal
//! - [`NodeSource`]: the pull interface through which ingest consumes records
//!
//! Files are host-order and deliberately not portable across architectures;
//! the header carries a version field for any future change of heart. One
//! logical owner per bundle or file: nothing here locks, nothing here blocks.

#![deny(unused_imports, unused_must_use)]

#[macro_use]
mod macros;
pub mod bundle;
pub mod error;
pub mod file;
pub mod hash;
pub mod mem;
pub mod node;
pub mod source;

pub use {
    bundle::{Bundle, Strictness},
    error::{Fault, FaultKind, HdagResult},
    file::HdagFile,
    node::{Edges, NodeRef, Outgoing, Target, Targets},
    source::{MemSource, NodeItem, NodeSource, VoidSource},
};
