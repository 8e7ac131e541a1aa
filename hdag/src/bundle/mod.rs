/*
 * Created on Sat Feb 22 2025
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

//! The in-memory mutable working set of a hash-addressed DAG.
//!
//! A bundle owns three arrays: the packed node records, the target hashes
//! (populated only between load and compaction, carrying unresolved
//! references), and the extra edges (populated only after compaction,
//! carrying the spilled target lists of outdegree >= 3 nodes). Exactly one
//! of the two auxiliary arrays is ever populated.
//!
//! The transformation pipeline lives in [`Bundle::ingest_node_seq`]: load ->
//! sort -> dedup -> compact -> generation enumeration (with cycle rejection) ->
//! component enumeration. Each pass is also exposed on its own; every pass
//! leaves the bundle structurally valid even when it fails.

mod enumerate;
mod ingest;
mod invert;

use {
    crate::{
        error::HdagResult,
        hash,
        mem::SlotArray,
        node::{self, Edges, NodeMut, NodeRef, Outgoing, Targets},
        source::NodeSource,
    },
    core::{cmp::Ordering, fmt},
    log::debug,
};

const NODES_PREALLOCATE: usize = 64;
const TARGET_HASHES_PREALLOCATE: usize = 64;
const EXTRA_EDGES_PREALLOCATE: usize = 16;

/// Ingest strictness. The default pipeline tolerates repeated node records
/// (as long as at most one of them carries targets) and repeated edges;
/// these switches turn either into a hard fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strictness {
    /// fault with [`crate::Fault::NodeDuplicate`] when any hash occurs twice
    pub reject_node_duplicates: bool,
    /// fault with [`crate::Fault::EdgeDuplicate`] when a node lists the same
    /// target twice
    pub reject_edge_duplicates: bool,
}

/// The mutable three-array working set. See the module docs for the
/// lifecycle; see [`crate::HdagFile`] for the serialized form.
pub struct Bundle {
    hash_len: u16,
    pub(crate) nodes: SlotArray,
    pub(crate) target_hashes: SlotArray,
    pub(crate) extra_edges: SlotArray,
}

impl Bundle {
    /// Create an empty bundle for hashes of the given length (nonzero,
    /// multiple of four)
    pub fn new(hash_len: u16) -> Self {
        assert!(hash::len_is_valid(hash_len), "invalid hash length");
        Self {
            hash_len,
            nodes: SlotArray::new(node::size(hash_len), NODES_PREALLOCATE),
            target_hashes: SlotArray::new(hash_len as usize, TARGET_HASHES_PREALLOCATE),
            extra_edges: SlotArray::new(sizeof!(u32), EXTRA_EDGES_PREALLOCATE),
        }
    }
    #[inline(always)]
    pub fn hash_len(&self) -> u16 {
        self.hash_len
    }
    #[inline(always)]
    pub fn node_num(&self) -> u32 {
        self.nodes.len() as u32
    }
    #[inline(always)]
    pub fn extra_edge_num(&self) -> u32 {
        self.extra_edges.len() as u32
    }
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    #[inline(always)]
    pub fn node(&self, idx: u32) -> NodeRef<'_> {
        NodeRef::new(self.nodes.slot(idx as usize))
    }
    #[inline(always)]
    pub(crate) fn node_mut(&mut self, idx: u32) -> NodeMut<'_> {
        NodeMut::new(self.nodes.slot_mut(idx as usize))
    }
    pub fn extra_edge(&self, idx: u32) -> u32 {
        u32::from_ne_bytes(self.extra_edges.slot(idx as usize).try_into().unwrap())
    }
    pub(crate) fn push_extra_edge(&mut self, node_idx: u32) -> u32 {
        self.extra_edges.append(&node_idx.to_ne_bytes()) as u32
    }
}

/*
    queries
*/

impl Bundle {
    pub fn targets(&self, idx: u32) -> Targets {
        self.node(idx).targets()
    }
    pub fn outdegree(&self, idx: u32) -> u32 {
        self.targets(idx).outdegree()
    }
    /// The `k`-th target node index of a node; `k < outdegree`
    pub fn target_node_idx(&self, idx: u32, k: u32) -> u32 {
        match self.targets(idx).decode() {
            Outgoing::OneDirect(t) => {
                assert!(k == 0, "target cursor out of range");
                t
            }
            Outgoing::TwoDirect(a, b) => {
                assert!(k < 2, "target cursor out of range");
                [a, b][k as usize]
            }
            Outgoing::Indirect { first, last } => {
                assert!(k <= last - first, "target cursor out of range");
                self.extra_edge(first + k)
            }
            Outgoing::Unknown | Outgoing::Absent => {
                panic!("target cursor out of range")
            }
        }
    }
    /// Walk the outgoing edges of a node. Requires a compacted bundle
    /// (indirect ranges resolve through the extra-edges array)
    pub fn outgoing(&self, idx: u32) -> Edges<'_> {
        Edges::new(self.targets(idx), self.extra_edges.as_bytes())
    }
    /// Binary-search the sorted node array for a hash
    pub fn find(&self, hash: &[u8]) -> Option<u32> {
        self.search(hash).ok()
    }
    pub(crate) fn search(&self, needle: &[u8]) -> Result<u32, u32> {
        debug_assert_eq!(needle.len(), self.hash_len as usize);
        self.nodes
            .binary_search_range(0, self.nodes.len(), |slot| {
                hash::cmp(&slot[node::NODE_HDR..], needle)
            })
            .map(|at| at as u32)
            .map_err(|at| at as u32)
    }
    pub(crate) fn node_hash_cmp(a: &[u8], b: &[u8]) -> Ordering {
        hash::cmp(&a[node::NODE_HDR..], &b[node::NODE_HDR..])
    }
}

/*
    state predicates
*/

impl Bundle {
    /// Structural validity: correct slot sizes and at most one populated
    /// auxiliary array. (Occupancy limits are enforced by the arrays.)
    pub fn is_valid(&self) -> bool {
        okay!(
            hash::len_is_valid(self.hash_len),
            self.nodes.slot_size() == node::size(self.hash_len),
            self.target_hashes.slot_size() == self.hash_len as usize,
            self.extra_edges.slot_size() == sizeof!(u32),
            self.target_hashes.is_empty() || self.extra_edges.is_empty(),
        )
    }
    /// Whether the node array is sorted by hash with no duplicates
    pub fn is_sorted_and_deduped(&self) -> bool {
        (1..self.nodes.len()).all(|i| {
            Self::node_hash_cmp(self.nodes.slot(i - 1), self.nodes.slot(i)) == Ordering::Less
        })
    }
    /// Whether all unresolved target hashes are gone (post-compaction)
    pub fn is_compacted(&self) -> bool {
        self.target_hashes.is_empty()
    }
    /// Whether every node carries a nonzero generation and component
    pub fn is_enumerated(&self) -> bool {
        (0..self.node_num()).all(|i| {
            let n = self.node(i);
            n.generation() > 0 && n.component() > 0
        })
    }
}

/*
    lifecycle
*/

impl Bundle {
    /// Drop all contents, keeping allocations for reuse
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.target_hashes.clear();
        self.extra_edges.clear();
    }
    /// Shrink every allocation to its occupancy
    pub fn deflate(&mut self) {
        self.nodes.deflate();
        self.target_hashes.deflate();
        self.extra_edges.deflate();
    }
    /// Run the full ingest pipeline with default (tolerant) strictness.
    /// See [`Bundle::ingest_node_seq_with`]
    pub fn ingest_node_seq(&mut self, src: &mut impl NodeSource) -> HdagResult<()> {
        self.ingest_node_seq_with(src, Strictness::default())
    }
    /// Run the full ingest pipeline: load the source, sort, dedup, compact,
    /// enumerate generations (rejecting cycles) and components.
    ///
    /// The bundle must be empty. On success it is organized, compacted and
    /// fully enumerated, and the target-hash allocation has been released.
    /// On failure it remains structurally valid -- possibly partially
    /// loaded -- and owns all of its memory, so dropping (or [`Bundle::clear`])
    /// releases everything.
    pub fn ingest_node_seq_with(
        &mut self,
        src: &mut impl NodeSource,
        strictness: Strictness,
    ) -> HdagResult<()> {
        assert!(self.is_empty(), "ingest into a non-empty bundle");
        self.load_node_seq(src)?;
        self.sort();
        self.dedup_with(strictness)?;
        self.compact_with(strictness)?;
        self.enumerate_generations()?;
        self.enumerate_components();
        self.deflate();
        debug!(
            "ingested bundle: {} nodes, {} extra edges",
            self.node_num(),
            self.extra_edge_num()
        );
        Ok(())
    }
}

impl PartialEq for Bundle {
    fn eq(&self, other: &Self) -> bool {
        okay!(
            self.hash_len == other.hash_len,
            self.nodes == other.nodes,
            self.target_hashes == other.target_hashes,
            self.extra_edges == other.extra_edges,
        )
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("hash_len", &self.hash_len)
            .field("node_num", &self.node_num())
            .field("target_hash_num", &self.target_hashes.len())
            .field("extra_edge_num", &self.extra_edge_num())
            .finish()
    }
}
