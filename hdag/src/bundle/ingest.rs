/*
 * Created on Tue Feb 25 2025
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

//! The load, sort, dedup and compact passes of the ingest pipeline.
//! Generation and component enumeration live in the sibling module.

use {
    super::{Bundle, Strictness},
    crate::{
        error::{Fault, HdagResult},
        node::{NodeMut, Outgoing, Targets},
        source::NodeSource,
    },
    core::cmp::Ordering,
    log::debug,
};

impl Bundle {
    fn append_node(&mut self, hash: &[u8], targets: Targets) -> u32 {
        let idx = self.nodes.len() as u32;
        NodeMut::new(self.nodes.append_uninit()).init(hash, targets);
        idx
    }
    /// Load every record of the source (the load pass). For each pulled node:
    /// no target stream -> one record with unknown targets; a target stream ->
    /// the parent record plus, per target hash, an entry in the target-hash
    /// array and a tombstone record (hash only, unknown targets) so that
    /// children without a record of their own resolve by hash later. The
    /// parent's targets become the indirect range over its target hashes, or
    /// absent for an empty stream.
    ///
    /// Post: nodes may contain duplicates by hash; every target pair is
    /// unknown, absent, or indirect into the target-hash array.
    pub fn load_node_seq(&mut self, src: &mut impl NodeSource) -> HdagResult<()> {
        assert!(self.is_empty(), "load into a non-empty bundle");
        assert!(
            src.hash_len() == self.hash_len() || src.hash_len() == 0,
            "source hash length mismatch"
        );
        let mut records = 0u64;
        let mut declared = 0u64;
        loop {
            let (parent, has_targets) = match src.next_node()? {
                Some(item) => (self.append_node(item.hash, Targets::UNKNOWN), item.has_targets),
                None => break,
            };
            if !has_targets {
                records += 1;
                continue;
            }
            let first = self.target_hashes.len() as u32;
            let mut pulled = 0u32;
            while let Some(target_hash) = src.next_target()? {
                self.target_hashes.append(target_hash);
                self.append_node(target_hash, Targets::UNKNOWN);
                pulled += 1;
            }
            let targets = if pulled == 0 {
                Targets::ABSENT
            } else {
                Targets::span(first, first + pulled - 1)
            };
            self.node_mut(parent).set_targets(targets);
            records += 1;
            declared += pulled as u64;
        }
        debug!("loaded {records} records ({declared} declared targets)");
        Ok(())
    }
    /// Sort the node array by hash ascending. Targets are not index-based at
    /// this stage, so reordering invalidates nothing. Idempotent
    pub fn sort(&mut self) {
        let n = self.nodes.len();
        self.nodes.sort_range(0, n, Self::node_hash_cmp);
    }
    /// Collapse runs of equal hash (default strictness); see
    /// [`Bundle::dedup_with`]
    pub fn dedup(&mut self) -> HdagResult<()> {
        self.dedup_with(Strictness::default())
    }
    /// Collapse runs of equal hash in the sorted node array. Within a run at
    /// most one record may be *known* (targets other than unknown); a second
    /// known record is a [`Fault::NodeConflict`]. The known record survives,
    /// else any of the unknown ones. One memmove-style compaction pass, O(n).
    /// Idempotent
    pub fn dedup_with(&mut self, strictness: Strictness) -> HdagResult<()> {
        let n = self.nodes.len();
        let mut write = 0;
        let mut run = 0;
        while run < n {
            let mut end = run + 1;
            while end < n
                && Self::node_hash_cmp(self.nodes.slot(run), self.nodes.slot(end))
                    == Ordering::Equal
            {
                end += 1;
            }
            if strictness.reject_node_duplicates && end - run > 1 {
                return Err(Fault::NodeDuplicate);
            }
            let mut known = None;
            for at in run..end {
                if !self.node(at as u32).targets().is_unknown() {
                    if known.is_some() {
                        return Err(Fault::NodeConflict);
                    }
                    known = Some(at);
                }
            }
            self.nodes.copy_slot(known.unwrap_or(run), write);
            write += 1;
            run = end;
        }
        self.nodes.truncate(write);
        Ok(())
    }
    /// Resolve and fold targets (default strictness); see
    /// [`Bundle::compact_with`]
    pub fn compact(&mut self) -> HdagResult<()> {
        self.compact_with(Strictness::default())
    }
    /// Resolve every unresolved target hash to a node index and fold the
    /// result in-node: outdegree 1 and 2 become direct words, outdegree >= 3
    /// spills into a contiguous extra-edge range. Per-node target lists are
    /// sorted and (tolerantly) deduplicated on the way; a repeat is a
    /// [`Fault::EdgeDuplicate`] under strictness. Pre: sorted + deduped.
    /// Post: the target-hash array is empty and its allocation released.
    /// Idempotent
    pub fn compact_with(&mut self, strictness: Strictness) -> HdagResult<()> {
        if self.target_hashes.is_empty() {
            // already compacted, or nothing was ever loaded
            return Ok(());
        }
        debug_assert!(self.extra_edges.is_empty());
        debug_assert!(self.is_sorted_and_deduped());
        let mut resolved: Vec<u32> = Vec::new();
        for at in 0..self.node_num() {
            let (first, last) = match self.node(at).targets().decode() {
                Outgoing::Indirect { first, last } => (first, last),
                Outgoing::Unknown | Outgoing::Absent => continue,
                Outgoing::OneDirect(_) | Outgoing::TwoDirect(..) => {
                    unreachable!("direct target before compaction")
                }
            };
            resolved.clear();
            for k in first..=last {
                match self.search(self.target_hashes.slot(k as usize)) {
                    Ok(idx) => resolved.push(idx),
                    // the loader tombstones every target hash; a miss means
                    // the node index itself is broken
                    Err(_) => unreachable!("target hash missing from node index"),
                }
            }
            resolved.sort_unstable();
            if strictness.reject_edge_duplicates && resolved.windows(2).any(|w| w[0] == w[1]) {
                // restore auxiliary-array exclusivity before bailing
                self.extra_edges.clear();
                return Err(Fault::EdgeDuplicate);
            }
            resolved.dedup();
            let folded = match resolved.as_slice() {
                [] => unreachable!("empty indirect range"),
                &[one] => Targets::one(one),
                &[a, b] => Targets::two(a, b),
                many => {
                    let spill = self.extra_edges.len() as u32;
                    for &target in many {
                        self.push_extra_edge(target);
                    }
                    Targets::span(spill, spill + many.len() as u32 - 1)
                }
            };
            self.node_mut(at).set_targets(folded);
        }
        self.target_hashes.clear();
        self.target_hashes.deflate();
        debug!(
            "compacted bundle: {} nodes, {} extra edges",
            self.node_num(),
            self.extra_edge_num()
        );
        Ok(())
    }
}
