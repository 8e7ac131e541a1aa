/*
 * Created on Sun Mar 09 2025
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
    super::Bundle,
    crate::{error::HdagResult, node::Targets},
};

impl Bundle {
    /// Derive a bundle with the same node set and every edge reversed.
    ///
    /// Requires an organized, compacted bundle with no unknown stubs
    /// (unknown-ness of outgoing targets has no reversed encoding). The
    /// hash set is unchanged, so node indices carry over verbatim. The
    /// result is freshly enumerated: components are invariant under edge
    /// reversal, generations are recomputed against the reversed edges.
    /// Double inversion is therefore an identity on fully enumerated
    /// bundles.
    pub fn invert(&self) -> HdagResult<Bundle> {
        assert!(self.is_compacted(), "invert requires a compacted bundle");
        debug_assert!(self.is_sorted_and_deduped());
        let n = self.node_num();
        // pass 1: indegrees (which become the outdegrees of the result)
        let mut indegree = vec![0u32; n as usize];
        for at in 0..n {
            assert!(
                !self.targets(at).is_unknown(),
                "invert requires fully known targets"
            );
            for child in self.outgoing(at) {
                indegree[child as usize] += 1;
            }
        }
        // reversed extra-edge ranges, laid out in node order exactly like
        // the compact pass lays them out
        let mut spill_at = vec![0u32; n as usize];
        let mut spilled = 0u32;
        for at in 0..n as usize {
            if indegree[at] > 2 {
                spill_at[at] = spilled;
                spilled += indegree[at];
            }
        }
        let mut out = Bundle::new(self.hash_len());
        out.nodes.extend_raw(self.nodes.as_bytes());
        for _ in 0..spilled {
            out.extra_edges.append_zeroed();
        }
        // pass 2: scatter reversed edges. Sources are visited in ascending
        // index order, so every per-node list comes out sorted
        let mut taken = vec![0u32; n as usize];
        let mut pair = vec![[0u32; 2]; n as usize];
        for at in 0..n {
            for child in self.outgoing(at) {
                let child = child as usize;
                let k = taken[child];
                taken[child] = k + 1;
                if indegree[child] > 2 {
                    out.extra_edges
                        .slot_mut((spill_at[child] + k) as usize)
                        .copy_from_slice(&at.to_ne_bytes());
                } else {
                    pair[child][k as usize] = at;
                }
            }
        }
        // pass 3: fold the reversed lists into target words
        for at in 0..n as usize {
            let targets = match indegree[at] {
                0 => Targets::ABSENT,
                1 => Targets::one(pair[at][0]),
                2 => Targets::two(pair[at][0], pair[at][1]),
                many => Targets::span(spill_at[at], spill_at[at] + many - 1),
            };
            out.node_mut(at as u32).set_targets(targets);
        }
        out.enumerate_generations()?;
        out.enumerate_components();
        out.deflate();
        Ok(out)
    }
}
