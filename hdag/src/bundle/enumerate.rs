/*
 * Created on Sat Mar 01 2025
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

//! Generation and component enumeration over a compacted bundle.

use {
    super::Bundle,
    crate::error::{Fault, HdagResult},
};

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Color {
    White,
    Gray,
    Black,
}

impl Bundle {
    /// Assign every node its generation: 1 for sinks, else one more than
    /// the largest generation among its targets (the longest-path distance
    /// from a sink). Iterative three-color DFS from every node in index
    /// order; a gray->gray edge proves a cycle and faults with
    /// [`Fault::GraphCycle`]. O(V + E); the frame stack lives on the heap,
    /// so input shape cannot exhaust the native stack.
    ///
    /// Unknown stubs have no recorded targets and enumerate as sinks.
    pub fn enumerate_generations(&mut self) -> HdagResult<()> {
        debug_assert!(self.is_compacted());
        let n = self.node_num();
        for at in 0..n {
            self.node_mut(at).set_generation(0);
        }
        let mut color = vec![Color::White; n as usize];
        // (node, next child cursor) frames
        let mut stack: Vec<(u32, u32)> = Vec::new();
        for root in 0..n {
            if color[root as usize] != Color::White {
                continue;
            }
            color[root as usize] = Color::Gray;
            stack.push((root, 0));
            while let Some(&(at, cursor)) = stack.last() {
                let outdegree = self.outdegree(at);
                if cursor < outdegree {
                    stack.last_mut().unwrap().1 += 1;
                    let child = self.target_node_idx(at, cursor);
                    match color[child as usize] {
                        Color::White => {
                            color[child as usize] = Color::Gray;
                            stack.push((child, 0));
                        }
                        Color::Gray => return Err(Fault::GraphCycle),
                        Color::Black => {}
                    }
                } else {
                    // every child is black, so every child generation is
                    // settled
                    let mut deepest = 0;
                    for k in 0..outdegree {
                        deepest = deepest.max(self.node(self.target_node_idx(at, k)).generation());
                    }
                    self.node_mut(at).set_generation(deepest + 1);
                    color[at as usize] = Color::Black;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
    /// Assign every node its weakly-connected component, numbered from 1
    /// upward in order of first-encountered node index. Union-find with
    /// path halving over the undirected projection of the edge set
    pub fn enumerate_components(&mut self) {
        debug_assert!(self.is_compacted());
        let n = self.node_num();
        let mut parent: Vec<u32> = (0..n).collect();
        fn find(parent: &mut [u32], mut x: u32) -> u32 {
            while parent[x as usize] != x {
                let grand = parent[parent[x as usize] as usize];
                parent[x as usize] = grand;
                x = grand;
            }
            x
        }
        for at in 0..n {
            for k in 0..self.outdegree(at) {
                let child = self.target_node_idx(at, k);
                let (a, b) = (find(&mut parent, at), find(&mut parent, child));
                if a != b {
                    parent[b as usize] = a;
                }
            }
        }
        let mut ids = vec![0u32; n as usize];
        let mut next = 1u32;
        for at in 0..n {
            let root = find(&mut parent, at) as usize;
            if ids[root] == 0 {
                ids[root] = next;
                next += 1;
            }
            self.node_mut(at).set_component(ids[root]);
        }
    }
}
