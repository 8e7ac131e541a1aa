/*
 * Created on Tue Feb 18 2025
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

//! The pull interface through which ingest consumes adjacency records.
//!
//! A source is a hand-rolled nested iterator so that ingestion can stream:
//! the whole input never needs to be materialized. Each pull has three
//! distinguishable outcomes: an item (`Ok(Some)`), the end (`Ok(None)`),
//! or a failure (`Err`).

use crate::error::HdagResult;

/// One node record pulled from a source
pub struct NodeItem<'a> {
    /// the node hash, valid until the next call on the same source
    pub hash: &'a [u8],
    /// whether a target stream follows. A node without one has *unknown*
    /// targets, which is different from a node with an empty stream
    /// (outdegree zero)
    pub has_targets: bool,
}

/// A pull-based producer of `(hash, target-hash…)` records
///
/// Contract:
/// - `hash_len` is fixed for the lifetime of the source
/// - borrowed hashes are valid only until the next call on the same source
/// - [`NodeSource::next_target`] may only be called after a
///   [`NodeSource::next_node`] that returned an item with `has_targets`,
///   and must be drained (until `Ok(None)`) before the next `next_node`
/// - target hashes need not be sorted or deduplicated; ingest handles both
/// - sources are single-pass unless they explicitly declare otherwise
pub trait NodeSource {
    fn hash_len(&self) -> u16;
    fn next_node(&mut self) -> HdagResult<Option<NodeItem<'_>>>;
    fn next_target(&mut self) -> HdagResult<Option<&[u8]>>;
}

/// The void source: declares `hash_len == 0` and yields no nodes
pub struct VoidSource;

impl NodeSource for VoidSource {
    fn hash_len(&self) -> u16 {
        0
    }
    fn next_node(&mut self) -> HdagResult<Option<NodeItem<'_>>> {
        Ok(None)
    }
    fn next_target(&mut self) -> HdagResult<Option<&[u8]>> {
        Ok(None)
    }
}

/*
    in-memory source
*/

struct MemRecord {
    hash: Vec<u8>,
    /// `None` means "no target stream": the node's targets stay unknown
    targets: Option<Vec<Vec<u8>>>,
}

/// An owned in-memory source for programmatic graph construction (and the
/// workhorse of the test suite). Unlike generic sources this one is
/// rewindable.
pub struct MemSource {
    hash_len: u16,
    records: Vec<MemRecord>,
    /// number of records already handed out
    node_cursor: usize,
    target_cursor: usize,
}

impl MemSource {
    pub fn new(hash_len: u16) -> Self {
        assert!(crate::hash::len_is_valid(hash_len), "invalid hash length");
        Self {
            hash_len,
            records: Vec::new(),
            node_cursor: 0,
            target_cursor: 0,
        }
    }
    /// Append one record. `targets: None` declares the node without target
    /// information; `Some(vec![])` declares outdegree zero
    pub fn push(&mut self, hash: Vec<u8>, targets: Option<Vec<Vec<u8>>>) -> &mut Self {
        assert_eq!(hash.len(), self.hash_len as usize, "bad hash length");
        if let Some(targets) = &targets {
            for t in targets {
                assert_eq!(t.len(), self.hash_len as usize, "bad target hash length");
            }
        }
        self.records.push(MemRecord { hash, targets });
        self
    }
    pub fn with_records<I>(hash_len: u16, records: I) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, Option<Vec<Vec<u8>>>)>,
    {
        let mut me = Self::new(hash_len);
        for (hash, targets) in records {
            me.push(hash, targets);
        }
        me
    }
    /// Reset to the first record (explicit multi-pass capability)
    pub fn rewind(&mut self) {
        self.node_cursor = 0;
        self.target_cursor = 0;
    }
}

impl NodeSource for MemSource {
    fn hash_len(&self) -> u16 {
        self.hash_len
    }
    fn next_node(&mut self) -> HdagResult<Option<NodeItem<'_>>> {
        if self.node_cursor == self.records.len() {
            return Ok(None);
        }
        self.node_cursor += 1;
        self.target_cursor = 0;
        let rec = &self.records[self.node_cursor - 1];
        Ok(Some(NodeItem {
            hash: &rec.hash,
            has_targets: rec.targets.is_some(),
        }))
    }
    fn next_target(&mut self) -> HdagResult<Option<&[u8]>> {
        assert!(self.node_cursor > 0, "next_target before next_node");
        let targets = self.records[self.node_cursor - 1]
            .targets
            .as_ref()
            .expect("next_target on a node without a target stream");
        if self.target_cursor == targets.len() {
            return Ok(None);
        }
        self.target_cursor += 1;
        Ok(Some(&targets[self.target_cursor - 1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_source_is_empty() {
        let mut src = VoidSource;
        assert_eq!(src.hash_len(), 0);
        assert!(src.next_node().unwrap().is_none());
    }

    #[test]
    fn mem_source_pulls_nested() {
        let mut src = MemSource::new(4);
        src.push(vec![0, 0, 0, 1], Some(vec![vec![0, 0, 0, 2], vec![0, 0, 0, 3]]))
            .push(vec![0, 0, 0, 2], Some(vec![]))
            .push(vec![0, 0, 0, 3], None);
        // first node: two targets
        let item = src.next_node().unwrap().unwrap();
        assert_eq!(item.hash, &[0, 0, 0, 1]);
        assert!(item.has_targets);
        assert_eq!(src.next_target().unwrap().unwrap(), &[0, 0, 0, 2]);
        assert_eq!(src.next_target().unwrap().unwrap(), &[0, 0, 0, 3]);
        assert!(src.next_target().unwrap().is_none());
        // second node: empty stream
        let item = src.next_node().unwrap().unwrap();
        assert!(item.has_targets);
        assert!(src.next_target().unwrap().is_none());
        // third node: no stream at all
        let item = src.next_node().unwrap().unwrap();
        assert!(!item.has_targets);
        assert!(src.next_node().unwrap().is_none());
        // rewindable
        src.rewind();
        assert_eq!(src.next_node().unwrap().unwrap().hash, &[0, 0, 0, 1]);
    }
}
