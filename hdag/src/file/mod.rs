/*
 * Created on Sat Mar 15 2025
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

//! The single-file serialization of an organized, enumerated bundle.
//!
//! ```text
//! offset 0    : 'H' 'D' 'A' 'G'
//! offset 4    : version major = 0, minor = 0
//! offset 6    : hash_len (u16, nonzero, multiple of 4)
//! offset 8    : node_fanout[256] (u32, non-decreasing)
//! offset 1032 : extra_edge_num (u32)
//! offset 1036 : nodes[node_num], (16 + hash_len) bytes each
//! …           : extra_edges[extra_edge_num], 4 bytes each
//! ```
//!
//! `node_fanout[b]` counts the nodes whose first hash byte is <= `b`, so
//! `node_fanout[255] == node_num` and a lookup only ever binary-searches
//! one first-byte bucket. All integers are host-order: files are
//! deliberately not portable across architectures (the version field exists
//! for any future change of heart).

#[cfg(test)]
mod tests;

use {
    crate::{
        bundle::Bundle,
        error::{Fault, HdagResult},
        hash,
        mem::unsafe_apis::memcpy,
        node::{self, Edges, NodeRef, Outgoing},
    },
    core::ops::Range,
    log::trace,
    memmap2::MmapMut,
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

const SEG_SIGNATURE: Range<usize> = 0..4;
const SEG_VERSION: Range<usize> = 4..6;
const SEG_HASH_LEN: Range<usize> = 6..8;
const SEG_NODE_FANOUT: Range<usize> = 8..1032;
const SEG_EXTRA_EDGE_NUM: Range<usize> = 1032..1036;
/// Total header size; also the size of the file of an empty graph
pub const HEADER_SIZE: usize = 1036;

const SIGNATURE: [u8; 4] = *b"HDAG";
const VERSION: [u8; 2] = [0, 0];
const FANOUT_LEN: usize = 256;

const _: () = assert!(HEADER_SIZE == 8 + sizeof!(u32, FANOUT_LEN) + sizeof!(u32));

/// A memory-mapped hdag file: either backed by a filesystem path or
/// anonymous. Dropping the handle unmaps it; the backing file (if any)
/// stays behind unless [`HdagFile::unlink`] removed it.
#[derive(Debug)]
pub struct HdagFile {
    map: MmapMut,
    path: Option<PathBuf>,
    hash_len: u16,
    node_num: u32,
    extra_edge_num: u32,
}

/*
    build
*/

impl HdagFile {
    fn total_size(bundle: &Bundle) -> usize {
        HEADER_SIZE
            + node::size(bundle.hash_len()) * bundle.node_num() as usize
            + sizeof!(u32, bundle.extra_edge_num() as usize)
    }
    /// Serialize the bundle into the given map: header (with freshly
    /// computed fanout), node block, extra-edge block
    fn write_blocks(bundle: &Bundle, map: &mut [u8]) {
        debug_assert!(bundle.is_enumerated());
        map[SEG_SIGNATURE].copy_from_slice(&SIGNATURE);
        map[SEG_VERSION].copy_from_slice(&VERSION);
        map[SEG_HASH_LEN].copy_from_slice(&bundle.hash_len().to_ne_bytes());
        // histogram of first hash bytes, then prefix sum
        let mut fanout = [0u32; FANOUT_LEN];
        for at in 0..bundle.node_num() {
            fanout[bundle.node(at).hash()[0] as usize] += 1;
        }
        let mut running = 0u32;
        for (bucket, slot) in fanout
            .iter_mut()
            .zip(map[SEG_NODE_FANOUT].chunks_exact_mut(sizeof!(u32)))
        {
            running += *bucket;
            slot.copy_from_slice(&running.to_ne_bytes());
        }
        map[SEG_EXTRA_EDGE_NUM].copy_from_slice(&bundle.extra_edge_num().to_ne_bytes());
        let nodes_end = HEADER_SIZE + bundle.nodes.as_bytes().len();
        map[HEADER_SIZE..nodes_end].copy_from_slice(bundle.nodes.as_bytes());
        map[nodes_end..].copy_from_slice(bundle.extra_edges.as_bytes());
    }
    fn from_map(map: MmapMut, path: Option<PathBuf>, bundle: &Bundle) -> Self {
        Self {
            map,
            path,
            hash_len: bundle.hash_len(),
            node_num: bundle.node_num(),
            extra_edge_num: bundle.extra_edge_num(),
        }
    }
    /// Build an anonymous (memory-only) file from an organized, enumerated
    /// bundle
    pub fn create_anon(bundle: &Bundle) -> HdagResult<Self> {
        assert!(bundle.is_valid() && bundle.is_compacted());
        debug_assert!(bundle.is_sorted_and_deduped());
        let mut map = MmapMut::map_anon(Self::total_size(bundle))?;
        Self::write_blocks(bundle, &mut map);
        trace!("mapped anonymous hdag file ({} bytes)", map.len());
        Ok(Self::from_map(map, None, bundle))
    }
    /// Build a file at the given path (created or truncated) from an
    /// organized, enumerated bundle. The partial file is unlinked if any
    /// step after creation fails
    pub fn create_at(bundle: &Bundle, path: impl AsRef<Path>) -> HdagResult<Self> {
        assert!(bundle.is_valid() && bundle.is_compacted());
        debug_assert!(bundle.is_sorted_and_deduped());
        let path = path.as_ref();
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        match Self::layout_into(bundle, &file, path) {
            Ok(this) => Ok(this),
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(path);
                Err(e)
            }
        }
    }
    /// Build a file from a `…XXXXXX{suffix}` template, `mkstemps`-style:
    /// the six `X`s become a unique random block and the suffix after them
    /// is preserved. Install the result under its final name with
    /// [`HdagFile::install`]. The temp file is unlinked if any step after
    /// creation fails
    #[cfg(unix)]
    pub fn create_temp(bundle: &Bundle, template: impl AsRef<Path>) -> HdagResult<Self> {
        use std::{
            ffi::{CString, OsStr},
            os::{fd::FromRawFd, unix::ffi::OsStrExt},
        };
        assert!(bundle.is_valid() && bundle.is_compacted());
        debug_assert!(bundle.is_sorted_and_deduped());
        let template = template.as_ref().as_os_str().as_bytes();
        let marker = template
            .windows(6)
            .rposition(|w| w == b"XXXXXX")
            .expect("template without an XXXXXX block");
        let suffix_len = template.len() - (marker + 6);
        let template = CString::new(template).expect("template contains NUL");
        let mut raw = template.into_bytes_with_nul();
        let fd = unsafe {
            // UNSAFE(@ohsayan): raw is a valid NUL-terminated buffer that
            // mkstemps rewrites in place
            libc::mkstemps(raw.as_mut_ptr() as *mut libc::c_char, suffix_len as libc::c_int)
        };
        if fd < 0 {
            return Err(Fault::last_os_error());
        }
        let file = unsafe {
            // UNSAFE(@ohsayan): fresh fd owned by us alone
            fs::File::from_raw_fd(fd)
        };
        let path = Path::new(OsStr::from_bytes(&raw[..raw.len() - 1])).to_path_buf();
        match Self::layout_into(bundle, &file, &path) {
            Ok(this) => Ok(this),
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&path);
                Err(e)
            }
        }
    }
    fn layout_into(bundle: &Bundle, file: &fs::File, path: &Path) -> HdagResult<Self> {
        let total = Self::total_size(bundle);
        file.set_len(total as u64)?;
        let mut map = unsafe {
            // UNSAFE(@ohsayan): shared RW map of a file we exclusively own
            MmapMut::map_mut(file)?
        };
        Self::write_blocks(bundle, &mut map);
        trace!("mapped hdag file at {} ({total} bytes)", path.display());
        Ok(Self::from_map(map, Some(path.to_path_buf()), bundle))
    }
}

/*
    open
*/

impl HdagFile {
    /// Map and validate an existing file. Anything that fails the header or
    /// size checks is a [`Fault::InvalidFormat`]
    pub fn open(path: impl AsRef<Path>) -> HdagResult<Self> {
        let path = path.as_ref();
        let file = fs::OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_SIZE as u64 {
            return Err(Fault::InvalidFormat);
        }
        let map = unsafe {
            // UNSAFE(@ohsayan): shared RW map; single-owner access is this
            // crate's contract
            MmapMut::map_mut(&file)?
        };
        let (hash_len, node_num, extra_edge_num) = Self::validate(&map, len)?;
        trace!(
            "opened hdag file at {} ({node_num} nodes, {extra_edge_num} extra edges)",
            path.display()
        );
        Ok(Self {
            map,
            path: Some(path.to_path_buf()),
            hash_len,
            node_num,
            extra_edge_num,
        })
    }
    fn validate(map: &[u8], len: u64) -> HdagResult<(u16, u32, u32)> {
        let hash_len = u16::from_ne_bytes(unsafe {
            // UNSAFE(@ohsayan): len >= HEADER_SIZE was checked before the map
            memcpy(&map[SEG_HASH_LEN])
        });
        let mut fanout = [0u32; FANOUT_LEN];
        for (bucket, slot) in fanout
            .iter_mut()
            .zip(map[SEG_NODE_FANOUT].chunks_exact(sizeof!(u32)))
        {
            *bucket = u32::from_ne_bytes(unsafe {
                // UNSAFE(@ohsayan): chunks_exact yields 4-byte slices
                memcpy(slot)
            });
        }
        let node_num = fanout[FANOUT_LEN - 1];
        let extra_edge_num = u32::from_ne_bytes(unsafe {
            // UNSAFE(@ohsayan): in-header range
            memcpy(&map[SEG_EXTRA_EDGE_NUM])
        });
        // the node count must be addressable within the hash space
        let node_bits = u64::BITS - (node_num as u64).leading_zeros();
        let expected_len = HEADER_SIZE as u64
            + node::size(hash_len) as u64 * node_num as u64
            + sizeof!(u32) as u64 * extra_edge_num as u64;
        let okay = okay!(
            map[SEG_SIGNATURE] == SIGNATURE,
            map[SEG_VERSION] == VERSION,
            hash::len_is_valid(hash_len),
            hash::fanout_is_valid(&fanout),
            node_bits as u64 <= 8 * hash_len as u64,
            expected_len == len,
        );
        if okay {
            Ok((hash_len, node_num, extra_edge_num))
        } else {
            Err(Fault::InvalidFormat)
        }
    }
}

/*
    queries
*/

impl HdagFile {
    #[inline(always)]
    pub fn hash_len(&self) -> u16 {
        self.hash_len
    }
    #[inline(always)]
    pub fn node_num(&self) -> u32 {
        self.node_num
    }
    #[inline(always)]
    pub fn extra_edge_num(&self) -> u32 {
        self.extra_edge_num
    }
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
    /// The raw mapped bytes (exactly the on-disk contents)
    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }
    fn nodes_bytes(&self) -> &[u8] {
        let end = HEADER_SIZE + node::size(self.hash_len) * self.node_num as usize;
        &self.map[HEADER_SIZE..end]
    }
    fn extra_bytes(&self) -> &[u8] {
        let at = HEADER_SIZE + node::size(self.hash_len) * self.node_num as usize;
        &self.map[at..]
    }
    /// Count of nodes whose first hash byte is <= `byte`
    pub fn fanout(&self, byte: u8) -> u32 {
        let at = SEG_NODE_FANOUT.start + sizeof!(u32, byte as usize);
        u32::from_ne_bytes(unsafe {
            // UNSAFE(@ohsayan): the fanout segment holds 256 u32 slots
            memcpy(&self.map[at..at + sizeof!(u32)])
        })
    }
    /// Zero-copy view of a node record straight over the map
    pub fn node(&self, idx: u32) -> NodeRef<'_> {
        assert!(idx < self.node_num, "node index out of range");
        let size = node::size(self.hash_len);
        let at = HEADER_SIZE + size * idx as usize;
        NodeRef::new(&self.map[at..at + size])
    }
    pub fn extra_edge(&self, idx: u32) -> u32 {
        assert!(idx < self.extra_edge_num, "extra edge index out of range");
        let at = sizeof!(u32, idx as usize);
        u32::from_ne_bytes(unsafe {
            // UNSAFE(@ohsayan): verified in-range extra edge slot
            memcpy(&self.extra_bytes()[at..at + sizeof!(u32)])
        })
    }
    /// O(log n) hash -> node index. The first hash byte selects the fanout
    /// window, a full-hash binary search settles it
    pub fn lookup(&self, needle: &[u8]) -> Option<u32> {
        assert_eq!(needle.len(), self.hash_len as usize, "bad hash length");
        let bucket = needle[0];
        let mut lo = match bucket {
            0 => 0,
            b => self.fanout(b - 1),
        };
        let mut hi = self.fanout(bucket);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match hash::cmp(self.node(mid).hash(), needle) {
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
                core::cmp::Ordering::Equal => return Some(mid),
            }
        }
        None
    }
    /// Walk the outgoing edges of a node. An unknown (stub) pair, a byte
    /// pattern outside the legal target shapes, or an out-of-range
    /// reference is rejected as [`Fault::InvalidFormat`]: a well-formed
    /// file contains none of them
    pub fn outgoing(&self, idx: u32) -> HdagResult<Edges<'_>> {
        let targets = self.node(idx).targets();
        let in_range = match targets.try_decode() {
            None | Some(Outgoing::Unknown) => false,
            Some(Outgoing::Absent) => true,
            Some(Outgoing::OneDirect(t)) => t < self.node_num,
            Some(Outgoing::TwoDirect(_, b)) => b < self.node_num,
            Some(Outgoing::Indirect { last, .. }) => last < self.extra_edge_num,
        };
        if in_range {
            Ok(Edges::new(targets, self.extra_bytes()))
        } else {
            Err(Fault::InvalidFormat)
        }
    }
    /// Reconstruct a bundle by copying the mapped arrays (the fanout is
    /// derived data and is dropped). Rebuilding a file from the result is
    /// byte-identical
    pub fn to_bundle(&self) -> Bundle {
        let mut bundle = Bundle::new(self.hash_len);
        bundle.nodes.extend_raw(self.nodes_bytes());
        bundle.extra_edges.extend_raw(self.extra_bytes());
        bundle
    }
}

/*
    lifecycle
*/

impl HdagFile {
    /// Flush the mapped contents to the backing file (msync). A no-op for
    /// anonymous maps
    pub fn sync(&self) -> HdagResult<()> {
        self.map.flush().map_err(Into::into)
    }
    /// Atomically install the backing file under a new name (rename)
    pub fn install(&mut self, to: impl AsRef<Path>) -> HdagResult<()> {
        let to = to.as_ref();
        let from = self
            .path
            .as_ref()
            .expect("anonymous files cannot be installed");
        fs::rename(from, to)?;
        trace!("installed {} as {}", from.display(), to.display());
        self.path = Some(to.to_path_buf());
        Ok(())
    }
    /// Remove the backing file; the map stays usable until the handle is
    /// dropped
    pub fn unlink(&mut self) -> HdagResult<()> {
        if let Some(path) = self.path.take() {
            fs::remove_file(&path)?;
            trace!("unlinked {}", path.display());
        }
        Ok(())
    }
    /// Unmap. Equivalent to dropping the handle; provided for callers that
    /// want the teardown spelled out
    pub fn close(self) {}
}
