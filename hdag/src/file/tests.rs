/*
 * Created on Thu Mar 20 2025
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
    super::{HdagFile, HEADER_SIZE},
    crate::{
        bundle::Bundle,
        error::FaultKind,
        node::Outgoing,
        source::MemSource,
    },
    rand::{rngs::StdRng, Rng, SeedableRng},
    std::{collections::BTreeSet, fs},
    tempfile::TempDir,
};

fn logged() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn h(v: u32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

fn ingested(records: Vec<(Vec<u8>, Option<Vec<Vec<u8>>>)>) -> Bundle {
    let mut bundle = Bundle::new(4);
    let mut src = MemSource::with_records(4, records);
    bundle.ingest_node_seq(&mut src).unwrap();
    bundle
}

/*
    end-to-end scenarios
*/

#[test]
fn empty_graph_file() {
    logged();
    let bundle = Bundle::new(4);
    let file = HdagFile::create_anon(&bundle).unwrap();
    assert_eq!(file.as_bytes().len(), HEADER_SIZE);
    let mut expected = Vec::with_capacity(HEADER_SIZE);
    expected.extend_from_slice(b"HDAG");
    expected.extend_from_slice(&[0, 0]);
    expected.extend_from_slice(&4u16.to_ne_bytes());
    expected.extend_from_slice(&[0u8; 1024]); // all-zero fanout
    expected.extend_from_slice(&0u32.to_ne_bytes());
    assert_eq!(file.as_bytes(), &expected[..]);
    assert_eq!(file.node_num(), 0);
    assert_eq!(file.lookup(&h(1)), None);
}

#[test]
fn singleton_file() {
    let bundle = ingested(vec![(h(1), Some(vec![]))]);
    let file = HdagFile::create_anon(&bundle).unwrap();
    assert_eq!(file.node_num(), 1);
    assert_eq!(file.extra_edge_num(), 0);
    for byte in 0u8..=255 {
        assert_eq!(file.fanout(byte), 1);
    }
    let node = file.node(0);
    assert_eq!(node.hash(), &h(1)[..]);
    assert_eq!(node.component(), 1);
    assert_eq!(node.generation(), 1);
    assert_eq!(node.targets().to_raw(), (0, 0));
}

#[test]
fn two_nodes_one_edge_file() {
    let bundle = ingested(vec![(h(1), Some(vec![h(2)])), (h(2), Some(vec![]))]);
    let file = HdagFile::create_anon(&bundle).unwrap();
    assert_eq!(file.node_num(), 2);
    assert_eq!(file.extra_edge_num(), 0);
    assert_eq!(file.node(0).hash(), &h(1)[..]);
    assert_eq!(file.node(0).targets().decode(), Outgoing::OneDirect(1));
    assert_eq!(file.node(0).generation(), 2);
    assert_eq!(file.node(1).targets().decode(), Outgoing::Absent);
    assert_eq!(file.node(1).generation(), 1);
    assert_eq!(file.node(0).component(), 1);
    assert_eq!(file.node(1).component(), 1);
    assert_eq!(file.outgoing(0).unwrap().collect::<Vec<_>>(), vec![1]);
    assert_eq!(file.outgoing(1).unwrap().count(), 0);
}

#[test]
fn fanout_three_file_and_lookup() {
    let bundle = ingested(vec![
        (h(0), Some(vec![h(1), h(2), h(3)])),
        (h(1), Some(vec![])),
        (h(2), Some(vec![])),
        (h(3), Some(vec![])),
    ]);
    let file = HdagFile::create_anon(&bundle).unwrap();
    assert_eq!(file.extra_edge_num(), 3);
    assert_eq!(
        file.node(0).targets().decode(),
        Outgoing::Indirect { first: 0, last: 2 }
    );
    assert_eq!((0..3).map(|k| file.extra_edge(k)).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(file.node(0).generation(), 2);
    // all four hashes share first byte 0x00: the whole graph sits in the
    // first fanout bucket
    assert_eq!(file.fanout(0), 4);
    assert_eq!(file.lookup(&h(2)), Some(2));
    assert_eq!(file.lookup(&h(0xf)), None);
    assert_eq!(file.lookup(&h(0)), Some(0));
}

/*
    round trips
*/

#[test]
fn bundle_to_file_to_bundle() {
    let bundle = ingested(vec![
        (h(0), Some(vec![h(1), h(2), h(3)])),
        (h(1), Some(vec![h(3)])),
        (h(2), Some(vec![])),
        (h(3), Some(vec![])),
    ]);
    let file = HdagFile::create_anon(&bundle).unwrap();
    let back = file.to_bundle();
    assert_eq!(back, bundle);
    assert!(back.is_compacted());
    assert!(back.is_enumerated());
}

#[test]
fn file_rebuild_is_byte_identical() {
    let bundle = ingested(vec![
        (h(0xaa00), Some(vec![h(1), h(0xbb00), h(3), h(4)])),
        (h(1), Some(vec![h(3)])),
        (h(0xbb00), Some(vec![])),
        (h(3), Some(vec![])),
        (h(4), Some(vec![])),
    ]);
    let file = HdagFile::create_anon(&bundle).unwrap();
    let rebuilt = HdagFile::create_anon(&file.to_bundle()).unwrap();
    assert_eq!(file.as_bytes(), rebuilt.as_bytes());
}

#[test]
fn backed_file_roundtrip() {
    logged();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.hdag");
    let bundle = ingested(vec![(h(7), Some(vec![h(8)])), (h(8), Some(vec![]))]);
    {
        let file = HdagFile::create_at(&bundle, &path).unwrap();
        file.sync().unwrap();
        file.close();
    }
    let file = HdagFile::open(&path).unwrap();
    assert_eq!(file.node_num(), 2);
    assert_eq!(file.to_bundle(), bundle);
    assert_eq!(file.lookup(&h(8)), Some(1));
}

#[cfg(unix)]
#[test]
fn temp_template_and_install() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("graph-XXXXXX.hdag");
    let bundle = ingested(vec![(h(5), Some(vec![]))]);
    let mut file = HdagFile::create_temp(&bundle, &template).unwrap();
    // the random block replaced the Xs, the suffix survived
    let tmp_path = file.path().unwrap().to_path_buf();
    let name = tmp_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("graph-") && name.ends_with(".hdag"));
    assert!(!name.contains("XXXXXX"));
    file.sync().unwrap();
    let final_path = dir.path().join("graph.hdag");
    file.install(&final_path).unwrap();
    assert!(!tmp_path.exists());
    file.close();
    let file = HdagFile::open(&final_path).unwrap();
    assert_eq!(file.node_num(), 1);
}

#[test]
fn unlink_removes_backing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doomed.hdag");
    let bundle = ingested(vec![(h(1), Some(vec![]))]);
    let mut file = HdagFile::create_at(&bundle, &path).unwrap();
    file.unlink().unwrap();
    assert!(!path.exists());
    // the map stays usable until drop
    assert_eq!(file.node_num(), 1);
}

/*
    open validation
*/

fn written_file(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("graph.hdag");
    let bundle = ingested(vec![(h(1), Some(vec![h(2)])), (h(2), Some(vec![]))]);
    HdagFile::create_at(&bundle, &path).unwrap().sync().unwrap();
    path
}

fn corrupt(path: &std::path::Path, f: impl FnOnce(&mut Vec<u8>)) {
    let mut bytes = fs::read(path).unwrap();
    f(&mut bytes);
    fs::write(path, bytes).unwrap();
}

#[test]
fn open_rejects_bad_signature() {
    let dir = TempDir::new().unwrap();
    let path = written_file(&dir);
    corrupt(&path, |b| b[0] = b'X');
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
}

#[test]
fn open_rejects_bad_version() {
    let dir = TempDir::new().unwrap();
    let path = written_file(&dir);
    corrupt(&path, |b| b[4] = 1);
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
}

#[test]
fn open_rejects_bad_hash_len() {
    let dir = TempDir::new().unwrap();
    let path = written_file(&dir);
    // 6 is nonzero but not a multiple of four
    corrupt(&path, |b| b[6..8].copy_from_slice(&6u16.to_ne_bytes()));
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
}

#[test]
fn open_rejects_unsorted_fanout() {
    let dir = TempDir::new().unwrap();
    let path = written_file(&dir);
    corrupt(&path, |b| b[8..12].copy_from_slice(&u32::MAX.to_ne_bytes()));
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
}

#[test]
fn open_rejects_size_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = written_file(&dir);
    corrupt(&path, |b| b.push(0));
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
    corrupt(&path, |b| {
        b.pop();
        b.pop();
    });
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
}

#[test]
fn open_rejects_truncated_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stub.hdag");
    fs::write(&path, b"HDAG").unwrap();
    assert_eq!(HdagFile::open(&path).unwrap_err().kind(), FaultKind::InvalidFormat);
}

#[test]
fn open_missing_file_is_errno() {
    let dir = TempDir::new().unwrap();
    let fault = HdagFile::open(dir.path().join("nope.hdag")).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::Errno);
    assert!(fault.os_code().is_some());
}

/*
    stubs and hostile targets
*/

#[test]
fn outgoing_rejects_unknown_stub() {
    // hash 2 is referenced but never declared; it serializes as a stub
    let bundle = ingested(vec![(h(1), Some(vec![h(2)]))]);
    let file = HdagFile::create_anon(&bundle).unwrap();
    let stub = file.lookup(&h(2)).unwrap();
    assert!(file.node(stub).targets().is_unknown());
    assert_eq!(file.outgoing(stub).unwrap_err().kind(), FaultKind::InvalidFormat);
    // the known node still walks fine
    let known = file.lookup(&h(1)).unwrap();
    assert_eq!(file.outgoing(known).unwrap().collect::<Vec<_>>(), vec![stub]);
}

/*
    lookup soundness + completeness
*/

#[test]
fn lookup_every_present_and_absent_hash() {
    let mut rng = StdRng::seed_from_u64(0x1da9);
    let present: BTreeSet<u32> = (0..512).map(|_| rng.gen::<u32>()).collect();
    let records = present
        .iter()
        .map(|&v| (h(v), Some(vec![])))
        .collect::<Vec<_>>();
    let bundle = ingested(records);
    let file = HdagFile::create_anon(&bundle).unwrap();
    assert_eq!(file.node_num(), present.len() as u32);
    // soundness: every node is found at its own index
    for at in 0..file.node_num() {
        let hash = file.node(at).hash().to_vec();
        assert_eq!(file.lookup(&hash), Some(at));
    }
    // completeness: absent hashes miss
    for _ in 0..512 {
        let probe: u32 = rng.gen();
        if !present.contains(&probe) {
            assert_eq!(file.lookup(&probe.to_be_bytes()), None);
        }
    }
    // fanout is monotone and closes at node_num
    for byte in 0u8..255 {
        assert!(file.fanout(byte) <= file.fanout(byte + 1));
    }
    assert_eq!(file.fanout(255), file.node_num());
}
