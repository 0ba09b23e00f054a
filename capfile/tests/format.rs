//! On-disk round trips for the capture file format.

use capfile::meta::SessionMeta;
use capfile::reader::{ReaderSet, ShardReader};
use capfile::record::{EntryHeader, PacketHeader, StatsHeader};
use capfile::{FormatError, MAGIC};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn meta() -> SessionMeta {
    SessionMeta {
        cpu_model: "Test CPU".into(),
        os_version: "Test OS".into(),
        iface: "test0".into(),
        nano: false,
        filter: String::new(),
        snaplen: 65536,
        ipv4: Vec::new(),
        ipv6: Vec::new(),
        mac: None,
        hardware: String::new(),
        speed: 0,
        link: 1,
    }
}

fn packet(id: u64, len: u32) -> (PacketHeader, Vec<u8>) {
    let hdr = PacketHeader {
        id,
        secs: 1_000 + id,
        frac: id * 10,
        orig_len: len,
        cap_len: len,
    };
    let payload = (0..len).map(|i| (i as u8) ^ (id as u8)).collect();
    (hdr, payload)
}

/// Write one capture file; `with_meta` selects the metadata-bearing file.
fn write_shard(dir: &TempDir, name: &str, with_meta: bool, entries: &[(PacketHeader, Vec<u8>)]) -> PathBuf {
    let mut bytes = MAGIC.to_ne_bytes().to_vec();
    if with_meta {
        bytes.extend_from_slice(&meta().encode());
    }
    for (hdr, payload) in entries {
        bytes.extend_from_slice(&hdr.encode());
        bytes.extend_from_slice(payload);
    }
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn single_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<_> = (1..=5).map(|id| packet(id, 40 + id as u32)).collect();
    let path = write_shard(&dir, "cap.bin", true, &entries);

    let mut set = ReaderSet::open(&[path]).unwrap();
    assert_eq!(set.meta(), &meta());
    assert_eq!(set.start_seconds(), 1_001);

    let mut payload = Vec::new();
    for (hdr, expected) in &entries {
        match set.next(&mut payload) {
            Some(EntryHeader::Packet(got)) => {
                assert_eq!(&got, hdr);
                assert_eq!(&payload, expected);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }
    assert!(set.next(&mut payload).is_none());
}

#[test]
fn merge_recovers_global_order_across_files() {
    let dir = TempDir::new().unwrap();
    // IDs interleaved over three files, each internally increasing.
    let all: Vec<_> = (1..=30).map(|id| packet(id, 24)).collect();
    let by_file: Vec<Vec<_>> = (0..3)
        .map(|f| {
            all.iter()
                .filter(|(h, _)| h.id % 3 == f)
                .cloned()
                .collect()
        })
        .collect();
    let paths: Vec<_> = by_file
        .iter()
        .enumerate()
        .map(|(i, entries)| write_shard(&dir, &format!("cap.{i}.bin"), i == 0, entries))
        .collect();

    let mut set = ReaderSet::open(&paths).unwrap();
    let mut payload = Vec::new();
    let mut ids = Vec::new();
    while let Some(entry) = set.next(&mut payload) {
        ids.push(entry.id());
    }
    assert_eq!(ids, (1..=30).collect::<Vec<u64>>());
}

#[test]
fn stats_records_merge_in_sequence() {
    let dir = TempDir::new().unwrap();
    let (p1, d1) = packet(1, 16);
    let stats = StatsHeader {
        id: 2,
        secs: 1_002,
        frac: 0,
        received: 100,
        iface_drops: 3,
        os_drops: 7,
    };
    let mut bytes = MAGIC.to_ne_bytes().to_vec();
    bytes.extend_from_slice(&meta().encode());
    bytes.extend_from_slice(&p1.encode());
    bytes.extend_from_slice(&d1);
    bytes.extend_from_slice(&stats.encode());
    let path = dir.path().join("cap.bin");
    fs::write(&path, bytes).unwrap();

    let mut set = ReaderSet::open(&[path]).unwrap();
    let mut payload = Vec::new();
    assert!(matches!(set.next(&mut payload), Some(EntryHeader::Packet(_))));
    match set.next(&mut payload) {
        Some(EntryHeader::Stats(got)) => assert_eq!(got, stats),
        other => panic!("expected stats, got {other:?}"),
    }
    assert!(set.next(&mut payload).is_none());
}

#[test]
fn missing_id_is_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<_> = [1u64, 2, 4, 5].iter().map(|&id| packet(id, 24)).collect();
    let path = write_shard(&dir, "cap.bin", true, &entries);

    let mut set = ReaderSet::open(&[path]).unwrap();
    let mut payload = Vec::new();
    let mut ids = Vec::new();
    while let Some(entry) = set.next(&mut payload) {
        ids.push(entry.id());
    }
    assert_eq!(ids, vec![1, 2, 4, 5]);
}

#[test]
fn truncated_tail_record_is_discarded() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<_> = (1..=3).map(|id| packet(id, 32)).collect();
    let path = write_shard(&dir, "cap.bin", true, &entries);

    // Cut the last record in the middle of its payload.
    let full = fs::read(&path).unwrap();
    fs::write(&path, &full[..full.len() - 16]).unwrap();

    let mut set = ReaderSet::open(&[path]).unwrap();
    let mut payload = Vec::new();
    let mut ids = Vec::new();
    while let Some(entry) = set.next(&mut payload) {
        ids.push(entry.id());
    }
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn bad_magic_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-a-capture");
    fs::write(&path, b"PCAPNG??").unwrap();
    match ReaderSet::open(&[path]) {
        Err(FormatError::BadMagic(_)) => {}
        other => panic!("expected BadMagic, got {:?}", other.err()),
    }
}

#[test]
fn metadata_record_required() {
    let dir = TempDir::new().unwrap();
    let entries = vec![packet(1, 16)];
    let path = write_shard(&dir, "cap.bin", false, &entries);
    assert!(matches!(
        ReaderSet::open(&[path]),
        Err(FormatError::MissingMetadata)
    ));
}

/// Byte-swap every multi-byte integer of a session's files, as a capture
/// taken on an opposite-endianness host would look, and verify the decoded
/// values are identical.
#[test]
fn foreign_endianness_decodes_identically() {
    let dir = TempDir::new().unwrap();

    let m = meta();
    let (hdr, payload) = packet(1, 48);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&MAGIC.swap_bytes().to_ne_bytes());
    // Metadata record with each integer field reversed; strings, flags and
    // address bytes are endianness-neutral.
    bytes.extend_from_slice(&0u64.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(m.cpu_model.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(m.os_version.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(m.iface.as_bytes());
    bytes.push(0);
    bytes.push(m.nano as u8);
    bytes.extend_from_slice(m.filter.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&m.snaplen.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&0u32.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&0u32.swap_bytes().to_ne_bytes());
    bytes.push(0);
    bytes.extend_from_slice(m.hardware.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&m.speed.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&m.link.swap_bytes().to_ne_bytes());
    // Packet record, likewise reversed field by field.
    bytes.extend_from_slice(&hdr.id.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&hdr.secs.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&hdr.frac.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&hdr.orig_len.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&hdr.cap_len.swap_bytes().to_ne_bytes());
    bytes.extend_from_slice(&payload);

    let path = dir.path().join("cap.bin");
    fs::write(&path, bytes).unwrap();

    let reader = ShardReader::open(&path).unwrap();
    assert!(reader.swapped());
    assert!(reader.has_meta());

    let mut set = ReaderSet::open(&[path]).unwrap();
    assert_eq!(set.meta(), &m);
    let mut got_payload = Vec::new();
    match set.next(&mut got_payload) {
        Some(EntryHeader::Packet(got)) => {
            assert_eq!(got, hdr);
            assert_eq!(got_payload, payload);
        }
        other => panic!("expected packet, got {other:?}"),
    }
}
