use crate::wcup::{
    from_wcup, load_wcup, parse_wcup, KeyField, SidField, WcupRecord, WCUP_RECORD_BYTES,
};
use crate::{AttrValue, Error};
use anyhow::Result;
use std::io::Write;

fn trace() -> Vec<WcupRecord> {
    vec![
        WcupRecord {
            timestamp: 893_964_000,
            client_id: 12,
            object_id: 4_000_000_000,
            size: 512,
            method: 1,
            status: 2,
            kind: 3,
            server: 4,
        },
        WcupRecord {
            timestamp: 893_963_999,
            client_id: 13,
            object_id: 7,
            size: 0,
            method: 5,
            status: 6,
            kind: 255,
            server: 8,
        },
    ]
}

fn encode(records: &[WcupRecord]) -> Vec<u8> {
    let mut bytes = vec![0u8; records.len() * WCUP_RECORD_BYTES];
    for (r, buf) in records.iter().zip(bytes.chunks_exact_mut(WCUP_RECORD_BYTES)) {
        r.encode(buf);
    }
    bytes
}

#[test]
fn decode_is_big_endian() {
    let mut buf = [0u8; WCUP_RECORD_BYTES];
    buf[0..4].copy_from_slice(&[0, 0, 1, 2]);
    buf[16..20].copy_from_slice(&[9, 8, 7, 6]);
    let r = WcupRecord::decode(&buf);
    assert_eq!(r.timestamp, 258);
    assert_eq!((r.method, r.status, r.kind, r.server), (9, 8, 7, 6));
}

#[test]
fn parse_rejects_partial_records() {
    let mut bytes = encode(&trace());
    assert_eq!(parse_wcup(&bytes).unwrap(), trace());
    bytes.pop();
    assert!(matches!(parse_wcup(&bytes), Err(Error::Format(_))));
}

#[test]
fn conversion_picks_fields() {
    let ds = from_wcup(&trace(), SidField::Status, KeyField::ObjectId, "wcup");
    // Sorted by timestamp, so the second trace record comes first.
    let recs = ds.records();
    assert_eq!(recs[0].timestamp, 893_963_999);
    assert_eq!((recs[0].stream_id, recs[0].source_id, recs[0].key), (6, 8, 7));
    assert_eq!(recs[1].stream_id, 2);
    assert_eq!(recs[1].key, 4_000_000_000u32 as i32);
    assert!(recs.iter().all(|r| r.update_count == 1));

    assert_eq!(ds.attrs().get("origin"), Some(&AttrValue::from("wcup")));
    assert_eq!(ds.attrs().get("sid_field"), Some(&AttrValue::from("status")));
    assert_eq!(ds.attrs().get("key_field"), Some(&AttrValue::from("objectID")));
}

#[test]
fn default_fields() {
    let ds = from_wcup(&trace(), SidField::default(), KeyField::default(), "x");
    let sids: Vec<i16> = ds.iter().map(|r| r.stream_id).collect();
    let keys: Vec<i32> = ds.iter().map(|r| r.key).collect();
    assert_eq!(sids, vec![255, 3]);
    assert_eq!(keys, vec![13, 12]);
}

#[test]
fn field_names_parse() {
    assert_eq!("Method".parse::<SidField>(), Ok(SidField::Method));
    assert_eq!("type".parse::<SidField>(), Ok(SidField::Type));
    assert!("size".parse::<SidField>().is_err());
    assert_eq!("clientID".parse::<KeyField>(), Ok(KeyField::ClientId));
    assert_eq!("object_id".parse::<KeyField>(), Ok(KeyField::ObjectId));
    assert!("server".parse::<KeyField>().is_err());
    assert_eq!(KeyField::ObjectId.to_string(), "objectID");
}

#[test]
fn load_from_file_sets_origin() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&encode(&trace()))?;
    file.flush()?;

    let ds = load_wcup(file.path(), SidField::Type, KeyField::ClientId)?;
    assert_eq!(ds.len(), 2);
    let origin = file.path().display().to_string();
    assert_eq!(ds.attrs().get("origin"), Some(&AttrValue::Str(origin)));
    Ok(())
}
