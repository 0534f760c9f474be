//! End-to-end extraction against synthetic NTFS volume images.

use hivetap::error::ExtractionError;
use hivetap::extraction::{self, Target};
use hivetap::mft::{ATTR_TYPE_DATA, ATTR_TYPE_FILE_NAME, MFT_RECORD_SIZE};
use std::io::Cursor;

const BYTES_PER_SECTOR: u16 = 512;
const SECTORS_PER_CLUSTER: u8 = 1;
const CLUSTER: usize = 512;
const MFT_CLUSTER: u64 = 8;

fn boot_sector() -> [u8; 512] {
    let mut sector = [0u8; 512];
    sector[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    sector[3..11].copy_from_slice(b"NTFS    ");
    sector[11..13].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes());
    sector[13] = SECTORS_PER_CLUSTER;
    sector[21] = 0xF8;
    sector[40..48].copy_from_slice(&64u64.to_le_bytes());
    sector[48..56].copy_from_slice(&MFT_CLUSTER.to_le_bytes());
    sector
}

enum Payload {
    Resident(Vec<u8>),
    NonResident(Vec<u8>),
}

struct EncodedAttribute {
    type_code: u32,
    payload: Payload,
}

fn file_name(name: &str) -> EncodedAttribute {
    let mut payload = vec![0u8; 66];
    let units: Vec<u16> = name.encode_utf16().collect();
    payload[64] = units.len() as u8;
    payload[65] = 3;
    for unit in units {
        payload.extend_from_slice(&unit.to_le_bytes());
    }
    EncodedAttribute {
        type_code: ATTR_TYPE_FILE_NAME,
        payload: Payload::Resident(payload),
    }
}

fn resident_data(value: &[u8]) -> EncodedAttribute {
    EncodedAttribute {
        type_code: ATTR_TYPE_DATA,
        payload: Payload::Resident(value.to_vec()),
    }
}

fn non_resident_data(run_list: &[u8]) -> EncodedAttribute {
    EncodedAttribute {
        type_code: ATTR_TYPE_DATA,
        payload: Payload::NonResident(run_list.to_vec()),
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

fn write_attribute(record: &mut [u8; MFT_RECORD_SIZE], offset: usize, attribute: &EncodedAttribute) -> usize {
    record[offset..offset + 4].copy_from_slice(&attribute.type_code.to_le_bytes());
    match &attribute.payload {
        Payload::Resident(value) => {
            let length = align8(24 + value.len());
            record[offset + 4..offset + 8].copy_from_slice(&(length as u32).to_le_bytes());
            record[offset + 8] = 0;
            record[offset + 16..offset + 20].copy_from_slice(&(value.len() as u32).to_le_bytes());
            record[offset + 20..offset + 22].copy_from_slice(&24u16.to_le_bytes());
            record[offset + 24..offset + 24 + value.len()].copy_from_slice(value);
            offset + length
        }
        Payload::NonResident(run_list) => {
            let length = align8(64 + run_list.len() + 1);
            record[offset + 4..offset + 8].copy_from_slice(&(length as u32).to_le_bytes());
            record[offset + 8] = 1;
            record[offset + 32..offset + 34].copy_from_slice(&64u16.to_le_bytes());
            record[offset + 64..offset + 64 + run_list.len()].copy_from_slice(run_list);
            offset + length
        }
    }
}

/// Builds a fixed-up MFT record from encoded attributes, the way the
/// volume would store it.
fn build_record(attributes: &[EncodedAttribute]) -> [u8; MFT_RECORD_SIZE] {
    let mut record = [0u8; MFT_RECORD_SIZE];
    record[0..4].copy_from_slice(b"FILE");
    record[4..6].copy_from_slice(&48u16.to_le_bytes());
    record[6..8].copy_from_slice(&3u16.to_le_bytes());
    record[20..22].copy_from_slice(&56u16.to_le_bytes());

    let mut offset = 56;
    for attribute in attributes {
        offset = write_attribute(&mut record, offset, attribute);
    }
    record[offset..offset + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

    // Update sequence array: stash the real sector tails, stamp the
    // sequence number over them.
    record[48] = 0x42;
    record[49] = 0x00;
    for sector in 1..=2usize {
        let tail = sector * BYTES_PER_SECTOR as usize - 2;
        record[48 + sector * 2] = record[tail];
        record[48 + sector * 2 + 1] = record[tail + 1];
        record[tail] = 0x42;
        record[tail + 1] = 0x00;
    }
    record
}

/// Assembles a volume image: boot sector, patterned data clusters,
/// and the given records at the MFT offset.
fn build_volume(records: &[[u8; MFT_RECORD_SIZE]], cluster_data: &[(u64, &[u8])]) -> Vec<u8> {
    let mft_offset = MFT_CLUSTER as usize * CLUSTER;
    let mut volume = vec![0u8; mft_offset + records.len() * MFT_RECORD_SIZE];

    volume[..512].copy_from_slice(&boot_sector());
    for (cluster, data) in cluster_data {
        let start = *cluster as usize * CLUSTER;
        volume[start..start + data.len()].copy_from_slice(data);
    }
    for (index, record) in records.iter().enumerate() {
        let start = mft_offset + index * MFT_RECORD_SIZE;
        volume[start..start + MFT_RECORD_SIZE].copy_from_slice(record);
    }
    volume
}

#[test]
fn extracts_resident_content() {
    let record = build_record(&[file_name("SAM"), resident_data(b"AB"), resident_data(b"CD")]);
    let volume = build_volume(&[record], &[]);

    let content = extraction::extract_file_content(&mut Cursor::new(volume), "SAM").unwrap();
    assert_eq!(content, b"ABCD");
}

#[test]
fn extracts_non_resident_content_across_fragments() {
    // Cluster 2 and 3 hold the first fragment, cluster 6 the second,
    // cluster 5 the third (a backward delta).
    let c23: Vec<u8> = (0..2 * CLUSTER).map(|i| i as u8).collect();
    let c5 = vec![0x55u8; CLUSTER];
    let c6 = vec![0x66u8; CLUSTER];

    let record = build_record(&[
        file_name("SYSTEM"),
        non_resident_data(&[
            0x11, 0x02, 0x02, // 2 clusters @ 2
            0x11, 0x01, 0x04, // 1 cluster @ 6
            0x11, 0x01, 0xFF, // 1 cluster @ 5 (delta -1)
            0x00,
        ]),
    ]);
    let volume = build_volume(&[record], &[(2, &c23), (5, &c5), (6, &c6)]);

    let content = extraction::extract_file_content(&mut Cursor::new(volume), "SYSTEM").unwrap();

    let mut expected = c23.clone();
    expected.extend_from_slice(&c6);
    expected.extend_from_slice(&c5);
    assert_eq!(content, expected);
}

#[test]
fn skips_unextractable_match_and_takes_a_later_record() {
    // The first SAM record declares a zero-length run, the chunk after
    // it is garbage, and the last record carries good content.
    let bad = build_record(&[file_name("SAM"), non_resident_data(&[0x11, 0x00, 0x05, 0x00])]);
    let garbage = [0xA5u8; MFT_RECORD_SIZE];
    let good = build_record(&[file_name("SAM"), resident_data(b"hive content")]);

    let volume = build_volume(&[bad, garbage, good], &[]);

    let content = extraction::extract_file_content(&mut Cursor::new(volume), "SAM").unwrap();
    assert_eq!(content, b"hive content");
}

#[test]
fn scan_position_survives_interleaved_content_reads() {
    // The first SYSTEM record reads clusters far away from the MFT and
    // then fails on a truncated extent; the scan must still pick up
    // the following record.
    let c2 = vec![0x22u8; CLUSTER];
    let bad = build_record(&[
        file_name("SYSTEM"),
        non_resident_data(&[
            0x11, 0x01, 0x02, // 1 cluster @ 2, reads fine
            0x11, 0x04, 0x20, // 4 clusters @ 34, past end of volume
            0x00,
        ]),
    ]);
    let good = build_record(&[file_name("SYSTEM"), resident_data(b"second record wins")]);

    let volume = build_volume(&[bad, good], &[(2, &c2)]);

    let content = extraction::extract_file_content(&mut Cursor::new(volume), "SYSTEM").unwrap();
    assert_eq!(content, b"second record wins");
}

#[test]
fn reports_not_found_when_no_match_is_extractable() {
    let bad = build_record(&[file_name("SAM"), non_resident_data(&[0x11, 0x00, 0x05, 0x00])]);
    let volume = build_volume(&[bad], &[]);

    let error = extraction::extract_file_content(&mut Cursor::new(volume), "SAM").unwrap_err();
    assert!(matches!(error, ExtractionError::NotFound { name } if name == "SAM"));
}

#[test]
fn reports_not_found_for_absent_names() {
    let record = build_record(&[file_name("SOFTWARE"), resident_data(b"x")]);
    let volume = build_volume(&[record], &[]);

    let error = extraction::extract_file_content(&mut Cursor::new(volume), "SAM").unwrap_err();
    assert!(matches!(error, ExtractionError::NotFound { .. }));
}

#[test]
fn empty_resident_content_does_not_count_as_a_match() {
    let empty = build_record(&[file_name("SAM"), resident_data(b"")]);
    let good = build_record(&[file_name("SAM"), resident_data(b"real")]);
    let volume = build_volume(&[empty, good], &[]);

    let content = extraction::extract_file_content(&mut Cursor::new(volume), "SAM").unwrap();
    assert_eq!(content, b"real");
}

#[test]
fn garbage_boot_sector_is_a_format_error() {
    let volume = vec![0xFFu8; 4096];
    let error = extraction::extract_file_content(&mut Cursor::new(volume), "SAM").unwrap_err();
    assert!(matches!(error, ExtractionError::Format(_)));
}

#[test]
fn extract_all_writes_hives_and_is_idempotent() {
    let system = build_record(&[file_name("SYSTEM"), resident_data(b"system hive bytes")]);
    let sam = build_record(&[file_name("SAM"), resident_data(b"sam hive bytes")]);
    let volume = build_volume(&[system, sam], &[]);

    let image = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(image.path(), &volume).unwrap();
    let output = tempfile::tempdir().unwrap();

    let targets = [
        Target::new("SYSTEM", output.path().join("system.hiv")),
        Target::new("SAM", output.path().join("sam.hiv")),
    ];

    let report = extraction::extract_all(image.path().to_str().unwrap(), &targets);
    assert!(report.all_succeeded());
    assert_eq!(report.saved.len(), 2);

    let first_system = std::fs::read(output.path().join("system.hiv")).unwrap();
    let first_sam = std::fs::read(output.path().join("sam.hiv")).unwrap();
    assert_eq!(first_system, b"system hive bytes");
    assert_eq!(first_sam, b"sam hive bytes");

    // A second run over the unchanged image overwrites with identical
    // bytes.
    let report = extraction::extract_all(image.path().to_str().unwrap(), &targets);
    assert!(report.all_succeeded());
    assert_eq!(
        std::fs::read(output.path().join("system.hiv")).unwrap(),
        first_system
    );
    assert_eq!(std::fs::read(output.path().join("sam.hiv")).unwrap(), first_sam);
}

#[test]
fn one_target_failing_does_not_stop_the_other() {
    let sam = build_record(&[file_name("SAM"), resident_data(b"sam hive bytes")]);
    let volume = build_volume(&[sam], &[]);

    let image = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(image.path(), &volume).unwrap();
    let output = tempfile::tempdir().unwrap();

    let targets = [
        Target::new("SYSTEM", output.path().join("system.hiv")),
        Target::new("SAM", output.path().join("sam.hiv")),
    ];

    let report = extraction::extract_all(image.path().to_str().unwrap(), &targets);
    assert_eq!(report.saved.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "SYSTEM");
    assert!(matches!(report.failed[0].1, ExtractionError::NotFound { .. }));
    assert_eq!(
        std::fs::read(output.path().join("sam.hiv")).unwrap(),
        b"sam hive bytes"
    );
}
