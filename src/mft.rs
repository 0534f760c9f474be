//! MFT record parsing and sequential scanning.
//!
//! Records are read as fixed 1024-byte chunks starting at the MFT byte
//! offset and walked until the volume stream runs out. The scan
//! deliberately ignores the MFT's own size metadata: slower, but it
//! never depends on the volume correctly describing itself.

use crate::boot_sector::VolumeGeometry;
use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Read, Seek, SeekFrom};

pub const MFT_RECORD_SIZE: usize = 1024;

/// Attribute type code for $FILE_NAME.
pub const ATTR_TYPE_FILE_NAME: u32 = 0x30;
/// Attribute type code for $DATA.
pub const ATTR_TYPE_DATA: u32 = 0x80;

const RECORD_SIGNATURE: [u8; 4] = *b"FILE";
const ATTR_END_MARKER: u32 = 0xFFFF_FFFF;

/// One attribute carved out of an MFT record.
///
/// Only FILE_NAME and DATA are interpreted downstream; other type
/// codes are carried through untouched.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub type_code: u32,
    pub resident: bool,
    /// Value bytes when resident, raw run-list bytes when non-resident.
    pub payload: Vec<u8>,
}

/// A parsed MFT record: a bag of attributes in on-disk order.
#[derive(Debug, Clone, Default)]
pub struct MftRecord {
    pub attributes: Vec<Attribute>,
}

impl MftRecord {
    /// Parses one record-sized chunk, verifying the signature and the
    /// update-sequence fixups. Returns `None` for chunks that are not
    /// structurally valid records (unused slots, torn writes, garbage).
    pub fn parse(chunk: &[u8], bytes_per_sector: u16) -> Option<Self> {
        if chunk.len() != MFT_RECORD_SIZE || chunk[0..4] != RECORD_SIGNATURE {
            return None;
        }

        let mut record = chunk.to_vec();
        apply_fixups(&mut record, bytes_per_sector)?;

        let first_attribute_offset = LittleEndian::read_u16(&record[20..22]) as usize;
        let mut attributes = Vec::new();
        let mut offset = first_attribute_offset;

        while offset + 8 <= MFT_RECORD_SIZE {
            let type_code = LittleEndian::read_u32(&record[offset..offset + 4]);
            if type_code == ATTR_END_MARKER {
                break;
            }
            let length = LittleEndian::read_u32(&record[offset + 4..offset + 8]) as usize;
            if length < 16 || offset + length > MFT_RECORD_SIZE {
                // The chain walked out of bounds; whatever parsed so
                // far is kept, the rest of the record is not trusted.
                break;
            }
            if let Some(attribute) = parse_attribute(&record[offset..offset + length]) {
                attributes.push(attribute);
            }
            offset += length;
        }

        Some(Self { attributes })
    }

    /// Decoded name of every FILE_NAME attribute, in record order.
    pub fn file_names(&self) -> impl Iterator<Item = String> + '_ {
        self.attributes
            .iter()
            .filter(|attribute| attribute.type_code == ATTR_TYPE_FILE_NAME)
            .map(|attribute| decode_file_name(&attribute.payload))
    }

    /// Whether any FILE_NAME attribute decodes exactly to `name`.
    /// Comparison is exact and case-sensitive.
    pub fn has_file_name(&self, name: &str) -> bool {
        self.file_names().any(|candidate| candidate == name)
    }

    /// DATA attributes in record order.
    pub fn data_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.type_code == ATTR_TYPE_DATA)
    }
}

fn parse_attribute(raw: &[u8]) -> Option<Attribute> {
    let type_code = LittleEndian::read_u32(&raw[0..4]);
    let resident = raw[8] == 0;

    let payload = if resident {
        if raw.len() < 24 {
            return None;
        }
        let value_length = LittleEndian::read_u32(&raw[16..20]) as usize;
        let value_offset = LittleEndian::read_u16(&raw[20..22]) as usize;
        raw.get(value_offset..value_offset + value_length)?.to_vec()
    } else {
        if raw.len() < 34 {
            return None;
        }
        let run_list_offset = LittleEndian::read_u16(&raw[32..34]) as usize;
        raw.get(run_list_offset..)?.to_vec()
    };

    Some(Attribute {
        type_code,
        resident,
        payload,
    })
}

/// Verifies and applies the update sequence array: the last two bytes
/// of each sector must equal the update sequence number and are
/// replaced with the originals stashed in the array. A mismatch means
/// a torn write or a stale chunk and fails the record.
fn apply_fixups(record: &mut [u8], bytes_per_sector: u16) -> Option<()> {
    let bytes_per_sector = bytes_per_sector as usize;
    if bytes_per_sector == 0 || record.len() % bytes_per_sector != 0 {
        return None;
    }

    let usa_offset = LittleEndian::read_u16(&record[4..6]) as usize;
    let usa_count = LittleEndian::read_u16(&record[6..8]) as usize;
    if usa_count < 2 || usa_offset + usa_count * 2 > record.len() {
        return None;
    }

    let sequence = [record[usa_offset], record[usa_offset + 1]];
    let fixup_count = (usa_count - 1).min(record.len() / bytes_per_sector);

    for sector in 1..=fixup_count {
        let tail = sector * bytes_per_sector - 2;
        if record[tail..tail + 2] != sequence {
            return None;
        }
        let stashed = usa_offset + sector * 2;
        record[tail] = record[stashed];
        record[tail + 1] = record[stashed + 1];
    }
    Some(())
}

/// Decodes the name carried by a FILE_NAME payload: length in UTF-16
/// units at offset 64, UTF-16LE name from offset 66. Payloads too
/// short for their declared length decode to the empty string, which
/// can never match a target name.
pub fn decode_file_name(payload: &[u8]) -> String {
    const NAME_LENGTH_OFFSET: usize = 64;
    const NAME_OFFSET: usize = 66;

    if payload.len() < NAME_OFFSET {
        return String::new();
    }
    let name_units = payload[NAME_LENGTH_OFFSET] as usize;
    let Some(name_bytes) = payload.get(NAME_OFFSET..NAME_OFFSET + name_units * 2) else {
        return String::new();
    };

    let units: Vec<u16> = name_bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
    String::from_utf16_lossy(&units)
}

/// Sequential scanner over MFT records.
///
/// Owns the volume stream and an explicit next-record position; every
/// read seeks there first, so callers may reposition the stream
/// between records (content reconstruction does) without derailing the
/// scan.
pub struct RecordScanner<V> {
    volume: V,
    next_offset: u64,
    bytes_per_sector: u16,
}

impl<V: Read + Seek> RecordScanner<V> {
    pub fn new(volume: V, geometry: &VolumeGeometry) -> Self {
        Self {
            volume,
            next_offset: geometry.mft_byte_offset(),
            bytes_per_sector: geometry.bytes_per_sector,
        }
    }

    /// Next structurally valid record, or `None` once the stream is
    /// exhausted. Chunks failing validation are skipped, not fatal.
    pub fn next_record(&mut self) -> io::Result<Option<MftRecord>> {
        let mut chunk = [0u8; MFT_RECORD_SIZE];
        loop {
            self.volume.seek(SeekFrom::Start(self.next_offset))?;
            if !read_full(&mut self.volume, &mut chunk)? {
                return Ok(None);
            }
            self.next_offset += MFT_RECORD_SIZE as u64;

            if let Some(record) = MftRecord::parse(&chunk, self.bytes_per_sector) {
                return Ok(Some(record));
            }
        }
    }

    /// The underlying stream, for interleaved content reads.
    pub fn volume_mut(&mut self) -> &mut V {
        &mut self.volume
    }
}

/// Fills `buffer` completely; `false` means the stream ended first.
fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}
