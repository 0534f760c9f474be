//! NTFS boot sector decoding.
//!
//! The first 512 bytes of a volume carry the geometry needed to locate
//! the MFT: bytes per sector, sectors per cluster, and the MFT's
//! starting cluster number. Everything downstream converts between
//! cluster addresses and byte offsets through [`VolumeGeometry`].

use crate::error::{ExtractionError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

pub const BOOT_SECTOR_SIZE: usize = 512;

/// OEM ID stamped on every NTFS volume: "NTFS    "
const NTFS_OEM_ID: [u8; 8] = *b"NTFS    ";

/// The fixed little-endian layout of an NTFS boot sector.
///
/// Only the geometry triple feeds the extraction; the remaining fields
/// are decoded and retained but not otherwise used.
#[derive(Debug, Clone)]
pub struct BootSector {
    pub jump: [u8; 3],
    pub oem_id: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub media_descriptor: u8,
    pub sectors_per_track: u16,
    pub number_of_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors: u64,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    pub clusters_per_file_record: i8,
    pub clusters_per_index_buffer: i8,
    pub volume_serial: [u8; 8],
    pub checksum: u32,
}

/// Unit conversions between cluster addresses and byte offsets.
#[derive(Debug, Clone, Copy)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub mft_cluster: u64,
}

impl VolumeGeometry {
    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    /// Byte offset of the first MFT record.
    pub fn mft_byte_offset(&self) -> u64 {
        self.mft_cluster * self.bytes_per_cluster()
    }
}

impl BootSector {
    /// Reads exactly one boot sector from the start of `reader` and
    /// decodes it. A short read is an I/O error; a layout that cannot
    /// be filled, or one that is not plausibly NTFS, is a format error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; BOOT_SECTOR_SIZE];
        reader.read_exact(&mut buffer)?;

        let boot_sector = Self::parse(&buffer)?;
        if !boot_sector.is_valid() {
            return Err(ExtractionError::Format(
                "boot sector is not a plausible NTFS boot sector".into(),
            ));
        }
        Ok(boot_sector)
    }

    fn parse(buffer: &[u8; BOOT_SECTOR_SIZE]) -> Result<Self> {
        let mut cursor = Cursor::new(&buffer[..]);

        let mut jump = [0u8; 3];
        cursor.read_exact(&mut jump).map_err(layout_error)?;

        let mut oem_id = [0u8; 8];
        cursor.read_exact(&mut oem_id).map_err(layout_error)?;

        let bytes_per_sector = cursor.read_u16::<LittleEndian>().map_err(layout_error)?;
        let sectors_per_cluster = cursor.read_u8().map_err(layout_error)?;
        let reserved_sectors = cursor.read_u16::<LittleEndian>().map_err(layout_error)?;

        // Five bytes that are always zero on NTFS.
        let mut unused = [0u8; 5];
        cursor.read_exact(&mut unused).map_err(layout_error)?;

        let media_descriptor = cursor.read_u8().map_err(layout_error)?;
        cursor.read_u16::<LittleEndian>().map_err(layout_error)?; // always zero
        let sectors_per_track = cursor.read_u16::<LittleEndian>().map_err(layout_error)?;
        let number_of_heads = cursor.read_u16::<LittleEndian>().map_err(layout_error)?;
        let hidden_sectors = cursor.read_u32::<LittleEndian>().map_err(layout_error)?;

        let mut unused = [0u8; 8];
        cursor.read_exact(&mut unused).map_err(layout_error)?;

        let total_sectors = cursor.read_u64::<LittleEndian>().map_err(layout_error)?;
        let mft_cluster = cursor.read_u64::<LittleEndian>().map_err(layout_error)?;
        let mft_mirror_cluster = cursor.read_u64::<LittleEndian>().map_err(layout_error)?;
        let clusters_per_file_record = cursor.read_i8().map_err(layout_error)?;
        let clusters_per_index_buffer = cursor.read_i8().map_err(layout_error)?;

        let mut volume_serial = [0u8; 8];
        cursor.read_exact(&mut volume_serial).map_err(layout_error)?;

        let checksum = cursor.read_u32::<LittleEndian>().map_err(layout_error)?;

        Ok(Self {
            jump,
            oem_id,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            media_descriptor,
            sectors_per_track,
            number_of_heads,
            hidden_sectors,
            total_sectors,
            mft_cluster,
            mft_mirror_cluster,
            clusters_per_file_record,
            clusters_per_index_buffer,
            volume_serial,
            checksum,
        })
    }

    fn is_valid(&self) -> bool {
        self.oem_id == NTFS_OEM_ID && self.bytes_per_sector >= 512 && self.sectors_per_cluster > 0
    }

    pub fn geometry(&self) -> VolumeGeometry {
        VolumeGeometry {
            bytes_per_sector: self.bytes_per_sector,
            sectors_per_cluster: self.sectors_per_cluster,
            mft_cluster: self.mft_cluster,
        }
    }
}

fn layout_error(error: io::Error) -> ExtractionError {
    ExtractionError::Format(format!("boot sector layout: {error}"))
}
