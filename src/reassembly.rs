//! Reconstruction of a record's complete DATA content.
//!
//! Resident attribute payloads already hold their content; non-resident
//! payloads are run lists naming cluster extents that must be read back
//! from the volume. Content is the concatenation of every DATA
//! attribute's bytes in record order, with extents appended in run-list
//! order.

use crate::boot_sector::VolumeGeometry;
use crate::error::{ExtractionError, Result};
use crate::mft::{Attribute, MftRecord};
use crate::run_list::RunList;
use std::io::{Read, Seek, SeekFrom};

/// Assembles the full byte content of `record`'s DATA attributes.
///
/// An empty result is a failure, not an empty file: live records for
/// in-use system files routinely carry attribute sets that cannot be
/// reconstructed, and the caller is expected to keep scanning for
/// another record with the same name.
pub fn assemble_content<V>(
    record: &MftRecord,
    geometry: &VolumeGeometry,
    volume: &mut V,
) -> Result<Vec<u8>>
where
    V: Read + Seek,
{
    let mut content = Vec::new();

    for attribute in record.data_attributes() {
        if attribute.resident {
            content.extend_from_slice(&attribute.payload);
        } else {
            append_extents(attribute, geometry, volume, &mut content)?;
        }
    }

    if content.is_empty() {
        return Err(ExtractionError::NotExtractable);
    }
    Ok(content)
}

/// Reads every extent of a non-resident attribute and appends it.
///
/// Reads go cluster by cluster so a run list declaring an absurd
/// length fails at end-of-volume instead of sizing a buffer for it.
fn append_extents<V>(
    attribute: &Attribute,
    geometry: &VolumeGeometry,
    volume: &mut V,
    content: &mut Vec<u8>,
) -> Result<()>
where
    V: Read + Seek,
{
    let bytes_per_cluster = geometry.bytes_per_cluster();
    let mut cluster = vec![0u8; bytes_per_cluster as usize];

    for extent in RunList::new(&attribute.payload) {
        let extent = extent?;
        let byte_offset = extent
            .start_cluster
            .checked_mul(bytes_per_cluster)
            .ok_or_else(|| {
                ExtractionError::Format(format!(
                    "extent at cluster {} overflows the byte address space",
                    extent.start_cluster
                ))
            })?;
        volume.seek(SeekFrom::Start(byte_offset))?;

        for _ in 0..extent.cluster_count {
            volume.read_exact(&mut cluster)?;
            content.extend_from_slice(&cluster);
        }
    }
    Ok(())
}
