//! End-to-end extraction: geometry, record scan, reconstruction, and
//! the output sink, driven once per target file.
//!
//! All logging lives at this boundary; the decoding modules underneath
//! only return structured results.

use crate::boot_sector::BootSector;
use crate::error::{ExtractionError, Result};
use crate::mft::RecordScanner;
use crate::reassembly;
use crate::volume;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One file to pull out of the volume, and where to put it.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub destination: PathBuf,
}

impl Target {
    pub fn new(name: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
        }
    }
}

/// Per-target outcomes of one extraction run.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub saved: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, ExtractionError)>,
}

impl ExtractionReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && !self.saved.is_empty()
    }
}

/// Extracts every target from the volume at `volume_path`.
///
/// Each target gets its own full scan pass over a freshly opened
/// handle; one target's terminal failure does not stop the others.
pub fn extract_all(volume_path: &str, targets: &[Target]) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for target in targets {
        info!(name = %target.name, "scanning volume for target file");
        match extract_target(volume_path, target) {
            Ok(()) => {
                info!(
                    name = %target.name,
                    destination = %target.destination.display(),
                    "file saved"
                );
                report
                    .saved
                    .push((target.name.clone(), target.destination.clone()));
            }
            Err(error) => {
                warn!(name = %target.name, %error, "extraction failed");
                report.failed.push((target.name.clone(), error));
            }
        }
    }

    report
}

fn extract_target(volume_path: &str, target: &Target) -> Result<()> {
    let mut volume = volume::open_volume(volume_path)?;
    let content = extract_file_content(&mut volume, &target.name)?;
    write_output(&target.destination, &content)
}

/// Scans the MFT for `name` and returns the first successfully
/// reconstructed content.
///
/// Matches whose reconstruction fails are absorbed and the scan goes
/// on: the live record of a locked system file often presents an
/// attribute set that cannot be read back, while another record for
/// the same name can. Only exhausting the volume without one usable
/// match fails the target.
pub fn extract_file_content<V>(volume: &mut V, name: &str) -> Result<Vec<u8>>
where
    V: Read + Seek,
{
    volume.seek(SeekFrom::Start(0))?;
    let boot_sector = BootSector::read_from(volume)?;
    let geometry = boot_sector.geometry();
    debug!(
        mft_offset = geometry.mft_byte_offset(),
        bytes_per_cluster = geometry.bytes_per_cluster(),
        "decoded volume geometry"
    );

    let mut scanner = RecordScanner::new(volume, &geometry);
    while let Some(record) = scanner.next_record()? {
        if !record.has_file_name(name) {
            continue;
        }
        match reassembly::assemble_content(&record, &geometry, scanner.volume_mut()) {
            Ok(content) => return Ok(content),
            Err(error) => {
                debug!(%name, %error, "matched record not extractable, continuing scan");
            }
        }
    }

    Err(ExtractionError::NotFound {
        name: name.to_string(),
    })
}

/// Persists reconstructed content, overwriting any existing file.
pub fn write_output(destination: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(destination, content)?;
    Ok(())
}
