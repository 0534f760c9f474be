pub mod boot_sector;
pub mod error;
pub mod extraction;
pub mod mft;
pub mod reassembly;
pub mod run_list;
pub mod volume;

pub use boot_sector::{BootSector, VolumeGeometry};
pub use error::ExtractionError;
pub use extraction::{ExtractionReport, Target, extract_all};
pub use mft::{Attribute, MftRecord, RecordScanner};
pub use run_list::{RunList, RunListExtent};
