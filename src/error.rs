use std::io;
use thiserror::Error;

/// Errors produced while locating and extracting a target file.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid on-disk format: {0}")]
    Format(String),

    #[error("no volume hosting the operating system was found")]
    NoVolumeFound,

    #[error("matched record yielded no usable content")]
    NotExtractable,

    #[error("no extractable MFT record named {name} in the volume")]
    NotFound { name: String },
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
