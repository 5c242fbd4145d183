pub mod types;
pub mod patterns;
pub mod classify;
pub mod entities;
pub mod regions;
pub mod summary;

pub use types::*;
pub use classify::*;
pub use entities::*;
pub use regions::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Region list parsing failed: {0}")]
    RegionParsing(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}
