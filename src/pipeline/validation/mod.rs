//! Ground-truth validation: score extracted records field by field and
//! aggregate per-category accuracy over a batch.

pub mod types;
pub mod scoring;
pub mod engine;
pub mod ground_truth;
pub mod runner;
pub mod report;

pub use types::*;
pub use engine::ValidationEngine;
pub use ground_truth::GroundTruthSet;
pub use runner::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::extraction::ExtractionError;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ground truth file not found: {0}")]
    GroundTruthNotFound(PathBuf),

    #[error("Ground truth is not a JSON object keyed by document: {0}")]
    GroundTruthFormat(String),

    #[error("Malformed ground truth for {document_id}: {reason}")]
    MalformedGroundTruth { document_id: String, reason: String },

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Processing panicked: {0}")]
    Panicked(String),

    #[error("Report rendering failed: {0}")]
    Report(String),
}

impl ValidationError {
    /// Terminal errors stop the whole batch; everything else is recorded
    /// against one document.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GroundTruthNotFound(_) | Self::GroundTruthFormat(_))
    }
}
