//! BatchRunner: runs extraction and scoring over a document batch.
//!
//! Sequential, one document at a time. A failing or panicking document is
//! recorded as an error and the batch moves on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use super::engine::ValidationEngine;
use super::ground_truth::GroundTruthSet;
use super::types::{BatchReport, CategoryResults};
use super::ValidationError;
use crate::config::PipelineSettings;
use crate::pipeline::extraction::{
    CorrelationResult, EntityExtractor, ExtractedRecord, ExtractionError, RegionCorrelator,
    TextRegion, TypeClassifier,
};

/// File extensions picked up by `documents_from_dir`.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "json"];

/// What the processor receives for one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentInput {
    /// Linear OCR text.
    Text(String),
    /// OCR regions in reading order.
    Regions(Vec<TextRegion>),
    /// `.txt` (linear text) or `.json` (region list) on disk, read lazily so
    /// a bad file fails only its own document.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchDocument {
    pub id: String,
    pub input: DocumentInput,
}

impl BatchDocument {
    pub fn text(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            input: DocumentInput::Text(text.to_string()),
        }
    }

    pub fn regions(id: &str, regions: Vec<TextRegion>) -> Self {
        Self {
            id: id.to_string(),
            input: DocumentInput::Regions(regions),
        }
    }
}

/// Turns one document into an extracted record.
pub trait DocumentProcessor {
    fn process(&self, document: &BatchDocument) -> Result<ExtractedRecord, ExtractionError>;
}

/// Record plus the correlation that fed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionExtraction {
    pub record: ExtractedRecord,
    pub correlation: CorrelationResult,
}

/// Classifier → extractor, with region correlation for region inputs.
#[derive(Debug, Clone, Default)]
pub struct PlanPipeline {
    classifier: TypeClassifier,
    extractor: EntityExtractor,
    correlator: RegionCorrelator,
    detailed: bool,
}

impl PlanPipeline {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            classifier: TypeClassifier::new(&settings.extractor),
            extractor: EntityExtractor::new(settings.extractor.clone()),
            correlator: RegionCorrelator::new(settings.correlator.clone(), &settings.extractor),
            detailed: false,
        }
    }

    /// Populate `detailed_info` on every record.
    pub fn with_detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn process_text(&self, text: &str) -> ExtractedRecord {
        let plan_type = self.classifier.classify(text);
        self.extractor.extract(text, plan_type, self.detailed)
    }

    pub fn process_regions(&self, regions: &[TextRegion]) -> RegionExtraction {
        let text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let plan_type = self.classifier.classify(&text);
        let correlation = self.correlator.correlate(regions);
        let record = self
            .extractor
            .extract_correlated(&text, plan_type, self.detailed, &correlation);
        RegionExtraction { record, correlation }
    }

    pub fn process_file(&self, path: &Path) -> Result<ExtractedRecord, ExtractionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => {
                let text = std::fs::read_to_string(path)?;
                Ok(self.process_text(&text))
            }
            "json" => {
                let raw = std::fs::read_to_string(path)?;
                let regions: Vec<TextRegion> = serde_json::from_str(&raw)
                    .map_err(|e| ExtractionError::RegionParsing(format!("{}: {e}", path.display())))?;
                Ok(self.process_regions(&regions).record)
            }
            _ => Err(ExtractionError::UnsupportedInput(path.display().to_string())),
        }
    }
}

impl DocumentProcessor for PlanPipeline {
    fn process(&self, document: &BatchDocument) -> Result<ExtractedRecord, ExtractionError> {
        match &document.input {
            DocumentInput::Text(text) => Ok(self.process_text(text)),
            DocumentInput::Regions(regions) => Ok(self.process_regions(regions).record),
            DocumentInput::File(path) => self.process_file(path),
        }
    }
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { document_count: usize },
    Progress { completed: usize, total: usize, document_id: String },
    Completed { succeeded: usize, failed: usize, duration_ms: u64 },
}

/// Drives a processor over a batch and feeds a `ValidationEngine`.
pub struct BatchRunner {
    processor: Box<dyn DocumentProcessor>,
}

impl BatchRunner {
    pub fn new(processor: Box<dyn DocumentProcessor>) -> Self {
        Self { processor }
    }

    /// Process, score and collect every document, then finalize.
    pub fn run(
        &self,
        documents: &[BatchDocument],
        ground_truth: &GroundTruthSet,
        engine: &mut ValidationEngine,
        progress_fn: Option<&dyn Fn(BatchEvent)>,
    ) -> BatchReport {
        let start = Instant::now();
        let total = documents.len();

        if let Some(progress) = progress_fn {
            progress(BatchEvent::Started {
                document_count: total,
            });
        }

        for (i, document) in documents.iter().enumerate() {
            if let Some(progress) = progress_fn {
                progress(BatchEvent::Progress {
                    completed: i,
                    total,
                    document_id: document.id.clone(),
                });
            }

            let doc_start = Instant::now();
            match self.validate_document(document, ground_truth, engine) {
                Ok((categories, degraded)) => {
                    engine.collect_success(&document.id, categories, degraded, doc_start.elapsed());
                }
                Err(e) => {
                    engine.collect_error(&document.id, &e.to_string(), doc_start.elapsed());
                }
            }
        }

        let report = engine.report(start.elapsed());
        tracing::info!(
            total = report.summary.total,
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            duration_ms = report.summary.total_time_ms,
            "Validation batch complete"
        );

        if let Some(progress) = progress_fn {
            progress(BatchEvent::Completed {
                succeeded: report.summary.succeeded,
                failed: report.summary.failed,
                duration_ms: report.summary.total_time_ms,
            });
        }

        report
    }

    fn validate_document(
        &self,
        document: &BatchDocument,
        ground_truth: &GroundTruthSet,
        engine: &ValidationEngine,
    ) -> Result<(CategoryResults, bool), ValidationError> {
        let record = catch_unwind(AssertUnwindSafe(|| self.processor.process(document)))
            .map_err(|payload| ValidationError::Panicked(panic_message(payload.as_ref())))??;

        let expected = ground_truth.get(&document.id)?;
        let categories = engine.score(&record, &expected);
        Ok((categories, record.is_degraded()))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Every supported file under `dir`, recursively, sorted by path. The
/// document id is the file name.
pub fn documents_from_dir(dir: &Path) -> Result<Vec<BatchDocument>, ValidationError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_supported(&path) {
                files.push(path);
            }
        }
    }
    files.sort();

    Ok(files
        .into_iter()
        .map(|path| BatchDocument {
            id: relative_id(dir, &path),
            input: DocumentInput::File(path),
        })
        .collect())
}

/// `/`-separated path below `dir`, so same-named files in different
/// subdirectories stay distinct.
fn relative_id(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
