use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::scoring::score_categories;
use super::types::*;
use crate::pipeline::extraction::ExtractedRecord;

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    matches: u64,
    mismatches: u64,
}

/// Scores documents against ground truth and accumulates per-category
/// counters over a batch.
///
/// Two-phase: `collect_*` accumulate, `finalize` computes percentages.
/// Counters are private; `finalize` is the only way to read them.
#[derive(Debug, Default)]
pub struct ValidationEngine {
    settings: ValidationSettings,
    counters: BTreeMap<Category, Counter>,
    results: Vec<ValidationResult>,
}

impl ValidationEngine {
    pub fn new(settings: ValidationSettings) -> Self {
        Self {
            settings,
            counters: BTreeMap::new(),
            results: Vec::new(),
        }
    }

    /// Pure scoring of one extraction against its ground truth.
    pub fn score(&self, extracted: &ExtractedRecord, expected: &GroundTruthRecord) -> CategoryResults {
        self.score_comparable(&ComparableRecord::from(extracted), expected)
    }

    pub fn score_comparable(
        &self,
        extracted: &ComparableRecord,
        expected: &GroundTruthRecord,
    ) -> CategoryResults {
        score_categories(extracted, expected, &self.settings)
    }

    /// Record a fully scored document and fold it into the counters.
    /// Categories with nothing scored leave the counters untouched.
    pub fn collect_success(
        &mut self,
        document_id: &str,
        categories: CategoryResults,
        degraded: bool,
        elapsed: Duration,
    ) -> &ValidationResult {
        for (category, result) in &categories {
            if result.scored == 0 {
                continue;
            }
            let counter = self.counters.entry(*category).or_default();
            counter.matches += u64::from(result.matches);
            counter.mismatches += u64::from(result.mismatches());
        }

        tracing::debug!(
            document_id,
            elapsed_ms = elapsed.as_millis() as u64,
            degraded,
            "Document scored"
        );

        self.push(ValidationResult {
            document_id: document_id.to_string(),
            status: ValidationStatus::Success,
            categories,
            processing_time_ms: elapsed.as_millis() as u64,
            error_message: None,
            degraded,
            timestamp: Utc::now(),
        })
    }

    /// Record a document whose extraction or comparison failed. Counters are
    /// not touched.
    pub fn collect_error(&mut self, document_id: &str, message: &str, elapsed: Duration) -> &ValidationResult {
        tracing::warn!(document_id, error = message, "Document failed validation");

        self.push(ValidationResult {
            document_id: document_id.to_string(),
            status: ValidationStatus::Error,
            categories: CategoryResults::new(),
            processing_time_ms: elapsed.as_millis() as u64,
            error_message: Some(message.to_string()),
            degraded: false,
            timestamp: Utc::now(),
        })
    }

    /// Per-category metrics. Idempotent; every category is present, with
    /// 0% accuracy when nothing was scored.
    pub fn finalize(&self) -> AggregateMetrics {
        let categories = Category::all()
            .into_iter()
            .map(|category| {
                let counter = self.counters.get(&category).copied().unwrap_or_default();
                let metrics = CategoryMetrics {
                    matches: counter.matches,
                    mismatches: counter.mismatches,
                    accuracy: percent(counter.matches, counter.matches + counter.mismatches),
                };
                (category, metrics)
            })
            .collect();
        AggregateMetrics { categories }
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Finalize and package everything collected so far.
    pub fn report(&self, total_elapsed: Duration) -> BatchReport {
        let succeeded = self
            .results
            .iter()
            .filter(|r| r.status == ValidationStatus::Success)
            .count();
        let degraded = self.results.iter().filter(|r| r.degraded).count();

        BatchReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            summary: BatchSummary {
                total: self.results.len(),
                succeeded,
                failed: self.results.len() - succeeded,
                degraded,
                total_time_ms: total_elapsed.as_millis() as u64,
            },
            metrics: self.finalize(),
            results: self.results.clone(),
        }
    }

    fn push(&mut self, result: ValidationResult) -> &ValidationResult {
        let index = self.results.len();
        self.results.push(result);
        &self.results[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{EntityExtractor, PlanType};

    fn ground_truth(value: serde_json::Value) -> GroundTruthRecord {
        serde_json::from_value(value).unwrap()
    }

    fn extract(text: &str) -> ExtractedRecord {
        EntityExtractor::default().extract(text, PlanType::Architectural, false)
    }

    #[test]
    fn fresh_engine_finalizes_to_zero() {
        let engine = ValidationEngine::default();
        let metrics = engine.finalize();
        assert_eq!(metrics.categories.len(), 4);
        for category in Category::all() {
            let m = metrics.get(category);
            assert_eq!(m.matches, 0);
            assert_eq!(m.mismatches, 0);
            assert_eq!(m.accuracy, 0.0);
        }
    }

    #[test]
    fn score_uses_projection() {
        let engine = ValidationEngine::default();
        let results = engine.score(
            &extract("SALA 12,5 M2 QUARTO 3,20X2,80"),
            &ground_truth(serde_json::json!({
                "environments": ["SALA", "QUARTO", "COZINHA"],
                "geometry": {"area": 12.5}
            })),
        );
        assert!(results[&Category::Environments].fields["environments"].is_match());
        assert!(results[&Category::Geometry].fields["area"].is_match());
    }

    #[test]
    fn counters_accumulate_across_documents() {
        let mut engine = ValidationEngine::default();
        let expected = ground_truth(serde_json::json!({
            "classification": {"plan_type": "architectural", "category": "residencial"}
        }));

        for id in ["a.txt", "b.txt"] {
            let categories = engine.score(&extract("SALA QUARTO"), &expected);
            engine.collect_success(id, categories, false, Duration::from_millis(3));
        }

        let metrics = engine.finalize();
        let classification = metrics.get(Category::Classification);
        assert_eq!(classification.matches, 2);
        assert_eq!(classification.mismatches, 2);
        assert_eq!(classification.accuracy, 50.0);
        assert_eq!(metrics.get(Category::Geometry).accuracy, 0.0);
    }

    #[test]
    fn errors_do_not_touch_counters() {
        let mut engine = ValidationEngine::default();
        let result = engine.collect_error("bad.txt", "boom", Duration::from_millis(1));
        assert_eq!(result.status, ValidationStatus::Error);
        assert_eq!(result.error_message.as_deref(), Some("boom"));

        let metrics = engine.finalize();
        assert!(Category::all().iter().all(|c| metrics.get(*c).matches == 0));
        assert_eq!(engine.results().len(), 1);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut engine = ValidationEngine::default();
        let expected = ground_truth(serde_json::json!({"environments": ["SALA"]}));
        let categories = engine.score(&extract("SALA"), &expected);
        engine.collect_success("a.txt", categories, false, Duration::ZERO);

        let first = engine.finalize();
        let second = engine.finalize();
        assert_eq!(first, second);
        assert_eq!(first.get(Category::Environments).accuracy, 100.0);
    }

    #[test]
    fn report_summarizes_statuses() {
        let mut engine = ValidationEngine::default();
        engine.collect_success("a.txt", CategoryResults::new(), true, Duration::from_millis(5));
        engine.collect_error("b.txt", "boom", Duration::from_millis(1));

        let report = engine.report(Duration::from_millis(10));
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.degraded, 1);
        assert_eq!(report.summary.total_time_ms, 10);
        assert_eq!(report.results[0].document_id, "a.txt");
    }
}
