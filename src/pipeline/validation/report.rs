//! Batch report rendering: JSON, CSV and Markdown.

use std::fmt::Write;

use super::types::{BatchReport, Category, FieldOutcome, ValidationStatus};
use super::ValidationError;

pub fn to_json(report: &BatchReport) -> Result<String, ValidationError> {
    serde_json::to_string_pretty(report).map_err(|e| ValidationError::Report(e.to_string()))
}

/// One row per document with per-category accuracy.
pub fn to_csv(report: &BatchReport) -> String {
    let mut out = String::from("document_id,status,processing_time_ms,degraded");
    for category in Category::all() {
        let _ = write!(out, ",{category}_accuracy");
    }
    out.push_str(",error_message\n");

    for result in &report.results {
        let _ = write!(
            out,
            "{},{},{},{}",
            csv_field(&result.document_id),
            result.status.as_str(),
            result.processing_time_ms,
            result.degraded
        );
        for category in Category::all() {
            match result.categories.get(&category) {
                Some(c) if c.scored > 0 => {
                    let _ = write!(out, ",{:.1}", c.accuracy);
                }
                _ => out.push(','),
            }
        }
        let _ = writeln!(
            out,
            ",{}",
            csv_field(result.error_message.as_deref().unwrap_or(""))
        );
    }
    out
}

pub fn to_markdown(report: &BatchReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    let _ = writeln!(out, "# Validation report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Run: `{}`", report.run_id);
    let _ = writeln!(out, "- Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "- Documents: {}", summary.total);
    let _ = writeln!(out, "- Succeeded: {}", summary.succeeded);
    let _ = writeln!(out, "- Failed: {}", summary.failed);
    if summary.degraded > 0 {
        let _ = writeln!(out, "- Degraded (placeholder rooms): {}", summary.degraded);
    }
    let _ = writeln!(out, "- Total time: {} ms", summary.total_time_ms);

    let _ = writeln!(out);
    let _ = writeln!(out, "## Metrics");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Category | Matches | Mismatches | Accuracy |");
    let _ = writeln!(out, "|---|---:|---:|---:|");
    for category in Category::all() {
        let m = report.metrics.get(category);
        let _ = writeln!(
            out,
            "| {category} | {} | {} | {:.1}% |",
            m.matches, m.mismatches, m.accuracy
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Documents");
    for result in &report.results {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "### {} ({}, {} ms)",
            result.document_id,
            result.status.as_str(),
            result.processing_time_ms
        );
        if result.status == ValidationStatus::Error {
            let _ = writeln!(
                out,
                "- Error: {}",
                result.error_message.as_deref().unwrap_or("unknown")
            );
            continue;
        }
        for (category, scored) in &result.categories {
            for (field, outcome) in &scored.fields {
                let _ = writeln!(out, "- {category}.{field}: {}", describe(outcome));
            }
        }
    }
    out
}

fn describe(outcome: &FieldOutcome) -> String {
    match outcome {
        FieldOutcome::Exact {
            matched: true,
            expected,
            ..
        } => format!("ok ({expected})"),
        FieldOutcome::Exact {
            matched: false,
            extracted,
            expected,
        } => format!("expected {expected}, got {extracted}"),
        FieldOutcome::Set {
            matched,
            f1,
            missing,
            extra,
            ..
        } => {
            let mut text = format!("{} (F1 {:.2})", if *matched { "ok" } else { "mismatch" }, f1);
            if !missing.is_empty() {
                let _ = write!(text, ", missing {}", missing.join(", "));
            }
            if !extra.is_empty() {
                let _ = write!(text, ", extra {}", extra.join(", "));
            }
            text
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
