//! Field scoring: exact match for scalars, precision / recall / F1 for sets.
//!
//! A field is scored only when the expected value is present. An empty
//! expected list counts as unlabeled.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use super::types::{
    Category, CategoryResult, CategoryResults, ComparableRecord, FieldOutcome, ValidationSettings,
};
use crate::pipeline::extraction::patterns::{has_ordinal, room_base};
use crate::pipeline::extraction::PlanType;

const F1_EPSILON: f64 = 1e-9;

/// Precision, recall and F1 of `extracted` against `expected`.
///
/// Each is 0 when its denominator is empty.
pub fn set_similarity(extracted: &BTreeSet<String>, expected: &BTreeSet<String>) -> (f64, f64, f64) {
    let hits = extracted.intersection(expected).count();
    let precision = if extracted.is_empty() {
        0.0
    } else {
        hits as f64 / extracted.len() as f64
    };
    let recall = if expected.is_empty() {
        0.0
    } else {
        hits as f64 / expected.len() as f64
    };
    // 2PR/(P+R) reduces to 2|∩|/(|E|+|G|), which avoids rounding drift.
    let f1 = if hits == 0 {
        0.0
    } else {
        2.0 * hits as f64 / (extracted.len() + expected.len()) as f64
    };
    (precision, recall, f1)
}

/// Upper-cased, trimmed member set.
pub fn normalize_set(items: &[String]) -> BTreeSet<String> {
    items
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn score_set(extracted: Option<&[String]>, expected: &[String], threshold: f64) -> FieldOutcome {
    let extracted = normalize_set(extracted.unwrap_or_default());
    let expected = normalize_set(expected);
    set_outcome(extracted, expected, threshold)
}

/// Like [`score_set`] for room names. A numbered room ("QUARTO 1") counts
/// as its bare token when the label only lists the token.
pub fn score_room_set(
    extracted: Option<&[String]>,
    expected: &[String],
    threshold: f64,
) -> FieldOutcome {
    let expected = normalize_set(expected);
    let extracted = normalize_set(extracted.unwrap_or_default())
        .into_iter()
        .map(|name| {
            let base = room_base(&name);
            if has_ordinal(&name) && !expected.contains(&name) && expected.contains(base) {
                base.to_string()
            } else {
                name
            }
        })
        .collect();
    set_outcome(extracted, expected, threshold)
}

fn set_outcome(extracted: BTreeSet<String>, expected: BTreeSet<String>, threshold: f64) -> FieldOutcome {
    let (precision, recall, f1) = set_similarity(&extracted, &expected);
    FieldOutcome::Set {
        matched: f1 + F1_EPSILON >= threshold,
        precision,
        recall,
        f1,
        missing: expected.difference(&extracted).cloned().collect(),
        extra: extracted.difference(&expected).cloned().collect(),
    }
}

pub fn score_text(extracted: Option<&str>, expected: &str) -> FieldOutcome {
    let matched = extracted
        .map(|e| e.trim().to_lowercase() == expected.trim().to_lowercase())
        .unwrap_or(false);
    exact(matched, json!(extracted), json!(expected))
}

/// Numbers match when equal after rounding to two decimals.
pub fn score_number(extracted: Option<f64>, expected: f64) -> FieldOutcome {
    let matched = extracted
        .map(|e| round_cents(e) == round_cents(expected))
        .unwrap_or(false);
    exact(matched, json!(extracted), json!(expected))
}

/// Free-form labels (angles, unit conversions) match on JSON equality.
pub fn score_value(extracted: Option<&Value>, expected: &Value) -> FieldOutcome {
    exact(extracted == Some(expected), json!(extracted), expected.clone())
}

pub fn score_count(extracted: Option<u32>, expected: u32) -> FieldOutcome {
    exact(extracted == Some(expected), json!(extracted), json!(expected))
}

pub fn score_plan_type(extracted: Option<PlanType>, expected: PlanType) -> FieldOutcome {
    exact(
        extracted == Some(expected),
        json!(extracted.map(|t| t.as_str())),
        json!(expected.as_str()),
    )
}

/// Dimension lists match as multisets of rounded `[width, length]` pairs.
pub fn score_dimensions(extracted: Option<&[[f64; 2]]>, expected: &[[f64; 2]]) -> FieldOutcome {
    let matched = extracted
        .map(|e| sorted_pairs(e) == sorted_pairs(expected))
        .unwrap_or(false);
    exact(matched, json!(extracted), json!(expected))
}

/// Score every category. Categories with nothing labeled come back with
/// `scored == 0`.
pub fn score_categories(
    extracted: &ComparableRecord,
    expected: &ComparableRecord,
    settings: &ValidationSettings,
) -> CategoryResults {
    let mut results = CategoryResults::new();
    for category in Category::all() {
        results.insert(category, CategoryResult::default());
    }

    if let Some(geometry) = results.get_mut(&Category::Geometry) {
        let (ext, exp) = (&extracted.geometry, &expected.geometry);
        if let Some(shape) = &exp.shape {
            geometry.push("shape", score_text(ext.shape.as_deref(), shape));
        }
        if let Some(area) = exp.area {
            geometry.push("area", score_number(ext.area, area));
        }
        if let Some(perimeter) = exp.perimeter {
            geometry.push("perimeter", score_number(ext.perimeter, perimeter));
        }
        if let Some(dims) = labeled(&exp.dimensions) {
            geometry.push("dimensions", score_dimensions(ext.dimensions.as_deref(), dims));
        }
        if let Some(angles) = &exp.angles {
            geometry.push("angles", score_value(ext.angles.as_ref(), angles));
        }
        if let Some(conversions) = &exp.conversions {
            geometry.push("conversions", score_value(ext.conversions.as_ref(), conversions));
        }
    }

    if let Some(classification) = results.get_mut(&Category::Classification) {
        let (ext, exp) = (&extracted.classification, &expected.classification);
        if let Some(plan_type) = exp.plan_type {
            classification.push("plan_type", score_plan_type(ext.plan_type, plan_type));
        }
        if let Some(category) = &exp.category {
            classification.push("category", score_text(ext.category.as_deref(), category));
        }
        if let Some(subcategory) = &exp.subcategory {
            classification.push("subcategory", score_text(ext.subcategory.as_deref(), subcategory));
        }
        if let Some(usage) = &exp.usage {
            classification.push("usage", score_text(ext.usage.as_deref(), usage));
        }
        if let Some(floors) = exp.floors {
            classification.push("floors", score_count(ext.floors, floors));
        }
    }

    let threshold = settings.f1_match_threshold;

    if let Some(functionality) = results.get_mut(&Category::Functionality) {
        let (ext, exp) = (&extracted.functionality, &expected.functionality);
        if let Some(rooms) = labeled(&exp.rooms) {
            functionality.push("rooms", score_room_set(ext.rooms.as_deref(), rooms, threshold));
        }
        if let Some(features) = labeled(&exp.features) {
            functionality.push("features", score_set(ext.features.as_deref(), features, threshold));
        }
    }

    if let Some(environments) = results.get_mut(&Category::Environments) {
        if let Some(expected_names) = labeled(&expected.environments) {
            environments.push(
                "environments",
                score_room_set(extracted.environments.as_deref(), expected_names, threshold),
            );
        }
    }

    results
}

fn labeled<T>(list: &Option<Vec<T>>) -> Option<&[T]> {
    list.as_deref().filter(|items| !items.is_empty())
}

fn exact(matched: bool, extracted: Value, expected: Value) -> FieldOutcome {
    FieldOutcome::Exact {
        matched,
        extracted,
        expected,
    }
}

fn round_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

fn sorted_pairs(pairs: &[[f64; 2]]) -> Vec<(i64, i64)> {
    let mut out: Vec<(i64, i64)> = pairs
        .iter()
        .map(|[w, l]| (round_cents(*w), round_cents(*l)))
        .collect();
    out.sort_unstable();
    out
}
