use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::extraction::patterns::{is_amenity, room_base};
use crate::pipeline::extraction::{ExtractedRecord, PlanType};

// ═══════════════════════════════════════════
// Comparable view (ground-truth shape)
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    #[serde(alias = "tipo", skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(alias = "perimetro", skip_serializing_if = "Option::is_none")]
    pub perimeter: Option<f64>,
    /// `[width, length]` pairs in meters.
    #[serde(alias = "dimensoes", skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<[f64; 2]>>,
    #[serde(alias = "angulos", skip_serializing_if = "Option::is_none")]
    pub angles: Option<serde_json::Value>,
    #[serde(alias = "conversoes", skip_serializing_if = "Option::is_none")]
    pub conversions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    #[serde(alias = "tipo_planta", skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<PlanType>,
    #[serde(alias = "categoria", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(alias = "subcategoria", skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(alias = "tipo_uso", skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(alias = "pavimentos", skip_serializing_if = "Option::is_none")]
    pub floors: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Functionality {
    #[serde(alias = "comodos", skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<String>>,
    #[serde(alias = "caracteristicas", skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

/// Record shape shared by ground truth and the projection of an extraction.
///
/// Every field is optional. In ground truth an absent field means "not
/// labeled", never "expected empty", and is not scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparableRecord {
    #[serde(alias = "geometria")]
    pub geometry: Geometry,
    #[serde(alias = "classificacao")]
    pub classification: Classification,
    #[serde(alias = "funcionalidade")]
    pub functionality: Functionality,
    #[serde(alias = "ambientes", skip_serializing_if = "Option::is_none")]
    pub environments: Option<Vec<String>>,
}

/// Hand-labeled expectation for one document.
pub type GroundTruthRecord = ComparableRecord;

impl From<&ExtractedRecord> for ComparableRecord {
    fn from(record: &ExtractedRecord) -> Self {
        let info = record.relevant_info();

        let area = info
            .areas()
            .map(|areas| areas.iter().map(|a| a.value()).sum::<f64>());
        let dimensions: Option<Vec<[f64; 2]>> = info
            .dimensions()
            .map(|dims| dims.iter().map(|d| [d.width.value(), d.length.value()]).collect());

        let names: Option<Vec<String>> = info.room_names().map(|set| set.iter().cloned().collect());
        let (rooms, features) = match info.room_names() {
            Some(set) => {
                let rooms: Vec<String> = set
                    .iter()
                    .filter(|n| !is_amenity(room_base(n)))
                    .cloned()
                    .collect();
                let features: Vec<String> = set
                    .iter()
                    .map(|n| room_base(n))
                    .filter(|n| is_amenity(n))
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                (non_empty(rooms), non_empty(features))
            }
            None => (None, None),
        };

        let floors = record
            .detailed_info()
            .map(|d| d.floor_count())
            .filter(|&n| n > 0)
            .map(|n| n as u32);

        Self {
            geometry: Geometry {
                shape: None,
                area,
                perimeter: None,
                dimensions,
                angles: None,
                conversions: None,
            },
            classification: Classification {
                plan_type: Some(record.plan_type()),
                category: None,
                subcategory: None,
                usage: None,
                floors,
            },
            functionality: Functionality { rooms, features },
            environments: names,
        }
    }
}

fn non_empty(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

// ═══════════════════════════════════════════
// Scoring results
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Geometry,
    Classification,
    Functionality,
    Environments,
}

impl Category {
    pub fn all() -> [Category; 4] {
        [
            Self::Geometry,
            Self::Classification,
            Self::Functionality,
            Self::Environments,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geometry => "geometry",
            Self::Classification => "classification",
            Self::Functionality => "functionality",
            Self::Environments => "environments",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scoring a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldOutcome {
    Exact {
        matched: bool,
        extracted: serde_json::Value,
        expected: serde_json::Value,
    },
    Set {
        matched: bool,
        precision: f64,
        recall: f64,
        f1: f64,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        missing: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        extra: Vec<String>,
    },
}

impl FieldOutcome {
    pub fn is_match(&self) -> bool {
        match self {
            Self::Exact { matched, .. } | Self::Set { matched, .. } => *matched,
        }
    }
}

/// Scored fields of one category for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryResult {
    pub scored: u32,
    pub matches: u32,
    pub fields: BTreeMap<String, FieldOutcome>,
    /// matches / scored × 100, 0 when nothing was scored.
    pub accuracy: f64,
}

impl CategoryResult {
    pub fn push(&mut self, field: &str, outcome: FieldOutcome) {
        self.scored += 1;
        if outcome.is_match() {
            self.matches += 1;
        }
        self.fields.insert(field.to_string(), outcome);
        self.accuracy = percent(self.matches as u64, self.scored as u64);
    }

    pub fn mismatches(&self) -> u32 {
        self.scored - self.matches
    }
}

pub type CategoryResults = BTreeMap<Category, CategoryResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Error,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Outcome for one (document, ground truth) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub document_id: String,
    pub status: ValidationStatus,
    pub categories: CategoryResults,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

// ═══════════════════════════════════════════
// Aggregates
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub matches: u64,
    pub mismatches: u64,
    pub accuracy: f64,
}

/// Per-category totals over a batch, produced by `ValidationEngine::finalize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateMetrics {
    pub categories: BTreeMap<Category, CategoryMetrics>,
}

impl AggregateMetrics {
    pub fn get(&self, category: Category) -> CategoryMetrics {
        self.categories.get(&category).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub degraded: usize,
    pub total_time_ms: u64,
}

/// Everything a validation run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub metrics: AggregateMetrics,
    pub results: Vec<ValidationResult>,
}

/// Tunables for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Set-valued fields match when F1 reaches this.
    pub f1_match_threshold: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            f1_match_threshold: 0.80,
        }
    }
}

/// `part / whole × 100`, 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::EntityExtractor;

    #[test]
    fn ground_truth_accepts_portuguese_keys() {
        let gt: GroundTruthRecord = serde_json::from_value(serde_json::json!({
            "geometria": {"tipo": "retangular", "area": 100},
            "classificacao": {"categoria": "residencial", "pavimentos": 2},
            "funcionalidade": {"comodos": ["sala", "quarto"]},
            "ambientes": ["sala", "cozinha"]
        }))
        .unwrap();
        assert_eq!(gt.geometry.shape.as_deref(), Some("retangular"));
        assert_eq!(gt.geometry.area, Some(100.0));
        assert_eq!(gt.classification.floors, Some(2));
        assert_eq!(gt.functionality.rooms.as_ref().unwrap().len(), 2);
        assert!(gt.functionality.features.is_none());
        assert_eq!(gt.environments.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn partial_ground_truth_leaves_fields_unset() {
        let gt: GroundTruthRecord =
            serde_json::from_value(serde_json::json!({"classification": {"plan_type": "structural"}}))
                .unwrap();
        assert_eq!(gt.classification.plan_type, Some(PlanType::Structural));
        assert_eq!(gt.geometry, Geometry::default());
        assert!(gt.environments.is_none());
    }

    #[test]
    fn projection_splits_rooms_and_amenities() {
        let record = EntityExtractor::default().extract(
            "SALA 20 m2 QUARTO GARAGEM VARANDA 5,5 m2",
            PlanType::Architectural,
            false,
        );
        let comparable = ComparableRecord::from(&record);

        assert_eq!(comparable.geometry.area, Some(25.5));
        assert_eq!(
            comparable.functionality.rooms,
            Some(vec!["QUARTO".to_string(), "SALA".to_string()])
        );
        assert_eq!(
            comparable.functionality.features,
            Some(vec!["GARAGEM".to_string(), "VARANDA".to_string()])
        );
        assert_eq!(comparable.environments.as_ref().unwrap().len(), 4);
        assert_eq!(comparable.classification.plan_type, Some(PlanType::Architectural));
        assert_eq!(comparable.classification.floors, None);
    }

    #[test]
    fn projection_counts_floors_only_in_detailed_mode() {
        let text = "TÉRREO PAVIMENTO 1 PAVIMENTO 1";
        let plain = EntityExtractor::default().extract(text, PlanType::Architectural, false);
        assert_eq!(ComparableRecord::from(&plain).classification.floors, None);

        let detailed = EntityExtractor::default().extract(text, PlanType::Architectural, true);
        assert_eq!(ComparableRecord::from(&detailed).classification.floors, Some(2));
    }

    #[test]
    fn category_result_tracks_accuracy() {
        let mut result = CategoryResult::default();
        let hit = FieldOutcome::Exact {
            matched: true,
            extracted: serde_json::json!(1),
            expected: serde_json::json!(1),
        };
        let miss = FieldOutcome::Exact {
            matched: false,
            extracted: serde_json::Value::Null,
            expected: serde_json::json!(2),
        };
        result.push("a", hit);
        result.push("b", miss);
        assert_eq!(result.scored, 2);
        assert_eq!(result.matches, 1);
        assert_eq!(result.mismatches(), 1);
        assert_eq!(result.accuracy, 50.0);
    }

    #[test]
    fn percent_guards_division_by_zero() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(3, 4), 75.0);
    }

    #[test]
    fn field_outcome_serializes_with_kind_tag() {
        let outcome = FieldOutcome::Set {
            matched: true,
            precision: 1.0,
            recall: 1.0,
            f1: 1.0,
            missing: vec![],
            extra: vec![],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "set");
        assert!(json.get("missing").is_none());
    }
}
