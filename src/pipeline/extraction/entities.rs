use std::collections::BTreeSet;

use super::patterns::{
    all_areas, all_cm_measurements, all_dimensions, all_floor_markers, char_window,
    find_area_loose, find_dimension, find_fck, has_ordinal, room_label, same_room, ROOM,
};
use super::regions::CorrelationResult;
use super::types::{
    round2, ConcreteStrength, DetailedInfo, Environment, ExtractedRecord, ExtractorSettings,
    FieldGroup, PlanProfile, PlanType, RelevantInfo,
};

/// Pattern-driven entity extraction over linear OCR text.
///
/// Pure and deterministic: the same text, plan type and mode always produce
/// the same record.
#[derive(Debug, Clone, Default)]
pub struct EntityExtractor {
    settings: ExtractorSettings,
}

impl EntityExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Build the record for `text`. `detailed` additionally captures raw
    /// centimeter measures, floor markers and the verbatim text.
    pub fn extract(&self, text: &str, plan_type: PlanType, detailed: bool) -> ExtractedRecord {
        let relevant_info = self.relevant_info(text, plan_type, &[]);
        let detailed_info = detailed.then(|| self.detailed_info(text));
        ExtractedRecord::new(PlanProfile::for_type(plan_type), relevant_info, detailed_info, false)
    }

    /// Like [`extract`](Self::extract), merging rooms found by region
    /// correlation. Placeholder rooms from a degraded correlation are not
    /// merged; the record is flagged instead.
    pub fn extract_correlated(
        &self,
        text: &str,
        plan_type: PlanType,
        detailed: bool,
        correlation: &CorrelationResult,
    ) -> ExtractedRecord {
        let extra: &[Environment] = if correlation.degraded {
            &[]
        } else {
            &correlation.environments
        };
        let relevant_info = self.relevant_info(text, plan_type, extra);
        let detailed_info = detailed.then(|| self.detailed_info(text));
        ExtractedRecord::new(
            PlanProfile::for_type(plan_type),
            relevant_info,
            detailed_info,
            correlation.degraded,
        )
    }

    /// One `Environment` per room mention, bound to the first area and the
    /// first dimension inside the proximity window.
    ///
    /// Repeated names collapse unless they carry distinct dimensions. A
    /// room followed by an ordinal keeps it ("QUARTO 2"), the same way
    /// region correlation names rooms.
    pub fn environments(&self, text: &str) -> Vec<Environment> {
        let radius = self.settings.proximity_window;
        let mut found: Vec<Environment> = Vec::new();

        for m in ROOM.find_iter(text) {
            let (from, to) = char_window(text, m.start(), m.end(), radius);
            let window = &text[from..to];

            let name = room_label(text, m);
            let dimension = find_dimension(window, self.settings.cm_to_m_threshold);
            let area = find_area_loose(window).map(|a| a.value());

            let env = match dimension {
                Some(dim) => {
                    let (w, l) = dim.as_meters();
                    Environment {
                        name,
                        area: Some(area.unwrap_or_else(|| round2(w * l))),
                        dimensions: Some((w, l)),
                    }
                }
                None => Environment {
                    name,
                    area,
                    dimensions: None,
                },
            };
            merge_environment(&mut found, env);
        }

        found
    }

    fn relevant_info(&self, text: &str, plan_type: PlanType, extra: &[Environment]) -> RelevantInfo {
        let mut info = RelevantInfo::new();

        info.insert(FieldGroup::Areas(all_areas(text)));
        info.insert(FieldGroup::Dimensions(all_dimensions(
            text,
            self.settings.cm_to_m_threshold,
        )));

        let mut environments = self.environments(text);
        for env in extra {
            merge_environment(&mut environments, env.clone());
        }

        let names: BTreeSet<String> = environments.iter().map(|e| e.name.clone()).collect();
        info.insert(FieldGroup::RoomNames(names));

        let measured: Vec<Environment> = environments
            .into_iter()
            .filter(|e| e.area.is_some() || e.dimensions.is_some())
            .collect();
        info.insert(FieldGroup::RoomMeasurements(measured));

        if plan_type == PlanType::Structural {
            if let Some(fck) = find_fck(text) {
                info.insert(FieldGroup::ConcreteStrength(ConcreteStrength::new(fck)));
            }
        }

        info
    }

    fn detailed_info(&self, text: &str) -> DetailedInfo {
        DetailedInfo {
            cm_measurements: all_cm_measurements(text),
            floor_markers: all_floor_markers(text),
            original_text: text.to_string(),
        }
    }
}

/// Insert `env` unless a record of the same room already covers it.
///
/// Same room means equal names, or the same token where one side has no
/// ordinal; the ordinal name wins when two records collapse. A
/// dimension-less mention never adds a record when the room exists; a
/// measured mention fills in a dimension-less record, and only a distinct
/// dimension produces a second record.
fn merge_environment(found: &mut Vec<Environment>, env: Environment) {
    let same: Vec<usize> = found
        .iter()
        .enumerate()
        .filter(|(_, e)| same_room(&e.name, &env.name))
        .map(|(i, _)| i)
        .collect();

    if same.is_empty() {
        found.push(env);
        return;
    }
    if env.dimensions.is_none() {
        if let Some(&i) = same.iter().find(|&&i| found[i].dimensions.is_none()) {
            adopt_ordinal(&mut found[i], &env.name);
        }
        return;
    }
    if let Some(&i) = same.iter().find(|&&i| found[i].dimensions == env.dimensions) {
        adopt_ordinal(&mut found[i], &env.name);
        return;
    }
    if let Some(&i) = same.iter().find(|&&i| found[i].dimensions.is_none()) {
        let previous = std::mem::replace(&mut found[i], env);
        adopt_ordinal(&mut found[i], &previous.name);
        return;
    }
    found.push(env);
}

fn adopt_ordinal(env: &mut Environment, name: &str) {
    if !has_ordinal(&env.name) && has_ordinal(name) {
        env.name = name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::regions::CorrelationStage;
    use crate::pipeline::extraction::types::FieldKey;

    fn extractor() -> EntityExtractor {
        EntityExtractor::default()
    }

    #[test]
    fn sample_text_yields_rooms_areas_and_dimensions() {
        let record = extractor().extract(
            "SALA 12,5 M2 QUARTO 3,20X2,80",
            PlanType::Architectural,
            false,
        );
        let info = record.relevant_info();

        let names: Vec<&str> = info.room_names().unwrap().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["QUARTO", "SALA"]);

        let areas: Vec<&str> = info.areas().unwrap().iter().map(|a| a.as_str()).collect();
        assert_eq!(areas, vec!["12.5"]);

        let dims = info.dimensions().unwrap();
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[0].width.as_str(), "3.20");
        assert_eq!(dims[0].length.as_str(), "2.80");
    }

    #[test]
    fn serialized_record_uses_field_group_keys() {
        let record = extractor().extract(
            "SALA 12,5 M2 QUARTO 3,20X2,80",
            PlanType::Architectural,
            false,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["plan_type"], "architectural");
        assert_eq!(json["relevant_info"]["areas_m2"], serde_json::json!(["12.5"]));
        assert_eq!(
            json["relevant_info"]["dimensions"],
            serde_json::json!([{"width": "3.20", "length": "2.80"}])
        );
        assert_eq!(
            json["relevant_info"]["environments"],
            serde_json::json!(["QUARTO", "SALA"])
        );
        assert!(json.get("detailed_info").is_none());
        assert!(json.get("degraded").is_none());
    }

    #[test]
    fn centimeter_dimensions_become_meters() {
        let record = extractor().extract("350X420", PlanType::Architectural, false);
        let dims = record.relevant_info().dimensions().unwrap();
        assert_eq!(dims[0].as_meters(), (3.5, 4.2));
    }

    #[test]
    fn absent_groups_are_absent_keys() {
        let record = extractor().extract("sem medidas aqui", PlanType::Architectural, false);
        assert!(record.relevant_info().is_empty());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["relevant_info"], serde_json::json!({}));
    }

    #[test]
    fn profile_fields_follow_plan_type() {
        let record = extractor().extract("", PlanType::Electrical, false);
        assert_eq!(record.plan_type(), PlanType::Electrical);
        assert_eq!(record.purpose(), "Distribuir energia elétrica com segurança");
        assert_eq!(record.essential_functions().len(), 3);
    }

    #[test]
    fn extract_is_deterministic() {
        let text = "SALA 4,50x3,80 20 m2\nQUARTO 1 3.5x3.0\nQUARTO 2 300x280\nPAVIMENTO 1 15 cm";
        let a = extractor().extract(text, PlanType::Architectural, true);
        let b = extractor().extract(text, PlanType::Architectural, true);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn detailed_mode_only_when_requested() {
        let text = "TÉRREO parede 15 cm PAVIMENTO 2";
        let plain = extractor().extract(text, PlanType::Architectural, false);
        assert!(plain.detailed_info().is_none());

        let detailed = extractor().extract(text, PlanType::Architectural, true);
        let info = detailed.detailed_info().unwrap();
        assert_eq!(info.cm_measurements, vec!["15"]);
        assert_eq!(info.floor_markers.len(), 2);
        assert_eq!(info.original_text, text);
    }

    #[test]
    fn fck_only_for_structural_plans() {
        let text = "PILAR P1 VIGA V3 FCK 25";
        let structural = extractor().extract(text, PlanType::Structural, false);
        assert_eq!(
            structural.relevant_info().concrete_strength().unwrap().fck_mpa,
            25
        );

        let architectural = extractor().extract(text, PlanType::Architectural, false);
        assert!(!architectural.relevant_info().contains(FieldKey::ConcreteStrength));
    }

    #[test]
    fn proximity_window_binds_only_nearby_values() {
        let filler = "-".repeat(150);
        let text = format!("SALA {filler} 4,00x5,00");
        let envs = extractor().environments(&text);
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].dimensions, None);

        // Still captured globally.
        let record = extractor().extract(&text, PlanType::Architectural, false);
        assert_eq!(record.relevant_info().dimensions().unwrap().len(), 1);
        assert!(!record.relevant_info().contains(FieldKey::RoomMeasurements));
    }

    #[test]
    fn window_size_is_configurable() {
        let text = format!("SALA {} 4,00x5,00", "-".repeat(30));
        let narrow = EntityExtractor::new(ExtractorSettings {
            proximity_window: 10,
            ..Default::default()
        });
        assert_eq!(narrow.environments(&text)[0].dimensions, None);
        assert_eq!(extractor().environments(&text)[0].dimensions, Some((4.0, 5.0)));
    }

    #[test]
    fn environment_binds_explicit_area_and_dimension() {
        let envs = extractor().environments("COZINHA 3,20x2,50 8 METROS QUADRADOS");
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].name, "COZINHA");
        assert_eq!(envs[0].area, Some(8.0));
        assert_eq!(envs[0].dimensions, Some((3.2, 2.5)));
    }

    #[test]
    fn area_is_derived_when_only_dimension_present() {
        let envs = extractor().environments("BANHEIRO 2,00x1,50");
        assert_eq!(envs[0].area, Some(3.0));
    }

    #[test]
    fn repeated_room_collapses_without_distinct_dimensions() {
        let filler = "-".repeat(120);
        let text = format!("SALA 4,00x5,00 {filler} SALA {filler} sala 4,00x5,00");
        let envs = extractor().environments(&text);
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].dimensions, Some((4.0, 5.0)));
    }

    #[test]
    fn repeated_room_with_distinct_dimensions_kept_apart() {
        let filler = "-".repeat(120);
        let text = format!("QUARTO 3,50x3,00 {filler} QUARTO 3,00x2,80");
        let envs = extractor().environments(&text);
        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].dimensions, Some((3.5, 3.0)));
        assert_eq!(envs[1].dimensions, Some((3.0, 2.8)));

        let record = extractor().extract(&text, PlanType::Architectural, false);
        assert_eq!(record.relevant_info().room_names().unwrap().len(), 1);
        assert_eq!(record.relevant_info().room_measurements().unwrap().len(), 2);
    }

    #[test]
    fn correlated_rooms_are_merged() {
        let correlation = CorrelationResult {
            environments: vec![Environment::measured("QUARTO 1", 3.5, 3.0)],
            degraded: false,
            stage: CorrelationStage::Regions,
        };
        let record = extractor().extract_correlated(
            "SALA",
            PlanType::Architectural,
            false,
            &correlation,
        );
        let names = record.relevant_info().room_names().unwrap();
        assert!(names.contains("SALA"));
        assert!(names.contains("QUARTO 1"));
        assert!(!record.is_degraded());
    }

    #[test]
    fn ordinal_is_kept_on_text_rooms() {
        let envs = extractor().environments("QUARTO 1 3,50x3,00 QUARTO 2 3,00x2,80 SALA 12 m2");
        let names: Vec<&str> = envs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["QUARTO 1", "QUARTO 2", "SALA"]);
    }

    #[test]
    fn bare_mention_folds_into_numbered_room() {
        let filler = "-".repeat(120);
        let text = format!("QUARTO {filler} QUARTO 1 3,50x3,00");
        let envs = extractor().environments(&text);
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].name, "QUARTO 1");
        assert_eq!(envs[0].dimensions, Some((3.5, 3.0)));

        let correlation = CorrelationResult {
            environments: vec![Environment::measured("QUARTO 1", 3.5, 3.0)],
            degraded: false,
            stage: CorrelationStage::Regions,
        };
        let record = extractor().extract_correlated(
            "QUARTO 3,50x3,00",
            PlanType::Architectural,
            false,
            &correlation,
        );
        let names: Vec<&str> = record
            .relevant_info()
            .room_names()
            .unwrap()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(names, vec!["QUARTO 1"]);
        assert_eq!(record.relevant_info().room_measurements().unwrap().len(), 1);
    }

    #[test]
    fn placeholder_rooms_never_reach_the_record() {
        let correlation = CorrelationResult {
            environments: vec![Environment::measured("SALA", 4.5, 3.8)],
            degraded: true,
            stage: CorrelationStage::Placeholder,
        };
        let record = extractor().extract_correlated(
            "",
            PlanType::Architectural,
            false,
            &correlation,
        );
        assert!(record.is_degraded());
        assert!(record.relevant_info().is_empty());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["degraded"], true);
    }
}
