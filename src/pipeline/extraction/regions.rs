use serde::{Deserialize, Serialize};

use super::patterns::{find_dimension, find_room_label};
use super::types::{CorrelatorSettings, Environment, ExtractorSettings, TextRegion};
use super::ExtractionError;

/// OCR provider seen by the correlator. The crate never links an engine;
/// callers plug one in behind this trait.
pub trait OcrEngine {
    /// Fine-grained pass: one entry per recognized region, in reading order.
    /// A region that failed to decode is an `Err` and is skipped.
    fn recognize_regions(&self, page: &[u8]) -> Vec<Result<TextRegion, ExtractionError>>;

    /// Coarse pass over the whole page, returned as plain text lines.
    fn recognize_page(&self, page: &[u8]) -> Result<String, ExtractionError>;
}

/// Which rung of the fallback ladder produced the rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStage {
    /// Room label and dimension paired within the region list.
    Regions,
    /// Pairs found line by line in the coarse full-page text.
    CoarsePass,
    /// Nothing found; illustrative rooms emitted.
    Placeholder,
    /// Nothing found and placeholders disabled.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub environments: Vec<Environment>,
    pub degraded: bool,
    pub stage: CorrelationStage,
}

/// Illustrative rooms used as last resort. Never real data.
const PLACEHOLDER_ROOMS: &[(&str, f64, f64)] = &[
    ("SALA", 4.5, 3.8),
    ("QUARTO 1", 3.5, 3.0),
    ("QUARTO 2", 3.0, 2.8),
    ("COZINHA", 3.2, 2.5),
    ("BANHEIRO", 2.0, 1.5),
];

/// Pairs room labels with dimensions across discrete OCR regions.
#[derive(Debug, Clone)]
pub struct RegionCorrelator {
    settings: CorrelatorSettings,
    cm_to_m_threshold: f64,
}

impl Default for RegionCorrelator {
    fn default() -> Self {
        Self::new(CorrelatorSettings::default(), &ExtractorSettings::default())
    }
}

impl RegionCorrelator {
    pub fn new(settings: CorrelatorSettings, extractor: &ExtractorSettings) -> Self {
        Self {
            settings,
            cm_to_m_threshold: extractor.cm_to_m_threshold,
        }
    }

    /// Correlate an already-recognized region list. No coarse pass is
    /// available here, so an empty result goes straight to the placeholder
    /// rung.
    pub fn correlate(&self, regions: &[TextRegion]) -> CorrelationResult {
        let environments = self.pair_regions(regions);
        if !environments.is_empty() {
            return found(environments, CorrelationStage::Regions);
        }
        self.fallback()
    }

    /// Run the full ladder against an OCR engine.
    pub fn correlate_page(&self, engine: &dyn OcrEngine, page: &[u8]) -> CorrelationResult {
        let mut regions = Vec::new();
        for (index, region) in engine.recognize_regions(page).into_iter().enumerate() {
            match region {
                Ok(r) => regions.push(r),
                Err(e) => tracing::debug!(index, error = %e, "Skipping unreadable region"),
            }
        }

        let environments = self.pair_regions(&regions);
        if !environments.is_empty() {
            return found(environments, CorrelationStage::Regions);
        }

        match engine.recognize_page(page) {
            Ok(text) => {
                let line_count = text.lines().count();
                if line_count > self.settings.coarse_pass_line_cap {
                    tracing::warn!(
                        line_count,
                        cap = self.settings.coarse_pass_line_cap,
                        "Coarse pass over line cap, skipping"
                    );
                } else {
                    let environments = self.pair_lines(&text);
                    if !environments.is_empty() {
                        tracing::info!(rooms = environments.len(), "Rooms recovered by coarse pass");
                        return found(environments, CorrelationStage::CoarsePass);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Coarse OCR pass failed"),
        }

        self.fallback()
    }

    /// Rungs 1 and 2: own text first, then the next `lookahead` regions.
    fn pair_regions(&self, regions: &[TextRegion]) -> Vec<Environment> {
        let mut environments = Vec::new();
        for (i, region) in regions.iter().enumerate() {
            let Some(name) = find_room_label(&region.text) else {
                continue;
            };
            let dimension = find_dimension(&region.text, self.cm_to_m_threshold).or_else(|| {
                regions
                    .iter()
                    .skip(i + 1)
                    .take(self.settings.lookahead)
                    .find_map(|next| find_dimension(&next.text, self.cm_to_m_threshold))
            });
            if let Some(dim) = dimension {
                let (w, l) = dim.as_meters();
                push_unique(&mut environments, Environment::measured(&name, w, l));
            }
        }
        environments
    }

    /// Rung 3: room token and dimension on the same line.
    fn pair_lines(&self, text: &str) -> Vec<Environment> {
        let mut environments = Vec::new();
        for line in text.lines() {
            let Some(name) = find_room_label(line) else {
                continue;
            };
            if let Some(dim) = find_dimension(line, self.cm_to_m_threshold) {
                let (w, l) = dim.as_meters();
                push_unique(&mut environments, Environment::measured(&name, w, l));
            }
        }
        environments
    }

    /// Rung 4.
    fn fallback(&self) -> CorrelationResult {
        if !self.settings.allow_placeholder {
            tracing::warn!("No rooms correlated; placeholders disabled");
            return CorrelationResult {
                environments: Vec::new(),
                degraded: false,
                stage: CorrelationStage::Empty,
            };
        }
        tracing::warn!(
            rooms = PLACEHOLDER_ROOMS.len(),
            "No rooms correlated; emitting placeholder rooms"
        );
        CorrelationResult {
            environments: placeholder_rooms(),
            degraded: true,
            stage: CorrelationStage::Placeholder,
        }
    }
}

pub fn placeholder_rooms() -> Vec<Environment> {
    PLACEHOLDER_ROOMS
        .iter()
        .map(|&(name, w, l)| Environment::measured(name, w, l))
        .collect()
}

fn found(environments: Vec<Environment>, stage: CorrelationStage) -> CorrelationResult {
    CorrelationResult {
        environments,
        degraded: false,
        stage,
    }
}

fn push_unique(environments: &mut Vec<Environment>, env: Environment) {
    if !environments.contains(&env) {
        environments.push(env);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::pipeline::extraction::types::BoundingBox;

    fn region(text: &str) -> TextRegion {
        TextRegion::new(text, BoundingBox::default())
    }

    fn correlator() -> RegionCorrelator {
        RegionCorrelator::default()
    }

    /// Scripted engine: fixed regions, fixed coarse text, counts coarse calls.
    struct MockOcrEngine {
        regions: Vec<Result<TextRegion, String>>,
        page_text: Result<String, String>,
        coarse_calls: Cell<usize>,
    }

    impl MockOcrEngine {
        fn new(regions: Vec<Result<TextRegion, String>>, page_text: Result<&str, &str>) -> Self {
            Self {
                regions,
                page_text: page_text.map(str::to_string).map_err(str::to_string),
                coarse_calls: Cell::new(0),
            }
        }
    }

    impl OcrEngine for MockOcrEngine {
        fn recognize_regions(&self, _page: &[u8]) -> Vec<Result<TextRegion, ExtractionError>> {
            self.regions
                .iter()
                .map(|r| r.clone().map_err(ExtractionError::OcrProcessing))
                .collect()
        }

        fn recognize_page(&self, _page: &[u8]) -> Result<String, ExtractionError> {
            self.coarse_calls.set(self.coarse_calls.get() + 1);
            self.page_text.clone().map_err(ExtractionError::OcrProcessing)
        }
    }

    #[test]
    fn dimension_in_own_region() {
        let result = correlator().correlate(&[region("SALA 4,50x3,80")]);
        assert_eq!(result.stage, CorrelationStage::Regions);
        assert!(!result.degraded);
        assert_eq!(result.environments, vec![Environment::measured("SALA", 4.5, 3.8)]);
    }

    #[test]
    fn dimension_in_following_region() {
        let result = correlator().correlate(&[
            region("QUARTO 1"),
            region("janela"),
            region("3,50 x 3,00"),
        ]);
        assert_eq!(result.environments.len(), 1);
        assert_eq!(result.environments[0].name, "QUARTO 1");
        assert_eq!(result.environments[0].dimensions, Some((3.5, 3.0)));
        assert_eq!(result.environments[0].area, Some(10.5));
    }

    #[test]
    fn lookahead_is_bounded() {
        let result = correlator().correlate(&[
            region("COZINHA"),
            region("a"),
            region("b"),
            region("3,20x2,50"),
        ]);
        assert!(result.degraded);
        assert_eq!(result.stage, CorrelationStage::Placeholder);
    }

    #[test]
    fn centimeter_regions_are_normalized() {
        let result = correlator().correlate(&[region("BANHEIRO"), region("200X150")]);
        assert_eq!(result.environments[0].dimensions, Some((2.0, 1.5)));
        assert_eq!(result.environments[0].area, Some(3.0));
    }

    #[test]
    fn empty_region_list_yields_flagged_placeholders() {
        let result = correlator().correlate(&[]);
        assert!(result.degraded);
        assert_eq!(result.stage, CorrelationStage::Placeholder);
        let names: Vec<&str> = result.environments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["SALA", "QUARTO 1", "QUARTO 2", "COZINHA", "BANHEIRO"]);
        assert_eq!(result.environments[0].area, Some(17.1));
    }

    #[test]
    fn placeholders_can_be_disabled() {
        let strict = RegionCorrelator::new(
            CorrelatorSettings {
                allow_placeholder: false,
                ..Default::default()
            },
            &ExtractorSettings::default(),
        );
        let result = strict.correlate(&[]);
        assert!(result.environments.is_empty());
        assert!(!result.degraded);
        assert_eq!(result.stage, CorrelationStage::Empty);
    }

    #[test]
    fn failed_region_is_skipped() {
        let engine = MockOcrEngine::new(
            vec![
                Ok(region("SALA")),
                Err("garbled".to_string()),
                Ok(region("4,00x5,00")),
            ],
            Ok(""),
        );
        let result = correlator().correlate_page(&engine, b"page");
        assert_eq!(result.stage, CorrelationStage::Regions);
        assert_eq!(result.environments[0].dimensions, Some((4.0, 5.0)));
        assert_eq!(engine.coarse_calls.get(), 0);
    }

    #[test]
    fn coarse_pass_when_regions_pair_nothing() {
        let engine = MockOcrEngine::new(
            vec![Ok(region("SALA")), Ok(region("sem cota"))],
            Ok("PLANTA BAIXA\nSALA 4,50x3,80\nCOZINHA 3,20x2,50\nescala 1:50"),
        );
        let result = correlator().correlate_page(&engine, b"page");
        assert_eq!(result.stage, CorrelationStage::CoarsePass);
        assert!(!result.degraded);
        assert_eq!(result.environments.len(), 2);
        assert_eq!(engine.coarse_calls.get(), 1);
    }

    #[test]
    fn coarse_pass_over_line_cap_goes_to_placeholder() {
        let text = format!("{}SALA 4,50x3,80", "linha\n".repeat(10));
        let engine = MockOcrEngine::new(vec![], Ok(text.as_str()));
        let capped = RegionCorrelator::new(
            CorrelatorSettings {
                coarse_pass_line_cap: 5,
                ..Default::default()
            },
            &ExtractorSettings::default(),
        );
        let result = capped.correlate_page(&engine, b"page");
        assert_eq!(result.stage, CorrelationStage::Placeholder);
        assert!(result.degraded);
    }

    #[test]
    fn coarse_pass_failure_goes_to_placeholder() {
        let engine = MockOcrEngine::new(vec![], Err("engine crashed"));
        let result = correlator().correlate_page(&engine, b"page");
        assert!(result.degraded);
    }
}
