use super::types::{ExtractorSettings, PlanProfile, PlanType, PLAN_PROFILES};

/// Keyword-frequency plan classifier.
///
/// Walks `PLAN_PROFILES` in order and returns the first type whose distinct
/// keyword hits reach the threshold. Never fails: falls back to
/// `PlanType::Architectural`.
#[derive(Debug, Clone)]
pub struct TypeClassifier {
    threshold: usize,
}

impl Default for TypeClassifier {
    fn default() -> Self {
        Self::new(&ExtractorSettings::default())
    }
}

impl TypeClassifier {
    pub fn new(settings: &ExtractorSettings) -> Self {
        Self {
            threshold: settings.keyword_threshold.max(1),
        }
    }

    pub fn classify(&self, text: &str) -> PlanType {
        let upper = text.to_uppercase();
        PLAN_PROFILES
            .iter()
            .find(|profile| keyword_hits(&upper, profile) >= self.threshold)
            .map(|profile| profile.plan_type)
            .unwrap_or_default()
    }

    /// Distinct keyword hits per profile, in priority order.
    pub fn scores(&self, text: &str) -> Vec<(PlanType, usize)> {
        let upper = text.to_uppercase();
        PLAN_PROFILES
            .iter()
            .map(|profile| (profile.plan_type, keyword_hits(&upper, profile)))
            .collect()
    }
}

/// Classify with default settings.
pub fn classify(text: &str) -> PlanType {
    TypeClassifier::default().classify(text)
}

fn keyword_hits(upper_text: &str, profile: &PlanProfile) -> usize {
    profile
        .keywords
        .iter()
        .filter(|kw| upper_text.contains(*kw))
        .count()
}
