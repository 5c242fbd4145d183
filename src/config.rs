use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::extraction::{CorrelatorSettings, ExtractionError, ExtractorSettings};
use crate::pipeline::validation::ValidationSettings;

/// Application-level constants
pub const APP_NAME: &str = "Planscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "planscan=info,warn"
}

/// Get the application data directory
/// ~/Planscan/ on all platforms. Falls back to the working directory
/// when no home directory can be resolved (containers, CI).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default directory for validation reports.
pub fn reports_dir() -> PathBuf {
    app_data_dir().join("reports")
}

/// All pipeline tunables in one place.
///
/// Every field has a literal default; a JSON file may override any subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub extractor: ExtractorSettings,
    pub correlator: CorrelatorSettings,
    pub validation: ValidationSettings,
}

impl PipelineSettings {
    /// Load settings from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractionError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            ExtractionError::Config(format!("{}: {e}", path.display()))
        })
    }
}
