pub mod config;
pub mod pipeline;

pub use pipeline::extraction::{
    classify, EntityExtractor, ExtractedRecord, ExtractionError, PlanType, RegionCorrelator,
    TypeClassifier,
};
pub use pipeline::validation::{BatchRunner, PlanPipeline, ValidationEngine, ValidationError};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable. Calling it twice is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);
}
