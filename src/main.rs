use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use planscan::config::{self, PipelineSettings};
use planscan::pipeline::extraction::summary::render_summary;
use planscan::pipeline::validation::{
    documents_from_dir, report, BatchEvent, BatchRunner, GroundTruthSet, PlanPipeline,
    ValidationEngine,
};

#[derive(Parser)]
#[command(name = "planscan")]
#[command(version, about = "Structured data extraction from OCR'd construction plans")]
struct Cli {
    /// JSON settings file; missing keys keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a record from a .txt (OCR text) or .json (region list) file
    Extract {
        file: PathBuf,
        /// Also capture cm measures, floor markers and the original text
        #[arg(short, long)]
        detailed: bool,
    },
    /// Print a human-readable summary of a plan file
    Summary { file: PathBuf },
    /// Validate every document in a directory against ground truth
    Validate {
        docs_dir: PathBuf,
        ground_truth: PathBuf,
        /// Report directory (defaults to ~/Planscan/reports)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    planscan::init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => PipelineSettings::from_json_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PipelineSettings::default(),
    };

    match cli.command {
        Commands::Extract { file, detailed } => {
            let pipeline = PlanPipeline::new(&settings).with_detailed(detailed);
            let record = pipeline.process_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Summary { file } => {
            let pipeline = PlanPipeline::new(&settings);
            let record = pipeline.process_file(&file)?;
            print!("{}", render_summary(&record));
        }
        Commands::Validate {
            docs_dir,
            ground_truth,
            out,
        } => {
            let out = out.unwrap_or_else(config::reports_dir);
            run_validation(&settings, &docs_dir, &ground_truth, &out)?;
        }
    }

    Ok(())
}

fn run_validation(
    settings: &PipelineSettings,
    docs_dir: &Path,
    ground_truth: &Path,
    out: &Path,
) -> Result<()> {
    let labels = GroundTruthSet::load(ground_truth)?;
    let documents = documents_from_dir(docs_dir)
        .with_context(|| format!("listing documents in {}", docs_dir.display()))?;

    let runner = BatchRunner::new(Box::new(PlanPipeline::new(settings).with_detailed(true)));
    let mut engine = ValidationEngine::new(settings.validation.clone());

    let progress = |event: BatchEvent| match event {
        BatchEvent::Started { document_count } => {
            tracing::info!(document_count, "Validation started");
        }
        BatchEvent::Progress {
            completed,
            total,
            document_id,
        } => {
            tracing::info!(completed, total, document_id = %document_id, "Processing");
        }
        BatchEvent::Completed { .. } => {}
    };
    let batch = runner.run(&documents, &labels, &mut engine, Some(&progress));

    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let stem = format!("validation_{}", batch.generated_at.format("%Y%m%d_%H%M%S"));
    let files = [
        (out.join(format!("{stem}.json")), report::to_json(&batch)?),
        (out.join(format!("{stem}.csv")), report::to_csv(&batch)),
        (out.join(format!("{stem}.md")), report::to_markdown(&batch)),
    ];
    for (path, contents) in &files {
        std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    }

    println!(
        "{} documents: {} succeeded, {} failed ({} ms)",
        batch.summary.total,
        batch.summary.succeeded,
        batch.summary.failed,
        batch.summary.total_time_ms
    );
    for (category, metrics) in &batch.metrics.categories {
        println!("  {:<15} {:>6.1}%", category.as_str(), metrics.accuracy);
    }
    for (path, _) in &files {
        println!("Wrote {}", path.display());
    }

    Ok(())
}
