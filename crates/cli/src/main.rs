//! prodsplit — split a discovery production PDF into classified segments.
//!
//! Reads the PDF, runs boundary detection and segment processing, and
//! prints the production result as JSON. Progress events go to the log.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use prodsplit_core::{config, Config, ProductionMetadata, ProductionPhase};
use prodsplit_segmentation::{CancelFlag, LogSink, Orchestrator};

/// Split a concatenated discovery production into logical documents.
#[derive(Parser, Debug)]
#[command(name = "prodsplit", version, about)]
struct Cli {
    /// Path to the production PDF.
    pdf: PathBuf,

    /// Production batch identifier, attached to every segment.
    #[arg(long, env = "PRODSPLIT_BATCH_ID")]
    batch_id: Option<String>,

    /// Producing party, attached to every segment.
    #[arg(long)]
    producing_party: Option<String>,

    /// Production date (YYYY-MM-DD).
    #[arg(long)]
    production_date: Option<chrono::NaiveDate>,

    /// Responsiveness tags, repeatable.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Confidentiality designation (e.g. "CONFIDENTIAL - AEO").
    #[arg(long)]
    confidentiality: Option<String>,

    /// Write full segment text into the JSON output.
    #[arg(long, default_value_t = false)]
    include_text: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let metadata = ProductionMetadata {
        batch_id: cli.batch_id,
        producing_party: cli.producing_party,
        production_date: cli.production_date,
        responsiveness_tags: cli.tags,
        confidentiality: cli.confidentiality,
    };

    let bytes = std::fs::read(&cli.pdf)
        .with_context(|| format!("failed to read {}", cli.pdf.display()))?;
    info!(pdf = %cli.pdf.display(), bytes = bytes.len(), "processing production");

    let orchestrator = Orchestrator::from_config(&config)?;
    let mut result = orchestrator
        .process_pdf(bytes, metadata, &LogSink, CancelFlag::new())
        .await?;

    if !cli.include_text {
        for segment in &mut result.segments_found {
            segment.text = None;
            for part in &mut segment.parts {
                part.text.clear();
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.phase == ProductionPhase::Failed {
        anyhow::bail!("production failed; see errors above");
    }
    Ok(())
}
