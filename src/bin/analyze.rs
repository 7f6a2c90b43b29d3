use hakaru::*;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Result log produced by the bench client
    #[arg(long)]
    results: PathBuf,

    /// Output directory for summary artifacts
    #[arg(long, default_value = "runs/vllm_bench")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let records = stats::read_records(&args.results)?;
    let Some(summary) = stats::summarize(&records) else {
        println!("No rows.");
        return Ok(());
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output directory {}", args.out.display()))?;

    let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    let summary_path = args.out.join("summary.json");
    std::fs::write(&summary_path, &json)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    let csv_path = args.out.join("raw.csv");
    stats::write_csv(&records, &csv_path)?;

    let latencies: Vec<f64> = records.iter().map(|r| r.latency_s).collect();
    let rendered = stats::render_histogram(&stats::histogram(&latencies, stats::HIST_BINS));
    let hist_path = args.out.join("latency_hist.txt");
    std::fs::write(&hist_path, rendered)
        .with_context(|| format!("failed to write {}", hist_path.display()))?;

    info!("artifacts written to {}", args.out.display());
    println!("{}", style("summary").cyan().bold());
    println!("{json}");
    Ok(())
}
