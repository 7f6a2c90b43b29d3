use hakaru::*;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, default_value = "http://localhost:8000/v1")]
    endpoint: String,

    /// Model name sent with every request (vLLM accepts any label)
    #[arg(long, default_value = "dummy")]
    model: String,

    /// File with one prompt per line; omitted means a built-in prompt
    #[arg(long)]
    prompts_file: Option<PathBuf>,

    /// Total number of requests to issue
    #[arg(short, long, default_value_t = 200)]
    requests: usize,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = 16)]
    concurrency: usize,

    /// Generation budget per request
    #[arg(long, default_value_t = 256)]
    max_new_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout_s: u64,

    /// Output directory for the result log
    #[arg(long, default_value = "runs/vllm_bench")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    ensure!(args.requests >= 1, "requests must be at least 1");
    ensure!(args.concurrency >= 1, "concurrency must be at least 1");

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output directory {}", args.out.display()))?;
    let results_path = args.out.join("results.jsonl");

    let prompts = feed::build_workload(args.prompts_file.as_deref(), args.requests)?;
    let config = model::Config {
        endpoint: args.endpoint,
        model: args.model,
        requests: args.requests,
        concurrency: args.concurrency,
        max_new_tokens: args.max_new_tokens,
        temperature: args.temperature,
        timeout: Duration::from_secs(args.timeout_s),
    };

    info!(
        "benchmarking {} with {} requests at concurrency {}",
        config.endpoint, config.requests, config.concurrency
    );

    let sty = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}",
    )
    .unwrap();
    let pb = ProgressBar::new(prompts.len() as u64);
    pb.set_style(sty);

    let (cancel_tx, cancel_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(());
        }
    });

    let started = Instant::now();
    let written = run::run(config, prompts, &results_path, pb, cancel_rx).await?;
    let elapsed = started.elapsed().as_secs_f64();

    println!(
        "{} {} records in {:.1}s -> {}",
        style("wrote").green().bold(),
        written,
        elapsed,
        results_path.display()
    );
    Ok(())
}
