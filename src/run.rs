use crate::model::{Config, Job};
use crate::{progress, recorder, worker};
use anyhow::{ensure, Context, Result};
use indicatif::ProgressBar;
use reqwest::Client;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Drives one complete run: preloads the shared queue with every prompt
/// followed by one stop marker per worker, spawns the pool, and joins the
/// recorder. Resolves to the number of records on disk, which equals the
/// request count unless the run was cancelled.
///
/// A cancel signal aborts in-flight requests and abandons whatever is still
/// queued, but the records already produced are always flushed first, so the
/// log on disk stays well formed.
pub async fn run(
    config: Config,
    prompts: Vec<String>,
    results_path: &Path,
    pb: ProgressBar,
    mut cancel: broadcast::Receiver<()>,
) -> Result<u64> {
    ensure!(config.concurrency >= 1, "concurrency must be at least 1");

    let total = prompts.len() as u64;
    let completed = Arc::new(AtomicU64::new(0));
    let (records, recorder_handle) =
        recorder::spawn(results_path.to_path_buf(), completed.clone());

    // All prompts go in first, then exactly one stop marker per worker, so
    // every worker sees a stop only after the real work is drained.
    let (tx, rx) = mpsc::unbounded_channel();
    for prompt in prompts {
        tx.send(Job::Prompt(prompt))
            .expect("queue receiver is held until workers spawn");
    }
    for _ in 0..config.concurrency {
        tx.send(Job::Stop)
            .expect("queue receiver is held until workers spawn");
    }
    drop(tx);
    let queue: worker::Queue = Arc::new(Mutex::new(rx));

    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .context("failed to build http client")?;

    let mut pool = JoinSet::new();
    for rank in 0..config.concurrency {
        pool.spawn(worker::worker(
            rank,
            queue.clone(),
            client.clone(),
            config.clone(),
            records.clone(),
        ));
    }
    drop(records);

    let monitor = tokio::spawn(progress::monitor(pb, completed.clone(), total));

    let mut cancelled = false;
    let mut cancel_open = true;
    loop {
        tokio::select! {
            next = pool.join_next() => match next {
                Some(result) => note_worker_exit(result)?,
                None => break,
            },
            result = cancel.recv(), if cancel_open => match result {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    cancelled = true;
                    break;
                }
                // no sender left means cancellation can no longer arrive
                Err(RecvError::Closed) => cancel_open = false,
            },
        }
    }
    if cancelled {
        warn!("cancel requested, abandoning queued work");
        pool.abort_all();
        while let Some(result) = pool.join_next().await {
            note_worker_exit(result)?;
        }
    }

    // Every sender is gone at this point; the recorder drains its buffer,
    // closes the log and reports.
    let written = match recorder_handle.await.context("recorder task panicked")? {
        Ok(written) => written,
        Err(err) => {
            monitor.abort();
            let _ = monitor.await;
            return Err(err);
        }
    };

    if cancelled {
        monitor.abort();
        let _ = monitor.await;
        warn!("run interrupted after {written} of {total} requests");
    } else {
        monitor.await.context("progress monitor panicked")?;
        info!("run complete: {written} records");
    }
    Ok(written)
}

fn note_worker_exit(result: Result<usize, JoinError>) -> Result<()> {
    match result {
        Ok(processed) => {
            debug!("worker exited after {processed} requests");
            Ok(())
        }
        Err(err) if err.is_cancelled() => Ok(()),
        Err(err) => Err(anyhow::Error::new(err).context("worker task failed")),
    }
}
