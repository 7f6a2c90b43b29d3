use crate::model::Sample;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 100;

/// Spawns the single owner of the result log at `path`. The log is recreated
/// from scratch, then every record arriving on the returned sender becomes
/// one flushed JSON line before the shared counter advances. The task
/// resolves to the number of lines written once all senders are dropped, or
/// to the first write error, which is fatal for the whole run.
pub fn spawn(
    path: PathBuf,
    completed: Arc<AtomicU64>,
) -> (mpsc::Sender<Sample>, JoinHandle<Result<u64>>) {
    let (tx, mut rx) = mpsc::channel::<Sample>(CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut file = File::create(&path)
            .await
            .with_context(|| format!("failed to create result log {}", path.display()))?;
        let mut written = 0u64;
        while let Some(sample) = rx.recv().await {
            let mut line = serde_json::to_string(&sample).context("failed to serialize record")?;
            line.push('\n');
            file.write_all(line.as_bytes())
                .await
                .with_context(|| format!("failed to append to result log {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("failed to flush result log {}", path.display()))?;
            written += 1;
            completed.fetch_add(1, Ordering::Relaxed);
        }
        debug!("result log closed with {written} records");
        Ok(written)
    });
    (tx, handle)
}
