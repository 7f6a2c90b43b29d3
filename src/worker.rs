use crate::model::{ChatRequest, Config, Job, Sample};
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Work source shared by the pool. The lock is held only across a single
/// dequeue, never across a request.
pub type Queue = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;

pub async fn worker(
    rank: usize,
    queue: Queue,
    client: Client,
    config: Config,
    records: mpsc::Sender<Sample>,
) -> usize {
    let mut processed = 0usize;
    loop {
        let job = { queue.lock().await.recv().await };
        match job {
            Some(Job::Prompt(prompt)) => {
                let sample = execute(&client, &config, &prompt).await;
                if records.send(sample).await.is_err() {
                    warn!("worker {rank}: record sink closed, stopping early");
                    break;
                }
                processed += 1;
            }
            Some(Job::Stop) | None => break,
        }
    }
    debug!("worker {rank} done after {processed} requests");
    processed
}

/// Issues one chat completion and folds every outcome into a `Sample`.
/// A transport failure, timeouts included, becomes status 0 with the error
/// text under `raw.error`; a completed exchange keeps its HTTP status even
/// when the body is not valid JSON.
pub async fn execute(client: &Client, config: &Config, prompt: &str) -> Sample {
    let url = format!("{}/chat/completions", config.endpoint.trim_end_matches('/'));
    let body = ChatRequest::new(config, prompt);

    let started = Instant::now();
    let (status, raw) = match client.post(&url).json(&body).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            match response.json::<Value>().await {
                Ok(data) => (status, data),
                // exchange completed, only the body was undecodable
                Err(e) => (status, json!({ "error": e.to_string() })),
            }
        }
        Err(e) => (0, json!({ "error": e.to_string() })),
    };
    let latency_s = started.elapsed().as_secs_f64();

    let response_chars = if raw.is_object() {
        serde_json::to_string(&raw).map_or(0, |s| s.chars().count())
    } else {
        0
    };

    Sample {
        ts: Utc::now().timestamp_micros() as f64 / 1e6,
        latency_s,
        status,
        prompt_chars: prompt.chars().count(),
        response_chars,
        raw,
    }
}
