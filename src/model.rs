use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub model: String,
    pub requests: usize,
    pub concurrency: usize,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// One entry of the shared work queue. A worker that dequeues `Stop` exits;
/// the coordinator enqueues exactly one marker per worker after the prompts.
#[derive(Debug, Clone)]
pub enum Job {
    Prompt(String),
    Stop,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Body of `POST {endpoint}/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(config: &Config, prompt: &str) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_new_tokens,
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
        }
    }
}

/// One benchmarked request, one line of the result log. `status` is the HTTP
/// code of a completed exchange and 0 for any transport failure; `raw` holds
/// the response body or an `{"error": ...}` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub ts: f64,
    pub latency_s: f64,
    pub status: u16,
    pub prompt_chars: usize,
    pub response_chars: usize,
    pub raw: Value,
}
