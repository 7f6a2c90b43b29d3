use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

pub const DEFAULT_PROMPT: &str = "Summarize the benefits of unit testing in one paragraph.";

/// Reads one prompt per line, dropping blank lines.
pub fn read_prompts(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open prompts file {}", path.display()))?;
    let mut prompts = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("failed to read prompts file {}", path.display()))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            prompts.push(trimmed.to_string());
        }
    }
    Ok(prompts)
}

/// Repeats `prompts` cyclically, preserving order, until exactly `total`
/// items exist. An empty source falls back to the built-in prompt.
pub fn expand(prompts: Vec<String>, total: usize) -> Vec<String> {
    if prompts.is_empty() {
        return vec![DEFAULT_PROMPT.to_string(); total];
    }
    prompts.iter().cycle().take(total).cloned().collect()
}

/// Builds the run's workload: prompts from the given file when there is one,
/// the built-in prompt otherwise, expanded to the target request count.
pub fn build_workload(prompts_file: Option<&Path>, total: usize) -> Result<Vec<String>> {
    let prompts = match prompts_file {
        Some(path) => {
            let prompts = read_prompts(path)?;
            info!("loaded {} prompts from {}", prompts.len(), path.display());
            prompts
        }
        None => Vec::new(),
    };
    Ok(expand(prompts, total))
}
