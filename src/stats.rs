use crate::model::Sample;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const HIST_BINS: usize = 30;

/// Aggregate statistics over one result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub n: usize,
    pub mean_latency_s: f64,
    pub p50_s: f64,
    pub p90_s: f64,
    pub p95_s: f64,
    pub p99_s: f64,
    pub success_rate: f64,
}

/// Parses every non-blank line of a result log.
pub fn read_records(path: &Path) -> Result<Vec<Sample>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read result log {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: Sample = serde_json::from_str(line).with_context(|| {
            format!("malformed record on line {} of {}", idx + 1, path.display())
        })?;
        records.push(sample);
    }
    Ok(records)
}

/// Percentile with linear interpolation between the two nearest ranks of an
/// ascending-sorted slice. Empty input yields 0; a `p` outside 0..=100 clamps
/// to the nearest extreme.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let rank = (p / 100.0) * last as f64;
    let lo = (rank.floor() as usize).min(last);
    let hi = (rank.ceil() as usize).min(last);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Summarizes a batch of records; `None` when there are none. Success means
/// HTTP 200, so transport failures (status 0) count against the rate.
pub fn summarize(records: &[Sample]) -> Option<Summary> {
    if records.is_empty() {
        return None;
    }
    let mut latencies: Vec<f64> = records.iter().map(|r| r.latency_s).collect();
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = records.len();
    let successes = records.iter().filter(|r| r.status == 200).count();
    Some(Summary {
        n,
        mean_latency_s: latencies.iter().sum::<f64>() / n as f64,
        p50_s: percentile(&latencies, 50.0),
        p90_s: percentile(&latencies, 90.0),
        p95_s: percentile(&latencies, 95.0),
        p99_s: percentile(&latencies, 99.0),
        success_rate: successes as f64 / n as f64,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistBucket {
    pub lower_s: f64,
    pub upper_s: f64,
    pub count: usize,
}

/// Equal-width latency histogram. The last bin's upper edge is inclusive;
/// a degenerate input where every value is equal collapses to one bucket.
pub fn histogram(latencies: &[f64], bins: usize) -> Vec<HistBucket> {
    if latencies.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = latencies.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = latencies.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![HistBucket {
            lower_s: min,
            upper_s: max,
            count: latencies.len(),
        }];
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in latencies {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistBucket {
            lower_s: min + width * i as f64,
            upper_s: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Renders buckets as fixed-width text bars, one line per bucket.
pub fn render_histogram(buckets: &[HistBucket]) -> String {
    let peak = buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    let mut out = String::from("latency_s distribution\n");
    for bucket in buckets {
        let bar = "#".repeat(bucket.count * 40 / peak);
        let _ = writeln!(
            out,
            "{:>10.4} .. {:>10.4}  {:<40} {}",
            bucket.lower_s, bucket.upper_s, bar, bucket.count
        );
    }
    out
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Flat CSV export of the log, with `raw` serialized as JSON in the last
/// column and quoted per RFC 4180.
pub fn write_csv(records: &[Sample], path: &Path) -> Result<()> {
    let mut out = String::from("ts,latency_s,status,prompt_chars,response_chars,raw\n");
    for record in records {
        let raw = serde_json::to_string(&record.raw).context("failed to serialize raw column")?;
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            record.ts,
            record.latency_s,
            record.status,
            record.prompt_chars,
            record.response_chars,
            csv_field(&raw)
        );
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(latency_s: f64, status: u16) -> Sample {
        Sample {
            ts: 1_700_000_000.0 + latency_s,
            latency_s,
            status,
            prompt_chars: 12,
            response_chars: 34,
            raw: json!({"choices": [{"message": {"content": "ok"}}]}),
        }
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&sorted, 90.0) - 3.7).abs() < 1e-12);
        assert!((percentile(&sorted, 99.0) - 3.97).abs() < 1e-12);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
    }

    #[test]
    fn percentile_of_degenerate_inputs() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.5], 99.0), 7.5);
    }

    #[test]
    fn percentile_clamps_out_of_range_p() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 101.0), 4.0);
        assert_eq!(percentile(&sorted, 150.0), 4.0);
        assert_eq!(percentile(&sorted, -50.0), 1.0);
    }

    #[test]
    fn summarize_known_batch() {
        let records = vec![
            sample(0.4, 200),
            sample(0.1, 200),
            sample(0.3, 500),
            sample(0.2, 0),
        ];
        let summary = summarize(&records).unwrap();
        assert_eq!(summary.n, 4);
        assert!((summary.mean_latency_s - 0.25).abs() < 1e-12);
        assert!((summary.p50_s - 0.25).abs() < 1e-12);
        assert!((summary.success_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn summarize_is_idempotent_over_the_same_records() {
        let records: Vec<Sample> = (0..50)
            .map(|i| sample(0.01 * i as f64, if i % 5 == 0 { 500 } else { 200 }))
            .collect();
        let first = summarize(&records).unwrap();
        let second = summarize(&records).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn summarize_empty_is_none() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn histogram_partitions_every_value() {
        let latencies: Vec<f64> = (0..90).map(|i| 0.01 * i as f64).collect();
        let buckets = histogram(&latencies, HIST_BINS);
        assert_eq!(buckets.len(), HIST_BINS);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 90);
        assert_eq!(buckets[0].lower_s, 0.0);
        assert!((buckets[HIST_BINS - 1].upper_s - 0.89).abs() < 1e-9);
    }

    #[test]
    fn histogram_of_identical_values_is_one_bucket() {
        let buckets = histogram(&[0.5, 0.5, 0.5], HIST_BINS);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 3);
    }

    #[test]
    fn render_histogram_emits_one_line_per_bucket() {
        let buckets = histogram(&[0.1, 0.2, 0.2, 0.9], 4);
        let rendered = render_histogram(&buckets);
        assert_eq!(rendered.lines().count(), 1 + buckets.len());
        assert!(rendered.contains('#'));
    }

    #[test]
    fn csv_field_quotes_per_rfc_4180() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn write_csv_emits_header_and_quoted_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        write_csv(&[sample(0.25, 200)], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("ts,latency_s,status,prompt_chars,response_chars,raw")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1700000000.25,0.25,200,12,34,\"{\"\"choices\"\""));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn read_records_skips_blank_lines_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let line = serde_json::to_string(&sample(0.5, 200)).unwrap();
        std::fs::write(&path, format!("{line}\n\n{line}\n")).unwrap();
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);

        std::fs::write(&path, "not json\n").unwrap();
        assert!(read_records(&path).is_err());
    }
}
