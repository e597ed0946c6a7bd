use super::{DurationPercentiles, GroupStats};
use crate::record::{RequestOutcome, RequestRecord};

/// Running totals for one group of records
#[derive(Debug, Default)]
pub(super) struct GroupAccumulator {
    pub requests: usize,
    pub completed: usize,
    pub failures: usize,
    pub abandoned: usize,
    pub http_errors: usize,
    pub total_bytes: u64,
    pub sized: usize,
    pub durations: Vec<f64>,
}

impl GroupAccumulator {
    pub fn add(&mut self, record: &RequestRecord) {
        self.requests += 1;
        match record.outcome() {
            RequestOutcome::Complete => self.completed += 1,
            RequestOutcome::Failed => self.failures += 1,
            RequestOutcome::Abandoned => self.abandoned += 1,
        }
        if record.is_http_error() {
            self.http_errors += 1;
        }
        if let Some(size) = record.encoded_body_size {
            self.total_bytes += size;
            self.sized += 1;
        }
        if let Some(duration) = record.duration_ms {
            self.durations.push(duration);
        }
    }

    /// Sort collected durations; must run before the order statistics
    pub fn sort(&mut self) {
        self.durations.sort_by(f64::total_cmp);
    }

    pub fn failure_rate(&self) -> Option<f64> {
        ratio(self.failures, self.requests)
    }

    pub fn avg_duration(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        Some(self.durations.iter().sum::<f64>() / self.durations.len() as f64)
    }

    pub fn avg_size(&self) -> Option<f64> {
        if self.sized == 0 {
            return None;
        }
        Some(self.total_bytes as f64 / self.sized as f64)
    }

    pub fn min_duration(&self) -> Option<f64> {
        self.durations.first().copied()
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.durations.last().copied()
    }

    pub fn percentiles(&self) -> Option<DurationPercentiles> {
        Some(DurationPercentiles {
            p50: percentile(&self.durations, 50.0)?,
            p90: percentile(&self.durations, 90.0)?,
            p95: percentile(&self.durations, 95.0)?,
            p99: percentile(&self.durations, 99.0)?,
        })
    }

    pub fn finish(mut self) -> GroupStats {
        self.sort();
        GroupStats {
            requests: self.requests,
            failures: self.failures,
            abandoned: self.abandoned,
            http_errors: self.http_errors,
            failure_rate: self.failure_rate(),
            avg_duration_ms: self.avg_duration(),
            min_duration_ms: self.min_duration(),
            max_duration_ms: self.max_duration(),
            median_duration_ms: median(&self.durations),
            total_bytes: self.total_bytes,
        }
    }
}

fn ratio(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64)
    }
}

/// Median of ascending-sorted values
pub fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Nearest-rank percentile of ascending-sorted values
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[idx])
}
