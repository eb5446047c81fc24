use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::worker::{Attempted, Outcome};

/// Success and failure counts, owned and updated by the runner alone.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub success: u64,
    pub failed: u64,
}

impl Tally {
    #[inline]
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Failure => self.failed += 1,
        }
    }

    /// Workers that have reported, whatever their outcome.
    #[inline]
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.success + self.failed
    }
}

/// Round trip of successful attempts, in microseconds.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub min_us: Option<u64>,
    pub max_us: Option<u64>,
    #[serde(skip)]
    total_us: u64,
    pub samples: u64,
}

impl LatencyStats {
    pub fn update(&mut self, rtt: Duration) {
        let cur = u64::try_from(rtt.as_micros()).unwrap_or(u64::MAX);
        self.min_us = Some(self.min_us.map_or(cur, |min| min.min(cur)));
        self.max_us = Some(self.max_us.map_or(cur, |max| max.max(cur)));
        self.total_us = self.total_us.saturating_add(cur);
        self.samples += 1;
    }

    #[must_use]
    pub fn mean_us(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.total_us as f64 / self.samples as f64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: &'static str,
    #[serde(flatten)]
    pub tally: Tally,
    /// HTTP attempts actually completed, retries included.
    pub attempts: u64,
    /// Size of every batch launched, in order.
    pub batches: Vec<usize>,
    pub latency: LatencyStats,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
}

impl RunSummary {
    #[must_use]
    pub fn new(mode: &'static str) -> Self {
        Self {
            mode,
            tally: Tally::default(),
            attempts: 0,
            batches: Vec::new(),
            latency: LatencyStats::default(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn record(&mut self, report: &Attempted) {
        self.tally.record(report.outcome);
        self.attempts += u64::from(report.attempts);
        if let Some(rtt) = report.latency {
            self.latency.update(rtt);
        }
    }

    #[must_use]
    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

fn as_secs_f64<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results ({}):", self.mode)?;
        writeln!(f, "    successful      = {}", self.tally.success)?;
        writeln!(f, "    failed          = {}", self.tally.failed)?;
        writeln!(f, "    attempts        = {}", self.attempts)?;
        writeln!(f, "    batches         = {}", self.batches.len())?;
        writeln!(
            f,
            "    elapsed         = {:.2}s ({:.1} req/s)",
            self.elapsed.as_secs_f64(),
            self.requests_per_sec()
        )?;
        match (self.latency.min_us, self.latency.mean_us(), self.latency.max_us) {
            (Some(min), Some(mean), Some(max)) => write!(
                f,
                "    rtt my s [min, mean, max] = [{min}, {mean:.2}, {max}]"
            ),
            _ => write!(f, "    rtt my s [min, mean, max] = [-, -, -]"),
        }
    }
}
