use std::fmt;

use crate::config::max_label;
use crate::error::AnalysisError;
use crate::probe::{RunReport, Sample};

/// Mean, extremes and median of the gaps between consecutive samples, in seconds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IntervalStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl IntervalStats {
    /// Gaps are taken in collection order, so they can be negative when
    /// requests complete out of issuance order.
    #[must_use]
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let intervals: Vec<f64> = samples
            .windows(2)
            .map(|pair| pair[1].timestamp - pair[0].timestamp)
            .collect();
        Self::from_intervals(&intervals)
    }

    /// `None` for an empty slice.
    #[must_use]
    pub fn from_intervals(intervals: &[f64]) -> Option<Self> {
        if intervals.is_empty() {
            return None;
        }
        let len = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / len;
        let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = intervals.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            mean,
            min,
            max,
            median,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub duration_secs: f64,
    pub samples: usize,
    pub max_label: String,
    pub failed: u64,
    pub abandoned: u64,
    pub samples_per_sec: f64,
    /// First observed counter minus one, taken as the value before the run.
    pub starting_counter: i128,
    pub final_counter: i64,
    /// Widened like the per-request deltas, so counter resets at the i64
    /// edges print the literal difference.
    pub total_increase: i128,
    /// Counter increase per collected sample, in percent.
    ///
    /// 100% means every successful request lined up with exactly one
    /// increment on the server. It is not an HTTP or retry success rate:
    /// failed requests do not lower it, and increments made by other clients
    /// during the run push it above 100%.
    pub success_rate: f64,
    /// `None` with fewer than two samples.
    pub intervals: Option<IntervalStats>,
}

impl Analysis {
    /// # Errors
    /// Returns [`AnalysisError::NoSamples`] when no request succeeded.
    pub fn from_report(report: &RunReport) -> Result<Self, AnalysisError> {
        let (Some(first), Some(last)) = (report.samples.first(), report.samples.last()) else {
            return Err(AnalysisError::NoSamples);
        };
        let samples = report.samples.len();
        let duration_secs = report.finished_at - report.started_at;
        let samples_per_sec = if duration_secs > 0.0 {
            samples as f64 / duration_secs
        } else {
            0.0
        };
        let starting_counter = i128::from(first.counter) - 1;
        let final_counter = last.counter;
        let total_increase = i128::from(final_counter) - starting_counter;

        Ok(Self {
            duration_secs,
            samples,
            max_label: max_label(report.max_requests),
            failed: report.failed,
            abandoned: report.abandoned,
            samples_per_sec,
            starting_counter,
            final_counter,
            total_increase,
            success_rate: total_increase as f64 / samples as f64 * 100.0,
            intervals: IntervalStats::from_samples(&report.samples),
        })
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== ANALYSIS ===")?;

        writeln!(f, "\n1. Overall Statistics:")?;
        writeln!(f, "Total time: {:.2} seconds", self.duration_secs)?;
        writeln!(f, "Successful requests: {}/{}", self.samples, self.max_label)?;
        writeln!(f, "Failed requests: {}", self.failed)?;
        if self.abandoned > 0 {
            writeln!(f, "Abandoned requests: {}", self.abandoned)?;
        }
        writeln!(f, "Average requests per second: {:.2}", self.samples_per_sec)?;

        writeln!(f, "\n2. Counter Progress:")?;
        writeln!(f, "Starting counter: {}", self.starting_counter)?;
        writeln!(f, "Final counter: {}", self.final_counter)?;
        writeln!(f, "Total increase: {}", self.total_increase)?;
        writeln!(f, "Success rate: {:.1}%", self.success_rate)?;

        writeln!(f, "\n3. Time Intervals Between Requests:")?;
        match &self.intervals {
            Some(stats) => {
                writeln!(f, "Average interval: {:.3}s", stats.mean)?;
                writeln!(f, "Min interval: {:.3}s", stats.min)?;
                writeln!(f, "Max interval: {:.3}s", stats.max)?;
                writeln!(f, "Median interval: {:.3}s", stats.median)?;
            }
            None => writeln!(f, "Intervals: n/a (need at least two samples)")?,
        }

        writeln!(f, "\n4. Counter Increase Patterns:")?;
        writeln!(f, "Successful increases: {}", self.samples)?;
        if let Some(stats) = &self.intervals {
            writeln!(f, "Average time between increases: {:.3}s", stats.mean)?;
            writeln!(f, "Min time between increases: {:.3}s", stats.min)?;
            write!(f, "Max time between increases: {:.3}s", stats.max)?;
        } else {
            write!(f, "Time between increases: n/a (need at least two samples)")?;
        }
        Ok(())
    }
}
