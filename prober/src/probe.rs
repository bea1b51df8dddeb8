use std::future::Future;
use std::io::Write;
use std::num::NonZeroU64;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;

use crate::client::CounterSource;
use crate::config::{max_label, ProbeConfig};
use crate::error::RequestError;
use crate::shutdown::Shutdown;

/// One successful request: when it was issued and the counter it got back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the UNIX epoch.
    pub timestamp: f64,
    pub counter: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// In the order completions were observed, not issuance order.
    pub samples: Vec<Sample>,
    pub started_at: f64,
    pub finished_at: f64,
    pub issued: u64,
    pub failed: u64,
    /// In-flight requests dropped by a forced shutdown.
    pub abandoned: u64,
    pub max_requests: Option<NonZeroU64>,
}

struct Completion {
    index: u64,
    timestamp: f64,
    result: Result<i64, RequestError>,
}

/// Loop-local bookkeeping for completed requests.
struct Recorder<W> {
    out: W,
    max_label: String,
    samples: Vec<Sample>,
    last_counter: Option<i64>,
    failed: u64,
}

impl<W: Write> Recorder<W> {
    fn new(out: W, max_label: String) -> Self {
        Self {
            out,
            max_label,
            samples: Vec::new(),
            last_counter: None,
            failed: 0,
        }
    }

    fn record(&mut self, completion: Completion) -> anyhow::Result<()> {
        let number = completion.index.saturating_add(1);
        match completion.result {
            Ok(counter) => {
                let delta = format_delta(self.last_counter, counter);
                writeln!(
                    self.out,
                    "Request {number}/{} - Time: {:.3}, Counter = {counter} ({delta})",
                    self.max_label, completion.timestamp
                )
                .context("Failed to write request line")?;
                self.last_counter = Some(counter);
                self.samples.push(Sample {
                    timestamp: completion.timestamp,
                    counter,
                });
            }
            Err(err) => {
                self.failed = self.failed.saturating_add(1);
                let detail = format!("{:#}", anyhow::Error::from(err));
                tracing::debug!(request = number, error = %detail, "request dropped");
                writeln!(self.out, "Request {number}/{} failed: {detail}", self.max_label)
                    .context("Failed to write request line")?;
            }
        }
        Ok(())
    }
}

/// `?` for the first counter, otherwise the signed difference with a `+` on increases.
#[must_use]
pub fn format_delta(previous: Option<i64>, counter: i64) -> String {
    let Some(previous) = previous else {
        return "?".to_owned();
    };
    let delta = i128::from(counter) - i128::from(previous);
    if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

/// Issues one request per poll window until `shutdown` is requested or the
/// request budget is spent, then drains whatever is still in flight.
///
/// A request line is written to `out` for every completion. Requests run
/// concurrently on the calling task; nothing is spawned.
///
/// # Errors
/// Only fails when writing to `out` fails. Request failures are recorded, not returned.
pub async fn run<S, W>(
    config: &ProbeConfig,
    source: S,
    mut shutdown: Shutdown,
    out: W,
) -> anyhow::Result<RunReport>
where
    S: CounterSource,
    W: Write,
{
    let mut recorder = Recorder::new(out, max_label(config.max_requests));
    let mut pending = FuturesUnordered::new();
    let mut issued: u64 = 0;
    let started_at = epoch_seconds();
    tracing::info!(url = %config.url, interval = ?config.check_interval, max = %recorder.max_label, "probe started");

    while !shutdown.is_requested() && !budget_spent(config.max_requests, issued) {
        let index = issued;
        issued = issued.saturating_add(1);
        let timestamp = epoch_seconds();
        let source = source.clone();
        pending.push(async move {
            let result = source.fetch_counter().await;
            Completion {
                index,
                timestamp,
                result,
            }
        });

        let deadline = Instant::now() + config.check_interval;
        while let Ok(Some(completion)) = tokio::time::timeout_at(deadline, pending.next()).await {
            recorder.record(completion)?;
        }
        tracing::trace!(in_flight = pending.len(), issued, "poll window closed");
        // Instant sources never hit a timer, so hand the signal listener a turn.
        tokio::task::yield_now().await;
    }

    let abandoned = drain(&mut pending, &mut shutdown, &mut recorder).await?;
    let finished_at = epoch_seconds();
    tracing::info!(
        issued,
        samples = recorder.samples.len(),
        failed = recorder.failed,
        abandoned,
        "probe finished"
    );

    Ok(RunReport {
        samples: recorder.samples,
        started_at,
        finished_at,
        issued,
        failed: recorder.failed,
        abandoned,
        max_requests: config.max_requests,
    })
}

fn budget_spent(max_requests: Option<NonZeroU64>, issued: u64) -> bool {
    max_requests.is_some_and(|max| issued >= max.get())
}

/// Waits for every pending request unless shutdown gets forced, in which case
/// the rest are dropped and their count returned.
async fn drain<F, W>(
    pending: &mut FuturesUnordered<F>,
    shutdown: &mut Shutdown,
    recorder: &mut Recorder<W>,
) -> anyhow::Result<u64>
where
    F: Future<Output = Completion>,
    W: Write,
{
    if !pending.is_empty() {
        tracing::info!(in_flight = pending.len(), "draining in-flight requests");
    }
    loop {
        tokio::select! {
            biased;
            next = pending.next() => match next {
                Some(completion) => recorder.record(completion)?,
                None => return Ok(0),
            },
            () = shutdown.forced() => {
                let abandoned = u64::try_from(pending.len()).unwrap_or(u64::MAX);
                pending.clear();
                tracing::warn!(abandoned, "shutdown forced");
                writeln!(recorder.out, "Forced shutdown: abandoned {abandoned} pending requests")
                    .context("Failed to write shutdown line")?;
                return Ok(abandoned);
            }
        }
    }
}
