use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use counter_util::{CounterReply, SharedCounter, COUNTER_PATH};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Body served once a scripted stub has no steps left.
pub const EXHAUSTED_BODY: &str = "script exhausted";

/// One scripted reply: wait `delay`, then answer 200 with `body`.
#[derive(Debug, Clone)]
pub struct Step {
    pub delay: Duration,
    pub body: String,
}

impl Step {
    #[must_use]
    pub fn counter(data: i64) -> Self {
        Self::raw(format!("{{\"data\":{data}}}"))
    }

    #[must_use]
    pub fn raw(body: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Every call increments a shared counter and answers the new value.
    Counting { start: i64 },
    /// Calls are answered by the steps in call order, then with 503.
    Scripted(Vec<Step>),
}

struct Script {
    steps: Vec<Step>,
    next: AtomicUsize,
}

impl Script {
    fn next_step(&self) -> Option<&Step> {
        self.steps.get(self.next.fetch_add(1, Ordering::AcqRel))
    }
}

#[must_use]
pub fn router(behaviour: Behaviour) -> Router {
    match behaviour {
        Behaviour::Counting { start } => Router::new()
            .route(COUNTER_PATH, get(add_click))
            .with_state(SharedCounter::new(start)),
        Behaviour::Scripted(steps) => Router::new()
            .route(COUNTER_PATH, get(scripted_click))
            .with_state(Arc::new(Script {
                steps,
                next: AtomicUsize::new(0),
            })),
    }
}

#[inline]
async fn add_click(State(counter): State<SharedCounter>) -> Json<CounterReply> {
    let reply = counter.increment();
    tracing::debug!(counter = reply.data, "click counted");
    Json(reply)
}

async fn scripted_click(State(script): State<Arc<Script>>) -> (StatusCode, String) {
    let Some(step) = script.next_step() else {
        tracing::debug!("script exhausted");
        return (StatusCode::SERVICE_UNAVAILABLE, EXHAUSTED_BODY.to_owned());
    };
    if !step.delay.is_zero() {
        tokio::time::sleep(step.delay).await;
    }
    (StatusCode::OK, step.body.clone())
}

/// Serves `behaviour` on `listener` until the process ends.
///
/// # Errors
/// Fails when the listener cannot accept connections.
pub async fn serve(listener: TcpListener, behaviour: Behaviour) -> anyhow::Result<()> {
    axum::serve(listener, router(behaviour))
        .await
        .context("Stub server failed")
}

pub struct RunningStub {
    /// Full URL of the counter endpoint, e.g. `http://127.0.0.1:41234/api/click-count/add`.
    pub url: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RunningStub {
    /// Stops accepting connections and waits for open ones to finish.
    ///
    /// # Errors
    /// Returns the server's own failure, or a join error if its task panicked.
    pub async fn stop(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(());
        self.handle.await.context("Failed to join stub server task")?
    }
}

/// Binds an ephemeral localhost port and serves `behaviour` on a background task.
///
/// # Errors
/// Fails when the port cannot be bound.
pub async fn spawn_stub(behaviour: Behaviour) -> anyhow::Result<RunningStub> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind stub listener")?;
    let addr = listener
        .local_addr()
        .context("Failed to read stub listener address")?;
    let url = format!("http://{addr}{COUNTER_PATH}");
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let app = router(behaviour);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .context("Stub server failed")
    });
    tracing::debug!(%url, "stub listening");

    Ok(RunningStub {
        url,
        shutdown,
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn raw_get(url: &str) -> (u16, String) {
        let rest = url.trim_start_matches("http://");
        let (addr, path) = rest.split_at(rest.find('/').unwrap());
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        let status = raw[9..12].parse().unwrap();
        let body = raw.split("\r\n\r\n").nth(1).unwrap_or_default().to_owned();
        (status, body)
    }

    #[tokio::test]
    async fn counting_stub_increments_per_call() {
        let stub = spawn_stub(Behaviour::Counting { start: 0 }).await.unwrap();
        for expected in 1..=3 {
            let (status, body) = raw_get(&stub.url).await;
            assert_eq!(status, 200);
            let reply: CounterReply = serde_json::from_str(&body).unwrap();
            assert_eq!(reply.data, expected);
        }
        stub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn scripted_stub_replays_steps_then_refuses() {
        let stub = spawn_stub(Behaviour::Scripted(vec![
            Step::counter(100),
            Step::raw("not json"),
        ]))
        .await
        .unwrap();
        assert_eq!(raw_get(&stub.url).await, (200, "{\"data\":100}".to_owned()));
        assert_eq!(raw_get(&stub.url).await, (200, "not json".to_owned()));
        assert_eq!(raw_get(&stub.url).await, (503, EXHAUSTED_BODY.to_owned()));
        stub.stop().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let stub = spawn_stub(Behaviour::Counting { start: 0 }).await.unwrap();
        let other = stub.url.replace(COUNTER_PATH, "/nope");
        let (status, _) = raw_get(&other).await;
        assert_eq!(status, 404);
        stub.stop().await.unwrap();
    }
}
