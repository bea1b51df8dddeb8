use anyhow::Context;
use counter_util::logging::init_logging;
use stub_server::{serve, Behaviour};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn main() -> anyhow::Result<()> {
    init_logging("STUB_LOG");
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(run_server())
}

async fn run_server() -> anyhow::Result<()> {
    let addr = std::env::var("STUB_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_owned());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, path = counter_util::COUNTER_PATH, "stub counter listening");
    serve(listener, Behaviour::Counting { start: 0 }).await
}
