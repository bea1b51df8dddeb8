use anyhow::Context;
use counter_util::logging::init_logging;
use prober::analysis::Analysis;
use prober::client::{HttpClient, HttpCounterSource};
use prober::config::ProbeConfig;
use prober::probe::run;
use prober::shutdown::{shutdown_channel, spawn_signal_listener};

fn main() -> anyhow::Result<()> {
    init_logging("PROBER_LOG");
    let config = ProbeConfig::from_env().context("Invalid configuration")?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(run_prober(config))
}

async fn run_prober(config: ProbeConfig) -> anyhow::Result<()> {
    let (trigger, shutdown) = shutdown_channel();
    let _signals = spawn_signal_listener(trigger);

    println!(
        "Starting {} requests against {} (checking every {}s)...",
        config.max_label(),
        config.url,
        config.check_interval.as_secs_f64()
    );
    println!("Press Ctrl+C for graceful shutdown with analysis\n");

    let source = HttpCounterSource::new(HttpClient::new(), config.url.clone());
    let report = run(&config, source, shutdown, std::io::stdout()).await?;

    match Analysis::from_report(&report) {
        Ok(analysis) => println!("{analysis}"),
        Err(err) => println!("\n{err}"),
    }
    Ok(())
}
