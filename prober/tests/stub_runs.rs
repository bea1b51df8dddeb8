use std::num::NonZeroU64;
use std::time::Duration;

use prober::analysis::Analysis;
use prober::client::{HttpClient, HttpCounterSource};
use prober::config::ProbeConfig;
use prober::error::AnalysisError;
use prober::probe::{run, RunReport};
use prober::shutdown::{shutdown_channel, Shutdown};
use stub_server::{spawn_stub, Behaviour, Step};

fn config_for(url: &str, interval_ms: u64, max_requests: Option<u64>) -> ProbeConfig {
    ProbeConfig {
        url: url.parse().unwrap(),
        check_interval: Duration::from_millis(interval_ms),
        max_requests: max_requests.and_then(NonZeroU64::new),
    }
}

fn source_for(config: &ProbeConfig) -> HttpCounterSource {
    HttpCounterSource::new(HttpClient::new(), config.url.clone())
}

async fn probe(config: &ProbeConfig, shutdown: Shutdown) -> (RunReport, String) {
    let mut out = Vec::new();
    let report = run(config, source_for(config), shutdown, &mut out)
        .await
        .unwrap();
    (report, String::from_utf8(out).unwrap())
}

fn counters(report: &RunReport) -> Vec<i64> {
    report.samples.iter().map(|s| s.counter).collect()
}

#[tokio::test]
async fn steady_counter_reports_full_success() {
    let stub = spawn_stub(Behaviour::Counting { start: 99 }).await.unwrap();
    let config = config_for(&stub.url, 500, Some(4));

    let (report, out) = probe(&config, Shutdown::never()).await;

    assert_eq!(report.issued, 4);
    assert_eq!(counters(&report), vec![100, 101, 102, 103]);
    assert!(report
        .samples
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    assert!(out.contains("Counter = 100 (?)"), "{out}");
    assert!(out.contains("Request 4/4 - Time: "), "{out}");
    assert!(out.contains("Counter = 103 (+1)"), "{out}");

    let analysis = Analysis::from_report(&report).unwrap();
    assert_eq!(analysis.starting_counter, 99);
    assert_eq!(analysis.total_increase, 4);
    assert!((analysis.success_rate - 100.0).abs() < 1e-9);
    assert!(analysis.intervals.is_some());
    stub.stop().await.unwrap();
}

#[tokio::test]
async fn bad_bodies_are_dropped_and_probing_continues() {
    let stub = spawn_stub(Behaviour::Scripted(vec![
        Step::counter(5),
        Step::raw("not json"),
        Step::counter(7),
        Step::raw(r#"{"count": 8}"#),
        Step::raw(r#"{"data": "9"}"#),
        Step::counter(6),
    ]))
    .await
    .unwrap();
    let config = config_for(&stub.url, 500, Some(6));

    let (report, out) = probe(&config, Shutdown::never()).await;

    assert_eq!(counters(&report), vec![5, 7, 6]);
    assert_eq!(report.failed, 3);
    assert!(out.contains("Request 2/6 failed: response is not valid JSON"), "{out}");
    assert!(out.contains("Request 4/6 failed: response has no `data` field"), "{out}");
    assert!(out.contains("Request 5/6 failed: `data` is not an integer"), "{out}");
    assert!(out.contains("Counter = 7 (+2)"), "{out}");
    assert!(out.contains("Counter = 6 (-1)"), "{out}");
    stub.stop().await.unwrap();
}

#[tokio::test]
async fn interrupt_drains_in_flight_requests_before_analysis() {
    let steps = (1..=50)
        .map(|n| Step::counter(n).after(Duration::from_millis(300)))
        .collect();
    let stub = spawn_stub(Behaviour::Scripted(steps)).await.unwrap();
    let config = config_for(&stub.url, 50, None);
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.interrupt();
    });

    let (report, out) = probe(&config, shutdown).await;

    assert!(report.issued >= 1 && report.issued < 50, "{report:?}");
    assert_eq!(report.samples.len() as u64, report.issued, "{out}");
    assert_eq!(report.failed, 0);
    assert_eq!(report.abandoned, 0);
    assert!(Analysis::from_report(&report).is_ok());
}

#[tokio::test]
async fn second_interrupt_abandons_slow_requests() {
    let steps = (1..=50)
        .map(|n| Step::counter(n).after(Duration::from_secs(30)))
        .collect();
    let stub = spawn_stub(Behaviour::Scripted(steps)).await.unwrap();
    let config = config_for(&stub.url, 50, None);
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.interrupt();
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.interrupt();
    });

    let (report, out) =
        tokio::time::timeout(Duration::from_secs(10), probe(&config, shutdown))
            .await
            .unwrap();

    assert!(report.samples.is_empty(), "{out}");
    assert_eq!(report.abandoned, report.issued);
    assert!(out.contains("Forced shutdown: abandoned"), "{out}");
    assert_eq!(Analysis::from_report(&report), Err(AnalysisError::NoSamples));
}

#[tokio::test]
async fn unreachable_endpoint_yields_failures_only() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("http://{addr}{}", counter_util::COUNTER_PATH);
    let config = config_for(&url, 200, Some(2));

    let (report, out) = probe(&config, Shutdown::never()).await;

    assert_eq!(report.issued, 2);
    assert_eq!(report.failed, 2);
    assert!(report.samples.is_empty());
    assert!(out.contains("Request 1/2 failed: request failed"), "{out}");
    assert_eq!(Analysis::from_report(&report), Err(AnalysisError::NoSamples));
}
