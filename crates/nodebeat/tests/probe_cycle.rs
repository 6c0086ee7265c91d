use std::sync::Arc;
use std::time::Duration;

use nodebeat::{
    ChannelSink, Endpoint, LatencyTracer, NetworkCollection, Phase, ProbeContext, ProbeError,
    ProbeScheduler, ProbeStatus, Prober, SchedulePolicy, TimeoutBudget,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

const GET_INFO: &str = r#"{"server_version":"d1bc8d3","head_block_num":100,"last_irreversible_block_num":80,"head_block_producer":"producer1","head_block_time":"2024-01-01T00:00:00.000","head_block_id":"00000064abc"}"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serves one canned HTTP response per connection after `delay`.
async fn node_server(status: &'static str, body: &'static str, delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn status_url(port: u16) -> Url {
    Endpoint::new("nodeA", "127.0.0.1", port).http_url().unwrap()
}

fn tracer() -> Arc<LatencyTracer> {
    Arc::new(LatencyTracer::new(TimeoutBudget::default()).unwrap())
}

#[tokio::test]
async fn test_trace_measures_server_delay() {
    init_tracing();
    let port = node_server("200 OK", GET_INFO, Duration::from_millis(50)).await;

    let outcome = tracer().probe(&status_url(port)).await.unwrap();
    let timings = outcome.timings;

    assert!(timings.full >= 49.0, "full = {}", timings.full);
    assert!(timings.full >= timings.longest_phase());
    assert!(timings.resp >= 49.0, "resp = {}", timings.resp);
    assert!(!outcome.tls);
    assert_eq!(outcome.payload.head_block_num, 100);
    assert_eq!(outcome.payload.head_block_producer, "producer1");
    assert_eq!(outcome.payload.last_irreversible_block_num, 80);
}

#[tokio::test]
async fn test_one_tick_emits_one_record() {
    init_tracing();
    let port = node_server("200 OK", GET_INFO, Duration::from_millis(50)).await;

    let endpoint = Endpoint::new("nodeA", "127.0.0.1", port).with_metadata("Org A", "Brazil");
    let collection = NetworkCollection::new("test1", vec![endpoint]);
    let context = ProbeContext::new(tracer(), collection.network(), "203.0.113.7");
    let (sink, mut rx) = ChannelSink::channel(8);
    let mut scheduler = ProbeScheduler::new(collection, context, sink);

    let report = scheduler.tick().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.emitted, 1);

    let record = rx.try_recv().unwrap();
    assert_eq!(record.status, ProbeStatus::Up);
    assert_eq!(record.target, "127.0.0.1");
    assert_eq!(record.source, "203.0.113.7");
    assert_eq!(record.network, "test1");
    assert_eq!(record.block, Some(100));
    assert_eq!(record.lastirrb, Some(80));
    assert_eq!(record.current_producer.as_deref(), Some("producer1"));
    assert_eq!(record.org, "Org A");
    assert!(record.latency_full.unwrap() >= 49.0);
    assert!(rx.try_recv().is_err());

    let history = scheduler.collection().get(0).unwrap().latencies();
    assert_eq!(history.len(), 1);
    assert_eq!(Some(history[0]), record.latency_full);
}

#[tokio::test]
async fn test_refused_connection_emits_nothing() {
    init_tracing();
    let port = closed_port().await;

    let err = tracer().probe(&status_url(port)).await.unwrap_err();
    assert!(matches!(err, ProbeError::Connect { .. }), "{err:?}");
    assert!(err.is_unreachable());

    let collection = NetworkCollection::new("test1", vec![Endpoint::new("nodeA", "127.0.0.1", port)]);
    let context = ProbeContext::new(tracer(), "test1", "src");
    let (sink, mut rx) = ChannelSink::channel(8);
    let mut scheduler = ProbeScheduler::new(collection, context, sink);

    let report = scheduler.tick().await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.emitted, 0);
    assert!(rx.try_recv().is_err());
    assert!(scheduler.collection().get(0).unwrap().latencies().is_empty());
}

#[tokio::test]
async fn test_refused_connection_with_failure_records() {
    init_tracing();
    let port = closed_port().await;

    let collection = NetworkCollection::new("test1", vec![Endpoint::new("nodeA", "127.0.0.1", port)]);
    let context = ProbeContext::new(tracer(), "test1", "src");
    let (sink, mut rx) = ChannelSink::channel(8);
    let mut scheduler = ProbeScheduler::new(collection, context, sink).with_policy(SchedulePolicy {
        emit_failure_records: true,
        ..SchedulePolicy::default()
    });

    scheduler.tick().await;
    let record = rx.try_recv().unwrap();
    assert_eq!(record.status, ProbeStatus::Down);
    assert!(record.error.is_some());
    assert_eq!(record.block, None);
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    init_tracing();
    let port = node_server("200 OK", "<html>not json</html>", Duration::ZERO).await;

    let err = tracer().probe(&status_url(port)).await.unwrap_err();
    assert!(matches!(err, ProbeError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn test_error_status_is_bad_status() {
    init_tracing();
    let port = node_server("500 Internal Server Error", GET_INFO, Duration::ZERO).await;

    let err = tracer().probe(&status_url(port)).await.unwrap_err();
    assert!(matches!(err, ProbeError::BadStatus(500)), "{err:?}");
    assert_eq!(err.to_string(), "HTTP status code: 500");
}

#[tokio::test]
async fn test_slow_node_hits_request_budget() {
    init_tracing();
    let port = node_server("200 OK", GET_INFO, Duration::from_millis(500)).await;
    let budget = TimeoutBudget { request: Duration::from_millis(100), ..TimeoutBudget::default() };

    let err = LatencyTracer::new(budget).unwrap().probe(&status_url(port)).await.unwrap_err();
    assert!(
        matches!(err, ProbeError::Timeout { phase: Phase::Request, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_missing_fields_default() {
    init_tracing();
    let port = node_server("200 OK", r#"{"head_block_num":7}"#, Duration::ZERO).await;

    let outcome = tracer().probe(&status_url(port)).await.unwrap();
    assert_eq!(outcome.payload.head_block_num, 7);
    assert_eq!(outcome.payload.last_irreversible_block_num, 0);
    assert!(outcome.payload.head_block_producer.is_empty());
}
