//! Prometheus metrics for the migration assistant.
//!
//! Exposes:
//! - `migration_assistant_command_duration_seconds` (histogram)
//! - `migration_assistant_command_total` (counter with status)
//! - `migration_assistant_command_inflight` (gauge)
//! - `migration_assistant_questions_total` (counter by outcome)
//! - `migration_assistant_rag_stage_seconds` (histogram by stage)
//! - `migration_assistant_chunks_indexed_total` (counter)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
    TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "migration_assistant_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "migration_assistant_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "migration_assistant_command_inflight",
        "Number of in-flight commands",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static QUESTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "migration_assistant_questions_total",
        "Questions answered by outcome",
        &["outcome"]
    )
    .expect("failed to register questions counter")
});

static RAG_STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 10ms .. ~80s, generation dominates the upper range.
    let buckets =
        prometheus::exponential_buckets(0.01, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "migration_assistant_rag_stage_seconds",
        "Duration of retrieval pipeline stages in seconds",
        &["stage"],
        buckets
    )
    .expect("failed to register rag stage histogram")
});

static CHUNKS_INDEXED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "migration_assistant_chunks_indexed_total",
        "Chunks written to the vector index"
    )
    .expect("failed to register chunks counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&QUESTIONS_TOTAL);
    Lazy::force(&RAG_STAGE_DURATION);
    Lazy::force(&CHUNKS_INDEXED);
}

/// Increment inflight gauge for a command.
pub fn record_command_start(command: &'static str) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).dec();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .inc();
}

/// Count one answered question (`answered`, `no_documents`, `generation_failed`).
pub fn record_question(outcome: &'static str) {
    init_collectors();
    QUESTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Observe one stage of the pipeline (`retrieve`, `rerank`, `generate`).
pub fn record_stage(stage: &'static str, duration: Duration) {
    init_collectors();
    RAG_STAGE_DURATION
        .with_label_values(&[stage])
        .observe(duration.as_secs_f64());
}

pub fn record_chunks_indexed(count: usize) {
    init_collectors();
    CHUNKS_INDEXED.inc_by(count as u64);
}

/// Render the default registry in the Prometheus text format.
pub(crate) fn render() -> (String, Vec<u8>) {
    init_collectors();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        buffer.clear();
    }

    (encoder.format_type().to_string(), buffer)
}

fn plain_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}

pub(crate) async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let (content_type, buffer) = render();
    if buffer.is_empty() {
        return Ok(plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from_static(b"encode error"),
        ));
    }

    let mut response = plain_response(StatusCode::OK, Bytes::from(buffer));
    if let Ok(value) = hyper::header::HeaderValue::from_str(&content_type) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(plain_response(StatusCode::NOT_FOUND, Bytes::new())),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
