//! Prometheus metrics for scraper runs.
//!
//! Exposes:
//! - `telegram_scraper_messages_total` (counter by channel kind)
//! - `telegram_scraper_media_total` (counter by status)
//! - `telegram_scraper_channels_total` (counter by outcome)
//! - `telegram_scraper_run_duration_seconds` (histogram)
//! - process metrics, registered by the default registry on Linux

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
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 1s up to ~4.5 hours.
    let buckets =
        prometheus::exponential_buckets(1.0, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "telegram_scraper_run_duration_seconds",
        "Scraper run duration in seconds",
        &["status"],
        buckets
    )
    .expect("failed to register run duration histogram")
});

static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_scraper_messages_total",
        "Messages written to the output table",
        &["kind"]
    )
    .expect("failed to register messages counter")
});

static MEDIA_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_scraper_media_total",
        "Media attachments by handling status",
        &["status"]
    )
    .expect("failed to register media counter")
});

static CHANNELS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_scraper_channels_total",
        "Channels by harvest outcome",
        &["status"]
    )
    .expect("failed to register channels counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&RUN_DURATION);
    Lazy::force(&MESSAGES_TOTAL);
    Lazy::force(&MEDIA_TOTAL);
    Lazy::force(&CHANNELS_TOTAL);
}

/// Count one written row; `kind` is `text` or `image`.
pub fn record_message(kind: &'static str) {
    MESSAGES_TOTAL.with_label_values(&[kind]).inc();
}

/// Count one attachment; `status` is `saved`, `skipped` or `failed`.
pub fn record_media(status: &'static str) {
    MEDIA_TOTAL.with_label_values(&[status]).inc();
}

/// Count one channel; `status` is `harvested`, `truncated` or `skipped`.
pub fn record_channel(status: &'static str) {
    CHANNELS_TOTAL.with_label_values(&[status]).inc();
}

/// Record run completion with duration and status.
pub fn record_run_result(duration: Duration, success: bool) {
    init_collectors();
    RUN_DURATION
        .with_label_values(&[if success { "ok" } else { "error" }])
        .observe(duration.as_secs_f64());
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
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
