//! Request counters and the Prometheus scrape endpoint.
//!
//! # Metrics
//! - `http_requests_total{method, endpoint, http_status}` (counter)
//! - `http_request_duration_seconds{method, endpoint}` (histogram)
//!
//! The registry is owned by [`HttpMetrics`] rather than a global so each
//! server instance (and each test) starts from zero. Label values are
//! updated with atomic increments, so concurrent requests never lose counts.

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Service-scoped request metrics. Cloning shares the underlying registry.
#[derive(Clone)]
pub struct HttpMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
}

impl HttpMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP Requests"),
            &["method", "endpoint", "http_status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "endpoint"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    /// Record one finished request.
    pub fn record(&self, method: &str, endpoint: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64());
    }

    /// Current value of the request counter for one label set.
    pub fn request_count(&self, method: &str, endpoint: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .get()
    }

    /// Render every registered metric in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Middleware counting every response, including errors and fallbacks.
pub async fn track_requests(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    metrics.record(&method, &path, status, elapsed);
    tracing::debug!(
        %method,
        %path,
        status,
        elapsed_ms = elapsed.as_millis() as u64,
        "request recorded"
    );

    response
}

/// Handler for Prometheus metrics endpoint
pub async fn metrics_handler(State(metrics): State<HttpMetrics>) -> Response {
    match metrics.render() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_label_set() {
        let metrics = HttpMetrics::new().unwrap();
        metrics.record("GET", "/books", 200, Duration::from_millis(3));
        metrics.record("GET", "/books", 200, Duration::from_millis(4));
        metrics.record("DELETE", "/books/1", 404, Duration::from_millis(1));

        assert_eq!(metrics.request_count("GET", "/books", 200), 2);
        assert_eq!(metrics.request_count("DELETE", "/books/1", 404), 1);
        assert_eq!(metrics.request_count("POST", "/books", 201), 0);
    }

    #[test]
    fn renders_text_exposition() {
        let metrics = HttpMetrics::new().unwrap();
        metrics.record("GET", "/livez", 200, Duration::ZERO);

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains(
            r#"http_requests_total{endpoint="/livez",http_status="200",method="GET"} 1"#
        ));
        assert!(text.contains("http_request_duration_seconds_bucket"));
    }

    #[test]
    fn instances_do_not_share_counts() {
        let first = HttpMetrics::new().unwrap();
        let second = HttpMetrics::new().unwrap();
        first.record("GET", "/books", 200, Duration::ZERO);
        assert_eq!(second.request_count("GET", "/books", 200), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let metrics = HttpMetrics::new().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        metrics.record("GET", "/books", 200, Duration::ZERO);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(metrics.request_count("GET", "/books", 200), 4000);
    }
}
