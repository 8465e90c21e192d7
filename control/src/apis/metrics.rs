//! Controller metrics
//!
//! Counters and histograms for TLS entry processing and certificate issuance

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Controller metrics registry
    pub static ref CONTROLLER_METRICS_REGISTRY: Registry = Registry::new();

    /// TLS entry processing duration
    static ref TLS_PROCESS_DURATION: HistogramVec = {
        let opts = HistogramOpts::new(
            "tls_process_duration_seconds",
            "Ingress TLS entry processing duration in seconds",
        );
        let histogram = HistogramVec::new(opts, &["namespace", "ingress"])
            .expect("Failed to create histogram");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("Failed to register histogram");
        histogram
    };

    /// TLS entries processed, by result
    static ref TLS_PROCESS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "tls_process_total",
            "Total number of ingress TLS entries processed",
        );
        let counter = IntCounterVec::new(opts, &["namespace", "ingress", "result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Certificate authority calls, by result
    static ref CERTIFICATE_ISSUANCE_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "certificate_issuance_total",
            "Total number of certificate issuance attempts",
        );
        let counter = IntCounterVec::new(opts, &["result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };
}

/// Record one processed TLS entry
///
/// `result` is `unchanged`, `issued`, `invalid` or an error kind.
pub fn record_tls_process(namespace: &str, ingress: &str, duration_secs: f64, result: &str) {
    TLS_PROCESS_DURATION
        .with_label_values(&[namespace, ingress])
        .observe(duration_secs);

    TLS_PROCESS_TOTAL
        .with_label_values(&[namespace, ingress, result])
        .inc();
}

/// Record one certificate authority call (`success` or `failure`)
pub fn record_certificate_issuance(result: &str) {
    CERTIFICATE_ISSUANCE_TOTAL.with_label_values(&[result]).inc();
}

/// Gather controller metrics in Prometheus text format
pub fn gather_controller_metrics() -> Result<String, String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = CONTROLLER_METRICS_REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert to UTF-8: {}", e))
}
