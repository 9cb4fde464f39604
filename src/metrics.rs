//! Prometheus metrics collection for bee-ng.
//!
//! - `bee_command_total{transport,outcome}` - Commands by terminal state
//! - `bee_command_duration_seconds{transport}` - Dispatch latency histogram
//! - `bee_command_errors_total{transport,error}` - Failures by error code
//! - `bee_registry_reloads_total{namespace,result}` - Module reloads
//! - `bee_bus_events_total{topic}` - Events published on the bus
//! - `bee_connected_clients` - Open realtime connections

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Commands by transport and outcome.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command failures by transport and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Module reloads by namespace and result.
pub static REGISTRY_RELOADS: OnceLock<IntCounterVec> = OnceLock::new();

/// Bus publications by logical topic.
pub static BUS_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

/// Currently open realtime connections.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Dispatch latency by transport.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Called once at startup; later calls are no-ops.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("bee_command_total", "Commands by transport and outcome"), &["transport", "outcome"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("bee_command_errors_total", "Command failures by error code"), &["transport", "error"]));
    register!(REGISTRY_RELOADS, IntCounterVec::new(Opts::new("bee_registry_reloads_total", "Handler module reloads"), &["namespace", "result"]));
    register!(BUS_EVENTS, IntCounterVec::new(Opts::new("bee_bus_events_total", "Events published on the bus"), &["topic"]));
    register!(CONNECTED_CLIENTS, IntGauge::new("bee_connected_clients", "Open realtime connections"));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("bee_command_duration_seconds", "Command dispatch latency by transport")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["transport"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record dispatch latency.
#[inline]
pub fn record_command(transport: &str, duration_secs: f64) {
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[transport]).observe(duration_secs);
    }
}

/// Record a command's terminal state.
#[inline]
pub fn record_outcome(transport: &str, outcome: &str) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[transport, outcome]).inc();
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(transport: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[transport, error]).inc();
    }
}

/// Record a module reload attempt.
#[inline]
pub fn record_reload(namespace: &str, ok: bool) {
    if let Some(c) = REGISTRY_RELOADS.get() {
        c.with_label_values(&[namespace, if ok { "ok" } else { "error" }])
            .inc();
    }
}

/// Record a bus publication.
#[inline]
pub fn record_bus_event(topic: &str) {
    if let Some(c) = BUS_EVENTS.get() {
        c.with_label_values(&[topic]).inc();
    }
}

#[inline]
pub fn client_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.inc();
    }
}

#[inline]
pub fn client_disconnected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.dec();
    }
}
