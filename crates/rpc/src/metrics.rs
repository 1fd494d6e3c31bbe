use prometheus::{
    CounterVec, HistogramVec, Registry, TextEncoder, register_counter_vec, register_histogram_vec,
};
use std::sync::Arc;

/// Prometheus metrics collector for the sandbox's HTTP surfaces.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    /// EBICS order-type dispatch counters, labeled by wire order code and outcome.
    pub ebics_orders: CounterVec,
    /// `/ebicsweb` request latency, labeled by order type.
    pub ebics_request_duration: HistogramVec,

    /// Ledger booking counters, labeled by direction (`credit`/`debit`) and origin (`cct`/`withdrawal`).
    pub ledger_bookings: CounterVec,

    /// Access/integration/admin HTTP request counters, labeled by route and status class.
    pub http_requests: CounterVec,
    pub http_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ebics_orders = register_counter_vec!(
            "ebicsbank_ebics_orders_total",
            "Total number of EBICS orders processed, by order type and outcome",
            &["order_type", "outcome"]
        )?;
        registry.register(Box::new(ebics_orders.clone()))?;

        let ebics_request_duration = register_histogram_vec!(
            "ebicsbank_ebics_request_duration_seconds",
            "ebicsweb request duration in seconds",
            &["order_type"]
        )?;
        registry.register(Box::new(ebics_request_duration.clone()))?;

        let ledger_bookings = register_counter_vec!(
            "ebicsbank_ledger_bookings_total",
            "Total number of ledger entries booked, by direction and origin",
            &["direction", "origin"]
        )?;
        registry.register(Box::new(ledger_bookings.clone()))?;

        let http_requests = register_counter_vec!(
            "ebicsbank_http_requests_total",
            "Total number of access/integration/admin HTTP requests, by route and status class",
            &["route", "status"]
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let http_request_duration = register_histogram_vec!(
            "ebicsbank_http_request_duration_seconds",
            "access/integration/admin request duration in seconds",
            &["route"]
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ebics_orders,
            ebics_request_duration,
            ledger_bookings,
            http_requests,
            http_request_duration,
        })
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }

    pub fn record_ebics_order(&self, order_type: &str, outcome: &str) {
        self.ebics_orders.with_label_values(&[order_type, outcome]).inc();
    }

    pub fn record_ledger_booking(&self, direction: &str, origin: &str) {
        self.ledger_bookings.with_label_values(&[direction, origin]).inc();
    }

    pub fn record_http_request(&self, route: &str, status: &str) {
        self.http_requests.with_label_values(&[route, status]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ebics_order("INI", "ok");
        metrics.record_ledger_booking("debit", "cct");
        let text = metrics.export().unwrap();
        assert!(text.contains("ebicsbank_ebics_orders_total"));
        assert!(text.contains("ebicsbank_ledger_bookings_total"));
    }
}
