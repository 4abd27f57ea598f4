//! OpenTelemetry instruments for client health
//!
//! Recorded through the global meter, so without a meter provider installed
//! by the host application these are no-ops. Enabled per client via
//! `ClientBuilder::with_metrics`.

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)
    pub connection_state: Gauge<i64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub notifications_received: Counter<u64>,
}

impl ClientMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("moonraker.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=failed)")
                .build(),
            requests_total: meter
                .u64_counter("moonraker.client.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("moonraker.client.request.duration")
                .with_description("Request duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("moonraker.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("moonraker.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("moonraker.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            notifications_received: meter
                .u64_counter("moonraker.client.notifications.received")
                .with_description("Total number of notifications received")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_notification(&self, method: &str) {
        let attributes = &[KeyValue::new("method", method.to_string())];
        self.notifications_received.add(1, attributes);
    }
}
