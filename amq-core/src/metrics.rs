//! Prometheus metrics for the messaging layer

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Total payloads published
    pub static ref PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "amq_publish_total",
        "Total payloads published",
        &["message_type", "status"]
    )
    .unwrap();

    /// Total payloads received
    pub static ref RECEIVE_TOTAL: CounterVec = register_counter_vec!(
        "amq_receive_total",
        "Total payloads received",
        &["message_type", "status"]
    )
    .unwrap();

    /// Payload processing duration
    pub static ref PROCESS_DURATION: HistogramVec = register_histogram_vec!(
        "amq_process_duration_seconds",
        "Payload processing duration in seconds",
        &["message_type"]
    )
    .unwrap();
}
