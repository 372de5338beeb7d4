//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Event bus throughput by intent
//! - Rate and status poll outcomes
//! - Order creation outcomes
//! - Notifications by severity

use crate::events::{Provider, Severity, SwapEvent};

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};

lazy_static! {
    // Bus metrics
    pub static ref EVENTS_PUBLISHED: CounterVec = register_counter_vec!(
        "swap_events_published_total",
        "Total events published on the bus by type",
        &["event_type"]
    ).unwrap();

    // Polling metrics
    pub static ref RATE_POLLS: CounterVec = register_counter_vec!(
        "swap_rate_polls_total",
        "Total rate poll attempts by provider and outcome",
        &["provider", "outcome"]
    ).unwrap();

    pub static ref STATUS_POLLS: CounterVec = register_counter_vec!(
        "swap_status_polls_total",
        "Total order status poll attempts by provider and outcome",
        &["provider", "outcome"]
    ).unwrap();

    // Order metrics
    pub static ref ORDERS_CREATED: CounterVec = register_counter_vec!(
        "swap_orders_created_total",
        "Total order creation attempts by provider and outcome",
        &["provider", "outcome"]
    ).unwrap();

    // Notification metrics
    pub static ref NOTIFICATIONS: CounterVec = register_counter_vec!(
        "swap_notifications_total",
        "Total notifications emitted by severity",
        &["severity"]
    ).unwrap();

    // Countdown metrics
    pub static ref ORDER_SECONDS_REMAINING: Gauge = register_gauge!(
        "swap_order_seconds_remaining",
        "Seconds until the active order expires"
    ).unwrap();
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Bity => "bity",
        Provider::Shapeshift => "shapeshift",
    }
}

fn outcome_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

// Helper functions to record metrics

pub fn record_event(event: &SwapEvent) {
    EVENTS_PUBLISHED.with_label_values(&[event.name()]).inc();
}

pub fn record_rate_poll(provider: Provider, ok: bool) {
    RATE_POLLS
        .with_label_values(&[provider_label(provider), outcome_label(ok)])
        .inc();
}

pub fn record_status_poll(provider: Provider, ok: bool) {
    STATUS_POLLS
        .with_label_values(&[provider_label(provider), outcome_label(ok)])
        .inc();
}

pub fn record_order_created(provider: Provider, ok: bool) {
    ORDERS_CREATED
        .with_label_values(&[provider_label(provider), outcome_label(ok)])
        .inc();
}

pub fn record_notification(severity: Severity) {
    let label = match severity {
        Severity::Danger => "danger",
        Severity::Warning => "warning",
    };
    NOTIFICATIONS.with_label_values(&[label]).inc();
}

pub fn record_seconds_remaining(seconds: u64) {
    ORDER_SECONDS_REMAINING.set(seconds as f64);
}

/// Render all registered metrics in the Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}
