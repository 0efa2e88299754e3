use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the order lifecycle
// ============================================================================
//
// Provides metrics for:
// - Order placement and state transitions
// - Conditional-write conflicts (racing writers)
// - Payment settlement by entry point
// - Webhook events by type and outcome
// - Notification delivery
// - Gateway call latency
//
// All metrics are registered with one registry and scraped via /metrics
// ============================================================================

pub struct LifecycleMetrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub order_transitions: IntCounterVec,
    pub write_conflicts: IntCounterVec,

    pub payment_settlements: IntCounterVec,
    pub webhook_events: IntCounterVec,

    pub notifications: IntCounterVec,

    pub gateway_duration: HistogramVec,
}

impl LifecycleMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders placed")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Committed order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let write_conflicts = IntCounterVec::new(
            Opts::new("order_write_conflicts_total", "Conditional writes that lost a race"),
            &["event"],
        )?;
        registry.register(Box::new(write_conflicts.clone()))?;

        let payment_settlements = IntCounterVec::new(
            Opts::new("payment_settlements_total", "PaymentSucceeded applications by entry point"),
            &["source", "outcome"],
        )?;
        registry.register(Box::new(payment_settlements.clone()))?;

        let webhook_events = IntCounterVec::new(
            Opts::new("payment_webhook_events_total", "Gateway webhook events by type and outcome"),
            &["event_type", "outcome"],
        )?;
        registry.register(Box::new(webhook_events.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("order_notifications_total", "Domain events handed to the notification sink"),
            &["event_type", "outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let gateway_duration = HistogramVec::new(
            HistogramOpts::new("payment_gateway_duration_seconds", "Payment gateway call duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(gateway_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_transitions,
            write_conflicts,
            payment_settlements,
            webhook_events,
            notifications,
            gateway_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_conflict(&self, event: &str) {
        self.write_conflicts.with_label_values(&[event]).inc();
    }

    pub fn record_settlement(&self, source: &str, outcome: &str) {
        self.payment_settlements.with_label_values(&[source, outcome]).inc();
    }

    pub fn record_webhook(&self, event_type: &str, outcome: &str) {
        self.webhook_events.with_label_values(&[event_type, outcome]).inc();
    }

    pub fn record_notification(&self, event_type: &str, outcome: &str) {
        self.notifications.with_label_values(&[event_type, outcome]).inc();
    }

    pub fn observe_gateway(&self, operation: &str, duration_secs: f64) {
        self.gateway_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    /// Prometheus text exposition of everything registered.
    pub fn render(&self) -> anyhow::Result<String> {
        use prometheus::{Encoder, TextEncoder};

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
