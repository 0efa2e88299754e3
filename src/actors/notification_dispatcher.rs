use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use std::sync::Arc;

use crate::domain::order::OrderEvent;
use crate::messaging::NotificationSink;
use crate::metrics::LifecycleMetrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

// ============================================================================
// Notification Dispatcher Actor
// ============================================================================
//
// Receives committed domain events fire-and-forget and hands them to the
// notification sink one at a time. Delivery failures are logged and counted;
// they never reach the caller that committed the transition.
//
// A circuit breaker sits in front of the sink so an outage costs one fast
// refusal per event instead of a slow failure.
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub struct Dispatch(pub Vec<OrderEvent>);

/// Replies once every Dispatch queued before it has been handled.
#[derive(Debug)]
pub struct Flush;

// ============================================================================
// Actor
// ============================================================================

pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    breaker: CircuitBreaker,
    metrics: Arc<LifecycleMetrics>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, breaker: CircuitBreakerConfig, metrics: Arc<LifecycleMetrics>) -> Self {
        Self {
            sink,
            breaker: CircuitBreaker::new("notifications", breaker),
            metrics,
        }
    }

    async fn deliver(&mut self, event: &OrderEvent) {
        let event_type = event.event_type();

        match self.breaker.call(self.sink.deliver(event)).await {
            Ok(()) => {
                self.metrics.record_notification(event_type, "delivered");
                tracing::debug!(event_type = event_type, order_id = %event.order_id(), "Notification delivered");
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                self.metrics.record_notification(event_type, "dropped");
                tracing::warn!(
                    event_type = event_type,
                    order_id = %event.order_id(),
                    "Notification dropped, sink circuit open"
                );
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                self.metrics.record_notification(event_type, "failed");
                tracing::error!(
                    event_type = event_type,
                    order_id = %event.order_id(),
                    error = %e,
                    "❌ Notification delivery failed"
                );
            }
        }
    }
}

impl Actor for NotificationDispatcher {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!("NotificationDispatcher started");
        Ok(state)
    }
}

impl Message<Dispatch> for NotificationDispatcher {
    type Reply = ();

    async fn handle(&mut self, msg: Dispatch, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        for event in &msg.0 {
            self.deliver(event).await;
        }
    }
}

impl Message<Flush> for NotificationDispatcher {
    type Reply = ();

    async fn handle(&mut self, _msg: Flush, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {}
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable front for the dispatcher actor.
#[derive(Clone)]
pub struct EventDispatcher {
    actor: ActorRef<NotificationDispatcher>,
}

impl EventDispatcher {
    pub fn spawn(sink: Arc<dyn NotificationSink>, breaker: CircuitBreakerConfig, metrics: Arc<LifecycleMetrics>) -> Self {
        let actor = NotificationDispatcher::spawn(NotificationDispatcher::new(sink, breaker, metrics));
        Self { actor }
    }

    /// Fire and forget. Never fails the caller.
    pub async fn publish(&self, events: Vec<OrderEvent>) {
        if events.is_empty() {
            return;
        }
        let count = events.len();
        if let Err(e) = self.actor.tell(Dispatch(events)).send().await {
            tracing::error!(error = %e, count = count, "Notification dispatcher unavailable, events lost");
        }
    }

    /// Wait until everything published so far has been handled.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.actor
            .ask(Flush)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("notification dispatcher unavailable: {}", e))
    }
}
