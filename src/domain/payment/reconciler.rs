use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::domain::order::{
    Committed, ConfirmPayment, Order, OrderError, OrderEvent, OrderLifecycleManager, OrderResult, OrderStatus,
    PaymentFailed, PaymentStatus, Principal,
};
use crate::metrics::LifecycleMetrics;
use crate::store::{OrderStore, WriteOutcome};

use super::gateway::{
    CreateIntentRequest, GatewayError, GatewayEvent, GatewayEventKind, IntentHandle, IntentMetadata, IntentStatus,
    PaymentGateway,
};

// ============================================================================
// Payment Reconciler
// ============================================================================
//
// Two entry points settle a payment: the buyer's confirmation call and the
// processor's webhook. Both resolve the order and hand it to the lifecycle
// manager's PaymentSucceeded transition, whose conditional write guarantees
// that at most one of them changes anything.
//
// Gateway I/O always completes before the conditional write; nothing is held
// across a network call.
//
// ============================================================================

const SOURCE_CONFIRM: &str = "confirm";
const SOURCE_WEBHOOK: &str = "webhook";

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub currency: String,
    /// Webhooks are refused with an internal error until this is set.
    pub webhook_secret: Option<String>,
}

/// How a verified webhook event was acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Processed,
    /// Acknowledged without a state change; carries the reason.
    NoOp(String),
}

impl Ack {
    pub fn label(&self) -> &'static str {
        match self {
            Ack::Processed => "processed",
            Ack::NoOp(_) => "noop",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub ack: Ack,
    pub events: Vec<OrderEvent>,
}

impl WebhookOutcome {
    fn processed(events: Vec<OrderEvent>) -> Self {
        Self { ack: Ack::Processed, events }
    }

    fn no_op(reason: impl Into<String>) -> Self {
        Self {
            ack: Ack::NoOp(reason.into()),
            events: Vec::new(),
        }
    }
}

pub struct PaymentReconciler {
    lifecycle: Arc<OrderLifecycleManager>,
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: ReconcilerConfig,
    metrics: Arc<LifecycleMetrics>,
}

impl PaymentReconciler {
    pub fn new(
        lifecycle: Arc<OrderLifecycleManager>,
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: ReconcilerConfig,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        Self {
            lifecycle,
            store,
            gateway,
            config,
            metrics,
        }
    }

    pub fn webhook_configured(&self) -> bool {
        self.config.webhook_secret.is_some()
    }

    #[tracing::instrument(skip(self, buyer), fields(buyer_id = %buyer.user_id))]
    pub async fn create_intent(&self, order_id: Uuid, buyer: &Principal) -> OrderResult<IntentHandle> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if !order.is_buyer(buyer) {
            return Err(OrderError::Forbidden(format!(
                "only the buyer may pay for order {}",
                order_id
            )));
        }
        if order.status == OrderStatus::Cancelled || order.payment_status != PaymentStatus::Pending {
            return Err(OrderError::InvalidState(format!(
                "order {} is {} and cannot take a payment",
                order_id,
                order.state()
            )));
        }

        if let Some(attached) = order.payment_intent_ref.as_deref() {
            return self.attached_intent(order_id, attached).await;
        }

        let observed = order.state();
        let request = CreateIntentRequest {
            amount: order.total_amount,
            currency: self.config.currency.clone(),
            metadata: IntentMetadata {
                order_id: order.id,
                buyer_id: order.buyer_id,
                seller_id: order.seller_id,
                post_id: order.post_id,
            },
            idempotency_key: format!("order-{}", order.id),
        };

        let started = Instant::now();
        let result = self.gateway.create_intent(request).await;
        self.metrics
            .observe_gateway("create_intent", started.elapsed().as_secs_f64());
        let handle = result.map_err(|e| {
            tracing::error!(order_id = %order_id, error = %e, "Payment intent creation failed");
            OrderError::from(e)
        })?;

        match self.store.attach_payment_intent(order.id, observed, &handle.id).await? {
            WriteOutcome::Applied(_) => {
                tracing::info!(order_id = %order_id, intent_id = %handle.id, "✅ Payment intent attached");
                Ok(handle)
            }
            WriteOutcome::Conflict(current) => match current.payment_intent_ref.as_deref() {
                Some(attached) if current.state() == observed => {
                    if attached == handle.id {
                        return Ok(handle);
                    }
                    // nobody holds the new intent's client secret, so it can never be charged
                    tracing::warn!(
                        order_id = %order_id,
                        attached = %attached,
                        discarded = %handle.id,
                        "Another request attached an intent first"
                    );
                    self.attached_intent(order_id, attached).await
                }
                _ => {
                    tracing::warn!(
                        order_id = %order_id,
                        intent_id = %handle.id,
                        state = %current.state(),
                        "Order moved while the intent was being created"
                    );
                    Err(OrderError::InvalidState(format!(
                        "order {} is now {} and cannot take a payment",
                        order_id,
                        current.state()
                    )))
                }
            },
        }
    }

    /// The handle of the intent already recorded on an order. The recorded
    /// intent is the one webhooks resolve, so it is returned rather than
    /// replaced.
    async fn attached_intent(&self, order_id: Uuid, intent_id: &str) -> OrderResult<IntentHandle> {
        let started = Instant::now();
        let snapshot = self.gateway.retrieve_intent(intent_id).await;
        self.metrics
            .observe_gateway("retrieve_intent", started.elapsed().as_secs_f64());
        let snapshot = snapshot?;

        tracing::debug!(order_id = %order_id, intent_id = %intent_id, status = %snapshot.status, "Reusing attached payment intent");
        Ok(snapshot.handle())
    }

    #[tracing::instrument(skip(self, command, buyer), fields(intent_id = %command.payment_intent_ref, buyer_id = %buyer.user_id))]
    pub async fn confirm_payment(&self, command: ConfirmPayment, buyer: &Principal) -> OrderResult<Committed> {
        let intent_id = command.payment_intent_ref;
        let order = self
            .store
            .find_by_payment_intent(&intent_id)
            .await?
            .ok_or_else(|| OrderError::PaymentIntentNotFound(intent_id.clone()))?;

        if !order.is_buyer(buyer) {
            return Err(OrderError::Forbidden(format!(
                "only the buyer may confirm payment for order {}",
                order.id
            )));
        }

        if order.payment_status != PaymentStatus::Pending {
            self.metrics.record_settlement(SOURCE_CONFIRM, "noop");
            tracing::debug!(order_id = %order.id, "Payment already settled");
            return Ok(Committed { order, events: Vec::new() });
        }
        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::InvalidState(format!("order {} is cancelled", order.id)));
        }

        let started = Instant::now();
        let snapshot = self.gateway.retrieve_intent(&intent_id).await;
        self.metrics
            .observe_gateway("retrieve_intent", started.elapsed().as_secs_f64());
        let snapshot = snapshot?;

        if snapshot.status != IntentStatus::Succeeded {
            self.metrics.record_settlement(SOURCE_CONFIRM, "not_succeeded");
            return Err(OrderError::InvalidState(format!(
                "payment intent {} is {}",
                intent_id, snapshot.status
            )));
        }

        let committed = self.lifecycle.apply_payment_succeeded(order).await?;
        self.record_settlement(SOURCE_CONFIRM, &committed);
        Ok(committed)
    }

    /// Verify, parse and dispatch one webhook delivery. The signature is
    /// checked before any order is read.
    pub async fn handle_gateway_event(&self, raw_body: &[u8], signature_header: &str) -> OrderResult<WebhookOutcome> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| OrderError::Internal("payment webhook secret is not configured".to_string()))?;

        let event = match self.gateway.verify_and_parse_event(raw_body, signature_header, secret) {
            Ok(event) => event,
            Err(GatewayError::MalformedPayload(reason)) => {
                tracing::warn!(reason = %reason, "Signed webhook payload could not be parsed");
                self.metrics.record_webhook("malformed", "noop");
                return Ok(WebhookOutcome::no_op(format!("malformed payload: {}", reason)));
            }
            Err(err) => {
                tracing::warn!(error = %err, "Webhook signature rejected");
                self.metrics.record_webhook("unverified", "rejected");
                return Err(err.into());
            }
        };

        tracing::debug!(event_id = %event.id, event_type = %event.type_label(), "Webhook event verified");

        let outcome = match &event.kind {
            GatewayEventKind::PaymentSucceeded => self.on_payment_succeeded(&event).await?,
            GatewayEventKind::PaymentFailed { reason } => self.on_payment_failed(&event, reason.clone()).await?,
            GatewayEventKind::Other(kind) => {
                tracing::debug!(event_id = %event.id, event_type = %kind, "Ignoring unhandled event type");
                WebhookOutcome::no_op(format!("unhandled event type {}", kind))
            }
        };

        self.metrics.record_webhook(event.metric_label(), outcome.ack.label());
        Ok(outcome)
    }

    async fn resolve(&self, event: &GatewayEvent) -> OrderResult<Option<(String, Order)>> {
        let Some(intent_id) = event.intent_id.clone() else {
            tracing::warn!(event_id = %event.id, "Webhook event carries no payment intent");
            return Ok(None);
        };

        match self.store.find_by_payment_intent(&intent_id).await? {
            Some(order) => Ok(Some((intent_id, order))),
            None => {
                tracing::warn!(
                    event_id = %event.id,
                    intent_id = %intent_id,
                    "Webhook references a payment intent no order knows"
                );
                Ok(None)
            }
        }
    }

    async fn on_payment_succeeded(&self, event: &GatewayEvent) -> OrderResult<WebhookOutcome> {
        let Some((_, order)) = self.resolve(event).await? else {
            self.metrics.record_settlement(SOURCE_WEBHOOK, "unknown_intent");
            return Ok(WebhookOutcome::no_op("no order for payment intent"));
        };
        let order_id = order.id;

        match self.lifecycle.apply_payment_succeeded(order).await {
            Ok(committed) => {
                self.record_settlement(SOURCE_WEBHOOK, &committed);
                if committed.events.is_empty() {
                    Ok(WebhookOutcome::no_op("payment already applied"))
                } else {
                    Ok(WebhookOutcome::processed(committed.events))
                }
            }
            Err(OrderError::InvalidState(reason)) => {
                tracing::error!(
                    order_id = %order_id,
                    event_id = %event.id,
                    reason = %reason,
                    "Payment captured for an order that cannot accept it; manual refund required"
                );
                self.metrics.record_settlement(SOURCE_WEBHOOK, "refund_required");
                Ok(WebhookOutcome::no_op(reason))
            }
            Err(err) => Err(err),
        }
    }

    async fn on_payment_failed(&self, event: &GatewayEvent, reason: Option<String>) -> OrderResult<WebhookOutcome> {
        let Some((intent_id, order)) = self.resolve(event).await? else {
            return Ok(WebhookOutcome::no_op("no order for payment intent"));
        };

        tracing::info!(
            order_id = %order.id,
            intent_id = %intent_id,
            reason = ?reason,
            "Payment failed; order left unchanged"
        );

        Ok(WebhookOutcome::processed(vec![OrderEvent::PaymentFailed(PaymentFailed {
            order_id: order.id,
            recipient: order.buyer_id,
            payment_intent_ref: intent_id,
            reason,
        })]))
    }

    fn record_settlement(&self, source: &str, committed: &Committed) {
        let outcome = if committed.events.is_empty() { "noop" } else { "applied" };
        self.metrics.record_settlement(source, outcome);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderState;
    use crate::domain::payment::IntentSnapshot;
    use crate::gateway::InProcessGateway;
    use crate::testing::{Fixture, WEBHOOK_SECRET};

    #[tokio::test]
    async fn test_create_intent_attaches_reference() {
        let fx = Fixture::new();
        let order = fx.pending_order().await;
        let buyer = Principal::member(order.buyer_id);

        let handle = fx.reconciler.create_intent(order.id, &buyer).await.unwrap();

        let stored = fx.store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_intent_ref.as_deref(), Some(handle.id.as_str()));
        assert_eq!(stored.state(), OrderState::initial());
        assert_eq!(fx.gateway.amount_of(&handle.id).await, Some((order.total_amount, "usd".to_string())));
    }

    #[tokio::test]
    async fn test_create_intent_twice_reuses_the_gateway_intent() {
        let fx = Fixture::new();
        let order = fx.pending_order().await;
        let buyer = Principal::member(order.buyer_id);

        let first = fx.reconciler.create_intent(order.id, &buyer).await.unwrap();
        let second = fx.reconciler.create_intent(order.id, &buyer).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(fx.gateway.intents_created(), 1);
    }

    #[tokio::test]
    async fn test_expired_idempotency_key_keeps_the_attached_intent() {
        let fx = Fixture::new();
        let order = fx.pending_order().await;
        let buyer = Principal::member(order.buyer_id);

        let first = fx.reconciler.create_intent(order.id, &buyer).await.unwrap();
        fx.gateway.expire_idempotency_keys().await;
        let second = fx.reconciler.create_intent(order.id, &buyer).await.unwrap();

        assert_eq!(second, first);
        assert_eq!(fx.gateway.intents_created(), 1);

        // the buyer pays the intent they were first given
        let (body, header) = fx.gateway.signed_event("payment_succeeded", &first.id, WEBHOOK_SECRET);
        let outcome = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        assert_eq!(outcome.ack, Ack::Processed);
        assert_eq!(
            fx.store.get(order.id).await.unwrap().unwrap().state(),
            OrderState::new(OrderStatus::Confirmed, PaymentStatus::Paid)
        );
    }

    /// Attaches an intent of its own before answering, as a concurrent
    /// request would, then answers with a different intent id.
    struct RacingGateway {
        inner: Arc<InProcessGateway>,
        store: Arc<dyn OrderStore>,
    }

    #[async_trait::async_trait]
    impl PaymentGateway for RacingGateway {
        async fn create_intent(&self, request: CreateIntentRequest) -> Result<IntentHandle, GatewayError> {
            let order_id = request.metadata.order_id;
            let winner = self.inner.create_intent(request.clone()).await?;
            self.store
                .attach_payment_intent(order_id, OrderState::initial(), &winner.id)
                .await
                .unwrap();
            self.inner.expire_idempotency_keys().await;
            self.inner.create_intent(request).await
        }

        async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, GatewayError> {
            self.inner.retrieve_intent(intent_id).await
        }

        fn verify_and_parse_event(
            &self,
            raw_body: &[u8],
            signature_header: &str,
            webhook_secret: &str,
        ) -> Result<GatewayEvent, GatewayError> {
            self.inner.verify_and_parse_event(raw_body, signature_header, webhook_secret)
        }
    }

    #[tokio::test]
    async fn test_losing_intent_race_returns_the_attached_intent() {
        let fx = Fixture::new();
        let order = fx.pending_order().await;
        let store: Arc<dyn OrderStore> = fx.store.clone();
        let reconciler = PaymentReconciler::new(
            fx.manager.clone(),
            store.clone(),
            Arc::new(RacingGateway {
                inner: fx.gateway.clone(),
                store,
            }),
            ReconcilerConfig {
                currency: "usd".to_string(),
                webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            },
            fx.metrics.clone(),
        );

        let handle = reconciler
            .create_intent(order.id, &Principal::member(order.buyer_id))
            .await
            .unwrap();

        let stored = fx.store.get(order.id).await.unwrap().unwrap();
        assert_eq!(fx.gateway.intents_created(), 2);
        assert_eq!(stored.payment_intent_ref.as_deref(), Some(handle.id.as_str()));
        assert_eq!(fx.store.find_by_payment_intent(&handle.id).await.unwrap().unwrap().id, order.id);
    }

    #[tokio::test]
    async fn test_unknown_event_types_share_one_metric_label() {
        let fx = Fixture::new();
        for event_type in ["customer.created", "invoice.paid"] {
            let (body, header) = fx.gateway.signed_event(event_type, "pi_1", WEBHOOK_SECRET);
            fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        }

        assert_eq!(
            fx.metrics.webhook_events.with_label_values(&["other", "noop"]).get(),
            2
        );
        let exposition = fx.metrics.render().unwrap();
        assert!(!exposition.contains("customer.created"));
        assert!(!exposition.contains("invoice.paid"));
    }

    #[tokio::test]
    async fn test_create_intent_rejections() {
        let fx = Fixture::new();
        let order = fx.pending_order().await;

        let seller = Principal::member(order.seller_id);
        assert!(matches!(
            fx.reconciler.create_intent(order.id, &seller).await,
            Err(OrderError::Forbidden(_))
        ));
        assert!(matches!(
            fx.reconciler.create_intent(Uuid::new_v4(), &seller).await,
            Err(OrderError::OrderNotFound(_))
        ));

        let paid = fx.paid_order().await;
        let err = fx
            .reconciler
            .create_intent(paid.id, &Principal::member(paid.buyer_id))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidState(_)));

        let buyer = Principal::member(order.buyer_id);
        fx.manager.cancel_order(order.id, &buyer).await.unwrap();
        assert!(matches!(
            fx.reconciler.create_intent(order.id, &buyer).await,
            Err(OrderError::InvalidState(_))
        ));
        assert_eq!(fx.gateway.intents_created(), 0);
    }

    #[tokio::test]
    async fn test_gateway_outage_leaves_order_untouched() {
        let fx = Fixture::new();
        let order = fx.pending_order().await;
        fx.gateway.fail_next_call();

        let err = fx
            .reconciler
            .create_intent(order.id, &Principal::member(order.buyer_id))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(fx.store.get(order.id).await.unwrap().unwrap(), order);
    }

    #[tokio::test]
    async fn test_confirm_payment_requires_succeeded_intent() {
        let fx = Fixture::new();
        let (order, intent) = fx.order_with_intent().await;
        let buyer = Principal::member(order.buyer_id);
        let confirm = || ConfirmPayment { payment_intent_ref: intent.clone() };

        let err = fx.reconciler.confirm_payment(confirm(), &buyer).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidState(ref m) if m.contains("requires_payment_method")));

        fx.gateway.mark_succeeded(&intent).await.unwrap();
        let committed = fx.reconciler.confirm_payment(confirm(), &buyer).await.unwrap();
        assert_eq!(committed.order.state(), OrderState::new(OrderStatus::Confirmed, PaymentStatus::Paid));
        assert_eq!(committed.events.len(), 1);
        assert_eq!(committed.events[0].event_type(), "PaymentReceived");

        let again = fx.reconciler.confirm_payment(confirm(), &buyer).await.unwrap();
        assert!(again.events.is_empty());
        assert_eq!(again.order, committed.order);
    }

    #[tokio::test]
    async fn test_confirm_payment_by_non_buyer_is_forbidden() {
        let fx = Fixture::new();
        let (order, intent) = fx.order_with_intent().await;
        fx.gateway.mark_succeeded(&intent).await.unwrap();

        let err = fx
            .reconciler
            .confirm_payment(
                ConfirmPayment { payment_intent_ref: intent },
                &Principal::member(order.seller_id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));

        let err = fx
            .reconciler
            .confirm_payment(
                ConfirmPayment { payment_intent_ref: "pi_unknown".to_string() },
                &Principal::member(order.buyer_id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::PaymentIntentNotFound(_)));
    }

    #[tokio::test]
    async fn test_webhook_replay_emits_one_payment_received() {
        let fx = Fixture::new();
        let (order, intent) = fx.order_with_intent().await;
        let (body, header) = fx.gateway.signed_event("payment_succeeded", &intent, WEBHOOK_SECRET);

        let first = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        let after_first = fx.store.get(order.id).await.unwrap().unwrap();
        let second = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        let after_second = fx.store.get(order.id).await.unwrap().unwrap();

        assert_eq!(first.ack, Ack::Processed);
        assert_eq!(first.events.len(), 1);
        assert!(matches!(second.ack, Ack::NoOp(_)));
        assert!(second.events.is_empty());
        assert_eq!(after_first.state(), after_second.state());
        assert_eq!(after_second.state(), OrderState::new(OrderStatus::Confirmed, PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_webhook_bad_signature_is_auth_error() {
        let fx = Fixture::new();
        let (order, intent) = fx.order_with_intent().await;
        let (body, _) = fx.gateway.signed_event("payment_succeeded", &intent, WEBHOOK_SECRET);
        let (_, forged) = fx.gateway.signed_event("payment_succeeded", &intent, "whsec_forged");

        let err = fx.reconciler.handle_gateway_event(&body, &forged).await.unwrap_err();

        assert!(matches!(err, OrderError::Auth(_)));
        assert_eq!(fx.store.get(order.id).await.unwrap().unwrap().state(), OrderState::initial());
    }

    #[tokio::test]
    async fn test_webhook_without_secret_is_internal_error() {
        let fx = Fixture::with_secret(None);
        let (body, header) = fx.gateway.signed_event("payment_succeeded", "pi_1", WEBHOOK_SECRET);

        let err = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap_err();
        assert!(matches!(err, OrderError::Internal(_)));
        assert!(!fx.reconciler.webhook_configured());
    }

    #[tokio::test]
    async fn test_webhook_anomalies_are_acknowledged() {
        let fx = Fixture::new();

        let (body, header) = fx.gateway.signed_event("payment_succeeded", "pi_nobody", WEBHOOK_SECRET);
        let outcome = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        assert!(matches!(outcome.ack, Ack::NoOp(_)));

        let (body, header) = fx.gateway.signed_event("customer.created", "cus_1", WEBHOOK_SECRET);
        let outcome = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        assert_eq!(outcome.ack, Ack::NoOp("unhandled event type customer.created".to_string()));

        let body = b"[1,2,3]".to_vec();
        let header = crate::gateway::signature::signature_header(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &body);
        let outcome = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();
        assert!(matches!(outcome.ack, Ack::NoOp(ref reason) if reason.starts_with("malformed")));
    }

    #[tokio::test]
    async fn test_payment_for_cancelled_order_needs_manual_refund() {
        let fx = Fixture::new();
        let (order, intent) = fx.order_with_intent().await;
        fx.manager
            .cancel_order(order.id, &Principal::member(order.buyer_id))
            .await
            .unwrap();

        let (body, header) = fx.gateway.signed_event("payment_intent.succeeded", &intent, WEBHOOK_SECRET);
        let outcome = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();

        assert!(matches!(outcome.ack, Ack::NoOp(_)));
        let stored = fx.store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), OrderState::new(OrderStatus::Cancelled, PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn test_payment_failed_notifies_buyer_without_state_change() {
        let fx = Fixture::new();
        let (order, intent) = fx.order_with_intent().await;
        let (body, header) = fx.gateway.signed_event("payment_failed", &intent, WEBHOOK_SECRET);

        let outcome = fx.reconciler.handle_gateway_event(&body, &header).await.unwrap();

        assert_eq!(outcome.ack, Ack::Processed);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type(), "PaymentFailed");
        assert_eq!(outcome.events[0].recipient(), order.buyer_id);
        assert_eq!(fx.store.get(order.id).await.unwrap().unwrap().state(), OrderState::initial());
    }
}
