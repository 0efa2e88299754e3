use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::payment::{
    CreateIntentRequest, GatewayError, GatewayEvent, GatewayEventKind, IntentHandle, IntentMetadata,
    IntentSnapshot, IntentStatus, PaymentGateway,
};
use super::signature::{signature_header, verify_header};

// ============================================================================
// In-Process Payment Gateway
// ============================================================================
//
// Keeps intents in memory and signs webhook events with the same scheme a
// hosted processor uses. Local runs and tests drive payments through
// mark_succeeded / mark_failed and feed signed_event output to the webhook.
//
// ============================================================================

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct IntentRecord {
    amount: i64,
    currency: String,
    metadata: IntentMetadata,
    client_secret: String,
    status: IntentStatus,
}

#[derive(Default)]
struct Ledger {
    intents: HashMap<String, IntentRecord>,
    by_idempotency_key: HashMap<String, String>,
}

pub struct InProcessGateway {
    ledger: Mutex<Ledger>,
    tolerance_secs: i64,
    fail_next: AtomicBool,
    intents_created: AtomicUsize,
}

impl Default for InProcessGateway {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECS)
    }
}

impl InProcessGateway {
    pub fn new(tolerance_secs: i64) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            tolerance_secs,
            fail_next: AtomicBool::new(false),
            intents_created: AtomicUsize::new(0),
        }
    }

    /// Number of distinct intents created; idempotent replays do not count.
    pub fn intents_created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }

    /// Make the next create/retrieve call fail as if the processor were down.
    pub fn fail_next_call(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Drop every remembered idempotency key, as a processor does once they
    /// age out. Existing intents stay retrievable.
    pub async fn expire_idempotency_keys(&self) {
        self.ledger.lock().await.by_idempotency_key.clear();
    }

    pub async fn mark_succeeded(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.set_status(intent_id, IntentStatus::Succeeded).await
    }

    pub async fn mark_failed(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.set_status(intent_id, IntentStatus::Failed).await
    }

    pub async fn amount_of(&self, intent_id: &str) -> Option<(i64, String)> {
        let ledger = self.ledger.lock().await;
        ledger
            .intents
            .get(intent_id)
            .map(|record| (record.amount, record.currency.clone()))
    }

    /// A webhook body for `event_type` about `intent_id`, with a fresh header.
    pub fn signed_event(&self, event_type: &str, intent_id: &str, secret: &str) -> (Vec<u8>, String) {
        let body = serde_json::json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": event_type,
            "data": { "object": { "id": intent_id } },
        });
        let payload = body.to_string().into_bytes();
        let header = signature_header(secret, Utc::now().timestamp(), &payload);
        (payload, header)
    }

    async fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<(), GatewayError> {
        let mut ledger = self.ledger.lock().await;
        let record = ledger
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;
        record.status = status;
        tracing::debug!(intent_id = intent_id, status = %status, "Intent status simulated");
        Ok(())
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("simulated processor outage".to_string()));
        }
        Ok(())
    }

    fn classify(kind: &str, failure: Option<RawFailure>) -> GatewayEventKind {
        match kind {
            "payment_intent.succeeded" | "payment_succeeded" => GatewayEventKind::PaymentSucceeded,
            "payment_intent.payment_failed" | "payment_failed" => GatewayEventKind::PaymentFailed {
                reason: failure.and_then(|f| f.message),
            },
            other => GatewayEventKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Debug, Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    id: Option<String>,
    #[serde(default)]
    last_payment_error: Option<RawFailure>,
}

#[derive(Debug, Deserialize)]
struct RawFailure {
    message: Option<String>,
}

#[async_trait]
impl PaymentGateway for InProcessGateway {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.metadata.order_id, amount = request.amount))]
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<IntentHandle, GatewayError> {
        self.check_available()?;
        if request.amount <= 0 {
            return Err(GatewayError::Rejected(format!("amount must be positive, got {}", request.amount)));
        }

        let mut ledger = self.ledger.lock().await;
        if let Some(existing) = ledger.by_idempotency_key.get(&request.idempotency_key) {
            if let Some(record) = ledger.intents.get(existing) {
                tracing::debug!(intent_id = %existing, "Idempotent replay of intent creation");
                return Ok(IntentHandle {
                    id: existing.clone(),
                    client_secret: record.client_secret.clone(),
                });
            }
        }

        let id = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{}_secret_{}", id, Uuid::new_v4().simple());
        ledger.intents.insert(
            id.clone(),
            IntentRecord {
                amount: request.amount,
                currency: request.currency,
                metadata: request.metadata,
                client_secret: client_secret.clone(),
                status: IntentStatus::RequiresPayment,
            },
        );
        ledger.by_idempotency_key.insert(request.idempotency_key, id.clone());
        self.intents_created.fetch_add(1, Ordering::SeqCst);

        tracing::info!(intent_id = %id, "Payment intent created");
        Ok(IntentHandle { id, client_secret })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, GatewayError> {
        self.check_available()?;
        let ledger = self.ledger.lock().await;
        let record = ledger
            .intents
            .get(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;

        tracing::debug!(
            intent_id = intent_id,
            order_id = %record.metadata.order_id,
            status = %record.status,
            "Payment intent retrieved"
        );
        Ok(IntentSnapshot {
            id: intent_id.to_string(),
            status: record.status,
            client_secret: record.client_secret.clone(),
        })
    }

    fn verify_and_parse_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        webhook_secret: &str,
    ) -> Result<GatewayEvent, GatewayError> {
        verify_header(
            raw_body,
            signature_header,
            webhook_secret,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )
        .map_err(|e| GatewayError::Signature(e.to_string()))?;

        let raw: RawEvent =
            serde_json::from_slice(raw_body).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let (intent_id, failure) = match raw.data {
            Some(data) => (data.object.id, data.object.last_payment_error),
            None => (None, None),
        };

        Ok(GatewayEvent {
            id: raw.id,
            kind: Self::classify(&raw.kind, failure),
            intent_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn request(order_id: Uuid, amount: i64) -> CreateIntentRequest {
        CreateIntentRequest {
            amount,
            currency: "usd".to_string(),
            metadata: IntentMetadata {
                order_id,
                buyer_id: Uuid::new_v4(),
                seller_id: Uuid::new_v4(),
                post_id: Uuid::new_v4(),
            },
            idempotency_key: format!("order-{}", order_id),
        }
    }

    #[tokio::test]
    async fn test_create_intent_is_idempotent_per_key() {
        let gateway = InProcessGateway::default();
        let order_id = Uuid::new_v4();

        let first = gateway.create_intent(request(order_id, 4500)).await.unwrap();
        let second = gateway.create_intent(request(order_id, 4500)).await.unwrap();
        let other = gateway.create_intent(request(Uuid::new_v4(), 4500)).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.id, other.id);
        assert_eq!(gateway.intents_created(), 2);
        assert_eq!(gateway.amount_of(&first.id).await, Some((4500, "usd".to_string())));
    }

    #[tokio::test]
    async fn test_expired_key_yields_a_new_intent() {
        let gateway = InProcessGateway::default();
        let order_id = Uuid::new_v4();

        let first = gateway.create_intent(request(order_id, 4500)).await.unwrap();
        gateway.expire_idempotency_keys().await;
        let second = gateway.create_intent(request(order_id, 4500)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(gateway.retrieve_intent(&first.id).await.unwrap().handle(), first);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount_and_simulated_outage() {
        let gateway = InProcessGateway::default();
        assert!(matches!(
            gateway.create_intent(request(Uuid::new_v4(), 0)).await,
            Err(GatewayError::Rejected(_))
        ));

        gateway.fail_next_call();
        assert!(matches!(
            gateway.create_intent(request(Uuid::new_v4(), 100)).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert!(gateway.create_intent(request(Uuid::new_v4(), 100)).await.is_ok());
    }

    #[tokio::test]
    async fn test_retrieve_reflects_simulated_status() {
        let gateway = InProcessGateway::default();
        let handle = gateway.create_intent(request(Uuid::new_v4(), 4500)).await.unwrap();

        let snapshot = gateway.retrieve_intent(&handle.id).await.unwrap();
        assert_eq!(snapshot.status, IntentStatus::RequiresPayment);

        gateway.mark_succeeded(&handle.id).await.unwrap();
        assert_eq!(gateway.retrieve_intent(&handle.id).await.unwrap().status, IntentStatus::Succeeded);

        assert!(matches!(
            gateway.retrieve_intent("pi_missing").await,
            Err(GatewayError::UnknownIntent(_))
        ));
    }

    #[test]
    fn test_signed_event_round_trips_through_verification() {
        let gateway = InProcessGateway::default();
        let (body, header) = gateway.signed_event("payment_intent.succeeded", "pi_1", SECRET);

        let event = gateway.verify_and_parse_event(&body, &header, SECRET).unwrap();

        assert_eq!(event.kind, GatewayEventKind::PaymentSucceeded);
        assert_eq!(event.intent_id.as_deref(), Some("pi_1"));
        assert!(event.id.starts_with("evt_"));
    }

    #[test]
    fn test_bad_signature_is_rejected_before_parsing() {
        let gateway = InProcessGateway::default();
        let (_, header) = gateway.signed_event("payment_succeeded", "pi_1", SECRET);

        let err = gateway
            .verify_and_parse_event(b"not even json", &header, SECRET)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Signature(_)));
    }

    #[test]
    fn test_signed_garbage_is_malformed_payload() {
        let gateway = InProcessGateway::default();
        let body = b"{\"unexpected\":true}";
        let header = signature_header(SECRET, Utc::now().timestamp(), body);

        let err = gateway.verify_and_parse_event(body, &header, SECRET).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedPayload(_)));
    }

    #[test]
    fn test_failure_reason_and_unknown_types() {
        let gateway = InProcessGateway::default();
        let body = serde_json::json!({
            "id": "evt_9",
            "type": "payment_intent.payment_failed",
            "data": { "object": { "id": "pi_9", "last_payment_error": { "message": "card declined" } } }
        })
        .to_string()
        .into_bytes();
        let header = signature_header(SECRET, Utc::now().timestamp(), &body);

        let event = gateway.verify_and_parse_event(&body, &header, SECRET).unwrap();
        assert_eq!(
            event.kind,
            GatewayEventKind::PaymentFailed { reason: Some("card declined".to_string()) }
        );

        let (body, header) = gateway.signed_event("charge.refunded", "pi_9", SECRET);
        let event = gateway.verify_and_parse_event(&body, &header, SECRET).unwrap();
        assert_eq!(event.kind, GatewayEventKind::Other("charge.refunded".to_string()));
    }
}
