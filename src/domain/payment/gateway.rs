use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::order::OrderError;

// ============================================================================
// Payment Gateway - the payment processor as seen by the core
// ============================================================================

/// Keys attached to every intent so the processor's dashboard can be traced
/// back to the marketplace order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub post_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub metadata: IntentMetadata,
    /// Repeating a request with the same key returns the original intent.
    pub idempotency_key: String,
}

/// What the client needs to complete the charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentHandle {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPayment,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresPayment => "requires_payment_method",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Failed => "failed",
            IntentStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentSnapshot {
    pub id: String,
    pub status: IntentStatus,
    pub client_secret: String,
}

impl IntentSnapshot {
    pub fn handle(&self) -> IntentHandle {
        IntentHandle {
            id: self.id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEventKind {
    PaymentSucceeded,
    PaymentFailed { reason: Option<String> },
    /// Any event type the core does not act on.
    Other(String),
}

/// A webhook event whose signature has been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub id: String,
    pub kind: GatewayEventKind,
    pub intent_id: Option<String>,
}

impl GatewayEvent {
    pub fn type_label(&self) -> &str {
        match &self.kind {
            GatewayEventKind::PaymentSucceeded => "payment_succeeded",
            GatewayEventKind::PaymentFailed { .. } => "payment_failed",
            GatewayEventKind::Other(kind) => kind,
        }
    }

    /// Like `type_label`, but from a fixed set so metric cardinality stays
    /// bounded whatever the processor sends.
    pub fn metric_label(&self) -> &'static str {
        match &self.kind {
            GatewayEventKind::PaymentSucceeded => "payment_succeeded",
            GatewayEventKind::PaymentFailed { .. } => "payment_failed",
            GatewayEventKind::Other(_) => "other",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network or processor-side failure; safe to retry.
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),

    #[error("payment processor rejected the request: {0}")]
    Rejected(String),

    #[error("unknown payment intent: {0}")]
    UnknownIntent(String),

    #[error("invalid webhook signature: {0}")]
    Signature(String),

    /// Signature was valid but the body could not be understood.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
}

impl From<GatewayError> for OrderError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Signature(reason) => OrderError::Auth(reason),
            GatewayError::UnknownIntent(id) => OrderError::PaymentIntentNotFound(id),
            other => OrderError::Gateway(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Processors only honour the idempotency key for a limited time; a
    /// repeated request may come back with a different intent.
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<IntentHandle, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, GatewayError>;

    /// Must reject a bad signature before looking at the body.
    fn verify_and_parse_event(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        webhook_secret: &str,
    ) -> Result<GatewayEvent, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::ErrorKind;

    #[test]
    fn test_gateway_errors_map_onto_taxonomy() {
        let auth: OrderError = GatewayError::Signature("mismatch".into()).into();
        assert_eq!(auth.kind(), ErrorKind::AuthError);

        let transient: OrderError = GatewayError::Unavailable("timeout".into()).into();
        assert_eq!(transient.kind(), ErrorKind::GatewayError);
        assert!(transient.is_retryable());

        let unknown: OrderError = GatewayError::UnknownIntent("pi_x".into()).into();
        assert_eq!(unknown.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_event_type_labels() {
        let event = GatewayEvent {
            id: "evt_1".into(),
            kind: GatewayEventKind::Other("charge.refunded".into()),
            intent_id: None,
        };
        assert_eq!(event.type_label(), "charge.refunded");
        assert_eq!(event.metric_label(), "other");
        assert_eq!(IntentStatus::RequiresPayment.to_string(), "requires_payment_method");
    }
}
