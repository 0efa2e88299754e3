use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Events - Domain Events handed to the notification sink
// ============================================================================
//
// Events are produced only after a transition has been committed. Every event
// names its recipient so the sink can route it without looking the order up.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    PaymentReceived(PaymentReceived),
    PaymentFailed(PaymentFailed),
    StatusChanged(StatusChanged),
    Cancelled(OrderCancelled),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::PaymentReceived(_) => "PaymentReceived",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::Cancelled(_) => "OrderCancelled",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(e) => e.order_id,
            OrderEvent::PaymentReceived(e) => e.order_id,
            OrderEvent::PaymentFailed(e) => e.order_id,
            OrderEvent::StatusChanged(e) => e.order_id,
            OrderEvent::Cancelled(e) => e.order_id,
        }
    }

    pub fn recipient(&self) -> Uuid {
        match self {
            OrderEvent::Created(e) => e.recipient,
            OrderEvent::PaymentReceived(e) => e.recipient,
            OrderEvent::PaymentFailed(e) => e.recipient,
            OrderEvent::StatusChanged(e) => e.recipient,
            OrderEvent::Cancelled(e) => e.recipient,
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Created - sent to the seller
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub recipient: Uuid,
    pub buyer_id: Uuid,
    pub post_id: Uuid,
    pub total_amount: i64,
}

/// Payment Received - sent to the seller once the order is settled
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentReceived {
    pub order_id: Uuid,
    pub recipient: Uuid,
    pub amount: i64,
    pub payment_intent_ref: Option<String>,
}

/// Payment Failed - sent to the buyer; the order stays payable
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentFailed {
    pub order_id: Uuid,
    pub recipient: Uuid,
    pub payment_intent_ref: String,
    pub reason: Option<String>,
}

/// Status Changed - fulfillment progress, sent to the counter-party
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusChanged {
    pub order_id: Uuid,
    pub recipient: Uuid,
    pub changed_by: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Order Cancelled - sent to the counter-party of whoever cancelled
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCancelled {
    pub order_id: Uuid,
    pub recipient: Uuid,
    pub cancelled_by: Uuid,
    pub previous_status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OrderEvent::Cancelled(OrderCancelled {
            order_id: Uuid::new_v4(),
            recipient: Uuid::new_v4(),
            cancelled_by: Uuid::new_v4(),
            previous_status: OrderStatus::Confirmed,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cancelled");
        assert_eq!(json["data"]["previous_status"], "confirmed");
    }

    #[test]
    fn test_accessors_route_to_recipient() {
        let order_id = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let event = OrderEvent::PaymentReceived(PaymentReceived {
            order_id,
            recipient: seller,
            amount: 4500,
            payment_intent_ref: Some("pi_1".to_string()),
        });

        assert_eq!(event.event_type(), "PaymentReceived");
        assert_eq!(event.order_id(), order_id);
        assert_eq!(event.recipient(), seller);
    }
}
