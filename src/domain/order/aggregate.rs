use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::PostSummary;
use super::errors::{OrderError, OrderResult};
use super::value_objects::{DeliveryAddress, OrderState, OrderStatus, PaymentStatus, Principal};

// ============================================================================
// Order Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub post_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,

    pub delivery_address: DeliveryAddress,
    /// Minor currency units.
    pub total_amount: i64,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_ref: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new (Pending, Pending) order for `buyer_id` against `post`.
    pub fn place(buyer_id: Uuid, post: &PostSummary, delivery_address: DeliveryAddress) -> OrderResult<Self> {
        if buyer_id == post.owner_id {
            return Err(OrderError::InvalidState("cannot order your own post".to_string()));
        }
        let total_amount = match post.price {
            Some(price) if price > 0 => price,
            _ => return Err(OrderError::InvalidState(format!("post {} has no price", post.id))),
        };

        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            post_id: post.id,
            buyer_id,
            seller_id: post.owner_id,
            delivery_address,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_intent_ref: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn state(&self) -> OrderState {
        OrderState::new(self.status, self.payment_status)
    }

    pub fn is_buyer(&self, principal: &Principal) -> bool {
        self.buyer_id == principal.user_id
    }

    pub fn is_seller(&self, principal: &Principal) -> bool {
        self.seller_id == principal.user_id
    }

    /// Buyer, seller and admins may read an order.
    pub fn visible_to(&self, principal: &Principal) -> bool {
        self.is_buyer(principal) || self.is_seller(principal) || principal.is_admin()
    }

    /// The party to notify when `actor` changes the order.
    pub fn counterparty_of(&self, actor: Uuid) -> Uuid {
        if actor == self.buyer_id {
            self.seller_id
        } else {
            self.buyer_id
        }
    }

    /// Copy of this order moved to `next`, stamped at `at`.
    pub fn with_state(&self, next: OrderState, at: DateTime<Utc>) -> Self {
        Self {
            status: next.status,
            payment_status: next.payment_status,
            updated_at: at,
            ..self.clone()
        }
    }
}

// ============================================================================
// Transition Table
// ============================================================================
//
// The single definition of which (status, payment_status) moves are legal.
// Pure: no I/O, no clock, no actor. Authorization is checked by the caller.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PaymentSucceeded,
    Ship,
    Deliver,
    Cancel,
}

impl LifecycleEvent {
    /// Map an actor-requested status onto the event that produces it.
    /// Pending and Confirmed cannot be requested directly.
    pub fn for_target(target: OrderStatus) -> Option<Self> {
        match target {
            OrderStatus::Shipped => Some(LifecycleEvent::Ship),
            OrderStatus::Delivered => Some(LifecycleEvent::Deliver),
            OrderStatus::Cancelled => Some(LifecycleEvent::Cancel),
            OrderStatus::Pending | OrderStatus::Confirmed => None,
        }
    }

    pub fn target_status(&self) -> OrderStatus {
        match self {
            LifecycleEvent::PaymentSucceeded => OrderStatus::Confirmed,
            LifecycleEvent::Ship => OrderStatus::Shipped,
            LifecycleEvent::Deliver => OrderStatus::Delivered,
            LifecycleEvent::Cancel => OrderStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Advance(OrderState),
    /// Event already reflected in the state; nothing to write.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Order is cancelled.
    Terminal,
    /// Fulfillment step requested out of order.
    OutOfSequence,
    /// Cancellation after the item left the seller.
    AlreadyFulfilled,
    /// Payment arrived for an order that can no longer be settled.
    PaymentClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub from: OrderState,
    pub event: LifecycleEvent,
    pub reason: RejectionReason,
}

impl From<Rejection> for OrderError {
    fn from(rejection: Rejection) -> Self {
        let from = rejection.from.status;
        let to = rejection.event.target_status();
        match rejection.reason {
            RejectionReason::Terminal | RejectionReason::OutOfSequence => {
                OrderError::InvalidTransition { from, to }
            }
            RejectionReason::AlreadyFulfilled => {
                OrderError::InvalidState(format!("order is already {} and can no longer be cancelled", from))
            }
            RejectionReason::PaymentClosed => OrderError::InvalidState(format!(
                "order is {} and cannot accept payment",
                rejection.from
            )),
        }
    }
}

pub fn transition(current: OrderState, event: LifecycleEvent) -> Result<Step, Rejection> {
    use OrderStatus::*;

    let reject = |reason| Err(Rejection { from: current, event, reason });

    match event {
        LifecycleEvent::PaymentSucceeded => match (current.status, current.payment_status) {
            (_, PaymentStatus::Paid) | (_, PaymentStatus::Refunded) => Ok(Step::Unchanged),
            (Cancelled, PaymentStatus::Pending) => reject(RejectionReason::PaymentClosed),
            (Pending, PaymentStatus::Pending) => Ok(Step::Advance(OrderState::new(Confirmed, PaymentStatus::Paid))),
            (status, PaymentStatus::Pending) => Ok(Step::Advance(OrderState::new(status, PaymentStatus::Paid))),
        },
        LifecycleEvent::Ship => match (current.status, current.payment_status) {
            (Confirmed, PaymentStatus::Paid) => Ok(Step::Advance(OrderState::new(Shipped, PaymentStatus::Paid))),
            (Cancelled, _) => reject(RejectionReason::Terminal),
            _ => reject(RejectionReason::OutOfSequence),
        },
        LifecycleEvent::Deliver => match (current.status, current.payment_status) {
            (Shipped, PaymentStatus::Paid) => Ok(Step::Advance(OrderState::new(Delivered, PaymentStatus::Paid))),
            (Cancelled, _) => reject(RejectionReason::Terminal),
            _ => reject(RejectionReason::OutOfSequence),
        },
        LifecycleEvent::Cancel => match current.status {
            Pending | Confirmed => Ok(Step::Advance(OrderState::new(Cancelled, current.payment_status))),
            Shipped | Delivered => reject(RejectionReason::AlreadyFulfilled),
            Cancelled => reject(RejectionReason::Terminal),
        },
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
