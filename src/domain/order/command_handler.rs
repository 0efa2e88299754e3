use std::sync::Arc;
use uuid::Uuid;

use crate::domain::catalog::PostCatalog;
use crate::metrics::LifecycleMetrics;
use crate::store::{OrderStore, WriteOutcome};

use super::aggregate::{transition, LifecycleEvent, Order, Step};
use super::commands::PlaceOrder;
use super::errors::{OrderError, OrderResult};
use super::events::*;
use super::value_objects::{OrderStatus, Principal};

// ============================================================================
// Order Lifecycle Manager
// ============================================================================
//
// Orchestrates: Command → Authorization → Transition Table → Conditional Write
//
// Returns the committed order together with the domain events it produced.
// Delivering those events is the caller's job and happens after the write.
//
// ============================================================================

/// A committed change and the events to hand to the notification sink.
#[derive(Debug, Clone)]
pub struct Committed {
    pub order: Order,
    pub events: Vec<OrderEvent>,
}

impl Committed {
    fn unchanged(order: Order) -> Self {
        Self { order, events: Vec::new() }
    }
}

/// Who caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Initiator {
    PaymentProcessor,
    User(Uuid),
}

pub struct OrderLifecycleManager {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn PostCatalog>,
    metrics: Arc<LifecycleMetrics>,
}

impl OrderLifecycleManager {
    pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<dyn PostCatalog>, metrics: Arc<LifecycleMetrics>) -> Self {
        Self { store, catalog, metrics }
    }

    #[tracing::instrument(skip(self, buyer, command), fields(buyer_id = %buyer.user_id, post_id = %command.post_id))]
    pub async fn create_order(&self, buyer: &Principal, command: PlaceOrder) -> OrderResult<Committed> {
        let post = self
            .catalog
            .find_post(command.post_id)
            .await?
            .ok_or(OrderError::PostNotFound(command.post_id))?;

        if !post.active {
            return Err(OrderError::InvalidState(format!("post {} is not available", post.id)));
        }

        let order = Order::place(buyer.user_id, &post, command.delivery_address)?;
        self.store.insert(&order).await?;
        self.metrics.orders_created.inc();

        tracing::info!(
            order_id = %order.id,
            seller_id = %order.seller_id,
            total_amount = order.total_amount,
            "✅ Order placed"
        );

        let events = vec![OrderEvent::Created(OrderCreated {
            order_id: order.id,
            recipient: order.seller_id,
            buyer_id: order.buyer_id,
            post_id: order.post_id,
            total_amount: order.total_amount,
        })];

        Ok(Committed { order, events })
    }

    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        actor: &Principal,
        target: OrderStatus,
    ) -> OrderResult<Committed> {
        let order = self.load(order_id).await?;

        let event = LifecycleEvent::for_target(target).ok_or(OrderError::InvalidTransition {
            from: order.status,
            to: target,
        })?;
        Self::authorize(&order, actor, event)?;

        self.apply(order, event, Initiator::User(actor.user_id)).await
    }

    pub async fn cancel_order(&self, order_id: Uuid, actor: &Principal) -> OrderResult<Committed> {
        self.transition_status(order_id, actor, OrderStatus::Cancelled).await
    }

    /// The shared PaymentSucceeded transition. A no-op once the order is paid.
    pub async fn apply_payment_succeeded(&self, order: Order) -> OrderResult<Committed> {
        self.apply(order, LifecycleEvent::PaymentSucceeded, Initiator::PaymentProcessor)
            .await
    }

    pub async fn get_order(&self, order_id: Uuid, actor: &Principal) -> OrderResult<Order> {
        let order = self.load(order_id).await?;
        if !order.visible_to(actor) {
            return Err(OrderError::Forbidden(format!(
                "user {} is not a party to order {}",
                actor.user_id, order_id
            )));
        }
        Ok(order)
    }

    pub async fn list_for_buyer(&self, actor: &Principal, buyer_id: Uuid) -> OrderResult<Vec<Order>> {
        Self::authorize_listing(actor, buyer_id)?;
        self.store.list_by_buyer(buyer_id).await
    }

    pub async fn list_for_seller(&self, actor: &Principal, seller_id: Uuid) -> OrderResult<Vec<Order>> {
        Self::authorize_listing(actor, seller_id)?;
        self.store.list_by_seller(seller_id).await
    }

    async fn load(&self, order_id: Uuid) -> OrderResult<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    fn authorize(order: &Order, actor: &Principal, event: LifecycleEvent) -> OrderResult<()> {
        let allowed = match event {
            LifecycleEvent::Ship | LifecycleEvent::Deliver => order.is_seller(actor) || actor.is_admin(),
            LifecycleEvent::Cancel => order.is_buyer(actor) || order.is_seller(actor),
            LifecycleEvent::PaymentSucceeded => false,
        };

        if allowed {
            Ok(())
        } else {
            tracing::warn!(
                order_id = %order.id,
                actor_id = %actor.user_id,
                event = ?event,
                "Rejected unauthorized transition"
            );
            Err(OrderError::Forbidden(format!(
                "user {} may not move order {} to {}",
                actor.user_id,
                order.id,
                event.target_status()
            )))
        }
    }

    fn authorize_listing(actor: &Principal, owner_id: Uuid) -> OrderResult<()> {
        if actor.user_id == owner_id || actor.is_admin() {
            Ok(())
        } else {
            Err(OrderError::Forbidden(format!(
                "user {} may not list orders of {}",
                actor.user_id, owner_id
            )))
        }
    }

    /// Evaluate the transition table and commit with a conditional write.
    /// A lost race re-evaluates against the winner's state, so the loop ends
    /// once the table answers Unchanged or Rejected.
    async fn apply(&self, mut current: Order, event: LifecycleEvent, initiator: Initiator) -> OrderResult<Committed> {
        loop {
            let next = match transition(current.state(), event) {
                Ok(Step::Advance(next)) => next,
                Ok(Step::Unchanged) => {
                    tracing::debug!(order_id = %current.id, event = ?event, "Transition already applied");
                    return Ok(Committed::unchanged(current));
                }
                Err(rejection) => return Err(rejection.into()),
            };

            match self.store.compare_and_set_state(current.id, current.state(), next).await? {
                WriteOutcome::Applied(updated) => {
                    self.metrics.record_transition(current.status.as_str(), updated.status.as_str());
                    tracing::info!(
                        order_id = %updated.id,
                        from = %current.state(),
                        to = %updated.state(),
                        "✅ Order transition committed"
                    );

                    let events = Self::events_for(&current, &updated, event, initiator);
                    return Ok(Committed { order: updated, events });
                }
                WriteOutcome::Conflict(latest) => {
                    self.metrics.record_conflict(event.target_status().as_str());
                    tracing::debug!(
                        order_id = %latest.id,
                        expected = %current.state(),
                        found = %latest.state(),
                        "Order changed concurrently, re-evaluating"
                    );
                    current = latest;
                }
            }
        }
    }

    fn events_for(before: &Order, after: &Order, event: LifecycleEvent, initiator: Initiator) -> Vec<OrderEvent> {
        match (event, initiator) {
            (LifecycleEvent::PaymentSucceeded, _) => vec![OrderEvent::PaymentReceived(PaymentReceived {
                order_id: after.id,
                recipient: after.seller_id,
                amount: after.total_amount,
                payment_intent_ref: after.payment_intent_ref.clone(),
            })],
            (LifecycleEvent::Cancel, Initiator::User(actor)) => vec![OrderEvent::Cancelled(OrderCancelled {
                order_id: after.id,
                recipient: after.counterparty_of(actor),
                cancelled_by: actor,
                previous_status: before.status,
            })],
            (LifecycleEvent::Ship | LifecycleEvent::Deliver, Initiator::User(actor)) => {
                vec![OrderEvent::StatusChanged(StatusChanged {
                    order_id: after.id,
                    recipient: after.counterparty_of(actor),
                    changed_by: actor,
                    from: before.status,
                    to: after.status,
                })]
            }
            (_, Initiator::PaymentProcessor) => Vec::new(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
