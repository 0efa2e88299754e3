use std::sync::Arc;

use crate::actors::EventDispatcher;
use crate::domain::order::{
    parse_id, AddressPolicy, ChangeStatusRequest, Committed, Order, OrderLifecycleManager, OrderResult,
    PlaceOrderRequest, Principal, ConfirmPaymentRequest,
};
use crate::domain::payment::{Ack, IntentHandle, PaymentReconciler};

// ============================================================================
// Order Service - command and query surface for the presentation layer
// ============================================================================
//
// Every command runs: Validation → Manager/Reconciler → Event Dispatch
//
// Events are published only after the conditional write has committed, and
// publishing never fails the request.
//
// ============================================================================

pub struct OrderService {
    lifecycle: Arc<OrderLifecycleManager>,
    reconciler: Arc<PaymentReconciler>,
    dispatcher: EventDispatcher,
    address_policy: AddressPolicy,
}

impl OrderService {
    pub fn new(
        lifecycle: Arc<OrderLifecycleManager>,
        reconciler: Arc<PaymentReconciler>,
        dispatcher: EventDispatcher,
        address_policy: AddressPolicy,
    ) -> Self {
        Self {
            lifecycle,
            reconciler,
            dispatcher,
            address_policy,
        }
    }

    async fn commit(&self, committed: Committed) -> Order {
        self.dispatcher.publish(committed.events).await;
        committed.order
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub async fn create_order(&self, buyer: &Principal, request: PlaceOrderRequest) -> OrderResult<Order> {
        let command = request.validate(&self.address_policy)?;
        let committed = self.lifecycle.create_order(buyer, command).await?;
        Ok(self.commit(committed).await)
    }

    pub async fn change_status(&self, actor: &Principal, request: ChangeStatusRequest) -> OrderResult<Order> {
        let command = request.validate()?;
        let committed = self
            .lifecycle
            .transition_status(command.order_id, actor, command.target)
            .await?;
        Ok(self.commit(committed).await)
    }

    pub async fn cancel_order(&self, actor: &Principal, order_id: &str) -> OrderResult<Order> {
        let order_id = parse_id("order_id", order_id)?;
        let committed = self.lifecycle.cancel_order(order_id, actor).await?;
        Ok(self.commit(committed).await)
    }

    pub async fn create_payment_intent(&self, buyer: &Principal, order_id: &str) -> OrderResult<IntentHandle> {
        let order_id = parse_id("order_id", order_id)?;
        self.reconciler.create_intent(order_id, buyer).await
    }

    pub async fn confirm_payment(&self, buyer: &Principal, request: ConfirmPaymentRequest) -> OrderResult<Order> {
        let command = request.validate()?;
        let committed = self.reconciler.confirm_payment(command, buyer).await?;
        Ok(self.commit(committed).await)
    }

    pub async fn handle_gateway_event(&self, raw_body: &[u8], signature_header: &str) -> OrderResult<Ack> {
        let outcome = self.reconciler.handle_gateway_event(raw_body, signature_header).await?;
        self.dispatcher.publish(outcome.events).await;
        Ok(outcome.ack)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_order(&self, actor: &Principal, order_id: &str) -> OrderResult<Order> {
        let order_id = parse_id("order_id", order_id)?;
        self.lifecycle.get_order(order_id, actor).await
    }

    pub async fn list_buyer_orders(&self, actor: &Principal) -> OrderResult<Vec<Order>> {
        self.lifecycle.list_for_buyer(actor, actor.user_id).await
    }

    pub async fn list_seller_orders(&self, actor: &Principal) -> OrderResult<Vec<Order>> {
        self.lifecycle.list_for_seller(actor, actor.user_id).await
    }

    pub fn webhook_configured(&self) -> bool {
        self.reconciler.webhook_configured()
    }

    /// Wait for queued notifications; used at shutdown and by tests.
    pub async fn flush_notifications(&self) -> anyhow::Result<()> {
        self.dispatcher.flush().await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
