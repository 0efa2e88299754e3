// ============================================================================
// Order Store - Persistence for Order records
// ============================================================================
//
// Every mutation is a conditional write: it names the (status, payment_status)
// pair it expects and is a no-op when the stored order has moved on. The
// caller gets the current record back either way, so the loser of a race can
// re-evaluate without a second lookup.
//
// ============================================================================

mod memory;
mod scylla;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderResult, OrderState};

pub use memory::InMemoryOrderStore;
pub use scylla::ScyllaOrderStore;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write happened; carries the order as this write left it.
    Applied(Order),
    /// The expected state no longer matched; carries the current order.
    Conflict(Order),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a freshly placed order. Fails if the id already exists.
    async fn insert(&self, order: &Order) -> OrderResult<()>;

    async fn get(&self, order_id: Uuid) -> OrderResult<Option<Order>>;

    async fn find_by_payment_intent(&self, payment_intent_ref: &str) -> OrderResult<Option<Order>>;

    /// Newest first.
    async fn list_by_buyer(&self, buyer_id: Uuid) -> OrderResult<Vec<Order>>;

    /// Newest first.
    async fn list_by_seller(&self, seller_id: Uuid) -> OrderResult<Vec<Order>>;

    /// Move the order to `next` if it is still in `expected`.
    async fn compare_and_set_state(
        &self,
        order_id: Uuid,
        expected: OrderState,
        next: OrderState,
    ) -> OrderResult<WriteOutcome>;

    /// Record the gateway intent handle if the order is still in `expected`
    /// and has none yet. An attached intent is never replaced.
    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        expected: OrderState,
        payment_intent_ref: &str,
    ) -> OrderResult<WriteOutcome>;
}
