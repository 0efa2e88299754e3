use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::order::{Order, OrderError, OrderResult, OrderState};
use super::{OrderStore, WriteOutcome};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// A single write lock covers the compare and the write, which makes each
// conditional update atomic with respect to every other writer.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    by_payment_intent: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: RwLock<Tables>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Conditional update shared by both write paths. `accepts` sees the
    /// stored order under the write lock.
    async fn update_if<P, F>(&self, order_id: Uuid, accepts: P, apply: F) -> OrderResult<WriteOutcome>
    where
        P: FnOnce(&Order) -> bool,
        F: FnOnce(&mut Order),
    {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if !accepts(order) {
            return Ok(WriteOutcome::Conflict(order.clone()));
        }

        let previous_intent = order.payment_intent_ref.clone();
        apply(order);
        order.updated_at = Utc::now();
        let updated = order.clone();

        if previous_intent.is_none() {
            if let Some(new) = updated.payment_intent_ref.clone() {
                tables.by_payment_intent.insert(new, order_id);
            }
        }

        Ok(WriteOutcome::Applied(updated))
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        orders
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> OrderResult<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(OrderError::Internal(format!("order {} already exists", order.id)));
        }
        if let Some(intent) = &order.payment_intent_ref {
            tables.by_payment_intent.insert(intent.clone(), order.id);
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> OrderResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn find_by_payment_intent(&self, payment_intent_ref: &str) -> OrderResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_payment_intent
            .get(payment_intent_ref)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> OrderResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let orders = tables.orders.values().filter(|o| o.buyer_id == buyer_id).cloned().collect();
        Ok(Self::newest_first(orders))
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> OrderResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let orders = tables.orders.values().filter(|o| o.seller_id == seller_id).cloned().collect();
        Ok(Self::newest_first(orders))
    }

    async fn compare_and_set_state(
        &self,
        order_id: Uuid,
        expected: OrderState,
        next: OrderState,
    ) -> OrderResult<WriteOutcome> {
        self.update_if(
            order_id,
            |order| order.state() == expected,
            |order| *order = order.with_state(next, Utc::now()),
        )
        .await
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        expected: OrderState,
        payment_intent_ref: &str,
    ) -> OrderResult<WriteOutcome> {
        let intent = payment_intent_ref.to_string();
        self.update_if(
            order_id,
            |order| order.state() == expected && order.payment_intent_ref.is_none(),
            move |order| order.payment_intent_ref = Some(intent),
        )
        .await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
