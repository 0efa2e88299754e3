use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::response::query_result::QueryResult;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{DeliveryAddress, Order, OrderError, OrderResult, OrderState};
use super::{OrderStore, WriteOutcome};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// All writes go through lightweight transactions (INSERT ... IF NOT EXISTS,
// UPDATE ... IF status = ? AND payment_status = ?), so the compare and the
// write are a single Paxos round per order. Reads use secondary indexes for
// the buyer, seller and payment intent lookups.
//
// A successful LWT is followed by a plain read for the columns the write did
// not touch; the columns it did touch are taken from the write itself, since
// another writer may already have moved the row again.
//
// ============================================================================

const ORDER_COLUMNS: &str = "id, post_id, buyer_id, seller_id, delivery_address, total_amount, \
                             status, payment_status, payment_intent_ref, created_at, updated_at";

type OrderRow = (
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    String,
    i64,
    String,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create the orders table and its lookup indexes in the session keyspace.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    id uuid PRIMARY KEY,
                    post_id uuid,
                    buyer_id uuid,
                    seller_id uuid,
                    delivery_address text,
                    total_amount bigint,
                    status text,
                    payment_status text,
                    payment_intent_ref text,
                    created_at timestamp,
                    updated_at timestamp
                )",
                &[],
            )
            .await
            .context("creating orders table")?;

        for (name, column) in [
            ("orders_by_buyer", "buyer_id"),
            ("orders_by_seller", "seller_id"),
            ("orders_by_payment_intent", "payment_intent_ref"),
        ] {
            self.session
                .query_unpaged(
                    format!("CREATE INDEX IF NOT EXISTS {} ON orders ({})", name, column),
                    &[],
                )
                .await
                .with_context(|| format!("creating index {}", name))?;
        }

        tracing::info!("Order schema ready");
        Ok(())
    }

    fn decode(row: OrderRow) -> Result<Order> {
        let (
            id,
            post_id,
            buyer_id,
            seller_id,
            delivery_address,
            total_amount,
            status,
            payment_status,
            payment_intent_ref,
            created_at,
            updated_at,
        ) = row;

        let delivery_address: DeliveryAddress = serde_json::from_str(&delivery_address)
            .with_context(|| format!("decoding delivery address of order {}", id))?;

        Ok(Order {
            id,
            post_id,
            buyer_id,
            seller_id,
            delivery_address,
            total_amount,
            status: status.parse()?,
            payment_status: payment_status.parse()?,
            payment_intent_ref,
            created_at,
            updated_at,
        })
    }

    /// Read the `[applied]` column every LWT response starts with.
    fn was_applied(result: QueryResult) -> Result<bool> {
        let rows = result.into_rows_result()?;
        let row = rows.first_row::<Row>()?;
        match row.columns.first() {
            Some(Some(CqlValue::Boolean(applied))) => Ok(*applied),
            other => bail!("unexpected [applied] column in LWT response: {:?}", other),
        }
    }

    async fn fetch_one(&self, column: &str, key: impl scylla::serialize::value::SerializeValue + Send) -> Result<Option<Order>> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM orders WHERE {} = ?", ORDER_COLUMNS, column),
                (key,),
            )
            .await?;

        let rows = result.into_rows_result()?;
        match rows.maybe_first_row::<OrderRow>()? {
            Some(row) => Ok(Some(Self::decode(row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_many(&self, column: &str, key: Uuid) -> Result<Vec<Order>> {
        let result = self
            .session
            .query_unpaged(
                format!("SELECT {} FROM orders WHERE {} = ?", ORDER_COLUMNS, column),
                (key,),
            )
            .await?;

        let rows = result.into_rows_result()?;
        let mut orders = Vec::new();
        for row in rows.rows::<OrderRow>()? {
            orders.push(Self::decode(row?)?);
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        tracing::debug!(column = column, key = %key, count = orders.len(), "Loaded orders");
        Ok(orders)
    }

    async fn try_insert(&self, order: &Order) -> Result<bool> {
        let address = serde_json::to_string(&order.delivery_address)?;
        let result = self
            .session
            .query_unpaged(
                format!(
                    "INSERT INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                    ORDER_COLUMNS
                ),
                (
                    order.id,
                    order.post_id,
                    order.buyer_id,
                    order.seller_id,
                    address,
                    order.total_amount,
                    order.status.as_str(),
                    order.payment_status.as_str(),
                    order.payment_intent_ref.as_deref(),
                    order.created_at,
                    order.updated_at,
                ),
            )
            .await?;
        Self::was_applied(result)
    }

    async fn try_update_state(
        &self,
        order_id: Uuid,
        expected: OrderState,
        next: OrderState,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = self
            .session
            .query_unpaged(
                "UPDATE orders SET status = ?, payment_status = ?, updated_at = ? \
                 WHERE id = ? IF status = ? AND payment_status = ?",
                (
                    next.status.as_str(),
                    next.payment_status.as_str(),
                    at,
                    order_id,
                    expected.status.as_str(),
                    expected.payment_status.as_str(),
                ),
            )
            .await?;
        Self::was_applied(result)
    }

    async fn try_attach_intent(
        &self,
        order_id: Uuid,
        expected: OrderState,
        intent: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = self
            .session
            .query_unpaged(
                "UPDATE orders SET payment_intent_ref = ?, updated_at = ? \
                 WHERE id = ? IF status = ? AND payment_status = ? AND payment_intent_ref = null",
                (
                    intent,
                    at,
                    order_id,
                    expected.status.as_str(),
                    expected.payment_status.as_str(),
                ),
            )
            .await?;
        Self::was_applied(result)
    }

    /// Re-read after an LWT. `written` overlays the applied write onto the
    /// re-read row.
    async fn outcome<F>(&self, order_id: Uuid, applied: bool, written: F) -> OrderResult<WriteOutcome>
    where
        F: FnOnce(Order) -> Order,
    {
        let order = self
            .fetch_one("id", order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if applied {
            Ok(WriteOutcome::Applied(written(order)))
        } else {
            tracing::debug!(order_id = %order_id, state = %order.state(), "Conditional write lost the race");
            Ok(WriteOutcome::Conflict(order))
        }
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn insert(&self, order: &Order) -> OrderResult<()> {
        if !self.try_insert(order).await? {
            return Err(OrderError::Internal(format!("order {} already exists", order.id)));
        }
        tracing::info!(order_id = %order.id, "✅ Order persisted");
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> OrderResult<Option<Order>> {
        Ok(self.fetch_one("id", order_id).await?)
    }

    async fn find_by_payment_intent(&self, payment_intent_ref: &str) -> OrderResult<Option<Order>> {
        Ok(self
            .fetch_one("payment_intent_ref", payment_intent_ref.to_string())
            .await?)
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> OrderResult<Vec<Order>> {
        Ok(self.fetch_many("buyer_id", buyer_id).await?)
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> OrderResult<Vec<Order>> {
        Ok(self.fetch_many("seller_id", seller_id).await?)
    }

    async fn compare_and_set_state(
        &self,
        order_id: Uuid,
        expected: OrderState,
        next: OrderState,
    ) -> OrderResult<WriteOutcome> {
        let at = Utc::now();
        let applied = self.try_update_state(order_id, expected, next, at).await?;
        self.outcome(order_id, applied, |order| order.with_state(next, at)).await
    }

    async fn attach_payment_intent(
        &self,
        order_id: Uuid,
        expected: OrderState,
        payment_intent_ref: &str,
    ) -> OrderResult<WriteOutcome> {
        let at = Utc::now();
        let applied = self
            .try_attach_intent(order_id, expected, payment_intent_ref, at)
            .await?;
        self.outcome(order_id, applied, |order| Order {
            payment_intent_ref: Some(payment_intent_ref.to_string()),
            ..order.with_state(expected, at)
        })
        .await
    }
}
