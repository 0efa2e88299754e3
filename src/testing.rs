// Shared wiring for unit tests: in-memory store, catalog and gateway behind
// a real lifecycle manager and reconciler.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::actors::EventDispatcher;
use crate::domain::catalog::{InMemoryPostCatalog, PostSummary};
use crate::domain::order::{
    AddressPolicy, DeliveryAddress, DeliveryAddressInput, Order, OrderLifecycleManager, PlaceOrder, Principal,
};
use crate::domain::payment::{PaymentReconciler, ReconcilerConfig};
use crate::gateway::InProcessGateway;
use crate::messaging::NotificationSink;
use crate::metrics::LifecycleMetrics;
use crate::service::OrderService;
use crate::store::InMemoryOrderStore;
use crate::utils::CircuitBreakerConfig;

pub(crate) const WEBHOOK_SECRET: &str = "whsec_test";

pub(crate) fn test_address() -> DeliveryAddress {
    DeliveryAddress {
        full_name: "Ada Buyer".to_string(),
        email: "ada@example.com".to_string(),
        phone: "+1 (555) 010-2030".to_string(),
        address: "1 Market St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip: "62701".to_string(),
        country: "US".to_string(),
    }
}

pub(crate) fn test_address_input() -> DeliveryAddressInput {
    let address = test_address();
    DeliveryAddressInput {
        full_name: Some(address.full_name),
        email: Some(address.email),
        phone: Some(address.phone),
        address: Some(address.address),
        city: Some(address.city),
        state: Some(address.state),
        zip: Some(address.zip),
        country: Some(address.country),
    }
}

pub(crate) struct Fixture {
    pub store: Arc<InMemoryOrderStore>,
    pub catalog: Arc<InMemoryPostCatalog>,
    pub gateway: Arc<InProcessGateway>,
    pub metrics: Arc<LifecycleMetrics>,
    pub manager: Arc<OrderLifecycleManager>,
    pub reconciler: Arc<PaymentReconciler>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_secret(Some(WEBHOOK_SECRET))
    }

    pub fn with_secret(secret: Option<&str>) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let catalog = Arc::new(InMemoryPostCatalog::new());
        let gateway = Arc::new(InProcessGateway::default());
        let metrics = Arc::new(LifecycleMetrics::new().unwrap());

        let manager = Arc::new(OrderLifecycleManager::new(store.clone(), catalog.clone(), metrics.clone()));
        let reconciler = Arc::new(PaymentReconciler::new(
            manager.clone(),
            store.clone(),
            gateway.clone(),
            ReconcilerConfig {
                currency: "usd".to_string(),
                webhook_secret: secret.map(str::to_string),
            },
            metrics.clone(),
        ));

        Self {
            store,
            catalog,
            gateway,
            metrics,
            manager,
            reconciler,
        }
    }

    /// An OrderService over this fixture, delivering into `sink`.
    pub fn service(&self, sink: Arc<dyn NotificationSink>) -> OrderService {
        let breaker = CircuitBreakerConfig {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        };
        OrderService::new(
            self.manager.clone(),
            self.reconciler.clone(),
            EventDispatcher::spawn(sink, breaker, self.metrics.clone()),
            AddressPolicy::new("US"),
        )
    }

    pub fn member(&self) -> Principal {
        Principal::member(Uuid::new_v4())
    }

    pub async fn seed_post(&self, owner_id: Uuid, price: Option<i64>) -> Uuid {
        let id = Uuid::new_v4();
        self.catalog
            .upsert(PostSummary {
                id,
                owner_id,
                price,
                active: true,
            })
            .await;
        id
    }

    pub fn place(&self, post_id: Uuid) -> PlaceOrder {
        PlaceOrder {
            post_id,
            delivery_address: test_address(),
        }
    }

    /// A fresh (Pending, Pending) order for 4500 minor units.
    pub async fn pending_order(&self) -> Order {
        let post = self.seed_post(Uuid::new_v4(), Some(4500)).await;
        self.manager
            .create_order(&self.member(), self.place(post))
            .await
            .unwrap()
            .order
    }

    pub async fn order_with_intent(&self) -> (Order, String) {
        let order = self.pending_order().await;
        let handle = self
            .reconciler
            .create_intent(order.id, &Principal::member(order.buyer_id))
            .await
            .unwrap();
        (order, handle.id)
    }

    /// A (Confirmed, Paid) order.
    pub async fn paid_order(&self) -> Order {
        let order = self.pending_order().await;
        self.manager.apply_payment_succeeded(order).await.unwrap().order
    }
}
