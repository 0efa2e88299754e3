use actix_web::web;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_lifecycle::actors::EventDispatcher;
use order_lifecycle::config::{AppConfig, StoreBackend};
use order_lifecycle::domain::catalog::{InMemoryPostCatalog, PostSummary};
use order_lifecycle::domain::order::{
    AddressPolicy, ChangeStatusRequest, ConfirmPaymentRequest, DeliveryAddressInput, OrderLifecycleManager,
    PlaceOrderRequest, Principal,
};
use order_lifecycle::domain::payment::{PaymentReconciler, ReconcilerConfig};
use order_lifecycle::gateway::InProcessGateway;
use order_lifecycle::messaging::LoggingSink;
use order_lifecycle::metrics::LifecycleMetrics;
use order_lifecycle::service::OrderService;
use order_lifecycle::store::{InMemoryOrderStore, OrderStore, ScyllaOrderStore};
use order_lifecycle::web::{start_http_server, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug"))
        )
        .init();

    tracing::info!("🚀 Starting Order Lifecycle Engine");

    // === 1. Configuration ===
    let config = AppConfig::from_env()?;
    tracing::info!(config = ?config, "Configuration loaded");
    if config.webhook_secret.is_none() {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET is not set; the payment webhook will answer 500");
    }

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(LifecycleMetrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Order store ===
    let store: Arc<dyn OrderStore> = match config.store {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory order store");
            Arc::new(InMemoryOrderStore::new())
        }
        StoreBackend::Scylla => connect_scylla(&config).await?,
    };

    // === 4. Collaborators and core components ===
    let catalog = Arc::new(InMemoryPostCatalog::new());
    let gateway = Arc::new(InProcessGateway::new(config.webhook_tolerance_secs));

    let lifecycle = Arc::new(OrderLifecycleManager::new(store.clone(), catalog.clone(), metrics.clone()));
    let reconciler = Arc::new(PaymentReconciler::new(
        lifecycle.clone(),
        store.clone(),
        gateway.clone(),
        ReconcilerConfig {
            currency: config.currency.clone(),
            webhook_secret: config.webhook_secret.clone(),
        },
        metrics.clone(),
    ));
    let dispatcher = EventDispatcher::spawn(Arc::new(LoggingSink), config.notification_breaker(), metrics.clone());
    let service = Arc::new(OrderService::new(
        lifecycle,
        reconciler,
        dispatcher,
        AddressPolicy::new(config.allowed_country.clone()),
    ));

    // === 5. Demonstrate one purchase end to end ===
    if let Err(e) = run_demo(&service, &catalog, &gateway, &config).await {
        tracing::error!(error = %e, "Demo purchase failed");
    }

    // === 6. HTTP surface ===
    let state = web::Data::new(AppState {
        service: service.clone(),
        metrics: metrics.clone(),
    });
    start_http_server(state, &config.server_host, config.server_port).await?;

    service.flush_notifications().await?;
    tracing::info!("👋 Shutdown complete");
    Ok(())
}

async fn connect_scylla(config: &AppConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
    tracing::info!(node = %config.scylla_node, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_node(&config.scylla_node)
        .build()
        .await?;

    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                config.scylla_keyspace
            ),
            &[],
        )
        .await?;
    session.use_keyspace(&config.scylla_keyspace, false).await?;

    let store = ScyllaOrderStore::new(Arc::new(session));
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

/// Place an order, pay for it through whichever settlement path is
/// configured, then ship and deliver it.
async fn run_demo(
    service: &OrderService,
    catalog: &InMemoryPostCatalog,
    gateway: &InProcessGateway,
    config: &AppConfig,
) -> anyhow::Result<()> {
    tracing::info!("📝 Demonstrating order lifecycle");

    let buyer = Principal::member(Uuid::new_v4());
    let seller = Principal::member(Uuid::new_v4());
    let post_id = Uuid::new_v4();
    catalog
        .upsert(PostSummary {
            id: post_id,
            owner_id: seller.user_id,
            price: Some(4500),
            active: true,
        })
        .await;

    let order = service
        .create_order(
            &buyer,
            PlaceOrderRequest {
                post_id: post_id.to_string(),
                delivery_address: DeliveryAddressInput {
                    full_name: Some("Ada Buyer".to_string()),
                    email: Some("ada@example.com".to_string()),
                    phone: Some("+1 555 010 2030".to_string()),
                    address: Some("1 Market St".to_string()),
                    city: Some("Springfield".to_string()),
                    state: Some("IL".to_string()),
                    zip: Some("62701".to_string()),
                    country: Some(config.allowed_country.clone()),
                },
            },
        )
        .await?;
    tracing::info!(order_id = %order.id, "✅ Order created");

    let intent = service.create_payment_intent(&buyer, &order.id.to_string()).await?;
    gateway.mark_succeeded(&intent.id).await?;

    match &config.webhook_secret {
        Some(secret) => {
            let (body, header) = gateway.signed_event("payment_intent.succeeded", &intent.id, secret);
            let ack = service.handle_gateway_event(&body, &header).await?;
            tracing::info!(order_id = %order.id, ack = ?ack, "✅ Payment settled by webhook");
        }
        None => {
            service
                .confirm_payment(&buyer, ConfirmPaymentRequest { payment_intent_id: intent.id.clone() })
                .await?;
            tracing::info!(order_id = %order.id, "✅ Payment settled by confirmation");
        }
    }

    for status in ["shipped", "delivered"] {
        let updated = service
            .change_status(
                &seller,
                ChangeStatusRequest {
                    order_id: order.id.to_string(),
                    status: status.to_string(),
                },
            )
            .await?;
        tracing::info!(order_id = %updated.id, state = %updated.state(), "✅ Order updated");
    }

    service.flush_notifications().await?;
    tracing::info!("🎉 Demo complete");
    Ok(())
}
