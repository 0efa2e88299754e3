use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use std::sync::Arc;

use crate::metrics::LifecycleMetrics;
use crate::service::OrderService;

mod webhook;

pub use webhook::{payment_webhook, FALLBACK_SIGNATURE_HEADER, SIGNATURE_HEADER};

// ============================================================================
// HTTP Surface
// ============================================================================
//
// POST /webhooks/payments - signed payment processor events
// GET  /metrics           - Prometheus exposition
// GET  /health            - liveness
//
// ============================================================================

pub struct AppState {
    pub service: Arc<OrderService>,
    pub metrics: Arc<LifecycleMetrics>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/webhooks/payments", web::post().to(payment_webhook))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

pub async fn start_http_server(state: web::Data<AppState>, host: &str, port: u16) -> std::io::Result<()> {
    tracing::info!("🌐 Starting HTTP server on http://{}:{}", host, port);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-lifecycle"
    }))
}
