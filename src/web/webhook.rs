use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::domain::order::ErrorKind;
use super::AppState;

pub const SIGNATURE_HEADER: &str = "Payment-Signature";
pub const FALLBACK_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// 200 once an event is processed or acknowledged as a no-op, 400 when the
/// signature does not verify, 500 when no webhook secret is configured.
pub async fn payment_webhook(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    if !state.service.webhook_configured() {
        tracing::error!("Payment webhook received but no webhook secret is configured");
        return HttpResponse::InternalServerError().json(json!({ "error": "webhook secret not configured" }));
    }

    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .or_else(|| req.headers().get(FALLBACK_SIGNATURE_HEADER))
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match state.service.handle_gateway_event(&body, signature).await {
        Ok(ack) => {
            tracing::debug!(ack = ?ack, "Payment webhook acknowledged");
            HttpResponse::Ok().json(json!({ "received": true }))
        }
        Err(err) if err.kind() == ErrorKind::AuthError => {
            HttpResponse::BadRequest().json(json!({ "error": err.to_string() }))
        }
        Err(err) => {
            // acknowledged so the processor stops redelivering
            tracing::error!(error = %err, "❌ Payment webhook dispatch failed");
            HttpResponse::Ok().json(json!({ "received": true }))
        }
    }
}
