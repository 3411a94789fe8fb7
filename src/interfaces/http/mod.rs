//! JSON API over the settlement engines.
//!
//! Every response uses the `{ success, message, data }` envelope; failures
//! carry a machine code in `error` instead of `data`.

pub mod auth;
pub mod extract;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod response;

use crate::application::marketplace::MarketplaceRef;
use axum::Router;
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tracing::info;

pub type AppState = MarketplaceRef;

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders", get(orders::list).post(orders::create_from_cart))
        .route("/orders/direct", post(orders::create_direct))
        .route("/orders/:id", get(orders::get))
        .route("/orders/:id/cancel", post(orders::cancel))
        .route("/orders/:id/status", post(orders::advance))
        .route("/cart", get(orders::cart))
        .route("/cart/items", post(orders::add_to_cart))
        .route("/payments", post(payments::create_payment))
        .route("/payments/:id", get(payments::get_payment))
        .route("/payments/:id/approve", post(payments::approve_payment))
        .route("/payments/:id/fail", post(payments::fail_payment))
        .route("/refunds", get(payments::list_refunds).post(payments::create_refund))
        .route("/refunds/:id", get(payments::get_refund))
        .route("/refunds/:id/approve", post(payments::approve_refund))
        .route("/refunds/:id/reject", post(payments::reject_refund))
        .route("/payouts", get(payouts::list))
        .route("/payouts/calculate", post(payouts::calculate))
        .route("/payouts/:id", get(payouts::get))
        .route("/payouts/:id/approve", post(payouts::approve))
        .route("/payouts/:id/pay", post(payouts::pay))
        .route("/payouts/:id/cancel", post(payouts::cancel))
        .route("/payouts/:id/statement", get(payouts::statement))
        .route("/sellers/:id/earnings", get(payouts::earnings))
        .route("/reconciliation", get(payouts::reconciliation))
        .with_state(app)
}

async fn health() -> axum::Json<Value> {
    axum::Json(json!({ "success": true, "message": "ok", "data": { "version": env!("CARGO_PKG_VERSION") } }))
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(app: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Settlement API listening");
    axum::serve(listener, router(app)).await
}
