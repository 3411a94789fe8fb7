use super::AppState;
use super::extract::{ApiJson, ApiPath};
use super::response::{ApiResult, Envelope, created, ok};
use crate::application::order_engine::{OrderOutcome, OrderSource};
use crate::domain::actor::Actor;
use crate::domain::catalog::CartLine;
use crate::domain::order::{Order, OrderStatus, ShippingAddress};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCheckout {
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPurchase {
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

pub async fn create_from_cart(
    State(app): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<CartCheckout>,
) -> ApiResult<(StatusCode, Json<Envelope<OrderOutcome>>)> {
    let outcome = app
        .orders
        .create_order(&actor, OrderSource::Cart, body.shipping_address)
        .await?;
    Ok(created("Order created", outcome))
}

pub async fn create_direct(
    State(app): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<DirectPurchase>,
) -> ApiResult<(StatusCode, Json<Envelope<OrderOutcome>>)> {
    let outcome = app
        .orders
        .create_order(&actor, OrderSource::Direct(body.items), body.shipping_address)
        .await?;
    Ok(created("Order created", outcome))
}

pub async fn list(State(app): State<AppState>, actor: Actor) -> ApiResult<Json<Envelope<Vec<Order>>>> {
    Ok(ok("Orders", app.orders.list_orders(&actor).await?))
}

pub async fn get(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(order_number): ApiPath<String>,
) -> ApiResult<Json<Envelope<Order>>> {
    Ok(ok("Order", app.orders.get_order(&actor, &order_number).await?))
}

pub async fn cancel(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(order_number): ApiPath<String>,
    ApiJson(body): ApiJson<CancelRequest>,
) -> ApiResult<Json<Envelope<OrderOutcome>>> {
    let reason = body
        .reason
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or_else(|| "cancelled by request".to_string());
    let outcome = app.orders.cancel_order(&actor, &order_number, reason).await?;
    Ok(ok("Order cancelled", outcome))
}

pub async fn advance(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(order_number): ApiPath<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Json<Envelope<Order>>> {
    let order = app
        .orders
        .advance_fulfillment(&actor, &order_number, body.status)
        .await?;
    Ok(ok("Order status updated", order))
}

pub async fn cart(State(app): State<AppState>, actor: Actor) -> ApiResult<Json<Envelope<Vec<CartLine>>>> {
    Ok(ok("Cart", app.orders.cart(&actor).await?))
}

pub async fn add_to_cart(
    State(app): State<AppState>,
    actor: Actor,
    ApiJson(line): ApiJson<CartLine>,
) -> ApiResult<(StatusCode, Json<Envelope<Vec<CartLine>>>)> {
    Ok(created("Added to cart", app.orders.add_to_cart(&actor, line).await?))
}
