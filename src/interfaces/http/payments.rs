use super::AppState;
use super::extract::{ApiJson, ApiPath};
use super::response::{ApiResult, Envelope, created, ok};
use crate::application::refund_engine::RefundLineRequest;
use crate::domain::actor::Actor;
use crate::domain::money::Money;
use crate::domain::payment::{Payment, PaymentMethod};
use crate::domain::refund::Refund;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_number: String,
    pub method: PaymentMethod,
}

/// Capture confirmation from the payment provider.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalCallback {
    pub transaction_id: String,
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub order_number: String,
    pub reason: String,
    #[serde(default)]
    pub items: Option<Vec<RefundLineRequest>>,
}

pub async fn create_payment(
    State(app): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Payment>>)> {
    let payment = app
        .payments
        .create_payment(&actor, &body.order_number, body.method)
        .await?;
    Ok(created("Payment opened", payment))
}

pub async fn get_payment(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payment_id): ApiPath<Uuid>,
) -> ApiResult<Json<Envelope<Payment>>> {
    Ok(ok("Payment", app.payments.get_payment(&actor, payment_id).await?))
}

pub async fn approve_payment(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payment_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ApprovalCallback>,
) -> ApiResult<Json<Envelope<Payment>>> {
    let payment = app
        .payments
        .approve_payment(&actor, payment_id, body.transaction_id, body.amount)
        .await?;
    Ok(ok("Payment approved", payment))
}

pub async fn fail_payment(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payment_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ReasonRequest>,
) -> ApiResult<Json<Envelope<Payment>>> {
    let payment = app.payments.fail_payment(&actor, payment_id, body.reason).await?;
    Ok(ok("Payment failed", payment))
}

pub async fn create_refund(
    State(app): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<RefundRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Refund>>)> {
    let refund = app
        .refunds
        .create_refund(&actor, &body.order_number, body.reason, body.items)
        .await?;
    Ok(created("Refund requested", refund))
}

pub async fn list_refunds(State(app): State<AppState>, actor: Actor) -> ApiResult<Json<Envelope<Vec<Refund>>>> {
    Ok(ok("Refunds", app.refunds.list_refunds(&actor).await?))
}

pub async fn get_refund(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(refund_id): ApiPath<Uuid>,
) -> ApiResult<Json<Envelope<Refund>>> {
    Ok(ok("Refund", app.refunds.get_refund(&actor, refund_id).await?))
}

pub async fn approve_refund(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(refund_id): ApiPath<Uuid>,
) -> ApiResult<Json<Envelope<Refund>>> {
    Ok(ok("Refund completed", app.refunds.approve_refund(&actor, refund_id).await?))
}

pub async fn reject_refund(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(refund_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ReasonRequest>,
) -> ApiResult<Json<Envelope<Refund>>> {
    let refund = app.refunds.reject_refund(&actor, refund_id, body.reason).await?;
    Ok(ok("Refund rejected", refund))
}
