use super::AppState;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{ApiResult, Envelope, created, ok};
use crate::application::payout_engine::{PayoutCalculation, SellerEarnings};
use crate::domain::actor::Actor;
use crate::domain::payout::{PayoutPeriod, SellerPayout};
use crate::domain::reconciliation::ReconciliationEntry;
use crate::interfaces::csv::statement_writer::StatementWriter;
use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub seller_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_method: String,
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutFilter {
    #[serde(default)]
    pub seller_id: Option<String>,
}

pub async fn calculate(
    State(app): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<CalculateRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<PayoutCalculation>>)> {
    let period = PayoutPeriod::new(body.period_start, body.period_end)?;
    let calculation = app.payouts.calculate_payout(&actor, &body.seller_id, period).await?;
    Ok(created("Payout calculated", calculation))
}

pub async fn list(
    State(app): State<AppState>,
    actor: Actor,
    ApiQuery(filter): ApiQuery<PayoutFilter>,
) -> ApiResult<Json<Envelope<Vec<SellerPayout>>>> {
    let payouts = app
        .payouts
        .list_payouts(&actor, filter.seller_id.as_deref())
        .await?;
    Ok(ok("Payouts", payouts))
}

pub async fn get(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payout_id): ApiPath<Uuid>,
) -> ApiResult<Json<Envelope<SellerPayout>>> {
    Ok(ok("Payout", app.payouts.get_payout(&actor, payout_id).await?))
}

pub async fn approve(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payout_id): ApiPath<Uuid>,
) -> ApiResult<Json<Envelope<SellerPayout>>> {
    Ok(ok("Payout approved", app.payouts.approve_payout(&actor, payout_id).await?))
}

pub async fn pay(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payout_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PayRequest>,
) -> ApiResult<Json<Envelope<SellerPayout>>> {
    let payout = app
        .payouts
        .pay_payout(&actor, payout_id, body.payment_method, body.transaction_id)
        .await?;
    Ok(ok("Payout paid", payout))
}

pub async fn cancel(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payout_id): ApiPath<Uuid>,
) -> ApiResult<Json<Envelope<SellerPayout>>> {
    Ok(ok("Payout cancelled", app.payouts.cancel_payout(&actor, payout_id).await?))
}

/// The payout as a CSV download.
pub async fn statement(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(payout_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let payout = app.payouts.get_payout(&actor, payout_id).await?;
    let mut writer = StatementWriter::new(Vec::new());
    writer.write_payout(&payout)?;
    let body = writer.into_inner()?;
    let disposition = format!("attachment; filename=\"payout-{}.csv\"", payout.id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn earnings(
    State(app): State<AppState>,
    actor: Actor,
    ApiPath(seller_id): ApiPath<String>,
) -> ApiResult<Json<Envelope<SellerEarnings>>> {
    Ok(ok("Seller earnings", app.payouts.seller_earnings(&actor, &seller_id).await?))
}

pub async fn reconciliation(
    State(app): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Envelope<Vec<ReconciliationEntry>>>> {
    Ok(ok("Reconciliation entries", app.reconciliation_entries(&actor).await?))
}
