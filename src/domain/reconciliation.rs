use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog-side or settlement follow-ups that failed or need an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationKind {
    StockStatusUpdate { product_id: String, status: String },
    StockRestore { product_id: String, quantity: u32 },
    CartClear { buyer_id: String },
    RefundAfterPayout { refund_id: Uuid, payout_id: Uuid },
    RefundCommit { refund_id: Uuid, gateway_reference: String },
    ClaimRelease { payout_id: Uuid },
    EarningsCredit { seller_id: String, payout_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationEntry {
    pub id: Uuid,
    pub order_number: Option<String>,
    #[serde(flatten)]
    pub kind: ReconciliationKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ReconciliationEntry {
    pub fn new(order_number: Option<String>, kind: ReconciliationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            kind,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}
