use super::catalog::{ProductId, SellerId};
use super::money::Money;
use super::order::OrderItem;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Calculated,
    Approved,
    Paid,
    Cancelled,
}

/// Inclusive settlement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PayoutPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(SettlementError::Validation(
                "periodStart must not be after periodEnd".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// One settled order item inside a payout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutLine {
    pub order_number: String,
    pub item_index: usize,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub sales_amount: Money,
    pub commission_amount: Money,
    pub refund_amount: Money,
    pub net_amount: Money,
}

impl PayoutLine {
    pub fn from_item(order_number: &str, item_index: usize, item: &OrderItem) -> Self {
        Self {
            order_number: order_number.to_string(),
            item_index,
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            sales_amount: item.total_price,
            commission_amount: item.commission_amount,
            refund_amount: item.refunded_earnings,
            net_amount: item.net_earnings(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerPayout {
    pub id: Uuid,
    pub seller_id: SellerId,
    pub period: PayoutPeriod,
    pub lines: Vec<PayoutLine>,
    pub total_sales: Money,
    pub total_commission: Money,
    pub total_refunds: Money,
    pub payout_amount: Money,
    pub status: PayoutStatus,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub calculated_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl SellerPayout {
    pub fn new(seller_id: SellerId, period: PayoutPeriod, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seller_id,
            period,
            lines: Vec::new(),
            total_sales: Money::ZERO,
            total_commission: Money::ZERO,
            total_refunds: Money::ZERO,
            payout_amount: Money::ZERO,
            status: PayoutStatus::Pending,
            payment_method: None,
            transaction_id: None,
            approved_by: None,
            created_at: now,
            calculated_at: None,
            approved_at: None,
            paid_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != PayoutStatus::Cancelled
    }

    /// Items this payout has already settled or is about to.
    pub fn holds_claims(&self) -> bool {
        matches!(self.status, PayoutStatus::Approved | PayoutStatus::Paid)
    }

    fn conflict(&self, action: &str) -> SettlementError {
        SettlementError::StateConflict(format!(
            "cannot {action} payout {} in status {:?}",
            self.id, self.status
        ))
    }

    /// Replaces the lines and recomputes every total from them.
    pub fn record_calculation(&mut self, lines: Vec<PayoutLine>, now: DateTime<Utc>) -> Result<()> {
        if !matches!(self.status, PayoutStatus::Pending | PayoutStatus::Calculated) {
            return Err(self.conflict("recalculate"));
        }
        self.total_sales = lines.iter().map(|line| line.sales_amount).sum();
        self.total_commission = lines.iter().map(|line| line.commission_amount).sum();
        self.total_refunds = lines.iter().map(|line| line.refund_amount).sum();
        self.payout_amount = self.total_sales - self.total_commission - self.total_refunds;
        self.lines = lines;
        self.status = PayoutStatus::Calculated;
        self.calculated_at = Some(now);
        Ok(())
    }

    pub fn approve(&mut self, approved_by: String, now: DateTime<Utc>) -> Result<()> {
        if self.status != PayoutStatus::Calculated {
            return Err(self.conflict("approve"));
        }
        self.status = PayoutStatus::Approved;
        self.approved_by = Some(approved_by);
        self.approved_at = Some(now);
        Ok(())
    }

    pub fn pay(&mut self, method: String, transaction_id: String, now: DateTime<Utc>) -> Result<()> {
        if self.status != PayoutStatus::Approved {
            return Err(self.conflict("pay"));
        }
        if method.trim().is_empty() || transaction_id.trim().is_empty() {
            return Err(SettlementError::Validation(
                "payment method and transaction id are required".to_string(),
            ));
        }
        self.status = PayoutStatus::Paid;
        self.payment_method = Some(method);
        self.transaction_id = Some(transaction_id);
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if matches!(self.status, PayoutStatus::Paid | PayoutStatus::Cancelled) {
            return Err(self.conflict("cancel"));
        }
        self.status = PayoutStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(())
    }
}
