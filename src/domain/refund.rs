use super::catalog::UserId;
use super::money::Money;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

/// A refunded slice of one order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLine {
    pub item_index: usize,
    pub quantity: u32,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RefundKind {
    Full,
    Partial { lines: Vec<RefundLine> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: Uuid,
    pub order_number: String,
    pub payment_id: Uuid,
    pub amount: Money,
    pub reason: String,
    #[serde(flatten)]
    pub kind: RefundKind,
    pub status: RefundStatus,
    pub requested_by: UserId,
    pub rejection_reason: Option<String>,
    pub gateway_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Refund {
    pub fn new(
        order_number: String,
        payment_id: Uuid,
        amount: Money,
        reason: String,
        kind: RefundKind,
        requested_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if reason.trim().is_empty() {
            return Err(SettlementError::Validation(
                "a refund reason is required".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            order_number,
            payment_id,
            amount,
            reason,
            kind,
            status: RefundStatus::Pending,
            requested_by,
            rejection_reason: None,
            gateway_reference: None,
            created_at: now,
            processed_at: None,
        })
    }

    pub fn is_full(&self) -> bool {
        matches!(self.kind, RefundKind::Full)
    }

    /// Pending, or approved with the gateway call or commit still in flight.
    pub fn is_open(&self) -> bool {
        matches!(self.status, RefundStatus::Pending | RefundStatus::Approved)
    }

    /// Units of order line `index` held by this refund while it is open.
    pub fn held_quantity(&self, index: usize) -> u32 {
        match &self.kind {
            RefundKind::Partial { lines } if self.is_open() => lines
                .iter()
                .filter(|line| line.item_index == index)
                .map(|line| line.quantity)
                .sum(),
            _ => 0,
        }
    }

    pub fn lines(&self) -> Vec<(usize, u32)> {
        match &self.kind {
            RefundKind::Full => Vec::new(),
            RefundKind::Partial { lines } => lines
                .iter()
                .map(|line| (line.item_index, line.quantity))
                .collect(),
        }
    }

    fn ensure_status(&self, expected: RefundStatus, action: &str) -> Result<()> {
        if self.status != expected {
            return Err(SettlementError::StateConflict(format!(
                "cannot {action} refund {} in status {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Marks the refund as in flight before the gateway is asked for money.
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(RefundStatus::Pending, "approve")?;
        self.status = RefundStatus::Approved;
        self.processed_at = Some(now);
        Ok(())
    }

    /// Returns an approved refund to the queue after the gateway declined it.
    pub fn reopen(&mut self) -> Result<()> {
        self.ensure_status(RefundStatus::Approved, "reopen")?;
        self.status = RefundStatus::Pending;
        self.processed_at = None;
        Ok(())
    }

    pub fn complete(&mut self, amount: Money, gateway_reference: String, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(RefundStatus::Approved, "complete")?;
        self.amount = amount;
        self.gateway_reference = Some(gateway_reference);
        self.processed_at = Some(now);
        self.status = RefundStatus::Completed;
        Ok(())
    }

    pub fn reject(&mut self, reason: String, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(RefundStatus::Pending, "reject")?;
        if reason.trim().is_empty() {
            return Err(SettlementError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        self.status = RefundStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.processed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn partial() -> Refund {
        Refund::new(
            "ORD-1".into(),
            Uuid::new_v4(),
            Money::new(dec!(20000)),
            "damaged".into(),
            RefundKind::Partial {
                lines: vec![RefundLine {
                    item_index: 0,
                    quantity: 2,
                    amount: Money::new(dec!(20000)),
                }],
            },
            "buyer-1".into(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_kind_is_tagged() {
        let json = serde_json::to_value(partial()).unwrap();
        assert_eq!(json["type"], "partial");
        assert_eq!(json["lines"][0]["quantity"], 2);

        let restored: Refund = serde_json::from_value(json).unwrap();
        assert_eq!(restored.lines(), vec![(0, 2)]);
    }

    #[test]
    fn test_held_quantity_only_while_open() {
        let mut refund = partial();
        assert_eq!(refund.held_quantity(0), 2);
        assert_eq!(refund.held_quantity(1), 0);
        refund.reject("not eligible".into(), Utc::now()).unwrap();
        assert_eq!(refund.held_quantity(0), 0);

        let mut in_flight = partial();
        in_flight.approve(Utc::now()).unwrap();
        assert!(in_flight.is_open());
        assert_eq!(in_flight.held_quantity(0), 2);
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut refund = partial();
        assert!(matches!(
            refund.reject("  ".into(), Utc::now()),
            Err(SettlementError::Validation(_))
        ));
        assert_eq!(refund.status, RefundStatus::Pending);
    }

    #[test]
    fn test_complete_requires_approval() {
        let mut refund = partial();
        assert!(matches!(
            refund.complete(Money::new(dec!(20000)), "pg-r-0".into(), Utc::now()),
            Err(SettlementError::StateConflict(_))
        ));
        refund.approve(Utc::now()).unwrap();
        assert!(matches!(
            refund.approve(Utc::now()),
            Err(SettlementError::StateConflict(_))
        ));
        refund.complete(Money::new(dec!(20000)), "pg-r-1".into(), Utc::now()).unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
        assert!(matches!(
            refund.complete(Money::new(dec!(20000)), "pg-r-2".into(), Utc::now()),
            Err(SettlementError::StateConflict(_))
        ));
    }

    #[test]
    fn test_declined_approval_reopens() {
        let mut refund = partial();
        assert!(refund.reopen().is_err());
        refund.approve(Utc::now()).unwrap();
        refund.reopen().unwrap();
        assert_eq!(refund.status, RefundStatus::Pending);
        assert!(refund.processed_at.is_none());
        refund.reject("duplicate request".into(), Utc::now()).unwrap();
    }

    #[test]
    fn test_reason_required() {
        let result = Refund::new(
            "ORD-1".into(),
            Uuid::new_v4(),
            Money::ZERO,
            "".into(),
            RefundKind::Full,
            "buyer-1".into(),
            Utc::now(),
        );
        assert!(result.is_err());
    }
}
