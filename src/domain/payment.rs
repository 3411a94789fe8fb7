use super::money::Money;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Refunded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    VirtualAccount,
    MobilePay,
}

/// The single payment record of an order.
///
/// Status only moves through the payment adapter callbacks and the refund
/// engine; clients never set it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_amount: Money,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(order_number: String, amount: Money, method: PaymentMethod, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            amount,
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            failure_reason: None,
            attempts: 1,
            paid_at: None,
            refund_amount: Money::ZERO,
            refunded_at: None,
            created_at: now,
        }
    }

    fn conflict(&self, action: &str) -> SettlementError {
        SettlementError::StateConflict(format!(
            "cannot {action} payment {} in status {:?}",
            self.id, self.status
        ))
    }

    /// Starts another attempt after a failure or cancellation.
    pub fn reopen(&mut self, amount: Money, method: PaymentMethod) -> Result<()> {
        match self.status {
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                self.status = PaymentStatus::Pending;
                self.amount = amount;
                self.method = method;
                self.failure_reason = None;
                self.attempts += 1;
                Ok(())
            }
            _ => Err(self.conflict("reopen")),
        }
    }

    pub fn approve(&mut self, transaction_id: String, now: DateTime<Utc>) -> Result<()> {
        if self.status != PaymentStatus::Pending {
            return Err(self.conflict("approve"));
        }
        self.status = PaymentStatus::Completed;
        self.transaction_id = Some(transaction_id);
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, reason: String) -> Result<()> {
        if self.status != PaymentStatus::Pending {
            return Err(self.conflict("fail"));
        }
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        if self.status != PaymentStatus::Pending {
            return Err(self.conflict("cancel"));
        }
        self.status = PaymentStatus::Cancelled;
        Ok(())
    }

    pub fn ensure_refundable(&self) -> Result<()> {
        if self.status != PaymentStatus::Completed {
            return Err(self.conflict("refund"));
        }
        Ok(())
    }

    /// Adds a refund; `fully_refunded` flips the status to refunded.
    pub fn record_refund(&mut self, amount: Money, fully_refunded: bool, now: DateTime<Utc>) -> Result<()> {
        self.ensure_refundable()?;
        self.refund_amount += amount;
        self.refunded_at = Some(now);
        if fully_refunded {
            self.status = PaymentStatus::Refunded;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment() -> Payment {
        Payment::new("ORD-1".into(), Money::new(dec!(50000)), PaymentMethod::Card, Utc::now())
    }

    #[test]
    fn test_approve_once() {
        let mut payment = payment();
        payment.approve("pg-123".into(), Utc::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.paid_at.is_some());
        assert!(matches!(
            payment.approve("pg-124".into(), Utc::now()),
            Err(SettlementError::StateConflict(_))
        ));
    }

    #[test]
    fn test_failed_payment_can_be_reopened() {
        let mut payment = payment();
        payment.fail("card declined".into()).unwrap();
        assert!(payment.approve("pg-1".into(), Utc::now()).is_err());

        payment.reopen(Money::new(dec!(50000)), PaymentMethod::BankTransfer).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.attempts, 2);
        assert_eq!(payment.failure_reason, None);
    }

    #[test]
    fn test_refund_requires_completion() {
        let mut payment = payment();
        assert!(payment.record_refund(Money::new(dec!(1)), false, Utc::now()).is_err());

        payment.approve("pg-1".into(), Utc::now()).unwrap();
        payment.record_refund(Money::new(dec!(20000)), false, Utc::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        payment.record_refund(Money::new(dec!(30000)), true, Utc::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert_eq!(payment.refund_amount, Money::new(dec!(50000)));
    }
}
