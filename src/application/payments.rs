use super::Stores;
use super::locks::LockTable;
use crate::domain::actor::{Actor, Role};
use crate::domain::money::Money;
use crate::domain::order::Order;
use crate::domain::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::error::{Result, SettlementError};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Drives payment records from the payment provider's callbacks.
///
/// `approve_payment` is the only path that marks an order paid.
pub struct PaymentProcessor {
    stores: Stores,
    locks: LockTable,
}

impl PaymentProcessor {
    pub fn new(stores: Stores, locks: LockTable) -> Self {
        Self { stores, locks }
    }

    /// Opens (or re-opens after a failure) the payment of an order.
    pub async fn create_payment(&self, actor: &Actor, order_number: &str, method: PaymentMethod) -> Result<Payment> {
        let _guard = self.locks.lock_order(order_number).await;
        let mut order = self.load_order(order_number).await?;
        actor.require_self_or_admin(&order.buyer_id)?;
        order.ensure_awaiting_payment()?;

        let payment = match self.stores.payments.get_by_order(order_number).await? {
            Some(existing) if existing.status == PaymentStatus::Pending => return Ok(existing),
            Some(mut existing) => {
                existing.reopen(order.total_amount, method)?;
                existing
            }
            None => Payment::new(order.order_number.clone(), order.total_amount, method, Utc::now()),
        };

        self.stores.payments.save(payment.clone()).await?;
        order.attach_payment(payment.id, Utc::now());
        self.stores.orders.save(order).await?;
        info!(
            payment_id = %payment.id,
            order_number = %payment.order_number,
            attempt = payment.attempts,
            "Payment opened"
        );
        Ok(payment)
    }

    /// Provider confirmed capture: payment completed, order paid and confirmed.
    pub async fn approve_payment(
        &self,
        actor: &Actor,
        payment_id: Uuid,
        transaction_id: String,
        captured_amount: Option<Money>,
    ) -> Result<Payment> {
        actor.require_payment_callback()?;
        if transaction_id.trim().is_empty() {
            return Err(SettlementError::Validation(
                "transaction id is required".to_string(),
            ));
        }
        let order_number = self.load_payment(payment_id).await?.order_number;
        let _guard = self.locks.lock_order(&order_number).await;
        let mut payment = self.load_payment(payment_id).await?;
        if let Some(amount) = captured_amount
            && amount != payment.amount
        {
            return Err(SettlementError::Validation(format!(
                "captured amount {amount} does not match payment amount {}",
                payment.amount
            )));
        }
        let mut order = self.load_order(&order_number).await?;

        let now = Utc::now();
        order.mark_paid(now)?;
        payment.approve(transaction_id, now)?;

        self.stores.payments.save(payment.clone()).await?;
        self.stores.orders.save(order).await?;
        info!(payment_id = %payment.id, order_number = %order_number, "Payment approved");
        Ok(payment)
    }

    /// Provider declined: the order stays pending so the buyer can retry.
    pub async fn fail_payment(&self, actor: &Actor, payment_id: Uuid, reason: String) -> Result<Payment> {
        actor.require_payment_callback()?;
        let order_number = self.load_payment(payment_id).await?.order_number;
        let _guard = self.locks.lock_order(&order_number).await;
        let mut payment = self.load_payment(payment_id).await?;
        let mut order = self.load_order(&order_number).await?;

        payment.fail(reason)?;
        order.mark_payment_failed(Utc::now());

        self.stores.payments.save(payment.clone()).await?;
        self.stores.orders.save(order).await?;
        info!(
            payment_id = %payment.id,
            order_number = %order_number,
            reason = payment.failure_reason.as_deref().unwrap_or(""),
            "Payment failed"
        );
        Ok(payment)
    }

    pub async fn get_payment(&self, actor: &Actor, payment_id: Uuid) -> Result<Payment> {
        let payment = self.load_payment(payment_id).await?;
        if actor.role != Role::System {
            let order = self.load_order(&payment.order_number).await?;
            actor.require_self_or_admin(&order.buyer_id)?;
        }
        Ok(payment)
    }

    async fn load_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.stores
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Payment", payment_id.to_string()))
    }

    async fn load_order(&self, order_number: &str) -> Result<Order> {
        self.stores
            .orders
            .get(order_number)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_number))
    }
}
