use crate::domain::money::Money;
use crate::domain::payment::Payment;
use crate::domain::ports::{GatewayReceipt, PaymentGateway};
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Gateway used when refunds are settled by hand outside the system.
///
/// It accepts every refund that fits inside the captured amount and issues a
/// local reference; the requests are kept for inspection.
#[derive(Default, Clone)]
pub struct ManualPaymentGateway {
    issued: Arc<RwLock<Vec<(Uuid, Money)>>>,
}

impl ManualPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issued_refunds(&self) -> Vec<(Uuid, Money)> {
        self.issued.read().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for ManualPaymentGateway {
    async fn refund(&self, payment: &Payment, amount: Money) -> Result<GatewayReceipt> {
        if payment.refund_amount + amount > payment.amount {
            return Err(SettlementError::Gateway(format!(
                "refund of {amount} exceeds the captured amount of payment {}",
                payment.id
            )));
        }
        self.issued.write().await.push((payment.id, amount));
        let reference = format!("manual-refund-{}", Uuid::new_v4().simple());
        info!(payment_id = %payment.id, %amount, %reference, "Refund issued");
        Ok(GatewayReceipt { reference })
    }
}
