use super::catalog::{CartLine, ProductSnapshot, ProductStatus};
use super::money::{CommissionRate, Money};
use super::order::Order;
use super::payment::Payment;
use super::payout::{PayoutPeriod, SellerPayout};
use super::reconciliation::ReconciliationEntry;
use super::refund::Refund;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order; fails with `Duplicate` if the number is taken.
    async fn insert(&self, order: Order) -> Result<()>;
    async fn save(&self, order: Order) -> Result<()>;
    async fn get(&self, order_number: &str) -> Result<Option<Order>>;
    async fn list(&self) -> Result<Vec<Order>>;
    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>>;
    /// Delivered orders placed within `[start, end]` that contain at least one
    /// item of `seller_id`, oldest first.
    async fn list_delivered_for_seller(
        &self,
        seller_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn save(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: Uuid) -> Result<Option<Payment>>;
    async fn get_by_order(&self, order_number: &str) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn save(&self, refund: Refund) -> Result<()>;
    async fn get(&self, refund_id: Uuid) -> Result<Option<Refund>>;
    async fn list(&self) -> Result<Vec<Refund>>;
    async fn list_by_order(&self, order_number: &str) -> Result<Vec<Refund>>;
}

/// Stores the outcome of an approved refund as one unit: the refund, its
/// payment and its order are either all written or none are.
#[async_trait]
pub trait RefundCommit: Send + Sync {
    async fn commit_refund(&self, refund: Refund, payment: Payment, order: Order) -> Result<()>;
}

#[async_trait]
pub trait PayoutStore: Send + Sync {
    async fn save(&self, payout: SellerPayout) -> Result<()>;
    async fn get(&self, payout_id: Uuid) -> Result<Option<SellerPayout>>;
    async fn list(&self, seller_id: Option<&str>) -> Result<Vec<SellerPayout>>;
    /// The non-cancelled payout of exactly this seller and period.
    async fn find_active(&self, seller_id: &str, period: &PayoutPeriod) -> Result<Option<SellerPayout>>;
}

/// Operator queue for side effects that could not be applied.
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    async fn record(&self, entry: ReconciliationEntry) -> Result<()>;
    async fn entries(&self) -> Result<Vec<ReconciliationEntry>>;
}

/// The external product catalog.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn get_product_snapshot(&self, product_id: &str) -> Result<Option<ProductSnapshot>>;
    /// Atomically removes `quantity` units if that many are available and
    /// returns the remaining stock; otherwise fails with `InsufficientStock`.
    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<u32>;
    /// Adds units back and returns the new stock level.
    async fn restore_stock(&self, product_id: &str, quantity: u32) -> Result<u32>;
    async fn set_product_status(&self, product_id: &str, status: ProductStatus) -> Result<()>;
    async fn get_seller_commission_rate(&self, seller_id: &str) -> Result<Option<CommissionRate>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn lines(&self, buyer_id: &str) -> Result<Vec<CartLine>>;
    async fn add_line(&self, buyer_id: &str, line: CartLine) -> Result<Vec<CartLine>>;
    async fn clear(&self, buyer_id: &str) -> Result<()>;
}

/// Running earnings actually disbursed to each seller.
#[async_trait]
pub trait SellerLedger: Send + Sync {
    async fn credit(&self, seller_id: &str, amount: Money) -> Result<Money>;
    async fn total_earnings(&self, seller_id: &str) -> Result<Money>;
}

/// Reference returned by the payment provider for a refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub reference: String,
}

/// Narrow adapter over the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn refund(&self, payment: &Payment, amount: Money) -> Result<GatewayReceipt>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type RefundStoreRef = Arc<dyn RefundStore>;
pub type RefundCommitRef = Arc<dyn RefundCommit>;
pub type PayoutStoreRef = Arc<dyn PayoutStore>;
pub type ReconciliationLogRef = Arc<dyn ReconciliationLog>;
pub type CatalogRef = Arc<dyn CatalogProvider>;
pub type CartStoreRef = Arc<dyn CartStore>;
pub type SellerLedgerRef = Arc<dyn SellerLedger>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

