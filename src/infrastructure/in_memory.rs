use super::gateway::ManualPaymentGateway;
use crate::application::Stores;
use crate::domain::catalog::{CartLine, ProductSnapshot, ProductStatus};
use crate::domain::money::{CommissionRate, Money};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::Payment;
use crate::domain::payout::{PayoutPeriod, SellerPayout};
use crate::domain::ports::{
    CartStore, CatalogProvider, OrderStore, PaymentStore, PayoutStore, ReconciliationLog,
    RefundCommit, RefundStore, SellerLedger,
};
use crate::domain::reconciliation::ReconciliationEntry;
use crate::domain::refund::Refund;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory order store keyed by order number.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| {
        a.ordered_at
            .cmp(&b.ordered_at)
            .then_with(|| a.order_number.cmp(&b.order_number))
    });
    orders
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_number) {
            return Err(SettlementError::Duplicate(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        orders.insert(order.order_number.clone(), order);
        Ok(())
    }

    async fn save(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.order_number.clone(), order);
        Ok(())
    }

    async fn get(&self, order_number: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_number).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(oldest_first(orders.values().cloned().collect()))
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(oldest_first(
            orders
                .values()
                .filter(|order| order.buyer_id == buyer_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_delivered_for_seller(
        &self,
        seller_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        // A single read guard gives a consistent view of the period.
        let orders = self.orders.read().await;
        Ok(oldest_first(
            orders
                .values()
                .filter(|order| {
                    order.status == OrderStatus::Delivered
                        && order.ordered_at >= start
                        && order.ordered_at <= end
                        && order.involves_seller(seller_id)
                })
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<Uuid, Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn save(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&payment_id).cloned())
    }

    async fn get_by_order(&self, order_number: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|payment| payment.order_number == order_number)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryRefundStore {
    refunds: Arc<RwLock<HashMap<Uuid, Refund>>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn save(&self, refund: Refund) -> Result<()> {
        let mut refunds = self.refunds.write().await;
        refunds.insert(refund.id, refund);
        Ok(())
    }

    async fn get(&self, refund_id: Uuid) -> Result<Option<Refund>> {
        let refunds = self.refunds.read().await;
        Ok(refunds.get(&refund_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Refund>> {
        let refunds = self.refunds.read().await;
        let mut all: Vec<Refund> = refunds.values().cloned().collect();
        all.sort_by_key(|refund| refund.created_at);
        Ok(all)
    }

    async fn list_by_order(&self, order_number: &str) -> Result<Vec<Refund>> {
        let refunds = self.refunds.read().await;
        let mut matching: Vec<Refund> = refunds
            .values()
            .filter(|refund| refund.order_number == order_number)
            .cloned()
            .collect();
        matching.sort_by_key(|refund| refund.created_at);
        Ok(matching)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    payouts: Arc<RwLock<HashMap<Uuid, SellerPayout>>>,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn save(&self, payout: SellerPayout) -> Result<()> {
        let mut payouts = self.payouts.write().await;
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn get(&self, payout_id: Uuid) -> Result<Option<SellerPayout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts.get(&payout_id).cloned())
    }

    async fn list(&self, seller_id: Option<&str>) -> Result<Vec<SellerPayout>> {
        let payouts = self.payouts.read().await;
        let mut matching: Vec<SellerPayout> = payouts
            .values()
            .filter(|payout| seller_id.is_none_or(|seller| payout.seller_id == seller))
            .cloned()
            .collect();
        matching.sort_by_key(|payout| payout.created_at);
        Ok(matching)
    }

    async fn find_active(&self, seller_id: &str, period: &PayoutPeriod) -> Result<Option<SellerPayout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts
            .values()
            .find(|payout| {
                payout.is_active() && payout.seller_id == seller_id && payout.period == *period
            })
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryReconciliationLog {
    entries: Arc<RwLock<Vec<ReconciliationEntry>>>,
}

impl InMemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationLog for InMemoryReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ReconciliationEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

/// In-process stand-in for the external catalog service.
///
/// Every stock mutation happens under the write guard, which makes
/// `decrement_stock` a compare-and-decrement.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<String, ProductSnapshot>>>,
    seller_rates: Arc<RwLock<HashMap<String, CommissionRate>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_product(&self, product: ProductSnapshot) {
        self.products
            .write()
            .await
            .insert(product.product_id.clone(), product);
    }

    pub async fn set_seller_rate(&self, seller_id: impl Into<String>, rate: CommissionRate) {
        self.seller_rates.write().await.insert(seller_id.into(), rate);
    }

    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn get_product_snapshot(&self, product_id: &str) -> Result<Option<ProductSnapshot>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<u32> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| SettlementError::not_found("Product", product_id))?;
        if !product.stock_management {
            return Ok(product.stock);
        }
        if product.stock < quantity {
            return Err(SettlementError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    async fn restore_stock(&self, product_id: &str, quantity: u32) -> Result<u32> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| SettlementError::not_found("Product", product_id))?;
        if product.stock_management {
            product.stock = product.stock.saturating_add(quantity);
        }
        Ok(product.stock)
    }

    async fn set_product_status(&self, product_id: &str, status: ProductStatus) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| SettlementError::not_found("Product", product_id))?;
        product.status = status;
        Ok(())
    }

    async fn get_seller_commission_rate(&self, seller_id: &str) -> Result<Option<CommissionRate>> {
        Ok(self.seller_rates.read().await.get(seller_id).copied())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<String, Vec<CartLine>>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn lines(&self, buyer_id: &str) -> Result<Vec<CartLine>> {
        Ok(self
            .carts
            .read()
            .await
            .get(buyer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_line(&self, buyer_id: &str, line: CartLine) -> Result<Vec<CartLine>> {
        if line.quantity == 0 {
            return Err(SettlementError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        let mut carts = self.carts.write().await;
        let cart = carts.entry(buyer_id.to_string()).or_default();
        match cart.iter_mut().find(|existing| existing.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => cart.push(line),
        }
        Ok(cart.clone())
    }

    async fn clear(&self, buyer_id: &str) -> Result<()> {
        self.carts.write().await.remove(buyer_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySellerLedger {
    earnings: Arc<RwLock<HashMap<String, Money>>>,
}

impl InMemorySellerLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SellerLedger for InMemorySellerLedger {
    async fn credit(&self, seller_id: &str, amount: Money) -> Result<Money> {
        let mut earnings = self.earnings.write().await;
        let total = earnings.entry(seller_id.to_string()).or_default();
        *total += amount;
        Ok(*total)
    }

    async fn total_earnings(&self, seller_id: &str) -> Result<Money> {
        Ok(self
            .earnings
            .read()
            .await
            .get(seller_id)
            .copied()
            .unwrap_or_default())
    }
}

/// Every in-memory adapter, with concrete handles kept for seeding and
/// inspection.
#[derive(Default, Clone)]
pub struct InMemoryBackend {
    pub orders: InMemoryOrderStore,
    pub payments: InMemoryPaymentStore,
    pub refunds: InMemoryRefundStore,
    pub payouts: InMemoryPayoutStore,
    pub reconciliation: InMemoryReconciliationLog,
    pub catalog: InMemoryCatalog,
    pub carts: InMemoryCartStore,
    pub ledger: InMemorySellerLedger,
    pub gateway: ManualPaymentGateway,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> Stores {
        Stores {
            orders: Arc::new(self.orders.clone()),
            payments: Arc::new(self.payments.clone()),
            refunds: Arc::new(self.refunds.clone()),
            refund_commits: Arc::new(self.clone()),
            payouts: Arc::new(self.payouts.clone()),
            reconciliation: Arc::new(self.reconciliation.clone()),
            catalog: Arc::new(self.catalog.clone()),
            carts: Arc::new(self.carts.clone()),
            ledger: Arc::new(self.ledger.clone()),
            gateway: Arc::new(self.gateway.clone()),
        }
    }
}

#[async_trait]
impl RefundCommit for InMemoryBackend {
    async fn commit_refund(&self, refund: Refund, payment: Payment, order: Order) -> Result<()> {
        // Guards are always taken refunds, payments, orders.
        let mut refunds = self.refunds.refunds.write().await;
        let mut payments = self.payments.payments.write().await;
        let mut orders = self.orders.orders.write().await;
        refunds.insert(refund.id, refund);
        payments.insert(payment.id, payment);
        orders.insert(order.order_number.clone(), order);
        Ok(())
    }
}
