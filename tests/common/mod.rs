#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplace_settlement::application::Stores;
use marketplace_settlement::application::marketplace::Marketplace;
use marketplace_settlement::application::order_engine::OrderSource;
use marketplace_settlement::config::EngineConfig;
use marketplace_settlement::domain::actor::{Actor, Role};
use marketplace_settlement::domain::catalog::{CartLine, ProductSnapshot, ProductStatus};
use marketplace_settlement::domain::money::Money;
use marketplace_settlement::domain::order::{Order, OrderStatus, ShippingAddress};
use marketplace_settlement::domain::payment::{Payment, PaymentMethod};
use marketplace_settlement::domain::ports::{OrderStore, OrderStoreRef, RefundCommit, SellerLedger};
use marketplace_settlement::domain::refund::Refund;
use marketplace_settlement::error::{Result as SettlementResult, SettlementError};
use marketplace_settlement::infrastructure::in_memory::InMemoryBackend;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Fixture {
    pub backend: InMemoryBackend,
    pub app: Marketplace,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let backend = InMemoryBackend::new();
        let app = Marketplace::new(backend.stores(), config);
        Self { backend, app }
    }

    /// Runs the engines over `stores`, usually `backend.stores()` with one
    /// port swapped out.
    pub fn with_stores(backend: InMemoryBackend, stores: Stores) -> Self {
        Self {
            app: Marketplace::new(stores, EngineConfig::default()),
            backend,
        }
    }

    pub async fn add_product(&self, product: ProductSnapshot) {
        self.backend.catalog.upsert_product(product).await;
    }

    pub async fn product(&self, product_id: &str) -> ProductSnapshot {
        use marketplace_settlement::domain::ports::CatalogProvider;
        self.backend
            .catalog
            .get_product_snapshot(product_id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn order(&self, order_number: &str) -> Order {
        self.app.orders.get_order(&admin(), order_number).await.unwrap()
    }

    /// Places a direct order and drives it through payment approval.
    pub async fn paid_order(&self, buyer: &Actor, lines: &[(&str, u32)]) -> Order {
        let lines = lines
            .iter()
            .map(|(product_id, quantity)| CartLine {
                product_id: product_id.to_string(),
                quantity: *quantity,
            })
            .collect();
        let outcome = self
            .app
            .orders
            .create_order(buyer, OrderSource::Direct(lines), address())
            .await
            .unwrap();
        let number = outcome.order.order_number;
        let payment = self
            .app
            .payments
            .create_payment(buyer, &number, PaymentMethod::Card)
            .await
            .unwrap();
        self.app
            .payments
            .approve_payment(&system(), payment.id, format!("tx-{number}"), None)
            .await
            .unwrap();
        self.order(&number).await
    }

    pub async fn delivered_order(&self, buyer: &Actor, lines: &[(&str, u32)]) -> Order {
        let order = self.paid_order(buyer, lines).await;
        self.app
            .orders
            .advance_fulfillment(&admin(), &order.order_number, OrderStatus::Delivered)
            .await
            .unwrap()
    }
}

/// Order store whose saves can be switched to fail mid-test.
pub struct FlakyOrderStore {
    inner: OrderStoreRef,
    failing: AtomicBool,
}

impl FlakyOrderStore {
    pub fn new(inner: OrderStoreRef) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(false),
        })
    }

    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for FlakyOrderStore {
    async fn insert(&self, order: Order) -> SettlementResult<()> {
        self.inner.insert(order).await
    }

    async fn save(&self, order: Order) -> SettlementResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SettlementError::internal("order store unavailable"));
        }
        self.inner.save(order).await
    }

    async fn get(&self, order_number: &str) -> SettlementResult<Option<Order>> {
        self.inner.get(order_number).await
    }

    async fn list(&self) -> SettlementResult<Vec<Order>> {
        self.inner.list().await
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> SettlementResult<Vec<Order>> {
        self.inner.list_by_buyer(buyer_id).await
    }

    async fn list_delivered_for_seller(
        &self,
        seller_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SettlementResult<Vec<Order>> {
        self.inner.list_delivered_for_seller(seller_id, start, end).await
    }
}

pub struct FailingRefundCommit;

#[async_trait]
impl RefundCommit for FailingRefundCommit {
    async fn commit_refund(&self, _refund: Refund, _payment: Payment, _order: Order) -> SettlementResult<()> {
        Err(SettlementError::internal("refund storage unavailable"))
    }
}

pub struct FailingLedger;

#[async_trait]
impl SellerLedger for FailingLedger {
    async fn credit(&self, _seller_id: &str, _amount: Money) -> SettlementResult<Money> {
        Err(SettlementError::internal("ledger unavailable"))
    }

    async fn total_earnings(&self, _seller_id: &str) -> SettlementResult<Money> {
        Err(SettlementError::internal("ledger unavailable"))
    }
}

pub fn won(amount: i64) -> Money {
    Money::new(Decimal::from(amount))
}

pub fn product(product_id: &str, seller_id: Option<&str>, price: i64, stock: u32) -> ProductSnapshot {
    ProductSnapshot {
        product_id: product_id.to_string(),
        name: format!("Product {product_id}"),
        status: ProductStatus::Active,
        price: won(price),
        sale_price: None,
        stock,
        stock_management: true,
        seller_id: seller_id.map(str::to_string),
        category_id: None,
        shipping_free: true,
        shipping_fee: Money::ZERO,
        commission_rate_override: None,
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Jamie Doe".into(),
        phone: "010-1234-5678".into(),
        line1: "12 Market Street".into(),
        line2: Some("Unit 3".into()),
        city: "Seoul".into(),
        postal_code: "04524".into(),
    }
}

pub fn buyer(id: &str) -> Actor {
    Actor::new(id, Role::Buyer)
}

pub fn seller(id: &str) -> Actor {
    Actor::new(id, Role::Seller)
}

pub fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub fn system() -> Actor {
    Actor::new("payment-gateway", Role::System)
}

pub fn write_products_csv(path: &Path, rows: &[(&str, Option<&str>, i64, u32)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["product_id", "name", "price", "stock", "seller_id"])?;
    for (product_id, seller_id, price, stock) in rows {
        wtr.write_record([
            product_id.to_string(),
            format!("Product {product_id}"),
            price.to_string(),
            stock.to_string(),
            seller_id.unwrap_or("").to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
