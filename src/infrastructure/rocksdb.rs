use crate::domain::money::Money;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::Payment;
use crate::domain::payout::{PayoutPeriod, SellerPayout};
use crate::domain::ports::{
    OrderStore, PaymentStore, PayoutStore, ReconciliationLog, RefundCommit, RefundStore, SellerLedger,
};
use crate::domain::reconciliation::ReconciliationEntry;
use crate::domain::refund::Refund;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const CF_ORDERS: &str = "orders";
pub const CF_PAYMENTS: &str = "payments";
pub const CF_REFUNDS: &str = "refunds";
pub const CF_PAYOUTS: &str = "payouts";
pub const CF_RECONCILIATION: &str = "reconciliation";
pub const CF_LEDGER: &str = "ledger";

const COLUMN_FAMILIES: [&str; 6] = [
    CF_ORDERS,
    CF_PAYMENTS,
    CF_REFUNDS,
    CF_PAYOUTS,
    CF_RECONCILIATION,
    CF_LEDGER,
];

/// Persistent store for the settlement aggregates and the seller ledger.
///
/// Each aggregate lives in its own column family as a JSON document. Catalog
/// and carts belong to other services and are not kept here.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    // Serializes read-then-write sequences: order inserts and ledger credits.
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates the database at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| SettlementError::internal(format!("column family {name} not found")))
    }

    fn put<T: Serialize>(&self, cf: &str, key: impl AsRef<[u8]>, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, value)?;
        Ok(())
    }

    fn batch_put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        batch.put_cf(self.cf(cf)?, key, value);
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn orders_where(&self, keep: impl Fn(&Order) -> bool) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.scan::<Order>(CF_ORDERS)?.into_iter().filter(keep).collect();
        orders.sort_by(|a, b| {
            a.ordered_at
                .cmp(&b.ordered_at)
                .then_with(|| a.order_number.cmp(&b.order_number))
        });
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.db.get_pinned_cf(self.cf(CF_ORDERS)?, &order.order_number)?.is_some() {
            return Err(SettlementError::Duplicate(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        self.put(CF_ORDERS, &order.order_number, &order)
    }

    async fn save(&self, order: Order) -> Result<()> {
        self.put(CF_ORDERS, &order.order_number, &order)
    }

    async fn get(&self, order_number: &str) -> Result<Option<Order>> {
        self.fetch(CF_ORDERS, order_number)
    }

    async fn list(&self) -> Result<Vec<Order>> {
        self.orders_where(|_| true)
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        self.orders_where(|order| order.buyer_id == buyer_id)
    }

    async fn list_delivered_for_seller(
        &self,
        seller_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        self.orders_where(|order| {
            order.status == OrderStatus::Delivered
                && order.ordered_at >= start
                && order.ordered_at <= end
                && order.involves_seller(seller_id)
        })
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn save(&self, payment: Payment) -> Result<()> {
        self.put(CF_PAYMENTS, payment.id.as_bytes(), &payment)
    }

    async fn get(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        self.fetch(CF_PAYMENTS, payment_id.as_bytes())
    }

    async fn get_by_order(&self, order_number: &str) -> Result<Option<Payment>> {
        Ok(self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .find(|payment| payment.order_number == order_number))
    }
}

#[async_trait]
impl RefundStore for RocksDBStore {
    async fn save(&self, refund: Refund) -> Result<()> {
        self.put(CF_REFUNDS, refund.id.as_bytes(), &refund)
    }

    async fn get(&self, refund_id: Uuid) -> Result<Option<Refund>> {
        self.fetch(CF_REFUNDS, refund_id.as_bytes())
    }

    async fn list(&self) -> Result<Vec<Refund>> {
        let mut refunds = self.scan::<Refund>(CF_REFUNDS)?;
        refunds.sort_by_key(|refund| refund.created_at);
        Ok(refunds)
    }

    async fn list_by_order(&self, order_number: &str) -> Result<Vec<Refund>> {
        let mut refunds: Vec<Refund> = self
            .scan::<Refund>(CF_REFUNDS)?
            .into_iter()
            .filter(|refund| refund.order_number == order_number)
            .collect();
        refunds.sort_by_key(|refund| refund.created_at);
        Ok(refunds)
    }
}

#[async_trait]
impl RefundCommit for RocksDBStore {
    async fn commit_refund(&self, refund: Refund, payment: Payment, order: Order) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_put(&mut batch, CF_REFUNDS, refund.id.as_bytes(), &refund)?;
        self.batch_put(&mut batch, CF_PAYMENTS, payment.id.as_bytes(), &payment)?;
        self.batch_put(&mut batch, CF_ORDERS, &order.order_number, &order)?;
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl PayoutStore for RocksDBStore {
    async fn save(&self, payout: SellerPayout) -> Result<()> {
        self.put(CF_PAYOUTS, payout.id.as_bytes(), &payout)
    }

    async fn get(&self, payout_id: Uuid) -> Result<Option<SellerPayout>> {
        self.fetch(CF_PAYOUTS, payout_id.as_bytes())
    }

    async fn list(&self, seller_id: Option<&str>) -> Result<Vec<SellerPayout>> {
        let mut payouts: Vec<SellerPayout> = self
            .scan::<SellerPayout>(CF_PAYOUTS)?
            .into_iter()
            .filter(|payout| seller_id.is_none_or(|seller| payout.seller_id == seller))
            .collect();
        payouts.sort_by_key(|payout| payout.created_at);
        Ok(payouts)
    }

    async fn find_active(&self, seller_id: &str, period: &PayoutPeriod) -> Result<Option<SellerPayout>> {
        Ok(self.scan::<SellerPayout>(CF_PAYOUTS)?.into_iter().find(|payout| {
            payout.is_active() && payout.seller_id == seller_id && payout.period == *period
        }))
    }
}

#[async_trait]
impl ReconciliationLog for RocksDBStore {
    async fn record(&self, entry: ReconciliationEntry) -> Result<()> {
        // Timestamp-prefixed keys keep the column family in arrival order.
        let key = format!(
            "{}:{}",
            entry.occurred_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            entry.id
        );
        self.put(CF_RECONCILIATION, key, &entry)
    }

    async fn entries(&self) -> Result<Vec<ReconciliationEntry>> {
        self.scan(CF_RECONCILIATION)
    }
}

#[async_trait]
impl SellerLedger for RocksDBStore {
    async fn credit(&self, seller_id: &str, amount: Money) -> Result<Money> {
        let _guard = self.write_lock.lock().await;
        let total = self.fetch::<Money>(CF_LEDGER, seller_id)?.unwrap_or_default() + amount;
        self.put(CF_LEDGER, seller_id, &total)?;
        Ok(total)
    }

    async fn total_earnings(&self, seller_id: &str) -> Result<Money> {
        Ok(self.fetch(CF_LEDGER, seller_id)?.unwrap_or_default())
    }
}
