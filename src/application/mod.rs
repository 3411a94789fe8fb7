//! Application layer containing the settlement workflows.
//!
//! Each engine owns one family of state transitions (orders, payments,
//! refunds, payouts). They share the storage ports through [`Stores`] and a
//! [`locks::LockTable`] that serializes mutations per aggregate.

pub mod locks;
pub mod marketplace;
pub mod order_engine;
pub mod payments;
pub mod payout_engine;
pub mod refund_engine;

use crate::domain::ports::{
    CartStoreRef, CatalogRef, OrderStoreRef, PaymentGatewayRef, PaymentStoreRef, PayoutStoreRef,
    ReconciliationLogRef, RefundCommitRef, RefundStoreRef, SellerLedgerRef,
};
use crate::domain::reconciliation::ReconciliationEntry;
use tracing::{error, warn};

/// Every port the engines talk to.
#[derive(Clone)]
pub struct Stores {
    pub orders: OrderStoreRef,
    pub payments: PaymentStoreRef,
    pub refunds: RefundStoreRef,
    pub refund_commits: RefundCommitRef,
    pub payouts: PayoutStoreRef,
    pub reconciliation: ReconciliationLogRef,
    pub catalog: CatalogRef,
    pub carts: CartStoreRef,
    pub ledger: SellerLedgerRef,
    pub gateway: PaymentGatewayRef,
}

impl Stores {
    /// Queues a failed side effect for an operator. The parent operation has
    /// already committed, so this never fails it.
    pub(crate) async fn follow_up(&self, entry: ReconciliationEntry) -> ReconciliationEntry {
        warn!(
            order_number = entry.order_number.as_deref().unwrap_or("-"),
            kind = ?entry.kind,
            "{}",
            entry.message
        );
        if let Err(e) = self.reconciliation.record(entry.clone()).await {
            error!(error = %e, entry_id = %entry.id, "Failed to record reconciliation entry");
        }
        entry
    }
}
