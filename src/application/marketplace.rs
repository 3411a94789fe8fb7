use super::Stores;
use super::locks::LockTable;
use super::order_engine::OrderEngine;
use super::payments::PaymentProcessor;
use super::payout_engine::PayoutEngine;
use super::refund_engine::RefundEngine;
use crate::config::EngineConfig;
use crate::domain::actor::Actor;
use crate::domain::reconciliation::ReconciliationEntry;
use crate::error::Result;
use std::sync::Arc;

/// The settlement engines wired to one set of stores.
///
/// All engines share a single [`LockTable`], so an order is never mutated by
/// two workflows at once.
pub struct Marketplace {
    pub orders: OrderEngine,
    pub payments: PaymentProcessor,
    pub refunds: RefundEngine,
    pub payouts: PayoutEngine,
    stores: Stores,
    config: EngineConfig,
}

pub type MarketplaceRef = Arc<Marketplace>;

impl Marketplace {
    pub fn new(stores: Stores, config: EngineConfig) -> Self {
        let locks = LockTable::new();
        Self {
            orders: OrderEngine::new(stores.clone(), config.commission_calculator(), locks.clone()),
            payments: PaymentProcessor::new(stores.clone(), locks.clone()),
            refunds: RefundEngine::new(stores.clone(), locks.clone()),
            payouts: PayoutEngine::new(stores.clone(), locks, config.max_orders_per_payout),
            stores,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Operator queue of side effects that need manual attention.
    pub async fn reconciliation_entries(&self, actor: &Actor) -> Result<Vec<ReconciliationEntry>> {
        actor.require_admin()?;
        self.stores.reconciliation.entries().await
    }
}
