use super::Stores;
use super::locks::LockTable;
use crate::domain::actor::{Actor, Role};
use crate::domain::money::Money;
use crate::domain::order::Order;
use crate::domain::payout::{PayoutLine, PayoutPeriod, PayoutStatus, SellerPayout};
use crate::domain::reconciliation::{ReconciliationEntry, ReconciliationKind};
use crate::error::{Result, SettlementError};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// Result of one bounded calculation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutCalculation {
    pub payout: SellerPayout,
    pub has_more: bool,
    pub remaining_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerEarnings {
    pub seller_id: String,
    pub total_earnings: Money,
}

/// Batches a seller's delivered items into payouts.
///
/// Each item carries the id of the payout that claimed it, so an item is
/// settled at most once no matter how periods overlap.
pub struct PayoutEngine {
    stores: Stores,
    locks: LockTable,
    max_orders_per_payout: usize,
}

impl PayoutEngine {
    pub fn new(stores: Stores, locks: LockTable, max_orders_per_payout: usize) -> Self {
        Self {
            stores,
            locks,
            max_orders_per_payout,
        }
    }

    /// Calculates (or refreshes) the payout of `seller_id` for `period`.
    ///
    /// Orders this payout already claimed are always re-read. At most
    /// `max_orders_per_payout` new orders are claimed per call; the rest are
    /// reported through `has_more` and picked up by the next call.
    pub async fn calculate_payout(
        &self,
        actor: &Actor,
        seller_id: &str,
        period: PayoutPeriod,
    ) -> Result<PayoutCalculation> {
        actor.require_admin()?;
        if seller_id.trim().is_empty() {
            return Err(SettlementError::Validation("sellerId is required".to_string()));
        }
        let _guard = self.locks.lock_seller_payouts(seller_id).await;

        let mut payout = match self.stores.payouts.find_active(seller_id, &period).await? {
            Some(existing) => existing,
            None => {
                let fresh = SellerPayout::new(seller_id.to_string(), period, Utc::now());
                self.stores.payouts.save(fresh.clone()).await?;
                fresh
            }
        };
        // Surface approved/paid payouts before touching any order.
        if !matches!(payout.status, PayoutStatus::Pending | PayoutStatus::Calculated) {
            return Err(SettlementError::StateConflict(format!(
                "payout {} is {:?} and can no longer be recalculated",
                payout.id, payout.status
            )));
        }

        let delivered = self
            .stores
            .orders
            .list_delivered_for_seller(seller_id, period.start, period.end)
            .await?;
        // Claims held by a cancelled or vanished payout count as open.
        let live: HashSet<Uuid> = self
            .stores
            .payouts
            .list(Some(seller_id))
            .await?
            .into_iter()
            .filter(SellerPayout::is_active)
            .map(|payout| payout.id)
            .collect();

        let mut claimed = Vec::new();
        let mut fresh = Vec::new();
        for order in delivered {
            let mut ours = false;
            let mut open = false;
            for item in order.items.iter().filter(|item| item.is_owned_by(seller_id)) {
                match item.payout_id {
                    Some(id) if id == payout.id => ours = true,
                    Some(id) if live.contains(&id) => {}
                    _ => open = true,
                }
            }
            if ours {
                claimed.push(order.order_number);
            } else if open {
                fresh.push(order.order_number);
            }
        }

        let remaining_orders = fresh.len().saturating_sub(self.max_orders_per_payout);
        fresh.truncate(self.max_orders_per_payout);

        let previously: BTreeSet<String> = payout
            .lines
            .iter()
            .map(|line| line.order_number.clone())
            .collect();
        let mut lines = Vec::new();
        let mut scanned: BTreeSet<String> = BTreeSet::new();
        for order_number in claimed.into_iter().chain(fresh) {
            lines.extend(self.claim_items(&order_number, seller_id, payout.id, &live).await?);
            scanned.insert(order_number);
        }
        // Orders that left the delivered set (fully refunded) give their items back.
        for order_number in previously.difference(&scanned) {
            self.release_items(order_number, payout.id).await?;
        }

        payout.record_calculation(lines, Utc::now())?;
        self.stores.payouts.save(payout.clone()).await?;
        info!(
            payout_id = %payout.id,
            seller_id = %seller_id,
            lines = payout.lines.len(),
            total_sales = %payout.total_sales,
            payout_amount = %payout.payout_amount,
            remaining_orders,
            "Payout calculated"
        );
        Ok(PayoutCalculation {
            payout,
            has_more: remaining_orders > 0,
            remaining_orders,
        })
    }

    pub async fn approve_payout(&self, actor: &Actor, payout_id: Uuid) -> Result<SellerPayout> {
        actor.require_admin()?;
        let seller_id = self.load(payout_id).await?.seller_id;
        let _guard = self.locks.lock_seller_payouts(&seller_id).await;
        let mut payout = self.load(payout_id).await?;
        payout.approve(actor.user_id.clone(), Utc::now())?;
        self.stores.payouts.save(payout.clone()).await?;
        info!(payout_id = %payout.id, seller_id = %seller_id, "Payout approved");
        Ok(payout)
    }

    /// Records the disbursement and credits the seller exactly once.
    pub async fn pay_payout(
        &self,
        actor: &Actor,
        payout_id: Uuid,
        payment_method: String,
        transaction_id: String,
    ) -> Result<SellerPayout> {
        actor.require_admin()?;
        let seller_id = self.load(payout_id).await?.seller_id;
        let _guard = self.locks.lock_seller_payouts(&seller_id).await;
        let mut payout = self.load(payout_id).await?;
        payout.pay(payment_method, transaction_id, Utc::now())?;
        self.stores.payouts.save(payout.clone()).await?;

        match self.stores.ledger.credit(&seller_id, payout.payout_amount).await {
            Ok(total) => info!(
                payout_id = %payout.id,
                seller_id = %seller_id,
                amount = %payout.payout_amount,
                total_earnings = %total,
                "Payout paid"
            ),
            Err(e) => {
                self.stores
                    .follow_up(ReconciliationEntry::new(
                        None,
                        ReconciliationKind::EarningsCredit {
                            seller_id: seller_id.clone(),
                            payout_id: payout.id,
                        },
                        format!("payout {} paid but earnings credit failed: {e}", payout.id),
                    ))
                    .await;
            }
        }
        Ok(payout)
    }

    /// Cancels a payout that has not been paid and releases its items.
    ///
    /// The cancellation is stored first. Items whose release fails keep a
    /// stale claim, which the next calculation treats as open.
    pub async fn cancel_payout(&self, actor: &Actor, payout_id: Uuid) -> Result<SellerPayout> {
        actor.require_admin()?;
        let seller_id = self.load(payout_id).await?.seller_id;
        let _guard = self.locks.lock_seller_payouts(&seller_id).await;
        let mut payout = self.load(payout_id).await?;
        payout.cancel(Utc::now())?;
        self.stores.payouts.save(payout.clone()).await?;

        let orders: BTreeSet<&str> = payout
            .lines
            .iter()
            .map(|line| line.order_number.as_str())
            .collect();
        for order_number in orders {
            if let Err(e) = self.release_items(order_number, payout.id).await {
                self.stores
                    .follow_up(ReconciliationEntry::new(
                        Some(order_number.to_string()),
                        ReconciliationKind::ClaimRelease { payout_id: payout.id },
                        format!("items of cancelled payout {} were not released: {e}", payout.id),
                    ))
                    .await;
            }
        }
        info!(payout_id = %payout.id, seller_id = %seller_id, "Payout cancelled");
        Ok(payout)
    }

    pub async fn get_payout(&self, actor: &Actor, payout_id: Uuid) -> Result<SellerPayout> {
        let payout = self.load(payout_id).await?;
        self.require_seller_view(actor, &payout.seller_id)?;
        Ok(payout)
    }

    /// Admins see every payout (optionally one seller's); sellers see their own.
    pub async fn list_payouts(&self, actor: &Actor, seller_id: Option<&str>) -> Result<Vec<SellerPayout>> {
        let filter = if actor.is_admin() {
            seller_id
        } else {
            let own = actor.user_id.as_str();
            self.require_seller_view(actor, seller_id.unwrap_or(own))?;
            Some(own)
        };
        self.stores.payouts.list(filter).await
    }

    pub async fn seller_earnings(&self, actor: &Actor, seller_id: &str) -> Result<SellerEarnings> {
        self.require_seller_view(actor, seller_id)?;
        Ok(SellerEarnings {
            seller_id: seller_id.to_string(),
            total_earnings: self.stores.ledger.total_earnings(seller_id).await?,
        })
    }

    fn require_seller_view(&self, actor: &Actor, seller_id: &str) -> Result<()> {
        if actor.is_admin() || (actor.role == Role::Seller && actor.user_id == seller_id) {
            return Ok(());
        }
        Err(SettlementError::Authorization(format!(
            "{} may not view payouts of seller {seller_id}",
            actor.user_id
        )))
    }

    /// Marks the seller's open items of one order as claimed and returns
    /// their payout lines. Only claims of `live` payouts are respected.
    async fn claim_items(
        &self,
        order_number: &str,
        seller_id: &str,
        payout_id: Uuid,
        live: &HashSet<Uuid>,
    ) -> Result<Vec<PayoutLine>> {
        let _guard = self.locks.lock_order(order_number).await;
        let Some(mut order) = self.stores.orders.get(order_number).await? else {
            return Ok(Vec::new());
        };
        let mut lines = Vec::new();
        let mut changed = false;
        for (index, item) in order.items.iter_mut().enumerate() {
            if !item.is_owned_by(seller_id) {
                continue;
            }
            match item.payout_id {
                Some(id) if id == payout_id => {}
                Some(id) if live.contains(&id) => continue,
                _ => {
                    item.payout_id = Some(payout_id);
                    changed = true;
                }
            }
            lines.push(PayoutLine::from_item(order_number, index, item));
        }
        if changed {
            self.stores.orders.save(order).await?;
        }
        debug!(order_number, payout_id = %payout_id, lines = lines.len(), "Claimed order items");
        Ok(lines)
    }

    async fn release_items(&self, order_number: &str, payout_id: Uuid) -> Result<()> {
        let _guard = self.locks.lock_order(order_number).await;
        let Some(mut order) = self.stores.orders.get(order_number).await? else {
            return Ok(());
        };
        if release(&mut order, payout_id) {
            self.stores.orders.save(order).await?;
        }
        Ok(())
    }

    async fn load(&self, payout_id: Uuid) -> Result<SellerPayout> {
        self.stores
            .payouts
            .get(payout_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Payout", payout_id.to_string()))
    }
}

fn release(order: &mut Order, payout_id: Uuid) -> bool {
    let mut changed = false;
    for item in &mut order.items {
        if item.payout_id == Some(payout_id) {
            item.payout_id = None;
            changed = true;
        }
    }
    changed
}
