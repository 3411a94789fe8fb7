use super::Stores;
use super::locks::LockTable;
use crate::domain::actor::Actor;
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderPaymentStatus};
use crate::domain::payment::Payment;
use crate::domain::reconciliation::{ReconciliationEntry, ReconciliationKind};
use crate::domain::refund::{Refund, RefundKind, RefundLine};
use crate::error::{Result, SettlementError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{error, info};
use uuid::Uuid;

/// A requested slice of one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineRequest {
    pub item_index: usize,
    pub quantity: u32,
}

/// Validates refund eligibility and applies approved refunds to the order and
/// its payment. Refunds never put stock back; returned goods re-enter stock
/// through logistics, not here.
pub struct RefundEngine {
    stores: Stores,
    locks: LockTable,
}

impl RefundEngine {
    pub fn new(stores: Stores, locks: LockTable) -> Self {
        Self { stores, locks }
    }

    /// Requests a refund. No line list (or an empty one) means a full refund.
    pub async fn create_refund(
        &self,
        actor: &Actor,
        order_number: &str,
        reason: String,
        lines: Option<Vec<RefundLineRequest>>,
    ) -> Result<Refund> {
        let _guard = self.locks.lock_order(order_number).await;
        let order = self.load_order(order_number).await?;
        actor.require_self_or_admin(&order.buyer_id)?;
        order.ensure_refundable()?;
        let payment = self.payment_of(&order).await?;
        payment.ensure_refundable()?;

        let pending: Vec<Refund> = self
            .stores
            .refunds
            .list_by_order(order_number)
            .await?
            .into_iter()
            .filter(Refund::is_open)
            .collect();
        if pending.iter().any(Refund::is_full) {
            return Err(SettlementError::StateConflict(format!(
                "order {order_number} already has an open full refund"
            )));
        }

        let (kind, amount) = match lines.filter(|lines| !lines.is_empty()) {
            None => {
                if !pending.is_empty() {
                    return Err(SettlementError::StateConflict(format!(
                        "order {order_number} has open partial refunds; resolve them first"
                    )));
                }
                (RefundKind::Full, order.outstanding_amount())
            }
            Some(requested) => {
                let lines = quote_partial(&order, &pending, requested)?;
                let amount = lines.iter().map(|line| line.amount).sum();
                (RefundKind::Partial { lines }, amount)
            }
        };

        let refund = Refund::new(
            order.order_number.clone(),
            payment.id,
            amount,
            reason,
            kind,
            actor.user_id.clone(),
            Utc::now(),
        )?;
        self.stores.refunds.save(refund.clone()).await?;
        info!(
            refund_id = %refund.id,
            order_number = %refund.order_number,
            amount = %refund.amount,
            full = refund.is_full(),
            "Refund requested"
        );
        Ok(refund)
    }

    /// Approves and completes a pending refund.
    ///
    /// The refund is stored as approved before the provider is asked, so a
    /// concurrent or repeated approval cannot pay out twice. A declined call
    /// puts it back to pending. Once the provider has paid, the refund,
    /// payment and order are committed together.
    pub async fn approve_refund(&self, actor: &Actor, refund_id: Uuid) -> Result<Refund> {
        actor.require_admin()?;
        let order_number = self.load_refund(refund_id).await?.order_number;
        let _guard = self.locks.lock_order(&order_number).await;
        let mut refund = self.load_refund(refund_id).await?;
        let now = Utc::now();
        refund.approve(now)?;

        let mut order = self.load_order(&order_number).await?;
        let payment = self.payment_of(&order).await?;
        payment.ensure_refundable()?;

        let amount = match &refund.kind {
            RefundKind::Full => order.apply_full_refund(now)?,
            RefundKind::Partial { .. } => order.apply_partial_refund(&refund.lines(), now)?,
        };
        let mut settled = payment.clone();
        settled.record_refund(amount, order.payment_status == OrderPaymentStatus::Refunded, now)?;

        self.stores.refunds.save(refund.clone()).await?;
        let receipt = match self.stores.gateway.refund(&payment, amount).await {
            Ok(receipt) => receipt,
            Err(e) => {
                refund.reopen()?;
                if let Err(save_err) = self.stores.refunds.save(refund).await {
                    error!(refund_id = %refund_id, error = %save_err, "Failed to reopen declined refund");
                }
                return Err(e);
            }
        };
        refund.complete(amount, receipt.reference.clone(), now)?;

        if let Err(e) = self
            .stores
            .refund_commits
            .commit_refund(refund.clone(), settled, order.clone())
            .await
        {
            self.stores
                .follow_up(ReconciliationEntry::new(
                    Some(order_number),
                    ReconciliationKind::RefundCommit {
                        refund_id,
                        gateway_reference: receipt.reference,
                    },
                    format!("refund {refund_id} was paid by the provider but not recorded: {e}"),
                ))
                .await;
            return Err(e);
        }
        info!(
            refund_id = %refund.id,
            order_number = %order.order_number,
            amount = %amount,
            order_status = ?order.status,
            "Refund completed"
        );

        self.flag_settled_items(&refund, &order).await;
        Ok(refund)
    }

    pub async fn reject_refund(&self, actor: &Actor, refund_id: Uuid, reason: String) -> Result<Refund> {
        actor.require_admin()?;
        let order_number = self.load_refund(refund_id).await?.order_number;
        let _guard = self.locks.lock_order(&order_number).await;
        let mut refund = self.load_refund(refund_id).await?;
        refund.reject(reason, Utc::now())?;
        self.stores.refunds.save(refund.clone()).await?;
        info!(refund_id = %refund.id, order_number = %order_number, "Refund rejected");
        Ok(refund)
    }

    pub async fn get_refund(&self, actor: &Actor, refund_id: Uuid) -> Result<Refund> {
        let refund = self.load_refund(refund_id).await?;
        if !actor.is_admin() {
            let order = self.load_order(&refund.order_number).await?;
            actor.require_self_or_admin(&order.buyer_id)?;
        }
        Ok(refund)
    }

    pub async fn list_refunds(&self, actor: &Actor) -> Result<Vec<Refund>> {
        let refunds = self.stores.refunds.list().await?;
        if actor.is_admin() {
            return Ok(refunds);
        }
        let own: HashSet<String> = self
            .stores
            .orders
            .list_by_buyer(&actor.user_id)
            .await?
            .into_iter()
            .map(|order| order.order_number)
            .collect();
        Ok(refunds
            .into_iter()
            .filter(|refund| own.contains(&refund.order_number))
            .collect())
    }

    /// Items already inside an approved or paid payout cannot be netted out
    /// any more; an operator has to claw the difference back.
    async fn flag_settled_items(&self, refund: &Refund, order: &Order) {
        let indexes: Vec<usize> = match &refund.kind {
            RefundKind::Full => (0..order.items.len()).collect(),
            RefundKind::Partial { lines } => lines.iter().map(|line| line.item_index).collect(),
        };
        let payout_ids: BTreeSet<Uuid> = indexes
            .into_iter()
            .filter_map(|index| order.items.get(index).and_then(|item| item.payout_id))
            .collect();
        for payout_id in payout_ids {
            let settled = match self.stores.payouts.get(payout_id).await {
                Ok(Some(payout)) => payout.holds_claims(),
                Ok(None) => false,
                Err(_) => true,
            };
            if settled {
                self.stores
                    .follow_up(ReconciliationEntry::new(
                        Some(order.order_number.clone()),
                        ReconciliationKind::RefundAfterPayout {
                            refund_id: refund.id,
                            payout_id,
                        },
                        format!(
                            "refund {} touches items settled by payout {payout_id}",
                            refund.id
                        ),
                    ))
                    .await;
            }
        }
    }

    async fn payment_of(&self, order: &Order) -> Result<Payment> {
        self.stores
            .payments
            .get_by_order(&order.order_number)
            .await?
            .ok_or_else(|| {
                SettlementError::StateConflict(format!(
                    "order {} has no payment to refund",
                    order.order_number
                ))
            })
    }

    async fn load_refund(&self, refund_id: Uuid) -> Result<Refund> {
        self.stores
            .refunds
            .get(refund_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Refund", refund_id.to_string()))
    }

    async fn load_order(&self, order_number: &str) -> Result<Order> {
        self.stores
            .orders
            .get(order_number)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_number))
    }
}

/// Prices a partial refund, holding back units already claimed by open
/// refunds of the same order.
fn quote_partial(order: &Order, pending: &[Refund], requested: Vec<RefundLineRequest>) -> Result<Vec<RefundLine>> {
    let mut quantities: BTreeMap<usize, u32> = BTreeMap::new();
    for line in requested {
        if line.quantity == 0 {
            return Err(SettlementError::Validation(
                "refund quantity must be at least 1".to_string(),
            ));
        }
        *quantities.entry(line.item_index).or_default() += line.quantity;
    }

    let mut lines = Vec::with_capacity(quantities.len());
    for (index, quantity) in quantities {
        let item = order.items.get(index).ok_or_else(|| {
            SettlementError::Validation(format!(
                "order {} has no item at index {index}",
                order.order_number
            ))
        })?;
        let held: u32 = pending.iter().map(|refund| refund.held_quantity(index)).sum();
        let available = item.remaining_quantity().saturating_sub(held);
        if quantity > available {
            return Err(SettlementError::StateConflict(format!(
                "only {available} units of {} remain refundable, requested {quantity}",
                item.product_id
            )));
        }
        let amount: Money = if held == 0 {
            item.quote_refund(quantity).0
        } else {
            item.total_price.prorate(quantity, item.quantity)
        };
        lines.push(RefundLine {
            item_index: index,
            quantity,
            amount,
        });
    }
    Ok(lines)
}
