use super::Stores;
use super::locks::LockTable;
use crate::domain::actor::{Actor, Role};
use crate::domain::catalog::{CartLine, ProductSnapshot, ProductStatus};
use crate::domain::commission::CommissionCalculator;
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderItem, OrderStatus, ShippingAddress};
use crate::domain::payment::PaymentStatus;
use crate::domain::reconciliation::{ReconciliationEntry, ReconciliationKind};
use crate::error::{Result, SettlementError};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Where the requested lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSource {
    /// The buyer's cart, cleared once the order is committed.
    Cart,
    Direct(Vec<CartLine>),
}

/// Result of an order mutation: the committed order plus any catalog or cart
/// side effects that failed and were queued for reconciliation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutcome {
    pub order: Order,
    pub follow_ups: Vec<ReconciliationEntry>,
}

/// Validates requested lines, reserves stock and persists orders.
pub struct OrderEngine {
    stores: Stores,
    commission: CommissionCalculator,
    locks: LockTable,
}

impl OrderEngine {
    pub fn new(stores: Stores, commission: CommissionCalculator, locks: LockTable) -> Self {
        Self {
            stores,
            commission,
            locks,
        }
    }

    /// Places an order for `actor`.
    ///
    /// Every line is validated before any stock moves. Stock is then reserved
    /// with an atomic decrement per line; a lost race restores what was already
    /// reserved and fails the whole order.
    pub async fn create_order(
        &self,
        actor: &Actor,
        source: OrderSource,
        shipping_address: ShippingAddress,
    ) -> Result<OrderOutcome> {
        shipping_address.validate()?;
        let from_cart = source == OrderSource::Cart;
        let requested = match source {
            OrderSource::Cart => self.stores.carts.lines(&actor.user_id).await?,
            OrderSource::Direct(lines) => lines,
        };
        let lines = merge_lines(requested)?;

        let mut snapshots = Vec::with_capacity(lines.len());
        for line in &lines {
            snapshots.push(self.validated_snapshot(line).await?);
        }

        let mut items = Vec::with_capacity(lines.len());
        for (line, product) in lines.iter().zip(&snapshots) {
            items.push(self.build_item(line, product).await?);
        }

        // Single-shipment simplification: the first line decides the fee.
        let shipping_fee = snapshots
            .first()
            .filter(|product| !product.shipping_free)
            .map(|product| product.shipping_fee)
            .unwrap_or(Money::ZERO);

        let now = Utc::now();
        let order = Order::new(
            Order::generate_number(now),
            actor.user_id.clone(),
            items,
            shipping_fee,
            Money::ZERO,
            shipping_address,
            now,
        )?;

        let mut follow_ups = Vec::new();
        let reserved = self.reserve_stock(&order, &snapshots, &mut follow_ups).await?;

        if let Err(e) = self.stores.orders.insert(order.clone()).await {
            warn!(order_number = %order.order_number, error = %e, "Order commit failed, releasing stock");
            let lines: Vec<_> = reserved.iter().map(|(line, _)| *line).collect();
            self.release_stock(&order, &snapshots, &lines, &mut follow_ups).await;
            return Err(e);
        }
        info!(
            order_number = %order.order_number,
            buyer_id = %order.buyer_id,
            total = %order.total_amount,
            items = order.items.len(),
            "Order created"
        );

        for (index, remaining) in reserved {
            if remaining == 0 {
                let product_id = &order.items[index].product_id;
                if let Err(e) = self
                    .stores
                    .catalog
                    .set_product_status(product_id, ProductStatus::OutOfStock)
                    .await
                {
                    follow_ups.push(
                        self.stores
                            .follow_up(ReconciliationEntry::new(
                                Some(order.order_number.clone()),
                                ReconciliationKind::StockStatusUpdate {
                                    product_id: product_id.clone(),
                                    status: "out_of_stock".to_string(),
                                },
                                format!("failed to mark {product_id} out of stock: {e}"),
                            ))
                            .await,
                    );
                }
            }
        }

        if from_cart && let Err(e) = self.stores.carts.clear(&actor.user_id).await {
            follow_ups.push(
                self.stores
                    .follow_up(ReconciliationEntry::new(
                        Some(order.order_number.clone()),
                        ReconciliationKind::CartClear {
                            buyer_id: actor.user_id.clone(),
                        },
                        format!("failed to clear cart of {}: {e}", actor.user_id),
                    ))
                    .await,
            );
        }

        Ok(OrderOutcome { order, follow_ups })
    }

    async fn validated_snapshot(&self, line: &CartLine) -> Result<ProductSnapshot> {
        let product = self
            .stores
            .catalog
            .get_product_snapshot(&line.product_id)
            .await?
            .ok_or_else(|| SettlementError::not_found("Product", line.product_id.as_str()))?;
        if !product.is_orderable() {
            return Err(SettlementError::Validation(format!(
                "product {} is not available for purchase",
                product.product_id
            )));
        }
        if !product.has_stock_for(line.quantity) {
            return Err(SettlementError::InsufficientStock {
                product_id: product.product_id.clone(),
                requested: line.quantity,
                available: product.stock,
            });
        }
        Ok(product)
    }

    async fn build_item(&self, line: &CartLine, product: &ProductSnapshot) -> Result<OrderItem> {
        let unit_price = product.unit_price();
        let line_total = unit_price.times(line.quantity);
        let split = match &product.seller_id {
            Some(seller_id) => {
                let seller_rate = self.stores.catalog.get_seller_commission_rate(seller_id).await?;
                let rate = self
                    .commission
                    .resolve_rate(seller_rate, product.commission_rate_override);
                self.commission.split(line_total, rate)
            }
            None => self.commission.platform_split(line_total),
        };
        Ok(OrderItem::new(
            product.product_id.clone(),
            product.name.clone(),
            line.quantity,
            unit_price,
            product.seller_id.clone(),
            split,
        ))
    }

    /// Returns `(item index, remaining stock)` for every managed line reserved.
    async fn reserve_stock(
        &self,
        order: &Order,
        snapshots: &[ProductSnapshot],
        follow_ups: &mut Vec<ReconciliationEntry>,
    ) -> Result<Vec<(usize, u32)>> {
        let mut reserved = Vec::new();
        for (index, (item, product)) in order.items.iter().zip(snapshots).enumerate() {
            if !product.stock_management {
                continue;
            }
            match self
                .stores
                .catalog
                .decrement_stock(&item.product_id, item.quantity)
                .await
            {
                Ok(remaining) => reserved.push((index, remaining)),
                Err(e) => {
                    debug!(product_id = %item.product_id, error = %e, "Stock reservation lost, compensating");
                    let lines: Vec<_> = reserved.iter().map(|(line, _)| *line).collect();
                    self.release_stock(order, snapshots, &lines, follow_ups).await;
                    return Err(e);
                }
            }
        }
        Ok(reserved)
    }

    /// Puts reserved units back, reactivating products that were sold out.
    async fn release_stock(
        &self,
        order: &Order,
        snapshots: &[ProductSnapshot],
        lines: &[usize],
        follow_ups: &mut Vec<ReconciliationEntry>,
    ) {
        for &index in lines {
            let item = &order.items[index];
            match self
                .stores
                .catalog
                .restore_stock(&item.product_id, item.quantity)
                .await
            {
                Ok(stock) => {
                    let sold_out = snapshots
                        .get(index)
                        .is_some_and(|product| product.status == ProductStatus::OutOfStock);
                    if stock > 0 && sold_out {
                        self.reactivate(order, &item.product_id, follow_ups).await;
                    }
                }
                Err(e) => follow_ups.push(
                    self.stores
                        .follow_up(ReconciliationEntry::new(
                            Some(order.order_number.clone()),
                            ReconciliationKind::StockRestore {
                                product_id: item.product_id.clone(),
                                quantity: item.quantity,
                            },
                            format!("failed to restore {} units of {}: {e}", item.quantity, item.product_id),
                        ))
                        .await,
                ),
            }
        }
    }

    async fn reactivate(&self, order: &Order, product_id: &str, follow_ups: &mut Vec<ReconciliationEntry>) {
        if let Err(e) = self
            .stores
            .catalog
            .set_product_status(product_id, ProductStatus::Active)
            .await
        {
            follow_ups.push(
                self.stores
                    .follow_up(ReconciliationEntry::new(
                        Some(order.order_number.clone()),
                        ReconciliationKind::StockStatusUpdate {
                            product_id: product_id.to_string(),
                            status: "active".to_string(),
                        },
                        format!("failed to reactivate {product_id}: {e}"),
                    ))
                    .await,
            );
        }
    }

    /// Cancels an unpaid order and gives its stock back.
    pub async fn cancel_order(&self, actor: &Actor, order_number: &str, reason: String) -> Result<OrderOutcome> {
        let _guard = self.locks.lock_order(order_number).await;
        let mut order = self.load(order_number).await?;
        actor.require_self_or_admin(&order.buyer_id)?;

        order.cancel(reason, Utc::now())?;
        self.stores.orders.save(order.clone()).await?;
        info!(order_number = %order.order_number, "Order cancelled");

        if let Some(mut payment) = self.stores.payments.get_by_order(order_number).await?
            && payment.status == PaymentStatus::Pending
        {
            payment.cancel()?;
            self.stores.payments.save(payment).await?;
        }

        let mut follow_ups = Vec::new();
        for item in &order.items {
            let product = match self.stores.catalog.get_product_snapshot(&item.product_id).await {
                Ok(Some(product)) => product,
                Ok(None) => continue,
                Err(e) => {
                    follow_ups.push(
                        self.stores
                            .follow_up(ReconciliationEntry::new(
                                Some(order.order_number.clone()),
                                ReconciliationKind::StockRestore {
                                    product_id: item.product_id.clone(),
                                    quantity: item.quantity,
                                },
                                format!("failed to look up {}: {e}", item.product_id),
                            ))
                            .await,
                    );
                    continue;
                }
            };
            if !product.stock_management {
                continue;
            }
            match self
                .stores
                .catalog
                .restore_stock(&item.product_id, item.quantity)
                .await
            {
                Ok(stock) if stock > 0 && product.status == ProductStatus::OutOfStock => {
                    self.reactivate(&order, &item.product_id, &mut follow_ups).await;
                }
                Ok(_) => {}
                Err(e) => follow_ups.push(
                    self.stores
                        .follow_up(ReconciliationEntry::new(
                            Some(order.order_number.clone()),
                            ReconciliationKind::StockRestore {
                                product_id: item.product_id.clone(),
                                quantity: item.quantity,
                            },
                            format!("failed to restore {} units of {}: {e}", item.quantity, item.product_id),
                        ))
                        .await,
                ),
            }
        }

        Ok(OrderOutcome { order, follow_ups })
    }

    /// Moves a paid order along its fulfilment path.
    pub async fn advance_fulfillment(&self, actor: &Actor, order_number: &str, next: OrderStatus) -> Result<Order> {
        actor.require_admin()?;
        let _guard = self.locks.lock_order(order_number).await;
        let mut order = self.load(order_number).await?;
        order.advance(next, Utc::now())?;
        self.stores.orders.save(order.clone()).await?;
        info!(order_number = %order.order_number, status = ?order.status, "Order fulfilment advanced");
        Ok(order)
    }

    pub async fn get_order(&self, actor: &Actor, order_number: &str) -> Result<Order> {
        let order = self.load(order_number).await?;
        let seller_view = actor.role == Role::Seller && order.involves_seller(&actor.user_id);
        if !seller_view {
            actor.require_self_or_admin(&order.buyer_id)?;
        }
        Ok(order)
    }

    pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>> {
        match actor.role {
            Role::Admin => self.stores.orders.list().await,
            Role::Seller => Ok(self
                .stores
                .orders
                .list()
                .await?
                .into_iter()
                .filter(|order| order.involves_seller(&actor.user_id))
                .collect()),
            _ => self.stores.orders.list_by_buyer(&actor.user_id).await,
        }
    }

    pub async fn cart(&self, actor: &Actor) -> Result<Vec<CartLine>> {
        self.stores.carts.lines(&actor.user_id).await
    }

    pub async fn add_to_cart(&self, actor: &Actor, line: CartLine) -> Result<Vec<CartLine>> {
        if self
            .stores
            .catalog
            .get_product_snapshot(&line.product_id)
            .await?
            .is_none()
        {
            return Err(SettlementError::not_found("Product", line.product_id.as_str()));
        }
        self.stores.carts.add_line(&actor.user_id, line).await
    }

    async fn load(&self, order_number: &str) -> Result<Order> {
        self.stores
            .orders
            .get(order_number)
            .await?
            .ok_or_else(|| SettlementError::not_found("Order", order_number))
    }
}

/// Rejects empty requests and zero quantities, folding repeated products into
/// one line so stock is checked against the combined quantity.
fn merge_lines(requested: Vec<CartLine>) -> Result<Vec<CartLine>> {
    if requested.is_empty() {
        return Err(SettlementError::Validation(
            "an order needs at least one item".to_string(),
        ));
    }
    let mut merged: Vec<CartLine> = Vec::with_capacity(requested.len());
    for line in requested {
        if line.quantity == 0 {
            return Err(SettlementError::Validation(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        match merged.iter_mut().find(|existing| existing.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line),
        }
    }
    Ok(merged)
}
