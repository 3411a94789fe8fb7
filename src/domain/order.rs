use super::catalog::{ProductId, SellerId, UserId};
use super::commission::CommissionSplit;
use super::money::{CommissionRate, Money};
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Position along the fulfilment path; terminal states have none.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled | Self::Refunded => None,
        }
    }
}

/// Order-side view of payment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    Seller,
    Platform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("recipient", &self.recipient),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SettlementError::Validation(format!(
                    "shipping address {field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// One line of an order. Name, price, seller and commission are snapshots
/// taken at order time; only the refund counters and the payout claim change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub seller_id: Option<SellerId>,
    pub ownership: Ownership,
    pub commission_rate: CommissionRate,
    pub commission_amount: Money,
    pub seller_earnings: Money,
    #[serde(default)]
    pub refunded_quantity: u32,
    #[serde(default)]
    pub refunded_amount: Money,
    #[serde(default)]
    pub refunded_earnings: Money,
    /// Payout that has claimed this item, if any.
    #[serde(default)]
    pub payout_id: Option<Uuid>,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        product_name: String,
        quantity: u32,
        unit_price: Money,
        seller_id: Option<SellerId>,
        split: CommissionSplit,
    ) -> Self {
        let ownership = if seller_id.is_some() {
            Ownership::Seller
        } else {
            Ownership::Platform
        };
        Self {
            product_id,
            product_name,
            quantity,
            unit_price,
            total_price: unit_price.times(quantity),
            seller_id,
            ownership,
            commission_rate: split.rate,
            commission_amount: split.commission,
            seller_earnings: split.seller_earnings,
            refunded_quantity: 0,
            refunded_amount: Money::ZERO,
            refunded_earnings: Money::ZERO,
            payout_id: None,
        }
    }

    pub fn remaining_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.refunded_quantity)
    }

    /// What the seller is still owed for this line.
    pub fn net_earnings(&self) -> Money {
        self.seller_earnings - self.refunded_earnings
    }

    pub fn is_owned_by(&self, seller_id: &str) -> bool {
        self.seller_id.as_deref() == Some(seller_id)
    }

    /// Refund value of `quantity` more units. Taking the last units returns the
    /// exact remainder so that rounding never over- or under-refunds a line.
    pub fn quote_refund(&self, quantity: u32) -> (Money, Money) {
        if quantity >= self.remaining_quantity() {
            (
                self.total_price - self.refunded_amount,
                self.seller_earnings - self.refunded_earnings,
            )
        } else {
            (
                self.total_price.prorate(quantity, self.quantity),
                self.seller_earnings.prorate(quantity, self.quantity),
            )
        }
    }

    fn record_refund(&mut self, quantity: u32) -> Result<Money> {
        if quantity == 0 || quantity > self.remaining_quantity() {
            return Err(SettlementError::StateConflict(format!(
                "cannot refund {quantity} of {} remaining units of {}",
                self.remaining_quantity(),
                self.product_id
            )));
        }
        let (amount, earnings) = self.quote_refund(quantity);
        self.refunded_quantity += quantity;
        self.refunded_amount += amount;
        self.refunded_earnings += earnings;
        Ok(amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_number: String,
    pub buyer_id: UserId,
    pub ordered_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount: Money,
    pub total_amount: Money,
    #[serde(default)]
    pub refunded_amount: Money,
    pub shipping_address: ShippingAddress,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub payment_id: Option<Uuid>,
    pub cancel_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Human-readable order number: `ORD-<date>-<random>`.
    pub fn generate_number(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "ORD-{}-{}",
            now.format("%Y%m%d"),
            suffix[..8].to_uppercase()
        )
    }

    /// Builds a pending order; `total = subtotal + shipping - discount`.
    pub fn new(
        order_number: String,
        buyer_id: UserId,
        items: Vec<OrderItem>,
        shipping_fee: Money,
        discount: Money,
        shipping_address: ShippingAddress,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(SettlementError::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        let subtotal: Money = items.iter().map(|item| item.total_price).sum();
        if discount.is_negative() || discount > subtotal + shipping_fee {
            return Err(SettlementError::Validation(
                "discount must be between zero and the order total".to_string(),
            ));
        }
        Ok(Self {
            order_number,
            buyer_id,
            ordered_at: now,
            items,
            subtotal,
            shipping_fee,
            discount,
            total_amount: subtotal + shipping_fee - discount,
            refunded_amount: Money::ZERO,
            shipping_address,
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            payment_id: None,
            cancel_reason: None,
            delivered_at: None,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.buyer_id == user_id
    }

    pub fn involves_seller(&self, seller_id: &str) -> bool {
        self.items.iter().any(|item| item.is_owned_by(seller_id))
    }

    /// Cancellation is a pre-payment operation; paid orders go through refunds.
    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<()> {
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(SettlementError::StateConflict(format!(
                "order {} cannot be cancelled in status {:?}",
                self.order_number, self.status
            )));
        }
        if matches!(
            self.payment_status,
            OrderPaymentStatus::Paid | OrderPaymentStatus::Refunded
        ) {
            return Err(SettlementError::StateConflict(format!(
                "order {} is already paid; request a refund instead",
                self.order_number
            )));
        }
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_awaiting_payment(&self) -> Result<()> {
        if self.status != OrderStatus::Pending
            || !matches!(
                self.payment_status,
                OrderPaymentStatus::Pending | OrderPaymentStatus::Failed
            )
        {
            return Err(SettlementError::StateConflict(format!(
                "order {} is not awaiting payment (status {:?}, payment {:?})",
                self.order_number, self.status, self.payment_status
            )));
        }
        Ok(())
    }

    pub fn attach_payment(&mut self, payment_id: Uuid, now: DateTime<Utc>) {
        self.payment_id = Some(payment_id);
        self.payment_status = OrderPaymentStatus::Pending;
        self.updated_at = now;
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_awaiting_payment()?;
        self.payment_status = OrderPaymentStatus::Paid;
        self.status = OrderStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_payment_failed(&mut self, now: DateTime<Utc>) {
        if self.payment_status == OrderPaymentStatus::Pending {
            self.payment_status = OrderPaymentStatus::Failed;
            self.updated_at = now;
        }
    }

    /// Moves forward along confirmed → processing → shipped → delivered.
    pub fn advance(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        let conflict = || {
            SettlementError::StateConflict(format!(
                "order {} cannot move from {:?} to {:?}",
                self.order_number, self.status, next
            ))
        };
        if self.payment_status != OrderPaymentStatus::Paid {
            return Err(conflict());
        }
        match (self.status.rank(), next.rank()) {
            (Some(current), Some(target)) if current >= 1 && target > current => {}
            _ => return Err(conflict()),
        }
        self.status = next;
        if next == OrderStatus::Delivered {
            self.delivered_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_refundable(&self) -> Result<()> {
        if self.payment_status != OrderPaymentStatus::Paid {
            return Err(SettlementError::StateConflict(format!(
                "order {} is not refundable in payment status {:?}",
                self.order_number, self.payment_status
            )));
        }
        Ok(())
    }

    pub fn outstanding_amount(&self) -> Money {
        self.total_amount - self.refunded_amount
    }

    /// Records a partial refund line by line, returning the refunded value.
    ///
    /// Partial refunds cover item value only. Once every unit is refunded the
    /// order flips to refunded even though shipping was never returned; only
    /// a full refund pays shipping back.
    pub fn apply_partial_refund(
        &mut self,
        lines: &[(usize, u32)],
        now: DateTime<Utc>,
    ) -> Result<Money> {
        self.ensure_refundable()?;
        let mut staged = self.items.clone();
        let mut refunded = Money::ZERO;
        for &(index, quantity) in lines {
            let item = staged.get_mut(index).ok_or_else(|| {
                SettlementError::Validation(format!("order has no item at index {index}"))
            })?;
            refunded += item.record_refund(quantity)?;
        }
        self.items = staged;
        self.refunded_amount += refunded;
        if self.items.iter().all(|item| item.remaining_quantity() == 0) {
            self.mark_refunded();
        }
        self.updated_at = now;
        Ok(refunded)
    }

    /// Refunds everything not yet refunded, shipping included.
    pub fn apply_full_refund(&mut self, now: DateTime<Utc>) -> Result<Money> {
        self.ensure_refundable()?;
        let refunded = self.outstanding_amount();
        for item in &mut self.items {
            let remaining = item.remaining_quantity();
            if remaining > 0 {
                item.record_refund(remaining)?;
            }
        }
        self.refunded_amount = self.total_amount;
        self.mark_refunded();
        self.updated_at = now;
        Ok(refunded)
    }

    fn mark_refunded(&mut self) {
        self.payment_status = OrderPaymentStatus::Refunded;
        self.status = OrderStatus::Refunded;
    }
}
