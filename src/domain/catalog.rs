use super::money::{CommissionRate, Money};
use serde::{Deserialize, Serialize};

pub type ProductId = String;
pub type SellerId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
    OutOfStock,
}

/// Catalog state of a product at the instant an order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub status: ProductStatus,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub stock: u32,
    pub stock_management: bool,
    /// `None` for platform-owned products.
    pub seller_id: Option<SellerId>,
    pub category_id: Option<String>,
    pub shipping_free: bool,
    pub shipping_fee: Money,
    pub commission_rate_override: Option<CommissionRate>,
}

impl ProductSnapshot {
    /// Sale price when present, otherwise the base price.
    pub fn unit_price(&self) -> Money {
        self.sale_price.unwrap_or(self.price)
    }

    /// Products without stock management always have enough stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        !self.stock_management || self.stock >= quantity
    }

    pub fn is_orderable(&self) -> bool {
        self.status != ProductStatus::Inactive
    }
}

/// A requested line, either taken from a cart or supplied directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}
