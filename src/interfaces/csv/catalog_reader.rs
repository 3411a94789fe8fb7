use crate::domain::catalog::{ProductSnapshot, ProductStatus};
use crate::domain::money::{CommissionRate, Money};
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of `products.csv`. Empty optional columns read as absent.
#[derive(Debug, Deserialize)]
struct ProductRow {
    product_id: String,
    name: String,
    #[serde(default)]
    status: Option<ProductStatus>,
    price: Decimal,
    #[serde(default)]
    sale_price: Option<Decimal>,
    stock: u32,
    #[serde(default)]
    stock_management: Option<bool>,
    #[serde(default)]
    seller_id: Option<String>,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    shipping_free: Option<bool>,
    #[serde(default)]
    shipping_fee: Option<Decimal>,
    #[serde(default)]
    commission_rate: Option<Decimal>,
}

impl TryFrom<ProductRow> for ProductSnapshot {
    type Error = SettlementError;

    fn try_from(row: ProductRow) -> Result<Self> {
        if row.product_id.is_empty() {
            return Err(SettlementError::Validation("product_id is required".to_string()));
        }
        let shipping_fee = Money::non_negative(row.shipping_fee.unwrap_or_default(), "shipping_fee")?;
        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            status: row.status.unwrap_or(ProductStatus::Active),
            price: Money::non_negative(row.price, "price")?,
            sale_price: row
                .sale_price
                .map(|price| Money::non_negative(price, "sale_price"))
                .transpose()?,
            stock: row.stock,
            stock_management: row.stock_management.unwrap_or(true),
            seller_id: row.seller_id.filter(|id| !id.is_empty()),
            category_id: row.category_id.filter(|id| !id.is_empty()),
            shipping_free: row.shipping_free.unwrap_or(shipping_fee == Money::ZERO),
            shipping_fee,
            commission_rate_override: row.commission_rate.map(CommissionRate::new).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SellerRow {
    seller_id: String,
    commission_rate: Decimal,
}

/// Reads catalog seed files.
///
/// Wraps `csv::Reader` with whitespace trimming, yielding one `Result` per
/// row so a bad line does not stop the rest of the file.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Rows of a `products.csv` file.
    pub fn products(self) -> impl Iterator<Item = Result<ProductSnapshot>> {
        self.reader
            .into_deserialize::<ProductRow>()
            .map(|row| row.map_err(SettlementError::from).and_then(ProductSnapshot::try_from))
    }

    /// Rows of a `sellers.csv` file: seller id and commission percent.
    pub fn seller_rates(self) -> impl Iterator<Item = Result<(String, CommissionRate)>> {
        self.reader.into_deserialize::<SellerRow>().map(|row| {
            let row = row?;
            Ok((row.seller_id, CommissionRate::new(row.commission_rate)?))
        })
    }
}
