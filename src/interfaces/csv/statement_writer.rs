use crate::domain::money::Money;
use crate::domain::payout::SellerPayout;
use crate::error::{Result, SettlementError};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct StatementRow<'a> {
    order_number: &'a str,
    item_index: usize,
    product_id: &'a str,
    product_name: &'a str,
    quantity: u32,
    sales_amount: Money,
    commission_amount: Money,
    refund_amount: Money,
    net_amount: Money,
}

/// Writes a payout's lines as a CSV statement for the seller.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// One row per settled item. The last row carries the payout totals under
    /// the order number `TOTAL`.
    pub fn write_payout(&mut self, payout: &SellerPayout) -> Result<()> {
        for line in &payout.lines {
            self.writer.serialize(StatementRow {
                order_number: &line.order_number,
                item_index: line.item_index,
                product_id: &line.product_id,
                product_name: &line.product_name,
                quantity: line.quantity,
                sales_amount: line.sales_amount,
                commission_amount: line.commission_amount,
                refund_amount: line.refund_amount,
                net_amount: line.net_amount,
            })?;
        }
        self.writer.serialize(StatementRow {
            order_number: "TOTAL",
            item_index: payout.lines.len(),
            product_id: "",
            product_name: "",
            quantity: payout.lines.iter().map(|line| line.quantity).sum(),
            sales_amount: payout.total_sales,
            commission_amount: payout.total_commission,
            refund_amount: payout.total_refunds,
            net_amount: payout.payout_amount,
        })?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| SettlementError::Io(e.into_error()))
    }
}
