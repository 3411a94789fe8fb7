use crate::domain::commission::CommissionCalculator;
use crate::domain::money::CommissionRate;
use crate::error::{Result, SettlementError};
use clap::Parser;
use rust_decimal::Decimal;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Settings the engines need, independent of how the process was started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineConfig {
    pub default_commission_rate: CommissionRate,
    /// Upper bound of newly scanned orders per payout calculation call.
    pub max_orders_per_payout: usize,
}

impl EngineConfig {
    pub fn new(default_commission_rate: Decimal, max_orders_per_payout: usize) -> Result<Self> {
        if max_orders_per_payout == 0 {
            return Err(SettlementError::Validation(
                "max orders per payout must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            default_commission_rate: CommissionRate::new(default_commission_rate)?,
            max_orders_per_payout,
        })
    }

    pub fn commission_calculator(&self) -> CommissionCalculator {
        CommissionCalculator::new(self.default_commission_rate)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_commission_rate: CommissionRate::PLATFORM_DEFAULT,
            max_orders_per_payout: 500,
        }
    }
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about = "Marketplace order lifecycle and seller settlement service", long_about = None)]
pub struct Cli {
    /// Address the HTTP API listens on.
    #[arg(long, env = "SETTLEMENT_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "SETTLEMENT_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Products CSV used to seed the in-process catalog.
    #[arg(long, env = "SETTLEMENT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Seller commission rates CSV.
    #[arg(long, env = "SETTLEMENT_SELLERS")]
    pub sellers: Option<PathBuf>,

    /// Platform commission percent applied when neither seller nor category sets one.
    #[arg(long, env = "SETTLEMENT_DEFAULT_COMMISSION_RATE", default_value = "10")]
    pub default_commission_rate: Decimal,

    /// Maximum number of orders a single payout calculation scans.
    #[arg(long, env = "SETTLEMENT_MAX_PAYOUT_ORDERS", default_value_t = 500)]
    pub max_payout_orders: usize,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Print the resolved configuration and exit without serving.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

impl Cli {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::new(self.default_commission_rate, self.max_payout_orders)
    }
}
