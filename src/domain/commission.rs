use super::money::{CommissionRate, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The platform/seller split of one line total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub rate: CommissionRate,
    pub commission: Money,
    pub seller_earnings: Money,
}

/// Computes per-line commission.
///
/// The platform default rate is injected rather than hard-coded so that a
/// deployment can change it without touching order logic.
#[derive(Debug, Clone, Copy)]
pub struct CommissionCalculator {
    default_rate: CommissionRate,
}

impl CommissionCalculator {
    pub fn new(default_rate: CommissionRate) -> Self {
        Self { default_rate }
    }

    pub fn default_rate(&self) -> CommissionRate {
        self.default_rate
    }

    /// Seller rate, then category override, then the platform default.
    pub fn resolve_rate(
        &self,
        seller_rate: Option<CommissionRate>,
        category_override: Option<CommissionRate>,
    ) -> CommissionRate {
        seller_rate
            .or(category_override)
            .unwrap_or(self.default_rate)
    }

    /// `commission = round(total * rate / 100)`, earnings take the remainder so
    /// the two always sum to the line total.
    pub fn split(&self, line_total: Money, rate: CommissionRate) -> CommissionSplit {
        let commission = Money::new(line_total.value() * rate.percent() / Decimal::ONE_HUNDRED).round();
        CommissionSplit {
            rate,
            commission,
            seller_earnings: line_total - commission,
        }
    }

    /// Platform-owned lines keep the whole total.
    pub fn platform_split(&self, line_total: Money) -> CommissionSplit {
        CommissionSplit {
            rate: CommissionRate::FULL,
            commission: line_total,
            seller_earnings: Money::ZERO,
        }
    }
}
