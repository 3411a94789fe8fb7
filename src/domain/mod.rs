//! Marketplace domain: value objects, aggregates and the ports the engines
//! depend on. Nothing in here performs I/O.

pub mod actor;
pub mod catalog;
pub mod commission;
pub mod money;
pub mod order;
pub mod payment;
pub mod payout;
pub mod ports;
pub mod reconciliation;
pub mod refund;
