mod common;

use chrono::{Duration, Utc};
use common::*;
use marketplace_settlement::application::refund_engine::RefundLineRequest;
use marketplace_settlement::config::EngineConfig;
use marketplace_settlement::domain::money::Money;
use marketplace_settlement::domain::payout::{PayoutPeriod, PayoutStatus};
use marketplace_settlement::domain::reconciliation::ReconciliationKind;
use marketplace_settlement::error::SettlementError;
use marketplace_settlement::domain::ports::SellerLedger;
use marketplace_settlement::infrastructure::in_memory::InMemoryBackend;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn this_week() -> PayoutPeriod {
    let now = Utc::now();
    PayoutPeriod::new(now - Duration::days(1), now + Duration::days(1)).unwrap()
}

async fn two_seller_fixture() -> Fixture {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 10000, 10)).await;
    fx.add_product(product("p-2", Some("s-1"), 5000, 10)).await;
    fx.add_product(product("p-3", Some("s-2"), 8000, 10)).await;
    fx
}

#[tokio::test]
async fn test_calculation_covers_only_the_sellers_items() {
    let fx = two_seller_fixture().await;
    let b = buyer("b-1");
    fx.delivered_order(&b, &[("p-1", 2)]).await;
    let mixed = fx.delivered_order(&b, &[("p-2", 1), ("p-3", 1)]).await;
    // Paid but not delivered: not settled yet.
    fx.paid_order(&b, &[("p-1", 1)]).await;

    let calc = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", this_week())
        .await
        .unwrap();
    let payout = calc.payout;
    assert!(!calc.has_more);
    assert_eq!(calc.remaining_orders, 0);
    assert_eq!(payout.status, PayoutStatus::Calculated);
    assert_eq!(payout.lines.len(), 2);
    assert_eq!(payout.total_sales, won(25000));
    assert_eq!(payout.total_commission, won(2500));
    assert_eq!(payout.total_refunds, Money::ZERO);
    assert_eq!(payout.payout_amount, won(22500));

    let mixed = fx.order(&mixed.order_number).await;
    assert_eq!(mixed.items[0].payout_id, Some(payout.id));
    assert_eq!(mixed.items[1].payout_id, None);

    let other = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-2", this_week())
        .await
        .unwrap();
    assert_eq!(other.payout.total_sales, won(8000));
    assert_eq!(other.payout.payout_amount, won(7200));
}

#[tokio::test]
async fn test_recalculation_refreshes_the_same_payout() {
    let fx = two_seller_fixture().await;
    let b = buyer("b-1");
    fx.delivered_order(&b, &[("p-1", 1)]).await;
    let period = this_week();

    let first = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    let again = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert_eq!(first.payout.id, again.payout.id);
    assert_eq!(again.payout.payout_amount, won(9000));

    fx.delivered_order(&b, &[("p-2", 2)]).await;
    let refreshed = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert_eq!(refreshed.payout.id, first.payout.id);
    assert_eq!(refreshed.payout.lines.len(), 2);
    assert_eq!(refreshed.payout.payout_amount, won(18000));
    assert_eq!(fx.app.payouts.list_payouts(&admin(), Some("s-1")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_overlapping_periods_never_settle_an_item_twice() {
    let fx = two_seller_fixture().await;
    fx.delivered_order(&buyer("b-1"), &[("p-1", 1)]).await;

    let first = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", this_week())
        .await
        .unwrap();
    assert_eq!(first.payout.payout_amount, won(9000));

    let now = Utc::now();
    let wider = PayoutPeriod::new(now - Duration::days(7), now + Duration::days(7)).unwrap();
    let second = fx.app.payouts.calculate_payout(&admin(), "s-1", wider).await.unwrap();
    assert_ne!(second.payout.id, first.payout.id);
    assert!(second.payout.lines.is_empty());
    assert_eq!(second.payout.payout_amount, Money::ZERO);
}

#[tokio::test]
async fn test_approve_and_pay_credits_once() {
    let fx = two_seller_fixture().await;
    fx.delivered_order(&buyer("b-1"), &[("p-1", 3)]).await;
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", this_week())
        .await
        .unwrap()
        .payout;

    assert!(matches!(
        fx.app
            .payouts
            .pay_payout(&admin(), payout.id, "bank_transfer".into(), "tx-1".into())
            .await,
        Err(SettlementError::StateConflict(_))
    ));
    let approved = fx.app.payouts.approve_payout(&admin(), payout.id).await.unwrap();
    assert_eq!(approved.approved_by.as_deref(), Some("admin-1"));

    let paid = fx
        .app
        .payouts
        .pay_payout(&admin(), payout.id, "bank_transfer".into(), "tx-1".into())
        .await
        .unwrap();
    assert_eq!(paid.status, PayoutStatus::Paid);
    assert_eq!(paid.transaction_id.as_deref(), Some("tx-1"));
    assert!(paid.paid_at.is_some());

    assert!(matches!(
        fx.app
            .payouts
            .pay_payout(&admin(), payout.id, "bank_transfer".into(), "tx-2".into())
            .await,
        Err(SettlementError::StateConflict(_))
    ));
    assert!(matches!(
        fx.app.payouts.cancel_payout(&admin(), payout.id).await,
        Err(SettlementError::StateConflict(_))
    ));

    let earnings = fx.app.payouts.seller_earnings(&seller("s-1"), "s-1").await.unwrap();
    assert_eq!(earnings.total_earnings, won(27000));
}

#[tokio::test]
async fn test_approved_payout_rejects_recalculation() {
    let fx = two_seller_fixture().await;
    fx.delivered_order(&buyer("b-1"), &[("p-1", 1)]).await;
    let period = this_week();
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", period)
        .await
        .unwrap()
        .payout;
    fx.app.payouts.approve_payout(&admin(), payout.id).await.unwrap();

    assert!(matches!(
        fx.app.payouts.calculate_payout(&admin(), "s-1", period).await,
        Err(SettlementError::StateConflict(_))
    ));
    assert_eq!(
        fx.app.payouts.get_payout(&admin(), payout.id).await.unwrap().status,
        PayoutStatus::Approved
    );
}

#[tokio::test]
async fn test_cancel_releases_items() {
    let fx = two_seller_fixture().await;
    let order = fx.delivered_order(&buyer("b-1"), &[("p-1", 1)]).await;
    let period = this_week();
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", period)
        .await
        .unwrap()
        .payout;
    fx.app.payouts.approve_payout(&admin(), payout.id).await.unwrap();

    let cancelled = fx.app.payouts.cancel_payout(&admin(), payout.id).await.unwrap();
    assert_eq!(cancelled.status, PayoutStatus::Cancelled);
    assert_eq!(fx.order(&order.order_number).await.items[0].payout_id, None);

    let redo = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert_ne!(redo.payout.id, payout.id);
    assert_eq!(redo.payout.payout_amount, won(9000));
}

#[tokio::test]
async fn test_unreleased_items_of_a_cancelled_payout_are_reclaimed() {
    let backend = InMemoryBackend::new();
    let mut stores = backend.stores();
    let orders = FlakyOrderStore::new(stores.orders.clone());
    stores.orders = orders.clone();
    let fx = Fixture::with_stores(backend, stores);
    fx.add_product(product("p-1", Some("s-1"), 10000, 10)).await;
    let order = fx.delivered_order(&buyer("b-1"), &[("p-1", 1)]).await;
    let period = this_week();
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", period)
        .await
        .unwrap()
        .payout;

    orders.fail_saves(true);
    let cancelled = fx.app.payouts.cancel_payout(&admin(), payout.id).await.unwrap();
    assert_eq!(cancelled.status, PayoutStatus::Cancelled);
    assert_eq!(
        fx.order(&order.order_number).await.items[0].payout_id,
        Some(payout.id)
    );
    let entries = fx.app.reconciliation_entries(&admin()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, ReconciliationKind::ClaimRelease { payout_id: payout.id });
    assert_eq!(entries[0].order_number.as_deref(), Some(order.order_number.as_str()));

    orders.fail_saves(false);
    let redo = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert_ne!(redo.payout.id, payout.id);
    assert_eq!(redo.payout.lines.len(), 1);
    assert_eq!(redo.payout.payout_amount, won(9000));
    assert_eq!(
        fx.order(&order.order_number).await.items[0].payout_id,
        Some(redo.payout.id)
    );
}

#[tokio::test]
async fn test_failed_earnings_credit_keeps_the_payout_paid() {
    let backend = InMemoryBackend::new();
    let mut stores = backend.stores();
    stores.ledger = Arc::new(FailingLedger);
    let fx = Fixture::with_stores(backend, stores);
    fx.add_product(product("p-1", Some("s-1"), 10000, 10)).await;
    fx.delivered_order(&buyer("b-1"), &[("p-1", 2)]).await;
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", this_week())
        .await
        .unwrap()
        .payout;
    fx.app.payouts.approve_payout(&admin(), payout.id).await.unwrap();

    let paid = fx
        .app
        .payouts
        .pay_payout(&admin(), payout.id, "bank_transfer".into(), "tx-1".into())
        .await
        .unwrap();
    assert_eq!(paid.status, PayoutStatus::Paid);
    assert_eq!(
        fx.app.payouts.get_payout(&admin(), payout.id).await.unwrap().status,
        PayoutStatus::Paid
    );
    let entries = fx.app.reconciliation_entries(&admin()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].kind,
        ReconciliationKind::EarningsCredit {
            seller_id: "s-1".into(),
            payout_id: payout.id,
        }
    );
    // The in-memory ledger behind the failing one was never credited.
    assert_eq!(fx.backend.ledger.total_earnings("s-1").await.unwrap(), Money::ZERO);
}

#[tokio::test]
async fn test_bounded_scan_reports_remaining_orders() {
    let fx = Fixture::with_config(EngineConfig::new(dec!(10), 1).unwrap());
    fx.add_product(product("p-1", Some("s-1"), 10000, 10)).await;
    let b = buyer("b-1");
    fx.delivered_order(&b, &[("p-1", 1)]).await;
    fx.delivered_order(&b, &[("p-1", 2)]).await;
    let period = this_week();

    let first = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert!(first.has_more);
    assert_eq!(first.remaining_orders, 1);
    assert_eq!(first.payout.lines.len(), 1);
    assert_eq!(first.payout.payout_amount, won(9000));

    let second = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert!(!second.has_more);
    assert_eq!(second.remaining_orders, 0);
    assert_eq!(second.payout.id, first.payout.id);
    assert_eq!(second.payout.lines.len(), 2);
    assert_eq!(second.payout.payout_amount, won(27000));
}

#[tokio::test]
async fn test_refunded_units_are_netted_out() {
    let fx = two_seller_fixture().await;
    let b = buyer("b-1");
    let order = fx.delivered_order(&b, &[("p-1", 2)]).await;
    let refund = fx
        .app
        .refunds
        .create_refund(
            &b,
            &order.order_number,
            "one cracked".into(),
            Some(vec![RefundLineRequest {
                item_index: 0,
                quantity: 1,
            }]),
        )
        .await
        .unwrap();
    fx.app.refunds.approve_refund(&admin(), refund.id).await.unwrap();

    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", this_week())
        .await
        .unwrap()
        .payout;
    assert_eq!(payout.total_sales, won(20000));
    assert_eq!(payout.total_commission, won(2000));
    assert_eq!(payout.total_refunds, won(9000));
    assert_eq!(payout.payout_amount, won(9000));
    assert_eq!(payout.lines[0].net_amount, won(9000));
}

#[tokio::test]
async fn test_fully_refunded_order_is_released_on_recalculation() {
    let fx = two_seller_fixture().await;
    let b = buyer("b-1");
    let order = fx.delivered_order(&b, &[("p-1", 1)]).await;
    let period = this_week();
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", period)
        .await
        .unwrap()
        .payout;
    assert_eq!(payout.lines.len(), 1);

    let refund = fx
        .app
        .refunds
        .create_refund(&b, &order.order_number, "never arrived".into(), None)
        .await
        .unwrap();
    fx.app.refunds.approve_refund(&admin(), refund.id).await.unwrap();
    // Calculated payouts have not settled anything yet.
    assert!(fx.app.reconciliation_entries(&admin()).await.unwrap().is_empty());

    let refreshed = fx.app.payouts.calculate_payout(&admin(), "s-1", period).await.unwrap();
    assert_eq!(refreshed.payout.id, payout.id);
    assert!(refreshed.payout.lines.is_empty());
    assert_eq!(refreshed.payout.payout_amount, Money::ZERO);
    assert_eq!(fx.order(&order.order_number).await.items[0].payout_id, None);
}

#[tokio::test]
async fn test_payout_visibility() {
    let fx = two_seller_fixture().await;
    fx.delivered_order(&buyer("b-1"), &[("p-1", 1), ("p-3", 1)]).await;
    let period = this_week();
    let mine = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", period)
        .await
        .unwrap()
        .payout;
    fx.app.payouts.calculate_payout(&admin(), "s-2", period).await.unwrap();

    assert!(matches!(
        fx.app.payouts.calculate_payout(&seller("s-1"), "s-1", period).await,
        Err(SettlementError::Authorization(_))
    ));
    assert!(matches!(
        fx.app.payouts.approve_payout(&seller("s-1"), mine.id).await,
        Err(SettlementError::Authorization(_))
    ));

    let s1 = seller("s-1");
    assert_eq!(fx.app.payouts.get_payout(&s1, mine.id).await.unwrap().id, mine.id);
    let listed = fx.app.payouts.list_payouts(&s1, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].seller_id, "s-1");
    assert!(matches!(
        fx.app.payouts.list_payouts(&s1, Some("s-2")).await,
        Err(SettlementError::Authorization(_))
    ));
    assert_eq!(fx.app.payouts.list_payouts(&admin(), None).await.unwrap().len(), 2);

    assert!(matches!(
        fx.app.payouts.get_payout(&seller("s-2"), mine.id).await,
        Err(SettlementError::Authorization(_))
    ));
    assert!(matches!(
        fx.app.payouts.seller_earnings(&buyer("b-1"), "s-1").await,
        Err(SettlementError::Authorization(_))
    ));
    assert!(matches!(
        fx.app.payouts.get_payout(&admin(), uuid::Uuid::new_v4()).await,
        Err(SettlementError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_refund_after_paid_payout_is_flagged_for_the_seller() {
    let fx = two_seller_fixture().await;
    let b = buyer("b-1");
    let order = fx.delivered_order(&b, &[("p-1", 1), ("p-3", 1)]).await;
    let payout = fx
        .app
        .payouts
        .calculate_payout(&admin(), "s-1", this_week())
        .await
        .unwrap()
        .payout;
    fx.app.payouts.approve_payout(&admin(), payout.id).await.unwrap();
    fx.app
        .payouts
        .pay_payout(&admin(), payout.id, "bank_transfer".into(), "tx-9".into())
        .await
        .unwrap();

    // Refunding only the unsettled s-2 line raises nothing.
    let refund = fx
        .app
        .refunds
        .create_refund(
            &b,
            &order.order_number,
            "wrong colour".into(),
            Some(vec![RefundLineRequest {
                item_index: 1,
                quantity: 1,
            }]),
        )
        .await
        .unwrap();
    fx.app.refunds.approve_refund(&admin(), refund.id).await.unwrap();
    assert!(fx.app.reconciliation_entries(&admin()).await.unwrap().is_empty());

    let refund = fx
        .app
        .refunds
        .create_refund(&b, &order.order_number, "all of it".into(), None)
        .await
        .unwrap();
    fx.app.refunds.approve_refund(&admin(), refund.id).await.unwrap();
    let entries = fx.app.reconciliation_entries(&admin()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        entries[0].kind,
        ReconciliationKind::RefundAfterPayout { payout_id, .. } if payout_id == payout.id
    ));
    assert_eq!(entries[0].order_number.as_deref(), Some(order.order_number.as_str()));
}
