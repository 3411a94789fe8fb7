mod common;

use common::*;
use marketplace_settlement::application::order_engine::OrderSource;
use marketplace_settlement::domain::catalog::{CartLine, ProductStatus};
use marketplace_settlement::domain::money::{CommissionRate, Money};
use marketplace_settlement::domain::order::{OrderPaymentStatus, OrderStatus, Ownership};
use marketplace_settlement::domain::payment::{PaymentMethod, PaymentStatus};
use marketplace_settlement::error::SettlementError;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn line(product_id: &str, quantity: u32) -> CartLine {
    CartLine {
        product_id: product_id.into(),
        quantity,
    }
}

#[tokio::test]
async fn test_order_totals_and_commission_split() {
    let fx = Fixture::new();
    let mut shipped = product("p-1", Some("s-1"), 12000, 10);
    shipped.shipping_free = false;
    shipped.shipping_fee = won(3000);
    fx.add_product(shipped).await;
    fx.add_product(product("p-2", None, 5000, 10)).await;
    fx.backend
        .catalog
        .set_seller_rate("s-1", CommissionRate::new(dec!(7.5)).unwrap())
        .await;

    let outcome = fx
        .app
        .orders
        .create_order(
            &buyer("b-1"),
            OrderSource::Direct(vec![line("p-1", 3), line("p-2", 1)]),
            address(),
        )
        .await
        .unwrap();
    let order = outcome.order;

    assert!(outcome.follow_ups.is_empty());
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, won(41000));
    assert_eq!(order.shipping_fee, won(3000));
    assert_eq!(order.total_amount, order.subtotal + order.shipping_fee - order.discount);

    let seller_item = &order.items[0];
    assert_eq!(seller_item.ownership, Ownership::Seller);
    assert_eq!(seller_item.commission_rate.percent(), dec!(7.5));
    assert_eq!(seller_item.commission_amount, won(2700));
    assert_eq!(seller_item.seller_earnings, won(33300));

    let platform_item = &order.items[1];
    assert_eq!(platform_item.ownership, Ownership::Platform);
    assert_eq!(platform_item.commission_amount, platform_item.total_price);
    assert_eq!(platform_item.seller_earnings, Money::ZERO);

    assert_eq!(fx.product("p-1").await.stock, 7);
    assert_eq!(fx.product("p-2").await.stock, 9);
}

#[tokio::test]
async fn test_commission_split_sums_for_random_lines() {
    let fx = Fixture::new();
    let mut rng = rand::thread_rng();
    for i in 0..20 {
        let id = format!("p-{i}");
        let price = rng.gen_range(1..=99_999);
        let mut p = product(&id, Some("s-1"), price, 1000);
        p.commission_rate_override = Some(CommissionRate::new(Decimal::from(rng.gen_range(0..=100u32))).unwrap());
        fx.add_product(p).await;
    }
    let lines = (0..20)
        .map(|i| line(&format!("p-{i}"), rng.gen_range(1..=7)))
        .collect();
    let order = fx
        .app
        .orders
        .create_order(&buyer("b-1"), OrderSource::Direct(lines), address())
        .await
        .unwrap()
        .order;

    for item in &order.items {
        assert_eq!(item.commission_amount + item.seller_earnings, item.total_price);
        assert!(!item.seller_earnings.is_negative());
    }
}

#[tokio::test]
async fn test_insufficient_stock_leaves_catalog_untouched() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 1000, 5)).await;
    fx.add_product(product("p-2", Some("s-1"), 1000, 1)).await;

    let result = fx
        .app
        .orders
        .create_order(
            &buyer("b-1"),
            OrderSource::Direct(vec![line("p-1", 2), line("p-2", 2)]),
            address(),
        )
        .await;

    assert!(matches!(
        result,
        Err(SettlementError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        })
    ));
    assert_eq!(fx.product("p-1").await.stock, 5);
    assert_eq!(fx.product("p-2").await.stock, 1);
    assert!(fx.app.orders.list_orders(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_and_unknown_products_rejected() {
    let fx = Fixture::new();
    let mut inactive = product("p-1", Some("s-1"), 1000, 5);
    inactive.status = ProductStatus::Inactive;
    fx.add_product(inactive).await;

    let inactive = fx
        .app
        .orders
        .create_order(&buyer("b-1"), OrderSource::Direct(vec![line("p-1", 1)]), address())
        .await;
    assert!(matches!(inactive, Err(SettlementError::Validation(_))));

    let unknown = fx
        .app
        .orders
        .create_order(&buyer("b-1"), OrderSource::Direct(vec![line("nope", 1)]), address())
        .await;
    assert!(matches!(unknown, Err(SettlementError::NotFound { .. })));
}

#[tokio::test]
async fn test_last_unit_sold_once_under_contention() {
    let fx = Arc::new(Fixture::new());
    fx.add_product(product("p-1", Some("s-1"), 1000, 1)).await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let fx = fx.clone();
            tokio::spawn(async move {
                fx.app
                    .orders
                    .create_order(
                        &buyer(&format!("b-{i}")),
                        OrderSource::Direct(vec![line("p-1", 1)]),
                        address(),
                    )
                    .await
                    .is_ok()
            })
        })
        .collect();
    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            placed += 1;
        }
    }

    assert_eq!(placed, 1);
    let product = fx.product("p-1").await;
    assert_eq!(product.stock, 0);
    assert_eq!(product.status, ProductStatus::OutOfStock);
}

#[tokio::test]
async fn test_cart_checkout_clears_cart() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 2500, 10)).await;
    let b = buyer("b-1");

    fx.app.orders.add_to_cart(&b, line("p-1", 1)).await.unwrap();
    fx.app.orders.add_to_cart(&b, line("p-1", 2)).await.unwrap();
    let order = fx
        .app
        .orders
        .create_order(&b, OrderSource::Cart, address())
        .await
        .unwrap()
        .order;

    assert_eq!(order.items[0].quantity, 3);
    assert!(fx.app.orders.cart(&b).await.unwrap().is_empty());
    assert!(matches!(
        fx.app.orders.create_order(&b, OrderSource::Cart, address()).await,
        Err(SettlementError::Validation(_))
    ));
}

#[tokio::test]
async fn test_cancel_restores_stock_and_reactivates() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 1000, 2)).await;
    let b = buyer("b-1");

    let order = fx
        .app
        .orders
        .create_order(&b, OrderSource::Direct(vec![line("p-1", 2)]), address())
        .await
        .unwrap()
        .order;
    assert_eq!(fx.product("p-1").await.status, ProductStatus::OutOfStock);
    let payment = fx
        .app
        .payments
        .create_payment(&b, &order.order_number, PaymentMethod::Card)
        .await
        .unwrap();

    let outcome = fx
        .app
        .orders
        .cancel_order(&b, &order.order_number, "changed my mind".into())
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
    let product = fx.product("p-1").await;
    assert_eq!(product.stock, 2);
    assert_eq!(product.status, ProductStatus::Active);
    let payment = fx.app.payments.get_payment(&b, payment.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn test_paid_order_cannot_be_cancelled() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 1000, 5)).await;
    let b = buyer("b-1");
    let order = fx.paid_order(&b, &[("p-1", 1)]).await;

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    assert!(matches!(
        fx.app
            .orders
            .cancel_order(&b, &order.order_number, "too late".into())
            .await,
        Err(SettlementError::StateConflict(_))
    ));
    assert_eq!(fx.product("p-1").await.stock, 4);
}

#[tokio::test]
async fn test_order_visibility() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 1000, 5)).await;
    let order = fx.paid_order(&buyer("b-1"), &[("p-1", 1)]).await;

    assert!(fx.app.orders.get_order(&seller("s-1"), &order.order_number).await.is_ok());
    assert!(matches!(
        fx.app.orders.get_order(&buyer("b-2"), &order.order_number).await,
        Err(SettlementError::Authorization(_))
    ));
    assert!(matches!(
        fx.app.orders.get_order(&seller("s-2"), &order.order_number).await,
        Err(SettlementError::Authorization(_))
    ));
    assert_eq!(fx.app.orders.list_orders(&seller("s-1")).await.unwrap().len(), 1);
    assert!(fx.app.orders.list_orders(&buyer("b-2")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_failure_then_retry() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 1000, 5)).await;
    let b = buyer("b-1");
    let order = fx
        .app
        .orders
        .create_order(&b, OrderSource::Direct(vec![line("p-1", 1)]), address())
        .await
        .unwrap()
        .order;

    let payment = fx
        .app
        .payments
        .create_payment(&b, &order.order_number, PaymentMethod::Card)
        .await
        .unwrap();
    assert!(matches!(
        fx.app.payments.approve_payment(&b, payment.id, "tx-1".into(), None).await,
        Err(SettlementError::Authorization(_))
    ));
    fx.app
        .payments
        .fail_payment(&system(), payment.id, "card declined".into())
        .await
        .unwrap();
    assert_eq!(fx.order(&order.order_number).await.payment_status, OrderPaymentStatus::Failed);

    let retry = fx
        .app
        .payments
        .create_payment(&b, &order.order_number, PaymentMethod::BankTransfer)
        .await
        .unwrap();
    assert_eq!(retry.id, payment.id);
    assert_eq!(retry.status, PaymentStatus::Pending);
    assert_eq!(retry.attempts, 2);

    assert!(matches!(
        fx.app
            .payments
            .approve_payment(&system(), retry.id, "tx-2".into(), Some(won(999)))
            .await,
        Err(SettlementError::Validation(_))
    ));
    let approved = fx
        .app
        .payments
        .approve_payment(&system(), retry.id, "tx-2".into(), Some(won(1000)))
        .await
        .unwrap();
    assert_eq!(approved.status, PaymentStatus::Completed);
    assert_eq!(fx.order(&order.order_number).await.status, OrderStatus::Confirmed);

    assert!(matches!(
        fx.app
            .payments
            .approve_payment(&system(), retry.id, "tx-3".into(), None)
            .await,
        Err(SettlementError::StateConflict(_))
    ));
}

#[tokio::test]
async fn test_fulfilment_is_admin_only_and_forward() {
    let fx = Fixture::new();
    fx.add_product(product("p-1", Some("s-1"), 1000, 5)).await;
    let order = fx.paid_order(&buyer("b-1"), &[("p-1", 1)]).await;
    let number = &order.order_number;

    assert!(matches!(
        fx.app
            .orders
            .advance_fulfillment(&buyer("b-1"), number, OrderStatus::Shipped)
            .await,
        Err(SettlementError::Authorization(_))
    ));
    fx.app
        .orders
        .advance_fulfillment(&admin(), number, OrderStatus::Shipped)
        .await
        .unwrap();
    assert!(
        fx.app
            .orders
            .advance_fulfillment(&admin(), number, OrderStatus::Processing)
            .await
            .is_err()
    );
    let delivered = fx
        .app
        .orders
        .advance_fulfillment(&admin(), number, OrderStatus::Delivered)
        .await
        .unwrap();
    assert!(delivered.delivered_at.is_some());
}
