//! Order line pricing, margin defaults and the order lock.

mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use fulfillment_engine::services::fulfillment::OrderLineUpdate;
use fulfillment_engine::ServiceError;

#[tokio::test]
async fn foreign_currency_lines_convert_then_apply_margin() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-RMB", "RMB").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(6.5), dec!(0))
        .await
        .unwrap();

    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(100), Some(dec!(20)))
        .await
        .unwrap();
    assert_eq!(line.cost_price_usd, dec!(650.00));
    assert_eq!(line.sale_price, dec!(780.00));
}

#[tokio::test]
async fn missing_margin_falls_back_to_the_customer_default() {
    let ctx = common::setup().await;
    let customer_id = Uuid::new_v4();
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    common::seed_customer_margin(&ctx.db, customer_id, product.id, dec!(15)).await;
    let order = ctx
        .engine
        .create_order(customer_id, dec!(1), dec!(0))
        .await
        .unwrap();

    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(100), None)
        .await
        .unwrap();
    assert_eq!(line.margin_percent, Some(dec!(15)));
    assert_eq!(line.sale_price, dec!(115.00));

    // no default configured means margin zero
    let other = common::seed_product(&ctx.db, "SKU-2", "USD").await;
    let plain = ctx
        .engine
        .add_order_line(order.id, other.id, 10, dec!(100), None)
        .await
        .unwrap();
    assert_eq!(plain.margin_percent, None);
    assert_eq!(plain.sale_price, dec!(100.00));
}

#[tokio::test]
async fn an_explicit_margin_beats_the_default() {
    let ctx = common::setup().await;
    let customer_id = Uuid::new_v4();
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    common::seed_customer_margin(&ctx.db, customer_id, product.id, dec!(15)).await;
    let order = ctx
        .engine
        .create_order(customer_id, dec!(1), dec!(0))
        .await
        .unwrap();

    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(100), Some(dec!(30)))
        .await
        .unwrap();
    assert_eq!(line.sale_price, dec!(130.00));
}

#[tokio::test]
async fn locked_orders_reject_line_edits_but_not_allocations() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(5), None)
        .await
        .unwrap();
    let batch = ctx.engine.create_batch(order.id, "B-1".into()).await.unwrap();

    ctx.engine.lock_order(order.id).await.unwrap();

    let err = ctx
        .engine
        .add_order_line(order.id, product.id, 5, dec!(5), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OrderLocked(_));

    let err = ctx
        .engine
        .update_order_line(
            line.id,
            OrderLineUpdate {
                cost_price: Some(dec!(6)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OrderLocked(_));

    let err = ctx
        .engine
        .create_batch(order.id, "B-2".into())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OrderLocked(_));

    // allocation into existing batches is unaffected by the lock
    ctx.engine.add_batch_item(batch.id, line.id, 5).await.unwrap();

    // unlocking re-enables edits
    ctx.engine.unlock_order(order.id).await.unwrap();
    ctx.engine
        .update_order_line(
            line.id,
            OrderLineUpdate {
                cost_price: Some(dec!(6)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn edits_reprice_the_line() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-RMB", "RMB").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(2), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(100), Some(dec!(10)))
        .await
        .unwrap();
    assert_eq!(line.sale_price, dec!(220.00));

    let updated = ctx
        .engine
        .update_order_line(
            line.id,
            OrderLineUpdate {
                cost_price: Some(dec!(50)),
                margin_percent: Some(Some(dec!(20))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.cost_price_usd, dec!(100.00));
    assert_eq!(updated.sale_price, dec!(120.00));

    // clearing the margin reprices at zero
    let cleared = ctx
        .engine
        .update_order_line(
            line.id,
            OrderLineUpdate {
                margin_percent: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.margin_percent, None);
    assert_eq!(cleared.sale_price, dec!(100.00));
}

#[tokio::test]
async fn invalid_order_parameters_are_rejected() {
    let ctx = common::setup().await;
    assert_matches!(
        ctx.engine
            .create_order(Uuid::new_v4(), dec!(0), dec!(0))
            .await
            .unwrap_err(),
        ServiceError::ValidationError(_)
    );
    assert_matches!(
        ctx.engine
            .create_order(Uuid::new_v4(), dec!(1), dec!(101))
            .await
            .unwrap_err(),
        ServiceError::ValidationError(_)
    );
}
