//! Conservation of order line quantities across batch allocations.

mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use fulfillment_engine::entities::batch::BatchStatus;
use fulfillment_engine::ServiceError;

#[tokio::test]
async fn allocations_never_exceed_the_ordered_quantity() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(20))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 100, dec!(10), None)
        .await
        .unwrap();

    let batch_a = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    let batch_b = ctx.engine.create_batch(order.id, "B-B".into()).await.unwrap();

    ctx.engine.add_batch_item(batch_a.id, line.id, 60).await.unwrap();

    // 41 would overshoot: only 40 left
    let err = ctx
        .engine
        .add_batch_item(batch_b.id, line.id, 41)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::OverAllocation {
            attempted: 41,
            remaining: 40,
            ..
        }
    );

    ctx.engine.add_batch_item(batch_b.id, line.id, 40).await.unwrap();
    assert_eq!(
        ctx.engine.allocations.remaining_balance(line.id, None).await.unwrap(),
        0
    );

    // the line is exhausted, even for the batch that already holds most of it
    let err = ctx
        .engine
        .add_batch_item(batch_a.id, line.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OverAllocation { remaining: 0, .. });
}

#[tokio::test]
async fn canceling_a_batch_releases_its_allocations() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 50, dec!(5), None)
        .await
        .unwrap();

    let batch_a = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    let batch_b = ctx.engine.create_batch(order.id, "B-B".into()).await.unwrap();
    ctx.engine.add_batch_item(batch_a.id, line.id, 50).await.unwrap();

    ctx.engine
        .set_batch_status(batch_a.id, BatchStatus::Canceled)
        .await
        .unwrap();
    assert_eq!(
        ctx.engine.allocations.remaining_balance(line.id, None).await.unwrap(),
        50
    );

    // released quantity can be re-committed elsewhere
    ctx.engine.add_batch_item(batch_b.id, line.id, 30).await.unwrap();

    // reviving the canceled batch would overshoot now
    let err = ctx
        .engine
        .set_batch_status(batch_a.id, BatchStatus::Production)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::OverAllocation {
            attempted: 50,
            remaining: 20,
            ..
        }
    );
}

#[tokio::test]
async fn canceled_batches_reject_new_allocations() {
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
    let batch = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    ctx.engine
        .set_batch_status(batch.id, BatchStatus::Canceled)
        .await
        .unwrap();

    let err = ctx
        .engine
        .add_batch_item(batch.id, line.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn reallocation_excludes_the_item_being_edited() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 100, dec!(5), None)
        .await
        .unwrap();
    let batch = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    let item = ctx.engine.add_batch_item(batch.id, line.id, 60).await.unwrap();

    // growing within the line's total is fine: 60 -> 100
    ctx.engine.allocations.reallocate(item.id, 100).await.unwrap();

    let err = ctx
        .engine
        .allocations
        .reallocate(item.id, 101)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::OverAllocation { remaining: 100, .. });
}

#[tokio::test]
async fn releasing_an_item_returns_its_quantity() {
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
    let batch = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    let item = ctx.engine.add_batch_item(batch.id, line.id, 10).await.unwrap();

    ctx.engine.allocations.release(item.id).await.unwrap();
    assert_eq!(
        ctx.engine.allocations.remaining_balance(line.id, None).await.unwrap(),
        10
    );
    assert!(!ctx.engine.allocations.has_allocations(line.id).await.unwrap());
}

#[tokio::test]
async fn lines_of_other_orders_are_rejected() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order_a = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let order_b = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line_b = ctx
        .engine
        .add_order_line(order_b.id, product.id, 10, dec!(5), None)
        .await
        .unwrap();
    let batch_a = ctx.engine.create_batch(order_a.id, "B-A".into()).await.unwrap();

    let err = ctx
        .engine
        .add_batch_item(batch_a.id, line_b.id, 5)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn quantity_is_immutable_once_allocated() {
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
    let batch = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    ctx.engine.add_batch_item(batch.id, line.id, 1).await.unwrap();

    let err = ctx
        .engine
        .update_order_line(
            line.id,
            fulfillment_engine::services::fulfillment::OrderLineUpdate {
                quantity: Some(20),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // non-quantity edits stay possible
    ctx.engine
        .update_order_line(
            line.id,
            fulfillment_engine::services::fulfillment::OrderLineUpdate {
                cost_price: Some(dec!(6)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}
