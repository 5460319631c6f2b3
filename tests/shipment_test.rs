//! Shipment creation constraints and the derived summaries.

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait};
use uuid::Uuid;

use fulfillment_engine::services::fulfillment::ShipmentDetails;
use fulfillment_engine::services::packaging_versions::PackagingSpec;
use fulfillment_engine::services::summaries::SummaryService;
use fulfillment_engine::ServiceError;

#[tokio::test]
async fn a_batch_ships_at_most_once() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 20, dec!(5), None)
        .await
        .unwrap();
    let batch_a = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    let batch_b = ctx.engine.create_batch(order.id, "B-B".into()).await.unwrap();
    ctx.engine.add_batch_item(batch_a.id, line.id, 10).await.unwrap();
    ctx.engine.add_batch_item(batch_b.id, line.id, 10).await.unwrap();

    let first = ctx
        .engine
        .create_shipment(vec![batch_a.id], ShipmentDetails::default())
        .await
        .unwrap();

    let err = ctx
        .engine
        .create_shipment(vec![batch_b.id, batch_a.id], ShipmentDetails::default())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::BatchAlreadyShipped { batch_id, shipment_id }
            if batch_id == batch_a.id && shipment_id == first.id
    );

    // the failed call linked nothing: batch B is still shippable
    ctx.engine
        .create_shipment(vec![batch_b.id], ShipmentDetails::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_and_canceled_inputs_are_rejected() {
    let ctx = common::setup().await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let batch = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    ctx.engine
        .set_batch_status(batch.id, fulfillment_engine::entities::batch::BatchStatus::Canceled)
        .await
        .unwrap();

    assert_matches!(
        ctx.engine
            .create_shipment(vec![], ShipmentDetails::default())
            .await
            .unwrap_err(),
        ServiceError::ValidationError(_)
    );
    assert_matches!(
        ctx.engine
            .create_shipment(vec![batch.id], ShipmentDetails::default())
            .await
            .unwrap_err(),
        ServiceError::ValidationError(_)
    );
}

#[tokio::test]
async fn order_summary_totals_follow_the_lines() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(30))
        .await
        .unwrap();
    ctx.engine
        .add_order_line(order.id, product.id, 10, dec!(100), Some(dec!(20)))
        .await
        .unwrap();
    ctx.engine
        .add_order_line(order.id, product.id, 5, dec!(40), None)
        .await
        .unwrap();

    let summary = SummaryService::new(ctx.db.clone())
        .order_summary(order.id)
        .await
        .unwrap();
    assert_eq!(summary.total_quantity, 15);
    assert_eq!(summary.total_cost_usd, dec!(1200.00));
    assert_eq!(summary.total_sale_value, dec!(1400.00));
    assert_eq!(summary.total_profit, dec!(200.00));
    assert_eq!(summary.deposit_payable, dec!(420.00));
    assert_eq!(summary.lines.len(), 2);
}

#[tokio::test]
async fn batch_summary_uses_the_bound_packaging_version() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    ctx.engine
        .packaging_versions
        .create_version(
            product.id,
            PackagingSpec {
                net_weight: dec!(0.5),
                gross_weight: dec!(14),
                packing_length: dec!(100),
                packing_width: dec!(50),
                packing_height: dec!(40),
                units_per_master_box: 24,
                packing_type: "carton".to_string(),
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 100, dec!(10), Some(dec!(10)))
        .await
        .unwrap();
    let batch = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    ctx.engine.add_batch_item(batch.id, line.id, 100).await.unwrap();

    let summary = SummaryService::new(ctx.db.clone())
        .batch_summary(batch.id)
        .await
        .unwrap();
    assert_eq!(summary.total_quantity, 100);
    assert_eq!(summary.declared_value, dec!(1100.00));
    assert_eq!(summary.net_weight_kg, dec!(50.0));
    // 100 units / 24 per box -> 5 boxes
    assert_eq!(summary.gross_weight_kg, dec!(70));
    assert_eq!(summary.volume_m3, dec!(1.0));
    assert_eq!(summary.unbound_items, 0);
}

#[tokio::test]
async fn shipment_summary_aggregates_its_batches() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 30, dec!(10), None)
        .await
        .unwrap();
    let batch_a = ctx.engine.create_batch(order.id, "B-A".into()).await.unwrap();
    let batch_b = ctx.engine.create_batch(order.id, "B-B".into()).await.unwrap();
    ctx.engine.add_batch_item(batch_a.id, line.id, 10).await.unwrap();
    ctx.engine.add_batch_item(batch_b.id, line.id, 20).await.unwrap();

    let shipment = ctx
        .engine
        .create_shipment(vec![batch_a.id, batch_b.id], ShipmentDetails::default())
        .await
        .unwrap();

    let summaries = SummaryService::new(ctx.db.clone());
    let summary = summaries.shipment_summary(shipment.id).await.unwrap();
    assert_eq!(summary.batches.len(), 2);
    assert_eq!(summary.total_quantity, 30);
    assert_eq!(summary.declared_value, dec!(300.00));
    // lines without a packaging binding carry no weights
    let unbound: u32 = summary.batches.iter().map(|b| b.unbound_items).sum();
    assert_eq!(unbound, 2);
    assert_eq!(summary.net_weight_kg, dec!(0));

    let line_view = summaries.line_summary(line.id).await.unwrap();
    assert_eq!(line_view.allocated, 30);
    assert_eq!(line_view.remaining, 0);
    assert_eq!(line_view.shipped, 0);

    // once the shipment departs, the allocated quantity counts as shipped
    let mut active: fulfillment_engine::entities::shipment::ActiveModel =
        fulfillment_engine::entities::shipment::Entity::find_by_id(shipment.id)
            .one(&*ctx.db)
            .await
            .unwrap()
            .unwrap()
            .into();
    active.status = sea_orm::Set("shipped".to_string());
    active.update(&*ctx.db).await.unwrap();

    let line_view = summaries.line_summary(line.id).await.unwrap();
    assert_eq!(line_view.shipped, 30);
}
