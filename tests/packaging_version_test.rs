//! Temporal exclusivity of packaging versions and binding stability of
//! order lines.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use uuid::Uuid;

use fulfillment_engine::services::packaging_versions::PackagingSpec;
use fulfillment_engine::ServiceError;

fn spec(units_per_master_box: i32) -> PackagingSpec {
    PackagingSpec {
        net_weight: dec!(0.5),
        gross_weight: dec!(14),
        packing_length: dec!(60),
        packing_width: dec!(40),
        packing_height: dec!(40),
        units_per_master_box,
        packing_type: "carton".to_string(),
    }
}

#[tokio::test]
async fn creating_a_version_seals_the_previous_one() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;

    let t1 = Utc::now();
    let v1 = ctx
        .engine
        .packaging_versions
        .create_version(product.id, spec(24), t1)
        .await
        .unwrap();
    assert_eq!(v1.valid_to, None);

    let t2 = t1 + Duration::days(30);
    let v2 = ctx
        .engine
        .packaging_versions
        .create_version(product.id, spec(12), t2)
        .await
        .unwrap();

    let current = ctx
        .engine
        .packaging_versions
        .current_version(product.id)
        .await
        .unwrap()
        .expect("a current version");
    assert_eq!(current.id, v2.id);
    assert_eq!(current.valid_to, None);

    // v1 is sealed exactly at v2's start
    let v1_after = fulfillment_engine::entities::packaging_version::Entity::find_by_id(v1.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(v1_after.valid_to, Some(t2));
}

#[tokio::test]
async fn retroactive_versions_are_rejected() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;

    let t1 = Utc::now();
    ctx.engine
        .packaging_versions
        .create_version(product.id, spec(24), t1)
        .await
        .unwrap();

    let err = ctx
        .engine
        .packaging_versions
        .create_version(product.id, spec(12), t1 - Duration::days(1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidValidity { .. });
}

#[tokio::test]
async fn order_lines_keep_their_binding_across_revisions() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();

    let t1 = Utc::now();
    let v1 = ctx
        .engine
        .packaging_versions
        .create_version(product.id, spec(24), t1)
        .await
        .unwrap();

    let line_before = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(5), None)
        .await
        .unwrap();
    assert_eq!(line_before.packaging_version_id, Some(v1.id));

    let v2 = ctx
        .engine
        .packaging_versions
        .create_version(product.id, spec(12), t1 + Duration::days(1))
        .await
        .unwrap();

    // the old line is untouched, a new line binds the new version
    let line_after = ctx
        .engine
        .add_order_line(order.id, product.id, 10, dec!(5), None)
        .await
        .unwrap();
    assert_eq!(line_after.packaging_version_id, Some(v2.id));

    let reread = fulfillment_engine::entities::order_line::Entity::find_by_id(line_before.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reread.packaging_version_id, Some(v1.id));
}

#[tokio::test]
async fn lines_without_any_version_bind_nothing() {
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
    assert_eq!(line.packaging_version_id, None);
}
