//! Concurrent allocations against one order line: the conservation invariant
//! must hold no matter how the transactions interleave.

mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use fulfillment_engine::ServiceError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_cannot_oversubscribe_a_line() {
    let ctx = common::setup().await;
    let product = common::seed_product(&ctx.db, "SKU-1", "USD").await;
    let order = ctx
        .engine
        .create_order(Uuid::new_v4(), dec!(1), dec!(0))
        .await
        .unwrap();
    let line = ctx
        .engine
        .add_order_line(order.id, product.id, 100, dec!(10), None)
        .await
        .unwrap();

    // 11 tasks of 10 units each against a line of 100: exactly one must lose.
    let mut handles = Vec::new();
    for i in 0..11 {
        let engine = ctx.engine.clone();
        let order_id = order.id;
        let line_id = line.id;
        handles.push(tokio::spawn(async move {
            let batch = engine
                .create_batch(order_id, format!("B-{i}"))
                .await
                .expect("create batch");
            engine.add_batch_item(batch.id, line_id, 10).await
        }));
    }

    let mut successes = 0;
    let mut over_allocations = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(ServiceError::OverAllocation { .. }) => over_allocations += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 10);
    assert_eq!(over_allocations, 1);
    assert_eq!(
        ctx.engine
            .allocations
            .remaining_balance(line.id, None)
            .await
            .unwrap(),
        0
    );
}
