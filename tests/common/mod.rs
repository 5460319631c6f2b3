//! Shared harness for integration tests: an in-memory SQLite database with
//! migrations applied, an engine wired to a drained event channel, and
//! seeding helpers for the rows the engine itself never creates (products,
//! stage definitions, margin defaults).

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

use fulfillment_engine::db::{establish_connection, run_migrations};
use fulfillment_engine::entities::stage_definition::WorkflowPhase;
use fulfillment_engine::entities::{customer_margin, product, stage_definition, stage_requirement};
use fulfillment_engine::events::EventSender;
use fulfillment_engine::FulfillmentEngine;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub engine: FulfillmentEngine,
}

pub async fn setup() -> TestContext {
    let db = Arc::new(
        establish_connection("sqlite::memory:")
            .await
            .expect("connect"),
    );
    run_migrations(&db).await.expect("migrate");
    let engine = FulfillmentEngine::new(Arc::clone(&db), EventSender::spawn_default(64), 3);
    TestContext { db, engine }
}

#[allow(dead_code)]
pub async fn seed_product(db: &DatabaseConnection, sku: &str, currency: &str) -> product::Model {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        sku: Set(sku.to_string()),
        name: Set(format!("product {sku}")),
        currency: Set(currency.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed product")
}

#[allow(dead_code)]
pub async fn seed_stage_definition(
    db: &DatabaseConnection,
    name: &str,
    phase: WorkflowPhase,
    sort_order: i32,
) -> stage_definition::Model {
    seed_stage_definition_full(db, name, phase, sort_order, true, false).await
}

#[allow(dead_code)]
pub async fn seed_stage_definition_full(
    db: &DatabaseConnection,
    name: &str,
    phase: WorkflowPhase,
    sort_order: i32,
    allows_attachment: bool,
    requires_attachment: bool,
) -> stage_definition::Model {
    stage_definition::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        phase: Set(phase.to_string()),
        sort_order: Set(sort_order),
        allows_attachment: Set(allows_attachment),
        requires_attachment: Set(requires_attachment),
        active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("seed stage definition")
}

#[allow(dead_code)]
pub async fn require_field(
    db: &DatabaseConnection,
    stage_definition_id: Uuid,
    field_name: &str,
) -> stage_requirement::Model {
    stage_requirement::ActiveModel {
        id: Set(Uuid::new_v4()),
        stage_definition_id: Set(stage_definition_id),
        field_name: Set(field_name.to_string()),
    }
    .insert(db)
    .await
    .expect("seed stage requirement")
}

#[allow(dead_code)]
pub async fn seed_customer_margin(
    db: &DatabaseConnection,
    customer_id: Uuid,
    product_id: Uuid,
    margin_percent: Decimal,
) -> customer_margin::Model {
    customer_margin::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        product_id: Set(product_id),
        margin_percent: Set(margin_percent),
    }
    .insert(db)
    .await
    .expect("seed customer margin")
}
