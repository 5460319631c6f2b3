//! Fulfillment façade: the single entry point embedders construct.
//!
//! Owns the database handle and the event channel, wires the allocation
//! ledger, the packaging version store and the workflow service together,
//! and carries the order/batch/shipment operations that cut across them.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::in_transaction;
use crate::entities::batch::{self, BatchStatus};
use crate::entities::shipment::{self, ShipmentStatus};
use crate::entities::stage_definition::WorkflowPhase;
use crate::entities::{batch_item, order, order_line, product, shipment_batch};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocations::{self, AllocationLedger};
use crate::services::packaging_versions::{self, PackagingVersionStore};
use crate::services::pricing;
use crate::services::workflow::{StageDefinitionRegistry, WorkflowService};

/// Partial update of an order line. `None` leaves a field untouched;
/// `margin_percent: Some(None)` clears the margin back to "not supplied".
#[derive(Debug, Default, Clone)]
pub struct OrderLineUpdate {
    pub quantity: Option<i32>,
    pub cost_price: Option<Decimal>,
    pub margin_percent: Option<Option<Decimal>>,
}

/// Principal shipment fields captured at creation time.
#[derive(Debug, Default, Clone)]
pub struct ShipmentDetails {
    pub pol: Option<String>,
    pub pod: Option<String>,
    pub signer: Option<String>,
    pub leader: Option<String>,
    pub customer_reference: Option<String>,
}

/// The engine façade.
#[derive(Clone)]
pub struct FulfillmentEngine {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    pub allocations: AllocationLedger,
    pub packaging_versions: PackagingVersionStore,
    pub workflow: WorkflowService,
    pub stage_definitions: StageDefinitionRegistry,
}

impl FulfillmentEngine {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, retries: u32) -> Self {
        Self {
            allocations: AllocationLedger::new(
                Arc::clone(&db),
                event_sender.clone(),
                retries,
            ),
            packaging_versions: PackagingVersionStore::new(
                Arc::clone(&db),
                event_sender.clone(),
                retries,
            ),
            workflow: WorkflowService::new(Arc::clone(&db), event_sender.clone()),
            stage_definitions: StageDefinitionRegistry::new(Arc::clone(&db)),
            db,
            event_sender,
        }
    }

    pub fn from_config(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        Self::new(db, event_sender, config.allocation_retries)
    }

    // ----- orders -----

    /// Creates an order with its conversion rate and down-payment percent
    /// frozen at creation.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        usd_conversion_rate: Decimal,
        down_payment_percent: Decimal,
    ) -> Result<order::Model, ServiceError> {
        if usd_conversion_rate <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "usd conversion rate must be positive".to_string(),
            ));
        }
        if down_payment_percent < Decimal::ZERO || down_payment_percent > Decimal::new(100, 0) {
            return Err(ServiceError::ValidationError(
                "down payment percent must be between 0 and 100".to_string(),
            ));
        }

        Ok(order::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            usd_conversion_rate: Set(usd_conversion_rate),
            down_payment_percent: Set(down_payment_percent),
            is_locked: Set(false),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?)
    }

    /// Adds a line to an order: prices it, binds it to the product's current
    /// packaging version, all in one transaction.
    ///
    /// When no margin is supplied, the (customer, product) default margin is
    /// consulted; absent that too, margin is zero. The packaging binding is
    /// pinned here and never rewritten afterwards.
    #[instrument(skip(self))]
    pub async fn add_order_line(
        &self,
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        cost_price: Decimal,
        margin_percent: Option<Decimal>,
    ) -> Result<order_line::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "order line quantity must be positive".to_string(),
            ));
        }
        if cost_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "cost price cannot be negative".to_string(),
            ));
        }

        let line = in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let parent = order::Entity::find_by_id(order_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("order", order_id))?;
                if parent.is_locked {
                    return Err(ServiceError::OrderLocked(order_id));
                }
                let item = product::Entity::find_by_id(product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("product", product_id))?;

                let margin = match margin_percent {
                    Some(m) => Some(m),
                    None => pricing::default_margin(txn, parent.customer_id, product_id).await?,
                };
                let quote = pricing::compute_sale_price(
                    cost_price,
                    &item.currency,
                    parent.usd_conversion_rate,
                    margin,
                )?;

                let binding = packaging_versions::resolve_for_binding(txn, product_id)
                    .await?
                    .map(|v| v.id);

                Ok(order_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    cost_price: Set(cost_price),
                    cost_price_usd: Set(quote.cost_price_usd),
                    margin_percent: Set(margin),
                    sale_price: Set(quote.sale_price),
                    packaging_version_id: Set(binding),
                    ..Default::default()
                }
                .insert(txn)
                .await?)
            })
        })
        .await?;

        info!(order_line_id = %line.id, %order_id, quantity, "order line added");
        self.event_sender
            .send_or_log(Event::OrderLineAdded {
                order_id,
                order_line_id: line.id,
                product_id,
                quantity,
            })
            .await;
        Ok(line)
    }

    /// Edits an order line's commercial fields, re-running pricing.
    ///
    /// Rejected when the order is locked. The quantity becomes immutable once
    /// any allocation exists against the line; the packaging binding is never
    /// touched here.
    #[instrument(skip(self, update))]
    pub async fn update_order_line(
        &self,
        order_line_id: Uuid,
        update: OrderLineUpdate,
    ) -> Result<order_line::Model, ServiceError> {
        if let Some(q) = update.quantity {
            if q <= 0 {
                return Err(ServiceError::ValidationError(
                    "order line quantity must be positive".to_string(),
                ));
            }
        }
        if let Some(c) = update.cost_price {
            if c < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "cost price cannot be negative".to_string(),
                ));
            }
        }

        in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let line = order_line::Entity::find_by_id(order_line_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("order line", order_line_id))?;
                let parent = order::Entity::find_by_id(line.order_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("order", line.order_id))?;
                if parent.is_locked {
                    return Err(ServiceError::OrderLocked(parent.id));
                }

                if let Some(new_quantity) = update.quantity {
                    if new_quantity != line.quantity {
                        let allocated =
                            allocations::allocated_quantity(txn, order_line_id, None, None)
                                .await?;
                        if allocated > 0 {
                            return Err(ServiceError::ValidationError(format!(
                                "order line {} has allocations; quantity is immutable",
                                order_line_id
                            )));
                        }
                    }
                }

                let item = product::Entity::find_by_id(line.product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("product", line.product_id))?;

                let cost_price = update.cost_price.unwrap_or(line.cost_price);
                let margin = match update.margin_percent {
                    Some(m) => m,
                    None => line.margin_percent,
                };
                let quote = pricing::compute_sale_price(
                    cost_price,
                    &item.currency,
                    parent.usd_conversion_rate,
                    margin,
                )?;

                let mut active: order_line::ActiveModel = line.into();
                if let Some(q) = update.quantity {
                    active.quantity = Set(q);
                }
                active.cost_price = Set(cost_price);
                active.cost_price_usd = Set(quote.cost_price_usd);
                active.margin_percent = Set(margin);
                active.sale_price = Set(quote.sale_price);
                Ok(active.update(txn).await?)
            })
        })
        .await
    }

    /// Locks the order against further line edits. Allocation and workflow
    /// operations remain permitted.
    #[instrument(skip(self))]
    pub async fn lock_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let updated = self.set_order_lock(order_id, true).await?;
        self.event_sender.send_or_log(Event::OrderLocked(order_id)).await;
        Ok(updated)
    }

    /// Releases the lock, e.g. when the issued proforma invoice is voided.
    #[instrument(skip(self))]
    pub async fn unlock_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let updated = self.set_order_lock(order_id, false).await?;
        self.event_sender
            .send_or_log(Event::OrderUnlocked(order_id))
            .await;
        Ok(updated)
    }

    async fn set_order_lock(
        &self,
        order_id: Uuid,
        locked: bool,
    ) -> Result<order::Model, ServiceError> {
        let conn = &*self.db;
        let parent = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;
        let mut active: order::ActiveModel = parent.into();
        active.is_locked = Set(locked);
        Ok(active.update(conn).await?)
    }

    // ----- batches -----

    /// Creates a batch on an order and materializes its batch-phase
    /// checkpoints. Rejected while the order is locked; existing batches
    /// keep working.
    #[instrument(skip(self))]
    pub async fn create_batch(
        &self,
        order_id: Uuid,
        code: String,
    ) -> Result<batch::Model, ServiceError> {
        let conn = &*self.db;
        let parent = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;
        if parent.is_locked {
            return Err(ServiceError::OrderLocked(order_id));
        }

        let created = batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            code: Set(code.clone()),
            status: Set(BatchStatus::Negotiation.as_str().to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        self.workflow.ensure_batch_instances(created.id).await?;

        info!(batch_id = %created.id, %order_id, code, "batch created");
        self.event_sender
            .send_or_log(Event::BatchCreated {
                order_id,
                batch_id: created.id,
                code,
            })
            .await;
        Ok(created)
    }

    /// Moves a batch to a new lifecycle status.
    ///
    /// Canceling implicitly releases the batch's allocations: its rows stay
    /// in place but stop counting against order line balances. Reviving a
    /// canceled batch therefore re-checks every affected line and fails with
    /// `OverAllocation` when the released quantities have been re-committed
    /// elsewhere in the meantime.
    #[instrument(skip(self))]
    pub async fn set_batch_status(
        &self,
        batch_id: Uuid,
        new_status: BatchStatus,
    ) -> Result<batch::Model, ServiceError> {
        let (updated, old_status) = in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let target = batch::Entity::find_by_id(batch_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("batch", batch_id))?;
                let old_status = target.status.clone();
                if old_status == new_status.as_str() {
                    return Ok((target, old_status));
                }

                if target.is_canceled() && new_status != BatchStatus::Canceled {
                    revalidate_batch_lines(txn, batch_id).await?;
                }

                let mut active: batch::ActiveModel = target.into();
                active.status = Set(new_status.as_str().to_string());
                let updated = active.update(txn).await?;
                Ok((updated, old_status))
            })
        })
        .await?;

        if old_status != new_status.as_str() {
            self.event_sender
                .send_or_log(Event::BatchStatusChanged {
                    batch_id,
                    old_status,
                    new_status: new_status.as_str().to_string(),
                })
                .await;
        }
        Ok(updated)
    }

    /// Allocates a quantity of an order line to a batch. Delegates to the
    /// ledger; see [`AllocationLedger::allocate`].
    pub async fn add_batch_item(
        &self,
        batch_id: Uuid,
        order_line_id: Uuid,
        quantity: i32,
    ) -> Result<batch_item::Model, ServiceError> {
        self.allocations.allocate(batch_id, order_line_id, quantity).await
    }

    // ----- shipments -----

    /// Groups batches into a new shipment in PRE_LOADING and materializes
    /// its pre-loading checkpoints.
    ///
    /// Every batch must be unshipped; a batch already linked to a shipment
    /// fails the whole call with `BatchAlreadyShipped`.
    #[instrument(skip(self, details))]
    pub async fn create_shipment(
        &self,
        batch_ids: Vec<Uuid>,
        details: ShipmentDetails,
    ) -> Result<shipment::Model, ServiceError> {
        if batch_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "a shipment needs at least one batch".to_string(),
            ));
        }

        let event_batch_ids = batch_ids.clone();
        let created = in_transaction(&self.db, |txn| {
            Box::pin(async move {
                for &batch_id in &batch_ids {
                    let target = batch::Entity::find_by_id(batch_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("batch", batch_id))?;
                    if target.is_canceled() {
                        return Err(ServiceError::ValidationError(format!(
                            "batch {} is canceled and cannot be shipped",
                            batch_id
                        )));
                    }
                    if let Some(existing) = shipment_batch::Entity::find()
                        .filter(shipment_batch::Column::BatchId.eq(batch_id))
                        .one(txn)
                        .await?
                    {
                        return Err(ServiceError::BatchAlreadyShipped {
                            batch_id,
                            shipment_id: existing.shipment_id,
                        });
                    }
                }

                let created = shipment::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    status: Set(ShipmentStatus::PreLoading.as_str().to_string()),
                    pol: Set(details.pol),
                    pod: Set(details.pod),
                    signer: Set(details.signer),
                    leader: Set(details.leader),
                    customer_reference: Set(details.customer_reference),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                for &batch_id in &batch_ids {
                    shipment_batch::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        shipment_id: Set(created.id),
                        batch_id: Set(batch_id),
                        created_at: Set(chrono::Utc::now()),
                    }
                    .insert(txn)
                    .await?;
                }

                Ok(created)
            })
        })
        .await?;

        self.workflow
            .ensure_shipment_instances(created.id, WorkflowPhase::PreLoading)
            .await?;

        info!(shipment_id = %created.id, batches = event_batch_ids.len(), "shipment created");
        self.event_sender
            .send_or_log(Event::ShipmentCreated {
                shipment_id: created.id,
                batch_ids: event_batch_ids,
            })
            .await;
        Ok(created)
    }
}

/// Re-checks the conservation invariant for every order line a batch touches,
/// counting the batch's own rows back in. Used when reviving a canceled batch.
async fn revalidate_batch_lines(
    txn: &sea_orm::DatabaseTransaction,
    batch_id: Uuid,
) -> Result<(), ServiceError> {
    let rows = batch_item::Entity::find()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .all(txn)
        .await?;

    for row in rows {
        let line = order_line::Entity::find_by_id(row.order_line_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order line", row.order_line_id))?;
        let allocated_elsewhere =
            allocations::allocated_quantity(txn, row.order_line_id, Some(batch_id), None).await?;
        let remaining = line.quantity - allocated_elsewhere;
        if row.quantity > remaining {
            return Err(ServiceError::OverAllocation {
                order_line_id: row.order_line_id,
                attempted: row.quantity,
                remaining,
            });
        }
    }
    Ok(())
}
