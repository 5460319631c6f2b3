//! Allocation ledger: the conservation invariant over batch items.
//!
//! For any order line, the sum of quantities across batch items in
//! non-canceled batches never exceeds the ordered quantity. Every
//! check-then-write here runs in one transaction, with a row lock on the
//! order line where the backend supports it, and a bounded internal retry
//! when the transaction loses a race.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QuerySelect, RelationTrait, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{in_transaction_with_retries, supports_row_locks};
use crate::entities::batch::{self, BatchStatus};
use crate::entities::{batch_item, order_line};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Service guarding order-line allocation balances.
#[derive(Clone)]
pub struct AllocationLedger {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    retries: u32,
}

impl AllocationLedger {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, retries: u32) -> Self {
        Self {
            db,
            event_sender,
            retries,
        }
    }

    /// Ordered quantity minus everything already committed to non-canceled
    /// batches, optionally ignoring one batch's own rows (used when
    /// re-validating an edit to that batch).
    #[instrument(skip(self))]
    pub async fn remaining_balance(
        &self,
        order_line_id: Uuid,
        excluding_batch_id: Option<Uuid>,
    ) -> Result<i32, ServiceError> {
        let conn = &*self.db;
        let line = find_line(conn, order_line_id).await?;
        let allocated = allocated_quantity(conn, order_line_id, excluding_batch_id, None).await?;
        Ok(line.quantity - allocated)
    }

    /// Commits `quantity` of an order line to a batch as a new batch item.
    ///
    /// Additive: existing rows of the same batch count against the balance
    /// too. Fails with `OverAllocation` when the quantity exceeds what is
    /// left, leaving no partial state.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        batch_id: Uuid,
        order_line_id: Uuid,
        quantity: i32,
    ) -> Result<batch_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "allocation quantity must be positive".to_string(),
            ));
        }

        let (item, remaining) = in_transaction_with_retries(&self.db, self.retries, |txn| {
            Box::pin(async move {
                let target = batch::Entity::find_by_id(batch_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("batch", batch_id))?;
                if target.is_canceled() {
                    return Err(ServiceError::ValidationError(format!(
                        "batch {} is canceled and cannot receive allocations",
                        batch_id
                    )));
                }
                if target.order_id != line_order_id(txn, order_line_id).await? {
                    return Err(ServiceError::ValidationError(
                        "order line belongs to a different order than the batch".to_string(),
                    ));
                }

                let line = find_line_locked(txn, order_line_id).await?;
                let allocated = allocated_quantity(txn, order_line_id, None, None).await?;
                let remaining = line.quantity - allocated;
                if quantity > remaining {
                    return Err(ServiceError::OverAllocation {
                        order_line_id,
                        attempted: quantity,
                        remaining,
                    });
                }

                let item = batch_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    batch_id: Set(batch_id),
                    order_line_id: Set(order_line_id),
                    quantity: Set(quantity),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                Ok((item, remaining - quantity))
            })
        })
        .await?;

        info!(
            batch_item_id = %item.id,
            %order_line_id,
            quantity,
            remaining,
            "allocation committed"
        );
        self.event_sender
            .send_or_log(Event::AllocationCommitted {
                batch_id,
                order_line_id,
                batch_item_id: item.id,
                quantity,
                remaining,
            })
            .await;

        Ok(item)
    }

    /// Changes an existing batch item's quantity, re-checking the invariant
    /// with the item's current quantity substituted out of the balance.
    #[instrument(skip(self))]
    pub async fn reallocate(
        &self,
        batch_item_id: Uuid,
        new_quantity: i32,
    ) -> Result<batch_item::Model, ServiceError> {
        if new_quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "allocation quantity must be positive".to_string(),
            ));
        }

        in_transaction_with_retries(&self.db, self.retries, |txn| {
            Box::pin(async move {
                let item = batch_item::Entity::find_by_id(batch_item_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("batch item", batch_item_id))?;

                let line = find_line_locked(txn, item.order_line_id).await?;
                let allocated_elsewhere =
                    allocated_quantity(txn, item.order_line_id, None, Some(item.id)).await?;
                let remaining = line.quantity - allocated_elsewhere;
                if new_quantity > remaining {
                    return Err(ServiceError::OverAllocation {
                        order_line_id: item.order_line_id,
                        attempted: new_quantity,
                        remaining,
                    });
                }

                let mut active: batch_item::ActiveModel = item.into();
                active.quantity = Set(new_quantity);
                Ok(active.update(txn).await?)
            })
        })
        .await
    }

    /// Removes a batch item, releasing its quantity back to the line.
    #[instrument(skip(self))]
    pub async fn release(&self, batch_item_id: Uuid) -> Result<(), ServiceError> {
        let conn = &*self.db;
        let item = batch_item::Entity::find_by_id(batch_item_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("batch item", batch_item_id))?;

        let order_line_id = item.order_line_id;
        let quantity = item.quantity;
        item.delete(conn).await?;

        self.event_sender
            .send_or_log(Event::AllocationReleased {
                batch_item_id,
                order_line_id,
                quantity,
            })
            .await;
        Ok(())
    }

    /// Whether any allocation exists against the line. Once true, the line's
    /// ordered quantity is immutable.
    pub async fn has_allocations(&self, order_line_id: Uuid) -> Result<bool, ServiceError> {
        let count = batch_item::Entity::find()
            .filter(batch_item::Column::OrderLineId.eq(order_line_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    order_line_id: Uuid,
) -> Result<order_line::Model, ServiceError> {
    order_line::Entity::find_by_id(order_line_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("order line", order_line_id))
}

/// Reads the order line, taking a `FOR UPDATE` lock where available so that
/// concurrent allocations against the same line serialize on this row.
async fn find_line_locked<C: ConnectionTrait>(
    conn: &C,
    order_line_id: Uuid,
) -> Result<order_line::Model, ServiceError> {
    let mut query = order_line::Entity::find_by_id(order_line_id);
    if supports_row_locks(conn.get_database_backend()) {
        query = query.lock_exclusive();
    }
    query
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("order line", order_line_id))
}

async fn line_order_id<C: ConnectionTrait>(
    conn: &C,
    order_line_id: Uuid,
) -> Result<Uuid, ServiceError> {
    Ok(find_line(conn, order_line_id).await?.order_id)
}

/// Sum of active allocations for a line across all batches of the order,
/// skipping canceled batches, optionally skipping one batch or one item.
pub(crate) async fn allocated_quantity<C: ConnectionTrait>(
    conn: &C,
    order_line_id: Uuid,
    excluding_batch_id: Option<Uuid>,
    excluding_item_id: Option<Uuid>,
) -> Result<i32, ServiceError> {
    let mut query = batch_item::Entity::find()
        .select_only()
        .column_as(batch_item::Column::Quantity.sum(), "total")
        .join(JoinType::InnerJoin, batch_item::Relation::Batch.def())
        .filter(batch_item::Column::OrderLineId.eq(order_line_id))
        .filter(batch::Column::Status.ne(BatchStatus::Canceled.as_str()));

    if let Some(batch_id) = excluding_batch_id {
        query = query.filter(batch_item::Column::BatchId.ne(batch_id));
    }
    if let Some(item_id) = excluding_item_id {
        query = query.filter(batch_item::Column::Id.ne(item_id));
    }

    let total: Option<i64> = query.into_tuple().one(conn).await?.flatten();
    Ok(total.unwrap_or(0) as i32)
}
