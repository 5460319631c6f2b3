//! Temporal store for packaging specifications.
//!
//! Versions form an append-only history per product: at most one row has
//! `valid_to = NULL`, and creating a new version seals the previous one in
//! the same transaction. Sealed rows are never touched again, so order lines
//! bound to them can trust the snapshot forever.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{in_transaction_with_retries, supports_row_locks};
use crate::entities::packaging_version;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Physical packaging fields of a version, supplied by configuration.
#[derive(Debug, Clone)]
pub struct PackagingSpec {
    pub net_weight: Decimal,
    pub gross_weight: Decimal,
    pub packing_length: Decimal,
    pub packing_width: Decimal,
    pub packing_height: Decimal,
    pub units_per_master_box: i32,
    pub packing_type: String,
}

/// Service managing packaging version history.
#[derive(Clone)]
pub struct PackagingVersionStore {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    retries: u32,
}

impl PackagingVersionStore {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, retries: u32) -> Self {
        Self {
            db,
            event_sender,
            retries,
        }
    }

    /// The version currently in force for the product, if any.
    #[instrument(skip(self))]
    pub async fn current_version(
        &self,
        product_id: Uuid,
    ) -> Result<Option<packaging_version::Model>, ServiceError> {
        resolve_for_binding(&*self.db, product_id).await
    }

    /// Creates a new version effective from `valid_from`, sealing the
    /// previously active version at that same instant.
    ///
    /// Fails with `InvalidValidity` when `valid_from` predates the active
    /// version's start (no retroactive insertion).
    #[instrument(skip(self, spec))]
    pub async fn create_version(
        &self,
        product_id: Uuid,
        spec: PackagingSpec,
        valid_from: DateTime<Utc>,
    ) -> Result<packaging_version::Model, ServiceError> {
        let spec = Arc::new(spec);
        let (version, sealed_id) = in_transaction_with_retries(&self.db, self.retries, |txn| {
            let spec = Arc::clone(&spec);
            Box::pin(async move {
                let mut query = packaging_version::Entity::find()
                    .filter(packaging_version::Column::ProductId.eq(product_id))
                    .filter(packaging_version::Column::ValidTo.is_null());
                if supports_row_locks(txn.get_database_backend()) {
                    query = query.lock_exclusive();
                }
                let active = query.one(txn).await?;

                let sealed_id = match active {
                    Some(active) => {
                        if valid_from < active.valid_from {
                            return Err(ServiceError::InvalidValidity {
                                product_id,
                                valid_from,
                                active_from: active.valid_from,
                            });
                        }
                        let sealed_id = active.id;
                        let mut sealing: packaging_version::ActiveModel = active.into();
                        sealing.valid_to = Set(Some(valid_from));
                        sealing.update(txn).await?;
                        Some(sealed_id)
                    }
                    None => None,
                };

                let version = packaging_version::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    net_weight: Set(spec.net_weight),
                    gross_weight: Set(spec.gross_weight),
                    packing_length: Set(spec.packing_length),
                    packing_width: Set(spec.packing_width),
                    packing_height: Set(spec.packing_height),
                    units_per_master_box: Set(spec.units_per_master_box),
                    packing_type: Set(spec.packing_type.clone()),
                    valid_from: Set(valid_from),
                    valid_to: Set(None),
                    created_at: Set(Utc::now()),
                }
                .insert(txn)
                .await?;

                Ok((version, sealed_id))
            })
        })
        .await?;

        info!(
            %product_id,
            version_id = %version.id,
            sealed = ?sealed_id,
            "packaging version created"
        );
        self.event_sender
            .send_or_log(Event::PackagingVersionCreated {
                product_id,
                version_id: version.id,
                sealed_version_id: sealed_id,
                valid_from,
            })
            .await;

        Ok(version)
    }
}

/// Resolves the version an order line should bind to, inside the caller's
/// transaction so the binding cannot race a concurrent sealing.
pub async fn resolve_for_binding<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Option<packaging_version::Model>, ServiceError> {
    Ok(packaging_version::Entity::find()
        .filter(packaging_version::Column::ProductId.eq(product_id))
        .filter(packaging_version::Column::ValidTo.is_null())
        .one(conn)
        .await?)
}
