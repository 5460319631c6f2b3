//! Read-only summaries over orders, batches and shipments.
//!
//! Everything here derives from persisted rows; nothing is cached or stored.
//! Weight and volume figures come from the packaging version each order line
//! was bound to at creation, so later packaging revisions never change the
//! numbers of an existing line.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::batch;
use crate::entities::shipment::{self, ShipmentStatus};
use crate::entities::{batch_item, order, order_line, packaging_version, shipment_batch};
use crate::errors::ServiceError;
use crate::services::allocations::allocated_quantity;
use crate::services::pricing::round_money;

/// Progress of one order line through allocation and shipping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSummary {
    pub order_line_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Committed to non-canceled batches
    pub allocated: i32,
    /// Portion of `allocated` sitting in batches on a SHIPPED shipment
    pub shipped: i32,
    /// Still unallocated
    pub remaining: i32,
    pub sale_value: Decimal,
}

/// Commercial totals of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub total_quantity: i32,
    pub total_cost_usd: Decimal,
    pub total_sale_value: Decimal,
    pub total_profit: Decimal,
    /// `total_sale_value` times the order's down-payment percent
    pub deposit_payable: Decimal,
    pub lines: Vec<LineSummary>,
}

/// Physical and commercial totals of a batch, derived from its items and
/// their lines' packaging bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub total_quantity: i32,
    /// Sale value of the allocated quantities
    pub declared_value: Decimal,
    pub net_weight_kg: Decimal,
    pub gross_weight_kg: Decimal,
    pub volume_m3: Decimal,
    /// Items on lines with no packaging binding; their weights and volume
    /// could not be counted
    pub unbound_items: u32,
}

/// Totals of a shipment across all its batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentSummary {
    pub shipment_id: Uuid,
    pub status: Option<ShipmentStatus>,
    pub total_quantity: i32,
    pub declared_value: Decimal,
    pub net_weight_kg: Decimal,
    pub gross_weight_kg: Decimal,
    pub volume_m3: Decimal,
    pub batches: Vec<BatchSummary>,
}

/// Read-side service computing the summaries.
#[derive(Clone)]
pub struct SummaryService {
    db: Arc<DatabaseConnection>,
}

impl SummaryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn line_summary(&self, order_line_id: Uuid) -> Result<LineSummary, ServiceError> {
        let conn = &*self.db;
        let line = order_line::Entity::find_by_id(order_line_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order line", order_line_id))?;
        line_summary_for(conn, &line).await
    }

    #[instrument(skip(self))]
    pub async fn order_summary(&self, order_id: Uuid) -> Result<OrderSummary, ServiceError> {
        let conn = &*self.db;
        let parent = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))?;
        let rows = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(conn)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        let mut total_quantity = 0i32;
        let mut total_cost_usd = Decimal::ZERO;
        let mut total_sale_value = Decimal::ZERO;
        for line in &rows {
            let quantity = Decimal::from(line.quantity);
            total_quantity += line.quantity;
            total_cost_usd += line.cost_price_usd * quantity;
            total_sale_value += line.sale_price * quantity;
            lines.push(line_summary_for(conn, line).await?);
        }

        let deposit_payable =
            round_money(total_sale_value * parent.down_payment_percent / Decimal::new(100, 0));

        Ok(OrderSummary {
            order_id,
            total_quantity,
            total_cost_usd,
            total_sale_value,
            total_profit: total_sale_value - total_cost_usd,
            deposit_payable,
            lines,
        })
    }

    #[instrument(skip(self))]
    pub async fn batch_summary(&self, batch_id: Uuid) -> Result<BatchSummary, ServiceError> {
        let conn = &*self.db;
        batch::Entity::find_by_id(batch_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("batch", batch_id))?;
        batch_summary_for(conn, batch_id).await
    }

    #[instrument(skip(self))]
    pub async fn shipment_summary(
        &self,
        shipment_id: Uuid,
    ) -> Result<ShipmentSummary, ServiceError> {
        let conn = &*self.db;
        let parent = shipment::Entity::find_by_id(shipment_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("shipment", shipment_id))?;
        let links = shipment_batch::Entity::find()
            .filter(shipment_batch::Column::ShipmentId.eq(shipment_id))
            .all(conn)
            .await?;

        let mut batches = Vec::with_capacity(links.len());
        let mut total_quantity = 0i32;
        let mut declared_value = Decimal::ZERO;
        let mut net_weight_kg = Decimal::ZERO;
        let mut gross_weight_kg = Decimal::ZERO;
        let mut volume_m3 = Decimal::ZERO;
        for link in links {
            let summary = batch_summary_for(conn, link.batch_id).await?;
            total_quantity += summary.total_quantity;
            declared_value += summary.declared_value;
            net_weight_kg += summary.net_weight_kg;
            gross_weight_kg += summary.gross_weight_kg;
            volume_m3 += summary.volume_m3;
            batches.push(summary);
        }

        Ok(ShipmentSummary {
            shipment_id,
            status: parent.status(),
            total_quantity,
            declared_value,
            net_weight_kg,
            gross_weight_kg,
            volume_m3,
            batches,
        })
    }
}

async fn line_summary_for<C: ConnectionTrait>(
    conn: &C,
    line: &order_line::Model,
) -> Result<LineSummary, ServiceError> {
    let allocated = allocated_quantity(conn, line.id, None, None).await?;
    let shipped = shipped_quantity(conn, line.id).await?;
    Ok(LineSummary {
        order_line_id: line.id,
        product_id: line.product_id,
        quantity: line.quantity,
        allocated,
        shipped,
        remaining: line.quantity - allocated,
        sale_value: line.sale_price * Decimal::from(line.quantity),
    })
}

/// Quantity of a line sitting in batches whose shipment has departed.
async fn shipped_quantity<C: ConnectionTrait>(
    conn: &C,
    order_line_id: Uuid,
) -> Result<i32, ServiceError> {
    let items = batch_item::Entity::find()
        .filter(batch_item::Column::OrderLineId.eq(order_line_id))
        .all(conn)
        .await?;

    let mut shipped = 0i32;
    for item in items {
        let link = shipment_batch::Entity::find()
            .filter(shipment_batch::Column::BatchId.eq(item.batch_id))
            .one(conn)
            .await?;
        let Some(link) = link else { continue };
        let departed = shipment::Entity::find_by_id(link.shipment_id)
            .one(conn)
            .await?
            .and_then(|s| s.status())
            .map(|s| s == ShipmentStatus::Shipped)
            .unwrap_or(false);
        if departed {
            shipped += item.quantity;
        }
    }
    Ok(shipped)
}

async fn batch_summary_for<C: ConnectionTrait>(
    conn: &C,
    batch_id: Uuid,
) -> Result<BatchSummary, ServiceError> {
    let items = batch_item::Entity::find()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .all(conn)
        .await?;

    let mut total_quantity = 0i32;
    let mut declared_value = Decimal::ZERO;
    let mut net_weight_kg = Decimal::ZERO;
    let mut gross_weight_kg = Decimal::ZERO;
    let mut volume_m3 = Decimal::ZERO;
    let mut unbound_items = 0u32;
    let mut version_cache: HashMap<Uuid, packaging_version::Model> = HashMap::new();

    for item in items {
        let line = order_line::Entity::find_by_id(item.order_line_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order line", item.order_line_id))?;

        total_quantity += item.quantity;
        declared_value += line.sale_price * Decimal::from(item.quantity);

        let Some(version_id) = line.packaging_version_id else {
            unbound_items += 1;
            continue;
        };
        let version = match version_cache.get(&version_id) {
            Some(v) => v.clone(),
            None => {
                let v = packaging_version::Entity::find_by_id(version_id)
                    .one(conn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("packaging version", version_id))?;
                version_cache.insert(version_id, v.clone());
                v
            }
        };

        let boxes = master_boxes(item.quantity, version.units_per_master_box);
        net_weight_kg += version.net_weight * Decimal::from(item.quantity);
        gross_weight_kg += version.gross_weight * Decimal::from(boxes);
        volume_m3 += version.master_box_volume_m3() * Decimal::from(boxes);
    }

    Ok(BatchSummary {
        batch_id,
        total_quantity,
        declared_value,
        net_weight_kg,
        gross_weight_kg,
        volume_m3,
        unbound_items,
    })
}

/// Master boxes needed for a quantity: a partial box counts as a whole one.
fn master_boxes(quantity: i32, units_per_master_box: i32) -> i32 {
    if units_per_master_box <= 0 {
        return 0;
    }
    (quantity + units_per_master_box - 1) / units_per_master_box
}
