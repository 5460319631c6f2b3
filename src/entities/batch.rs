use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a shipping batch. Stored as a string in the DB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Negotiation,
    Production,
    PreShipment,
    InTransit,
    Delivered,
    Standby,
    Canceled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Negotiation => "negotiation",
            BatchStatus::Production => "production",
            BatchStatus::PreShipment => "pre_shipment",
            BatchStatus::InTransit => "in_transit",
            BatchStatus::Delivered => "delivered",
            BatchStatus::Standby => "standby",
            BatchStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "negotiation" => Some(BatchStatus::Negotiation),
            "production" => Some(BatchStatus::Production),
            "pre_shipment" => Some(BatchStatus::PreShipment),
            "in_transit" => Some(BatchStatus::InTransit),
            "delivered" => Some(BatchStatus::Delivered),
            "standby" => Some(BatchStatus::Standby),
            "canceled" => Some(BatchStatus::Canceled),
            _ => None,
        }
    }
}

/// A subset of an order's lines grouped for one shipping event.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub code: String,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn status(&self) -> Option<BatchStatus> {
        BatchStatus::from_str(&self.status)
    }

    /// Canceled batches no longer count against order line balances.
    pub fn is_canceled(&self) -> bool {
        self.status == BatchStatus::Canceled.as_str()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(has_many = "super::batch_item::Entity")]
    BatchItem,
    #[sea_orm(has_many = "super::batch_stage::Entity")]
    BatchStage,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::batch_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchItem.def()
    }
}

impl Related<super::batch_stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchStage.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
