use async_trait::async_trait;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Macro-status of a shipment, driven by the phase gate: all pre-loading
/// stages complete advances PRE_LOADING → READY, all shipment stages
/// complete advances READY → SHIPPED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    PreLoading,
    Ready,
    Shipped,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::PreLoading => "pre_loading",
            ShipmentStatus::Ready => "ready",
            ShipmentStatus::Shipped => "shipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pre_loading" => Some(ShipmentStatus::PreLoading),
            "ready" => Some(ShipmentStatus::Ready),
            "shipped" => Some(ShipmentStatus::Shipped),
            _ => None,
        }
    }
}

/// A shipment groups one or more batches for a single loading event.
///
/// The free-form business fields below double as checkpoint evidence:
/// stage definitions may name any of them as required before the stage can
/// be completed. The workflow service resolves them through the typed
/// accessor map in `services::workflow::fields`, never by reflection.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: String,

    // Principal fields captured at creation
    pub pol: Option<String>,
    pub pod: Option<String>,
    pub signer: Option<String>,
    pub leader: Option<String>,
    pub customer_reference: Option<String>,

    // Fields filled in as the workflow progresses
    pub loading_date: Option<DateTimeUtc>,
    pub shipping_date: Option<Date>,
    pub cons_point: Option<String>,
    pub city: Option<String>,
    pub carrier: Option<String>,
    pub origin_agent: Option<String>,
    pub destination_agent: Option<String>,
    pub agents_note: Option<String>,
    pub tracking_number: Option<String>,
    pub bl_number: Option<String>,
    pub bl_date: Option<DateTimeUtc>,
    pub inspection_no: Option<String>,
    pub eta_destination: Option<Date>,
    pub ata_destination: Option<Date>,
    pub notes: Option<String>,

    // Opaque references into external document storage
    pub shipping_document: Option<String>,
    pub booking_document: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn status(&self) -> Option<ShipmentStatus> {
        ShipmentStatus::from_str(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment_batch::Entity")]
    ShipmentBatch,
    #[sea_orm(has_many = "super::shipment_stage::Entity")]
    ShipmentStage,
}

impl Related<super::shipment_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentBatch.def()
    }
}

impl Related<super::shipment_stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentStage.def()
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
