use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which workflow a checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowPhase {
    /// Checkpoints on a shipping batch
    Batch,
    /// Shipment checkpoints before the vessel is booked
    PreLoading,
    /// Shipment checkpoints from booking to departure
    Shipment,
}

/// Configuration entity: one checkpoint in a workflow phase.
///
/// Created and edited out of band by an external collaborator; the engine
/// only reads these. Definitions may be added after aggregates already
/// exist, which is why stage instances are materialized lazily.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub phase: String,
    pub sort_order: i32,
    pub allows_attachment: bool,
    /// When true, completing the stage without an attachment fails
    pub requires_attachment: bool,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn phase(&self) -> Option<WorkflowPhase> {
        self.phase.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stage_requirement::Entity")]
    StageRequirement,
    #[sea_orm(has_many = "super::batch_stage::Entity")]
    BatchStage,
    #[sea_orm(has_many = "super::shipment_stage::Entity")]
    ShipmentStage,
}

impl Related<super::stage_requirement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageRequirement.def()
    }
}

impl Related<super::batch_stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchStage.def()
    }
}

impl Related<super::shipment_stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentStage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
