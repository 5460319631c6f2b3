use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Names a shipment field that must hold a value before the owning stage
/// can be completed, e.g. `bl_number` or `loading_date`. The name must be
/// registered in the typed accessor map (`services::workflow::fields`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_requirements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stage_definition_id: Uuid,
    pub field_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stage_definition::Entity",
        from = "Column::StageDefinitionId",
        to = "super::stage_definition::Column::Id"
    )]
    StageDefinition,
}

impl Related<super::stage_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageDefinition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
