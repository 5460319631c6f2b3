use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product master data. Owned by an external catalog; the engine only needs
/// identity and the cost currency.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    /// ISO currency code of the cost price, e.g. "USD" or "RMB"
    pub currency: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::packaging_version::Entity")]
    PackagingVersion,
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLine,
}

impl Related<super::packaging_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackagingVersion.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
