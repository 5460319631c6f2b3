use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dated snapshot of a product's physical packaging specification.
///
/// Append-only history ordered by `valid_from`; at most one row per product
/// has `valid_to = NULL` (the currently active version). Sealed rows are
/// never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packaging_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// Net weight per unit, kg
    pub net_weight: Decimal,
    /// Gross weight per master box, kg
    pub gross_weight: Decimal,
    /// Master box dimensions, cm
    pub packing_length: Decimal,
    pub packing_width: Decimal,
    pub packing_height: Decimal,
    pub units_per_master_box: i32,
    pub packing_type: String,
    pub valid_from: DateTimeUtc,
    /// NULL while this version is the active one
    pub valid_to: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLine,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Volume of one master box in cubic meters.
    pub fn master_box_volume_m3(&self) -> Decimal {
        let cm3 = self.packing_length * self.packing_width * self.packing_height;
        cm3 / Decimal::new(1_000_000, 0)
    }
}
