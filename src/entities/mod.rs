//! SeaORM entities for the fulfillment engine schema.

pub mod batch;
pub mod batch_item;
pub mod batch_stage;
pub mod customer_margin;
pub mod order;
pub mod order_line;
pub mod packaging_version;
pub mod product;
pub mod shipment;
pub mod shipment_batch;
pub mod shipment_stage;
pub mod stage_definition;
pub mod stage_requirement;

pub use batch::Entity as Batch;
pub use batch_item::Entity as BatchItem;
pub use batch_stage::Entity as BatchStage;
pub use customer_margin::Entity as CustomerMargin;
pub use order::Entity as Order;
pub use order_line::Entity as OrderLine;
pub use packaging_version::Entity as PackagingVersion;
pub use product::Entity as Product;
pub use shipment::Entity as Shipment;
pub use shipment_batch::Entity as ShipmentBatch;
pub use shipment_stage::Entity as ShipmentStage;
pub use stage_definition::Entity as StageDefinition;
pub use stage_requirement::Entity as StageRequirement;
