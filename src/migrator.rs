use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_catalog_tables::Migration),
            Box::new(m20240601_000002_create_order_tables::Migration),
            Box::new(m20240601_000003_create_batch_tables::Migration),
            Box::new(m20240601_000004_create_shipment_tables::Migration),
            Box::new(m20240601_000005_create_workflow_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240601_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null().unique_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Currency).string().not_null())
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PackagingVersions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PackagingVersions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PackagingVersions::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(PackagingVersions::NetWeight)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::GrossWeight)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::PackingLength)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::PackingWidth)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::PackingHeight)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::UnitsPerMasterBox)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::PackingType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackagingVersions::ValidFrom)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PackagingVersions::ValidTo).timestamp().null())
                        .col(
                            ColumnDef::new(PackagingVersions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_packaging_versions_product_valid_to")
                        .table(PackagingVersions::Table)
                        .col(PackagingVersions::ProductId)
                        .col(PackagingVersions::ValidTo)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerMargins::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerMargins::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerMargins::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(CustomerMargins::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(CustomerMargins::MarginPercent)
                                .decimal()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customer_margins_customer_product")
                        .table(CustomerMargins::Table)
                        .col(CustomerMargins::CustomerId)
                        .col(CustomerMargins::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CustomerMargins::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PackagingVersions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Sku,
        Name,
        Currency,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PackagingVersions {
        Table,
        Id,
        ProductId,
        NetWeight,
        GrossWeight,
        PackingLength,
        PackingWidth,
        PackingHeight,
        UnitsPerMasterBox,
        PackingType,
        ValidFrom,
        ValidTo,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum CustomerMargins {
        Table,
        Id,
        CustomerId,
        ProductId,
        MarginPercent,
    }
}

mod m20240601_000002_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::UsdConversionRate)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DownPaymentPercent)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::IsLocked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderLines::CostPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderLines::CostPriceUsd).decimal().not_null())
                        .col(ColumnDef::new(OrderLines::MarginPercent).decimal().null())
                        .col(ColumnDef::new(OrderLines::SalePrice).decimal().not_null())
                        .col(ColumnDef::new(OrderLines::PackagingVersionId).uuid().null())
                        .col(ColumnDef::new(OrderLines::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(OrderLines::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_lines_order_id")
                        .table(OrderLines::Table)
                        .col(OrderLines::OrderId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        CustomerId,
        UsdConversionRate,
        DownPaymentPercent,
        IsLocked,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderLines {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
        CostPrice,
        CostPriceUsd,
        MarginPercent,
        SalePrice,
        PackagingVersionId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_batch_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_batch_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Batches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Batches::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Batches::Code).string().not_null())
                        .col(ColumnDef::new(Batches::Status).string().not_null())
                        .col(ColumnDef::new(Batches::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Batches::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_order_id")
                        .table(Batches::Table)
                        .col(Batches::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BatchItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BatchItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BatchItems::BatchId).uuid().not_null())
                        .col(ColumnDef::new(BatchItems::OrderLineId).uuid().not_null())
                        .col(ColumnDef::new(BatchItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(BatchItems::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BatchItems::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // The allocation ledger aggregates rows per order line
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batch_items_order_line_id")
                        .table(BatchItems::Table)
                        .col(BatchItems::OrderLineId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batch_items_batch_id")
                        .table(BatchItems::Table)
                        .col(BatchItems::BatchId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BatchItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Batches {
        Table,
        Id,
        OrderId,
        Code,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BatchItems {
        Table,
        Id,
        BatchId,
        OrderLineId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000004_create_shipment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_shipment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Shipments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Shipments::Status).string().not_null())
                        .col(ColumnDef::new(Shipments::Pol).string().null())
                        .col(ColumnDef::new(Shipments::Pod).string().null())
                        .col(ColumnDef::new(Shipments::Signer).string().null())
                        .col(ColumnDef::new(Shipments::Leader).string().null())
                        .col(ColumnDef::new(Shipments::CustomerReference).string().null())
                        .col(ColumnDef::new(Shipments::LoadingDate).timestamp().null())
                        .col(ColumnDef::new(Shipments::ShippingDate).date().null())
                        .col(ColumnDef::new(Shipments::ConsPoint).string().null())
                        .col(ColumnDef::new(Shipments::City).string().null())
                        .col(ColumnDef::new(Shipments::Carrier).string().null())
                        .col(ColumnDef::new(Shipments::OriginAgent).string().null())
                        .col(ColumnDef::new(Shipments::DestinationAgent).string().null())
                        .col(ColumnDef::new(Shipments::AgentsNote).string().null())
                        .col(ColumnDef::new(Shipments::TrackingNumber).string().null())
                        .col(ColumnDef::new(Shipments::BlNumber).string().null())
                        .col(ColumnDef::new(Shipments::BlDate).timestamp().null())
                        .col(ColumnDef::new(Shipments::InspectionNo).string().null())
                        .col(ColumnDef::new(Shipments::EtaDestination).date().null())
                        .col(ColumnDef::new(Shipments::AtaDestination).date().null())
                        .col(ColumnDef::new(Shipments::Notes).string().null())
                        .col(ColumnDef::new(Shipments::ShippingDocument).string().null())
                        .col(ColumnDef::new(Shipments::BookingDocument).string().null())
                        .col(ColumnDef::new(Shipments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Shipments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_status")
                        .table(Shipments::Table)
                        .col(Shipments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentBatches::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentBatches::BatchId).uuid().not_null())
                        .col(
                            ColumnDef::new(ShipmentBatches::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // A batch may belong to at most one shipment
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_batches_batch_id")
                        .table(ShipmentBatches::Table)
                        .col(ShipmentBatches::BatchId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentBatches::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Shipments {
        Table,
        Id,
        Status,
        Pol,
        Pod,
        Signer,
        Leader,
        CustomerReference,
        LoadingDate,
        ShippingDate,
        ConsPoint,
        City,
        Carrier,
        OriginAgent,
        DestinationAgent,
        AgentsNote,
        TrackingNumber,
        BlNumber,
        BlDate,
        InspectionNo,
        EtaDestination,
        AtaDestination,
        Notes,
        ShippingDocument,
        BookingDocument,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ShipmentBatches {
        Table,
        Id,
        ShipmentId,
        BatchId,
        CreatedAt,
    }
}

mod m20240601_000005_create_workflow_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_workflow_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StageDefinitions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StageDefinitions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StageDefinitions::Name).string().not_null())
                        .col(ColumnDef::new(StageDefinitions::Description).string().null())
                        .col(ColumnDef::new(StageDefinitions::Phase).string().not_null())
                        .col(
                            ColumnDef::new(StageDefinitions::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StageDefinitions::AllowsAttachment)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StageDefinitions::RequiresAttachment)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(StageDefinitions::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StageDefinitions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StageDefinitions::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stage_definitions_phase_sort")
                        .table(StageDefinitions::Table)
                        .col(StageDefinitions::Phase)
                        .col(StageDefinitions::SortOrder)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StageRequirements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StageRequirements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StageRequirements::StageDefinitionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StageRequirements::FieldName)
                                .string()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stage_requirements_stage_field")
                        .table(StageRequirements::Table)
                        .col(StageRequirements::StageDefinitionId)
                        .col(StageRequirements::FieldName)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BatchStages::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BatchStages::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BatchStages::BatchId).uuid().not_null())
                        .col(
                            ColumnDef::new(BatchStages::StageDefinitionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BatchStages::EstimatedCompletion).date().null())
                        .col(ColumnDef::new(BatchStages::ActualCompletion).date().null())
                        .col(ColumnDef::new(BatchStages::Notes).string().null())
                        .col(ColumnDef::new(BatchStages::Attachment).string().null())
                        .col(
                            ColumnDef::new(BatchStages::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(BatchStages::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BatchStages::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batch_stages_batch_stage")
                        .table(BatchStages::Table)
                        .col(BatchStages::BatchId)
                        .col(BatchStages::StageDefinitionId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentStages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentStages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentStages::ShipmentId).uuid().not_null())
                        .col(
                            ColumnDef::new(ShipmentStages::StageDefinitionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentStages::EstimatedCompletion)
                                .date()
                                .null(),
                        )
                        .col(ColumnDef::new(ShipmentStages::ActualCompletion).date().null())
                        .col(ColumnDef::new(ShipmentStages::Notes).string().null())
                        .col(ColumnDef::new(ShipmentStages::Attachment).string().null())
                        .col(
                            ColumnDef::new(ShipmentStages::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ShipmentStages::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentStages::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_stages_shipment_stage")
                        .table(ShipmentStages::Table)
                        .col(ShipmentStages::ShipmentId)
                        .col(ShipmentStages::StageDefinitionId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentStages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BatchStages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StageRequirements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StageDefinitions::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum StageDefinitions {
        Table,
        Id,
        Name,
        Description,
        Phase,
        SortOrder,
        AllowsAttachment,
        RequiresAttachment,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StageRequirements {
        Table,
        Id,
        StageDefinitionId,
        FieldName,
    }

    #[derive(DeriveIden)]
    enum BatchStages {
        Table,
        Id,
        BatchId,
        StageDefinitionId,
        EstimatedCompletion,
        ActualCompletion,
        Notes,
        Attachment,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ShipmentStages {
        Table,
        Id,
        ShipmentId,
        StageDefinitionId,
        EstimatedCompletion,
        ActualCompletion,
        Notes,
        Attachment,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}
