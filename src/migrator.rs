#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_crops_table::Migration),
            Box::new(m20240301_000003_create_orders_table::Migration),
            Box::new(m20240301_000004_create_deliveries_table::Migration),
            Box::new(m20240301_000005_create_delivery_requests_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        Role,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_crops_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_crops_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Crops::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Crops::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Crops::Name).string().not_null())
                        .col(ColumnDef::new(Crops::Description).text())
                        .col(
                            ColumnDef::new(Crops::PricePerUnit)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Crops::AvailableQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Crops::Unit).string().not_null())
                        .col(ColumnDef::new(Crops::ImageUrl).string())
                        .col(ColumnDef::new(Crops::FarmerId).uuid().not_null())
                        .col(
                            ColumnDef::new(Crops::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Crops::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_crops_farmer")
                                .from(Crops::Table, Crops::FarmerId)
                                .to(Users::Table, Users::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Crops::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Crops {
        Table,
        Id,
        Name,
        Description,
        PricePerUnit,
        AvailableQuantity,
        Unit,
        ImageUrl,
        FarmerId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }
}

mod m20240301_000003_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_orders_table"
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
                        .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::DeliveryAddress).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentProof).string())
                        .col(ColumnDef::new(Orders::BuyerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CropId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::AdminPayment)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DriverPayment)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::FarmerPayment)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_buyer")
                                .from(Orders::Table, Orders::BuyerId)
                                .to(Users::Table, Users::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_crop")
                                .from(Orders::Table, Orders::CropId)
                                .to(Crops::Table, Crops::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_buyer")
                        .table(Orders::Table)
                        .col(Orders::BuyerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        Quantity,
        TotalPrice,
        Status,
        DeliveryAddress,
        PaymentProof,
        BuyerId,
        CropId,
        AdminPayment,
        DriverPayment,
        FarmerPayment,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Crops {
        Table,
        Id,
    }
}

mod m20240301_000004_create_deliveries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_deliveries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Deliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Deliveries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Deliveries::PickupDate).timestamp_with_time_zone())
                        .col(ColumnDef::new(Deliveries::DeliveryDate).timestamp_with_time_zone())
                        .col(ColumnDef::new(Deliveries::DriverId).uuid())
                        .col(
                            ColumnDef::new(Deliveries::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Deliveries::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_deliveries_order")
                                .from(Deliveries::Table, Deliveries::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_deliveries_driver")
                                .from(Deliveries::Table, Deliveries::DriverId)
                                .to(Users::Table, Users::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Deliveries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Deliveries {
        Table,
        Id,
        Status,
        PickupDate,
        DeliveryDate,
        DriverId,
        OrderId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }
}

mod m20240301_000005_create_delivery_requests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_delivery_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRequests::DeliveryId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryRequests::DriverId).uuid().not_null())
                        .col(
                            ColumnDef::new(DeliveryRequests::CustomFee)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRequests::Message).text())
                        .col(
                            ColumnDef::new(DeliveryRequests::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRequests::AdminCommissionPaid)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(DeliveryRequests::PaymentProof).string())
                        .col(
                            ColumnDef::new(DeliveryRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRequests::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_requests_delivery")
                                .from(DeliveryRequests::Table, DeliveryRequests::DeliveryId)
                                .to(Deliveries::Table, Deliveries::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_requests_driver")
                                .from(DeliveryRequests::Table, DeliveryRequests::DriverId)
                                .to(Users::Table, Users::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // One bid per driver per delivery, enforced at the database so the
            // pre-insert check cannot race.
            manager
                .create_index(
                    Index::create()
                        .name("uq_delivery_requests_delivery_driver")
                        .table(DeliveryRequests::Table)
                        .col(DeliveryRequests::DeliveryId)
                        .col(DeliveryRequests::DriverId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DeliveryRequests {
        Table,
        Id,
        DeliveryId,
        DriverId,
        CustomFee,
        Message,
        Status,
        AdminCommissionPaid,
        PaymentProof,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Deliveries {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }
}
