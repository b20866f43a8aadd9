use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_catalog_tables::Materials;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PackagingRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PackagingRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PackagingRules::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(PackagingRules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(PackagingRules::AppliesTo)
                            .string_len(32)
                            .not_null()
                            .default("all"),
                    )
                    .col(
                        ColumnDef::new(PackagingRules::TargetProductIds)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PackagingRules::MaterialId).integer().not_null())
                    .col(
                        ColumnDef::new(PackagingRules::DeductionType)
                            .string_len(32)
                            .not_null()
                            .default("per_order"),
                    )
                    .col(
                        ColumnDef::new(PackagingRules::QuantitySingle)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PackagingRules::QuantityMultiple)
                            .decimal_len(16, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PackagingRules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_packaging_rules_material")
                            .from(PackagingRules::Table, PackagingRules::MaterialId)
                            .to(Materials::Table, Materials::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Append-only; no unique key on (order_id, material_id) because two
        // rules may draw on the same material for one order.
        manager
            .create_table(
                Table::create()
                    .table(PackagingDeductions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PackagingDeductions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PackagingDeductions::OrderId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PackagingDeductions::MaterialId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PackagingDeductions::QuantityDeducted)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PackagingDeductions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_packaging_deductions_order")
                    .table(PackagingDeductions::Table)
                    .col(PackagingDeductions::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PackagingDeductions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PackagingRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PackagingRules {
    Table,
    Id,
    Name,
    IsActive,
    AppliesTo,
    TargetProductIds,
    MaterialId,
    DeductionType,
    QuantitySingle,
    QuantityMultiple,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PackagingDeductions {
    Table,
    Id,
    OrderId,
    MaterialId,
    QuantityDeducted,
    CreatedAt,
}
