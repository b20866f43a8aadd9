use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CashflowTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashflowTransactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashflowTransactions::Kind)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashflowTransactions::Category)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashflowTransactions::Amount)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashflowTransactions::Note).text().null())
                    .col(
                        ColumnDef::new(CashflowTransactions::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cashflow_transactions_occurred_at")
                    .table(CashflowTransactions::Table)
                    .col(CashflowTransactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CashflowTransactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CashflowTransactions {
    Table,
    Id,
    Kind,
    Category,
    Amount,
    Note,
    OccurredAt,
}
