use sea_orm_migration::prelude::*;

/// One row per calendar day, advanced atomically while an order is created.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrderNumberSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderNumberSequences::DayKey)
                            .string_len(16)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderNumberSequences::LastValue)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderNumberSequences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderNumberSequences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OrderNumberSequences {
    Table,
    DayKey,
    LastValue,
    UpdatedAt,
}
