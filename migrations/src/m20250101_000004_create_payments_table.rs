use sea_orm_migration::prelude::*;

use super::m20250101_000003_create_orders_tables::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Payments::OrderId).integer().not_null())
                    .col(
                        ColumnDef::new(Payments::GatewayOrderId)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Payments::GrossAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::TransactionId).string_len(100).null())
                    .col(ColumnDef::new(Payments::PaymentType).string_len(50).null())
                    .col(
                        ColumnDef::new(Payments::TransactionStatus)
                            .string_len(50)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Payments::TransactionTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Payments::SettlementTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Payments::FraudStatus).string_len(50).null())
                    .col(ColumnDef::new(Payments::StatusMessage).text().null())
                    .col(ColumnDef::new(Payments::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_order_id")
                            .from(Payments::Table, Payments::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_order_id")
                    .table(Payments::Table)
                    .col(Payments::OrderId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Payments {
    Table,
    Id,
    OrderId,
    GatewayOrderId,
    GrossAmount,
    TransactionId,
    PaymentType,
    TransactionStatus,
    TransactionTime,
    SettlementTime,
    FraudStatus,
    StatusMessage,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
