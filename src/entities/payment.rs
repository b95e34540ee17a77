use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One attempt to collect an order's total through the payment gateway.
///
/// `gross_amount` is copied from the order total when the attempt is created
/// and every later notification must match it exactly. The gateway status
/// fields are stored verbatim (see [`crate::services::payments::TransactionStatus`]
/// for the parsed view).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: i32,
    #[sea_orm(unique)]
    pub gateway_order_id: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub gross_amount: Decimal,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_status: Option<String>,
    pub transaction_time: Option<DateTimeUtc>,
    pub settlement_time: Option<DateTimeUtc>,
    pub fraud_status: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub status_message: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.updated_at = sea_orm::Set(Utc::now());
        Ok(self)
    }
}
