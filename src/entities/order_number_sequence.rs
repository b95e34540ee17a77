use sea_orm::entity::prelude::*;

/// Per-day order number counter, keyed by the `MC-YYMMDD` prefix.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "order_number_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub day_key: String,
    pub last_value: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
