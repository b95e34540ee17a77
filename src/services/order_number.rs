//! Daily order numbers of the form `MC-YYMMDD-NNN`.
//!
//! The sequence lives in `order_number_sequences`, one row per business day.
//! [`next_order_number`] advances it with a single upsert on the order
//! creation transaction, so concurrent creators serialize on the day row and a
//! rolled back order gives its number back. Sequences past 999 keep counting
//! and simply print with more digits.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, QueryFilter, QuerySelect,
    Statement, Value,
};
use tracing::{debug, error};

use crate::entities::order;
use crate::errors::ServiceError;

pub const ORDER_NUMBER_PREFIX: &str = "MC";
const DATE_FORMAT: &str = "%y%m%d";

/// `MC-YYMMDD` for the business day containing `now`
pub fn day_key(now: DateTime<Utc>, offset: FixedOffset) -> String {
    format!(
        "{ORDER_NUMBER_PREFIX}-{}",
        now.with_timezone(&offset).format(DATE_FORMAT)
    )
}

pub fn format_order_number(day_key: &str, sequence: u32) -> String {
    format!("{day_key}-{sequence:03}")
}

/// A parsed order number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderNumber {
    pub date: NaiveDate,
    pub sequence: u32,
}

impl OrderNumber {
    /// Parses `MC-YYMMDD-NNN`. The sequence must have at least three digits.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(3, '-');
        if parts.next()? != ORDER_NUMBER_PREFIX {
            return None;
        }
        let date_part = parts.next()?;
        let seq_part = parts.next()?;

        if date_part.len() != 6 || !date_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if seq_part.len() < 3 || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()?;
        let sequence = seq_part.parse().ok()?;
        Some(Self { date, sequence })
    }
}

fn upsert_sql(backend: DatabaseBackend) -> Option<&'static str> {
    match backend {
        DatabaseBackend::Postgres => Some(
            "INSERT INTO order_number_sequences (day_key, last_value, updated_at) \
             VALUES ($1, 1, $2) \
             ON CONFLICT (day_key) DO UPDATE \
             SET last_value = order_number_sequences.last_value + 1, updated_at = excluded.updated_at \
             RETURNING last_value",
        ),
        DatabaseBackend::Sqlite => Some(
            "INSERT INTO order_number_sequences (day_key, last_value, updated_at) \
             VALUES (?, 1, ?) \
             ON CONFLICT (day_key) DO UPDATE \
             SET last_value = order_number_sequences.last_value + 1, updated_at = excluded.updated_at \
             RETURNING last_value",
        ),
        DatabaseBackend::MySql => None,
    }
}

fn generation_failed(err: impl std::fmt::Display) -> ServiceError {
    error!(error = %err, "order number generation failed");
    ServiceError::OrderNumberGenerationFailed(err.to_string())
}

/// Allocates the next order number for the business day of `now`.
///
/// Must run on the transaction that inserts the order.
pub async fn next_order_number<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<String, ServiceError> {
    let key = day_key(now, offset);
    let backend = conn.get_database_backend();
    let sql = upsert_sql(backend)
        .ok_or_else(|| generation_failed(format!("unsupported backend {backend:?}")))?;

    let row = conn
        .query_one(Statement::from_sql_and_values(
            backend,
            sql,
            [Value::from(key.clone()), Value::from(now)],
        ))
        .await
        .map_err(generation_failed)?
        .ok_or_else(|| generation_failed("sequence upsert returned no row"))?;

    let mut sequence: i32 = row.try_get("", "last_value").map_err(generation_failed)?;

    if sequence == 1 {
        // First allocation for this day on this counter; orders may already exist
        if let Some(existing) = highest_existing_sequence(conn, &key).await? {
            let next = i32::try_from(existing)
                .ok()
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| generation_failed("daily sequence overflow"))?;
            seed_counter(conn, &key, next, now).await?;
            sequence = next;
        }
    }

    let sequence = u32::try_from(sequence).map_err(generation_failed)?;
    let number = format_order_number(&key, sequence);
    debug!(order_number = %number, "allocated order number");
    Ok(number)
}

async fn highest_existing_sequence<C: ConnectionTrait>(
    conn: &C,
    key: &str,
) -> Result<Option<u32>, ServiceError> {
    let numbers: Vec<String> = order::Entity::find()
        .select_only()
        .column(order::Column::OrderNumber)
        .filter(order::Column::OrderNumber.starts_with(format!("{key}-")))
        .into_tuple()
        .all(conn)
        .await
        .map_err(generation_failed)?;

    Ok(numbers
        .iter()
        .filter_map(|n| OrderNumber::parse(n))
        .map(|n| n.sequence)
        .max())
}

async fn seed_counter<C: ConnectionTrait>(
    conn: &C,
    key: &str,
    value: i32,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    use crate::entities::order_number_sequence::{Column, Entity};
    use sea_orm::sea_query::Expr;

    Entity::update_many()
        .col_expr(Column::LastValue, Expr::value(value))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::DayKey.eq(key))
        .exec(conn)
        .await
        .map_err(generation_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_db;
    use crate::entities::order::{OrderSource, OrderStatus};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
    use uuid::Uuid;

    fn jakarta() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    async fn insert_order(db: &DatabaseConnection, number: &str) {
        let now = Utc::now();
        order::ActiveModel {
            public_id: Set(Uuid::new_v4()),
            order_number: Set(number.to_string()),
            user_id: Set(None),
            customer_name: Set("Walk-in".into()),
            status: Set(OrderStatus::Pending),
            source: Set(OrderSource::Guest),
            subtotal: Set(Decimal::ZERO),
            tax: Set(Decimal::ZERO),
            total: Set(Decimal::ZERO),
            notes: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[test]
    fn day_key_uses_business_offset() {
        // 18:30 UTC on the 14th is already the 15th in Jakarta
        let now = Utc.with_ymd_and_hms(2025, 1, 14, 18, 30, 0).unwrap();
        assert_eq!(day_key(now, jakarta()), "MC-250115");
        assert_eq!(day_key(now, FixedOffset::east_opt(0).unwrap()), "MC-250114");
    }

    #[test]
    fn formats_with_three_digit_padding() {
        assert_eq!(format_order_number("MC-250115", 1), "MC-250115-001");
        assert_eq!(format_order_number("MC-250115", 42), "MC-250115-042");
        assert_eq!(format_order_number("MC-250115", 1000), "MC-250115-1000");
    }

    #[test]
    fn parses_valid_numbers_and_rejects_garbage() {
        let parsed = OrderNumber::parse("MC-250115-007").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(parsed.sequence, 7);
        assert_eq!(OrderNumber::parse("MC-250115-1000").unwrap().sequence, 1000);

        for bad in [
            "",
            "MC-250115",
            "XX-250115-001",
            "MC-251315-001",
            "MC-250115-01",
            "MC-2501-001",
            "MC-250115-0a1",
        ] {
            assert!(OrderNumber::parse(bad).is_none(), "{bad} should not parse");
        }
    }

    #[tokio::test]
    async fn sequence_starts_at_one_and_increments() {
        let db = memory_db().await;
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();

        assert_eq!(next_order_number(&db, now, jakarta()).await.unwrap(), "MC-250115-001");
        assert_eq!(next_order_number(&db, now, jakarta()).await.unwrap(), "MC-250115-002");

        let next_day = Utc.with_ymd_and_hms(2025, 1, 16, 3, 0, 0).unwrap();
        assert_eq!(next_order_number(&db, next_day, jakarta()).await.unwrap(), "MC-250116-001");
    }

    #[tokio::test]
    async fn fresh_counter_continues_after_existing_orders() {
        let db = memory_db().await;
        insert_order(&db, "MC-250115-009").await;
        insert_order(&db, "MC-250115-010").await;
        insert_order(&db, "MC-250114-050").await;

        let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
        assert_eq!(next_order_number(&db, now, jakarta()).await.unwrap(), "MC-250115-011");
        assert_eq!(next_order_number(&db, now, jakarta()).await.unwrap(), "MC-250115-012");
    }

    #[tokio::test]
    async fn rolled_back_allocation_is_released() {
        let db = memory_db().await;
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();

        let txn = db.begin().await.unwrap();
        assert_eq!(next_order_number(&txn, now, jakarta()).await.unwrap(), "MC-250115-001");
        txn.rollback().await.unwrap();

        assert_eq!(next_order_number(&db, now, jakarta()).await.unwrap(), "MC-250115-001");
    }
}
