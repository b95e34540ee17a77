//! Order status state machine.
//!
//! `pending -> {preparing, cancelled}`, `preparing -> ready`,
//! `ready -> completed`. Completed and cancelled orders are final.

use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::order::{self, OrderStatus};
use crate::errors::ServiceError;
use crate::repositories::OrderRepository;

impl OrderStatus {
    pub fn successors(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Preparing, OrderStatus::Cancelled],
            OrderStatus::Preparing => &[OrderStatus::Ready],
            OrderStatus::Ready => &[OrderStatus::Completed],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.successors().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Whether an order in this status has already passed through `target`
    pub fn has_reached(self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        match target {
            Pending => self == Pending,
            Preparing => matches!(self, Preparing | Ready | Completed),
            Ready => matches!(self, Ready | Completed),
            Completed => self == Completed,
            Cancelled => self == Cancelled,
        }
    }
}

/// How a transition treats a target the order has already reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Only listed successors are accepted
    Strict,
    /// Redelivered gateway notifications: an already reached target is a no-op
    Reconcile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(order::Model),
    Unchanged(order::Model),
}

impl TransitionOutcome {
    pub fn into_order(self) -> order::Model {
        match self {
            TransitionOutcome::Applied(order) | TransitionOutcome::Unchanged(order) => order,
        }
    }
}

/// Moves an order to `target`, reading its current status from the store.
///
/// The update is conditional on the status that was read; losing a race with
/// another writer yields [`ServiceError::ConcurrentModification`].
#[instrument(skip(conn), fields(target = %target))]
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    public_id: Uuid,
    target: OrderStatus,
    policy: TransitionPolicy,
) -> Result<TransitionOutcome, ServiceError> {
    let current = OrderRepository::find_model_by_public_id(conn, public_id)
        .await?
        .ok_or_else(|| ServiceError::OrderNotFound(public_id.to_string()))?;
    let from = current.status;

    if !from.can_transition_to(target) {
        if policy == TransitionPolicy::Reconcile && from.has_reached(target) {
            info!(order_number = %current.order_number, status = %from, "order already reached target status");
            return Ok(TransitionOutcome::Unchanged(current));
        }
        return Err(ServiceError::InvalidStatusTransition { from, to: target });
    }

    let now = Utc::now();
    let mut update = order::Entity::update_many()
        .col_expr(order::Column::Status, Expr::value(target))
        .col_expr(order::Column::UpdatedAt, Expr::value(now));
    if target == OrderStatus::Completed {
        update = update.col_expr(order::Column::CompletedAt, Expr::value(Some(now)));
    }

    let result = update
        .filter(order::Column::Id.eq(current.id))
        .filter(order::Column::Status.eq(from))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(public_id));
    }

    let updated = order::Entity::find_by_id(current.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::OrderNotFound(public_id.to_string()))?;

    info!(
        order_number = %updated.order_number,
        from = %from,
        to = %target,
        "order status changed"
    );

    Ok(TransitionOutcome::Applied(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_db;
    use crate::entities::order::{OrderSource, OrderStatus::*};
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

    #[rstest]
    #[case(Pending, Preparing, true)]
    #[case(Pending, Cancelled, true)]
    #[case(Preparing, Ready, true)]
    #[case(Ready, Completed, true)]
    #[case(Pending, Ready, false)]
    #[case(Pending, Completed, false)]
    #[case(Pending, Pending, false)]
    #[case(Preparing, Cancelled, false)]
    #[case(Preparing, Preparing, false)]
    #[case(Ready, Preparing, false)]
    #[case(Completed, Ready, false)]
    #[case(Completed, Cancelled, false)]
    #[case(Cancelled, Pending, false)]
    #[case(Cancelled, Preparing, false)]
    fn transition_table(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Preparing.is_terminal());
        assert!(!Ready.is_terminal());
    }

    #[test]
    fn reached_follows_the_happy_path() {
        assert!(Ready.has_reached(Preparing));
        assert!(Completed.has_reached(Preparing));
        assert!(!Cancelled.has_reached(Preparing));
        assert!(!Pending.has_reached(Preparing));
        assert!(Cancelled.has_reached(Cancelled));
        assert!(!Completed.has_reached(Cancelled));
    }

    async fn seed_order(db: &DatabaseConnection, status: OrderStatus) -> order::Model {
        let now = Utc::now();
        order::ActiveModel {
            public_id: Set(Uuid::new_v4()),
            order_number: Set(format!("MC-250115-{:03}", now.timestamp_subsec_micros() % 1000)),
            user_id: Set(None),
            customer_name: Set("Dewi".into()),
            status: Set(status),
            source: Set(OrderSource::Guest),
            subtotal: Set(dec!(45000)),
            tax: Set(dec!(4500)),
            total: Set(dec!(49500)),
            notes: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn walks_the_happy_path_and_stamps_completion_once() {
        let db = memory_db().await;
        let order = seed_order(&db, Pending).await;

        for target in [Preparing, Ready] {
            let updated = transition(&db, order.public_id, target, TransitionPolicy::Strict)
                .await
                .unwrap()
                .into_order();
            assert_eq!(updated.status, target);
            assert!(updated.completed_at.is_none());
        }

        let outcome = transition(&db, order.public_id, Completed, TransitionPolicy::Strict)
            .await
            .unwrap();
        let completed = assert_matches!(outcome, TransitionOutcome::Applied(o) => o);
        assert_eq!(completed.status, Completed);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn skipping_a_step_is_rejected_without_mutation() {
        let db = memory_db().await;
        let order = seed_order(&db, Pending).await;

        let err = transition(&db, order.public_id, Ready, TransitionPolicy::Strict)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidStatusTransition { from: Pending, to: Ready });

        let reloaded = order::Entity::find_by_id(order.id).one(&db).await.unwrap().unwrap();
        assert_eq!(reloaded.status, Pending);
    }

    #[tokio::test]
    async fn repeat_target_is_strictly_rejected_but_reconciled_as_noop() {
        let db = memory_db().await;
        let order = seed_order(&db, Preparing).await;

        assert_matches!(
            transition(&db, order.public_id, Preparing, TransitionPolicy::Strict).await,
            Err(ServiceError::InvalidStatusTransition { .. })
        );
        assert_matches!(
            transition(&db, order.public_id, Preparing, TransitionPolicy::Reconcile).await,
            Ok(TransitionOutcome::Unchanged(o)) if o.status == Preparing
        );
    }

    #[tokio::test]
    async fn reconcile_still_rejects_leaving_a_final_state() {
        let db = memory_db().await;
        let order = seed_order(&db, Cancelled).await;

        assert_matches!(
            transition(&db, order.public_id, Preparing, TransitionPolicy::Reconcile).await,
            Err(ServiceError::InvalidStatusTransition { from: Cancelled, to: Preparing })
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let db = memory_db().await;
        assert_matches!(
            transition(&db, Uuid::new_v4(), Preparing, TransitionPolicy::Strict).await,
            Err(ServiceError::OrderNotFound(_))
        );
    }
}
