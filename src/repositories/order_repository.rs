use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel, OrderSource,
    OrderStatus,
};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItem, Model as OrderItemModel,
};
use crate::entities::user::{self, Entity as User};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// An order together with its lines and, for member orders, its owner
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregate {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    pub user: Option<user::Model>,
}

/// Optional filters for order listings. `created_to` is exclusive.
#[derive(Debug, Clone, Default)]
pub struct OrderListFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub source: Option<OrderSource>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl OrderListFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(user_id) = self.user_id {
            condition = condition.add(Column::UserId.eq(user_id));
        }
        if let Some(status) = self.status {
            condition = condition.add(Column::Status.eq(status));
        }
        if let Some(source) = self.source {
            condition = condition.add(Column::Source.eq(source));
        }
        if let Some(from) = self.created_from {
            condition = condition.add(Column::CreatedAt.gte(from));
        }
        if let Some(to) = self.created_to {
            condition = condition.add(Column::CreatedAt.lt(to));
        }
        condition
    }
}

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_public_id(
        &self,
        public_id: Uuid,
    ) -> Result<Option<OrderAggregate>, ServiceError> {
        let order = Order::find()
            .filter(Column::PublicId.eq(public_id))
            .one(self.base.get_db())
            .await?;
        match order {
            Some(order) => Ok(Some(self.load_aggregate(order).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderAggregate>, ServiceError> {
        let order = Order::find()
            .filter(Column::OrderNumber.eq(order_number))
            .one(self.base.get_db())
            .await?;
        match order {
            Some(order) => Ok(Some(self.load_aggregate(order).await?)),
            None => Ok(None),
        }
    }

    /// Plain order row by public id, without lines
    pub async fn find_model_by_public_id<C: ConnectionTrait>(
        conn: &C,
        public_id: Uuid,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(Column::PublicId.eq(public_id))
            .one(conn)
            .await?)
    }

    pub async fn find_model_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find_by_id(id).one(conn).await?)
    }

    /// Newest first. `page` is 1-based.
    pub async fn list(
        &self,
        filter: &OrderListFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderAggregate>, u64), ServiceError> {
        let db = self.base.get_db();
        let paginator = Order::find()
            .filter(filter.condition())
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .paginate(db, limit);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        let aggregates = self.load_aggregates(orders).await?;

        Ok((aggregates, total))
    }

    /// Inserts the order and its lines on the given connection, normally the
    /// order creation transaction.
    pub async fn insert_with_items<C: ConnectionTrait>(
        conn: &C,
        order: OrderActiveModel,
        items: Vec<OrderItemActiveModel>,
    ) -> Result<(OrderModel, Vec<OrderItemModel>), ServiceError> {
        let order = order.insert(conn).await?;

        let mut inserted = Vec::with_capacity(items.len());
        for mut item in items {
            item.order_id = Set(order.id);
            inserted.push(item.insert(conn).await?);
        }

        Ok((order, inserted))
    }

    async fn load_aggregate(&self, order: OrderModel) -> Result<OrderAggregate, ServiceError> {
        let db = self.base.get_db();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::LineNumber)
            .all(db)
            .await?;
        let user = match order.user_id {
            Some(user_id) => User::find_by_id(user_id).one(db).await?,
            None => None,
        };
        Ok(OrderAggregate { order, items, user })
    }

    async fn load_aggregates(
        &self,
        orders: Vec<OrderModel>,
    ) -> Result<Vec<OrderAggregate>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.base.get_db();

        let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<i32, Vec<OrderItemModel>> = HashMap::new();
        for item in OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::LineNumber)
            .all(db)
            .await?
        {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        let user_ids: Vec<Uuid> = orders.iter().filter_map(|o| o.user_id).collect();
        let users: HashMap<Uuid, user::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            User::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(orders
            .into_iter()
            .map(|order| OrderAggregate {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                user: order.user_id.and_then(|id| users.get(&id).cloned()),
                order,
            })
            .collect())
    }
}
