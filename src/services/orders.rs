use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthUser, Capability, Role};
use crate::entities::order::{self, OrderSource, OrderStatus};
use crate::entities::{order_item, user};
use crate::errors::ServiceError;
use crate::repositories::{
    CatalogLookup, OrderAggregate, OrderListFilter, OrderRepository, UserRepository,
};
use crate::services::order_lifecycle::{self, TransitionPolicy};
use crate::services::order_number;
use crate::services::pricing::{CartItem, CartPricer, CustomizationSnapshot, PricedLine};
use crate::PaginatedResponse;

pub const MY_ORDERS_DEFAULT_LIMIT: u64 = 10;

/// Request body for placing an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 2, max = 255))]
    pub customer_name: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    #[validate]
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Filters for the staff order listing. Dates are business-day dates, both inclusive.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub source: Option<OrderSource>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    pub customizations: Vec<CustomizationSnapshot>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderUserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    /// Public order identifier
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub order_source: OrderSource,
    #[schema(value_type = String, example = "90000")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "9000")]
    pub tax: Decimal,
    #[schema(value_type = String, example = "99000")]
    pub total: Decimal,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub user: Option<OrderUserResponse>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<OrderAggregate> for OrderResponse {
    fn from(aggregate: OrderAggregate) -> Self {
        let OrderAggregate { order, items, user } = aggregate;
        Self {
            id: order.public_id,
            order_number: order.order_number,
            customer_name: order.customer_name,
            status: order.status,
            order_source: order.source,
            subtotal: order.subtotal,
            tax: order.tax,
            total: order.total,
            notes: order.notes,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
            user: user.map(OrderUserResponse::from),
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(item: order_item::Model) -> Self {
        // Rows are written by this service; a snapshot that fails to decode is shown as empty
        let customizations = serde_json::from_value(item.customizations).unwrap_or_default();
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
            customizations,
            notes: item.notes,
        }
    }
}

/// Who is placing an order
#[derive(Debug, Clone, Copy)]
enum Placement {
    Guest,
    Account { user_id: Uuid, role: Role },
}

impl Placement {
    fn source(self) -> OrderSource {
        match self {
            Placement::Guest => OrderSource::Guest,
            Placement::Account { role: Role::Kiosk, .. } => OrderSource::Kiosk,
            Placement::Account { .. } => OrderSource::Member,
        }
    }

    fn user_id(self) -> Option<Uuid> {
        match self {
            Placement::Guest => None,
            Placement::Account { user_id, .. } => Some(user_id),
        }
    }
}

/// Order placement, lookup and staff status management
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    orders: OrderRepository,
    users: UserRepository,
    catalog: Arc<dyn CatalogLookup>,
    pricer: CartPricer,
    business_offset: FixedOffset,
    default_page_size: u64,
    max_page_size: u64,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<dyn CatalogLookup>,
        pricer: CartPricer,
        business_offset: FixedOffset,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            users: UserRepository::new(db.clone()),
            db,
            catalog,
            pricer,
            business_offset,
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }

    /// Places an order for an authenticated account
    #[instrument(skip(self, request), fields(user_id = %user.user_id))]
    pub async fn create_order(
        &self,
        user: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        if self.users.find_by_id(user.user_id).await?.is_none() {
            return Err(ServiceError::UserNotFound(user.user_id));
        }
        self.place(
            Placement::Account {
                user_id: user.user_id,
                role: user.role,
            },
            request,
        )
        .await
    }

    /// Places an anonymous order
    #[instrument(skip(self, request))]
    pub async fn create_guest_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        self.place(Placement::Guest, request).await
    }

    async fn place(
        &self,
        placement: Placement,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let priced = self.pricer.price(self.catalog.as_ref(), &request.items).await?;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let order_number = order_number::next_order_number(&txn, now, self.business_offset).await?;

        let new_order = order::ActiveModel {
            public_id: Set(Uuid::new_v4()),
            order_number: Set(order_number.clone()),
            user_id: Set(placement.user_id()),
            customer_name: Set(request.customer_name.trim().to_string()),
            status: Set(OrderStatus::Pending),
            source: Set(placement.source()),
            subtotal: Set(priced.totals.subtotal),
            tax: Set(priced.totals.tax),
            total: Set(priced.totals.total),
            notes: Set(request.notes.clone()),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let items = priced
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| item_model(line, index, now))
            .collect::<Result<Vec<_>, _>>()?;

        let (order, items) = OrderRepository::insert_with_items(&txn, new_order, items).await?;
        txn.commit().await?;

        info!(
            order_number = %order.order_number,
            source = %order.source,
            total = %order.total,
            items = items.len(),
            "order created"
        );

        let user = match order.user_id {
            Some(id) => self.users.find_by_id(id).await?,
            None => None,
        };
        Ok(OrderAggregate { order, items, user }.into())
    }

    pub async fn get_by_public_id(&self, public_id: Uuid) -> Result<OrderResponse, ServiceError> {
        self.orders
            .find_by_public_id(public_id)
            .await?
            .map(OrderResponse::from)
            .ok_or_else(|| ServiceError::OrderNotFound(public_id.to_string()))
    }

    /// Single order for an authenticated caller: owners, or staff allowed to view any order
    pub async fn get_for_user(
        &self,
        user: &AuthUser,
        public_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let aggregate = self
            .orders
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(public_id.to_string()))?;

        let owns = aggregate.order.user_id == Some(user.user_id);
        if !owns && !user.can(Capability::ViewAnyOrder) {
            // Not revealing that someone else's order exists
            return Err(ServiceError::OrderNotFound(public_id.to_string()));
        }
        Ok(aggregate.into())
    }

    pub async fn get_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<OrderResponse, ServiceError> {
        self.orders
            .find_by_order_number(order_number)
            .await?
            .map(OrderResponse::from)
            .ok_or_else(|| ServiceError::OrderNotFound(order_number.to_string()))
    }

    pub async fn list_my_orders(
        &self,
        user: &AuthUser,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<OrderResponse>, ServiceError> {
        let filter = OrderListFilter {
            user_id: Some(user.user_id),
            ..Default::default()
        };
        let (page, limit) =
            self.page_window(pagination.page, pagination.limit, MY_ORDERS_DEFAULT_LIMIT);
        self.list(&filter, page, limit).await
    }

    pub async fn list_all_orders(
        &self,
        query: ListOrdersQuery,
    ) -> Result<PaginatedResponse<OrderResponse>, ServiceError> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if end < start {
                return Err(ServiceError::validation("end_date must not be before start_date"));
            }
        }

        let filter = OrderListFilter {
            user_id: None,
            status: query.status,
            source: query.source,
            created_from: query.start_date.map(|d| self.start_of_day(d)).transpose()?,
            created_to: query
                .end_date
                .map(|d| {
                    d.checked_add_days(Days::new(1))
                        .ok_or_else(|| ServiceError::validation("end_date is out of range"))
                        .and_then(|next| self.start_of_day(next))
                })
                .transpose()?,
        };
        let (page, limit) = self.page_window(query.page, query.limit, self.default_page_size);
        self.list(&filter, page, limit).await
    }

    /// Staff status change, strict successor rules
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        public_id: Uuid,
        target: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        order_lifecycle::transition(self.db.as_ref(), public_id, target, TransitionPolicy::Strict)
            .await?;
        self.get_by_public_id(public_id).await
    }

    async fn list(
        &self,
        filter: &OrderListFilter,
        page: u64,
        limit: u64,
    ) -> Result<PaginatedResponse<OrderResponse>, ServiceError> {
        let (aggregates, total) = self.orders.list(filter, page, limit).await?;
        Ok(PaginatedResponse {
            items: aggregates.into_iter().map(OrderResponse::from).collect(),
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    fn page_window(&self, page: Option<u64>, limit: Option<u64>, default_limit: u64) -> (u64, u64) {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(self.max_page_size);
        (page, limit)
    }

    fn start_of_day(&self, date: NaiveDate) -> Result<DateTime<Utc>, ServiceError> {
        self.business_offset
            .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ServiceError::validation(format!("invalid date {date}")))
    }
}

fn item_model(
    line: &PricedLine,
    index: usize,
    now: DateTime<Utc>,
) -> Result<order_item::ActiveModel, ServiceError> {
    let customizations = serde_json::to_value(&line.customizations)
        .map_err(|e| ServiceError::InternalError(format!("customization snapshot: {e}")))?;

    Ok(order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        line_number: Set(index as i32 + 1),
        product_id: Set(Some(line.product_id)),
        product_name: Set(line.product_name.clone()),
        quantity: Set(line.quantity),
        unit_price: Set(line.unit_price),
        subtotal: Set(line.subtotal),
        customizations: Set(customizations),
        notes: Set(line.notes.clone()),
        created_at: Set(now),
        ..Default::default()
    })
}

impl From<user::Model> for OrderUserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pricing::CustomizationChoice;

    fn request(name: &str, quantity: i32) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: name.into(),
            notes: None,
            items: vec![CartItem {
                product_id: Uuid::new_v4(),
                quantity,
                notes: None,
                customizations: vec![CustomizationChoice {
                    customization_id: Uuid::new_v4(),
                    option_name: None,
                }],
            }],
        }
    }

    #[test]
    fn request_validation_covers_name_items_and_quantity() {
        assert!(request("Rina", 2).validate().is_ok());

        let err: ServiceError = request("R", 2).validate().unwrap_err().into();
        assert!(matches!(&err, ServiceError::ValidationError { fields: Some(f), .. } if f.contains_key("customer_name")));

        let err: ServiceError = request("Rina", 0).validate().unwrap_err().into();
        assert!(matches!(&err, ServiceError::ValidationError { fields: Some(f), .. } if f.contains_key("items[0].quantity")));

        let mut empty = request("Rina", 1);
        empty.items.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn source_follows_placement() {
        assert_eq!(Placement::Guest.source(), OrderSource::Guest);
        let kiosk = Placement::Account {
            user_id: Uuid::new_v4(),
            role: Role::Kiosk,
        };
        assert_eq!(kiosk.source(), OrderSource::Kiosk);
        let member = Placement::Account {
            user_id: Uuid::new_v4(),
            role: Role::Member,
        };
        assert_eq!(member.source(), OrderSource::Member);
        assert!(member.user_id().is_some());
        assert!(Placement::Guest.user_id().is_none());
    }
}
