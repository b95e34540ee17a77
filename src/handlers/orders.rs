use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use super::json_body;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::orders::{
    CreateOrderRequest, ListOrdersQuery, OrderResponse, Pagination, UpdateOrderStatusRequest,
};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

/// Place an order without an account
#[utoipa::path(
    post,
    path = "/api/v1/orders/guest",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid cart", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product or customization", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
#[instrument(skip_all)]
pub async fn create_guest_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Created<OrderResponse> {
    let request = json_body(payload)?;
    let order = state.services.orders.create_guest_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Place an order as the authenticated member or kiosk
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role cannot place orders", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Created<OrderResponse> {
    let request = json_body(payload)?;
    let order = state.services.orders.create_order(&user, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Track an order by its public id
#[utoipa::path(
    get,
    path = "/api/v1/orders/track/{id}",
    params(("id" = Uuid, Path, description = "Public order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn track_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_by_public_id(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Fetch one order. Members only see their own orders.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Public order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_for_user(&user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Orders placed by the caller, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/me",
    params(Pagination),
    responses(
        (status = 200, description = "Caller's orders", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> ApiResult<PaginatedResponse<OrderResponse>> {
    let page = state.services.orders.list_my_orders(&user, pagination).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Staff listing with optional filters
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role cannot list orders", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<PaginatedResponse<OrderResponse>> {
    let page = state.services.orders.list_all_orders(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Look an order up by its `MC-YYMMDD-NNN` number
#[utoipa::path(
    get,
    path = "/api/v1/orders/number/{number}",
    params(("number" = String, Path, description = "Order number", example = "MC-250115-001")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_by_order_number(&number).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Advance an order through the preparation workflow
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Public order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
#[instrument(skip_all, fields(order_id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let request = json_body(payload)?;
    let order = state.services.orders.update_status(id, request.status).await?;
    Ok(Json(ApiResponse::success(order)))
}
