//! Cafe ordering API library
//!
//! Cart pricing, daily order numbering, the order preparation workflow and
//! payment gateway reconciliation, served over axum.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod middleware_helpers;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod telemetry;

use axum::{
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService, Capability};
use crate::gateway::PaymentGateway;
use crate::handlers::AppServices;
use crate::repositories::CatalogRepository;
use crate::services::{orders::OrderService, payments::PaymentService, pricing::CartPricer};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires services from configuration around an open pool and a gateway client
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let offset = config.business_offset();
        let catalog = Arc::new(CatalogRepository::new(db.clone()));

        let orders = OrderService::new(
            db.clone(),
            catalog,
            CartPricer::new(config.tax_rate()),
            offset,
        )
        .with_page_sizes(config.api_default_page_size, config.api_max_page_size);

        let payments = PaymentService::new(
            db.clone(),
            gateway,
            config.midtrans_server_key.clone(),
            offset,
        );

        let auth = Arc::new(AuthService::new(AuthConfig::from_app_config(&config)));

        Self {
            db,
            config,
            services: AppServices {
                orders: Arc::new(orders),
                payments: Arc::new(payments),
            },
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: telemetry::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{orders, payments};

    let public = Router::new()
        .route("/orders/guest", post(orders::create_guest_order))
        .route("/orders/track/:id", get(orders::track_order))
        .route("/orders/:id/payment", post(payments::create_payment_token))
        .route("/webhooks/midtrans", post(payments::midtrans_notification));

    let place = Router::new()
        .route("/orders", post(orders::create_order))
        .with_capability(Capability::PlaceOrder);

    let own = Router::new()
        .route("/orders/me", get(orders::list_my_orders))
        .with_capability(Capability::ViewOwnOrders);

    // Ownership is checked by the service
    let single = Router::new()
        .route("/orders/:id", get(orders::get_order))
        .with_auth();

    let list_all = Router::new()
        .route("/orders", get(orders::list_orders))
        .with_capability(Capability::ListAllOrders);

    let by_number = Router::new()
        .route("/orders/number/:number", get(orders::get_order_by_number))
        .with_capability(Capability::LookupOrderNumber);

    let manage = Router::new()
        .route("/orders/:id/status", put(orders::update_order_status))
        .with_capability(Capability::ManageOrderStatus);

    public
        .merge(place)
        .merge(own)
        .merge(single)
        .merge(list_all)
        .merge(by_number)
        .merge(manage)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(origins))
    }
}

/// Full application router with middleware
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(Extension(state.auth.clone()))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(telemetry::RequestSpanMaker))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            telemetry::scope_request_id(telemetry::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}
