pub mod health;
pub mod orders;
pub mod payments;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::services::{orders::OrderService, payments::PaymentService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

/// Unwraps a JSON body, reporting malformed input as a validation error
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::validation(rejection.body_text()))
}
