use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::OrderStatus;

fn current_request_id() -> Option<String> {
    crate::telemetry::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every endpoint except the payment webhook
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": "Bad Request",
    "message": "Product Matcha Latte is not available",
    "request_id": "req-abc123xyz",
    "timestamp": "2025-01-15T10:30:00+00:00"
}))]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Field-level validation failures, keyed by field name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Vec<String>>>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Customization {0} not found")]
    CustomizationNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Payment for gateway order {0} not found")]
    PaymentNotFound(String),

    #[error("Product {0} is not available")]
    ProductNotAvailable(String),

    #[error("Product {0} is not customizable")]
    ProductNotCustomizable(String),

    #[error("Invalid customization: {0}")]
    InvalidCustomization(String),

    #[error("Invalid unit price: {0}")]
    InvalidUnitPrice(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order {0} must be pending to create a payment")]
    OrderNotPending(String),

    #[error("Order {0} already has a settled payment")]
    PaymentAlreadyExists(String),

    #[error("Invalid notification signature")]
    InvalidSignature,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Failed to generate order number: {0}")]
    OrderNumberGenerationFailed(String),

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        fields: Option<BTreeMap<String, Vec<String>>>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Concurrent modification for order {0}")]
    ConcurrentModification(Uuid),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let fields = flatten_validation_errors(&err);
        ServiceError::ValidationError {
            message: "Validation failed".to_string(),
            fields: Some(fields),
        }
    }
}

impl From<crate::gateway::GatewayError> for ServiceError {
    fn from(err: crate::gateway::GatewayError) -> Self {
        ServiceError::GatewayError(err.to_string())
    }
}

/// Collapses nested `validator` errors into `path -> messages`, e.g. `items[0].quantity`.
fn flatten_validation_errors(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    use validator::ValidationErrorsKind;

    fn walk(
        prefix: &str,
        errors: &validator::ValidationErrors,
        out: &mut BTreeMap<String, Vec<String>>,
    ) {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(list) => {
                    let messages = list
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect::<Vec<_>>();
                    out.entry(path).or_default().extend(messages);
                }
                ValidationErrorsKind::Struct(inner) => walk(&path, inner, out),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        walk(&format!("{path}[{index}]"), inner, out);
                    }
                }
            }
        }
    }

    let mut out = BTreeMap::new();
    walk("", errors, &mut out);
    out
}

impl ServiceError {
    /// Shorthand for a validation failure without field detail.
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::ValidationError {
            message: message.into(),
            fields: None,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_)
            | Self::OrderNumberGenerationFailed(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OrderNotFound(_)
            | Self::ProductNotFound(_)
            | Self::CustomizationNotFound(_)
            | Self::UserNotFound(_)
            | Self::PaymentNotFound(_) => StatusCode::NOT_FOUND,
            Self::ProductNotAvailable(_)
            | Self::ProductNotCustomizable(_)
            | Self::InvalidCustomization(_)
            | Self::InvalidUnitPrice(_)
            | Self::InvalidStatusTransition { .. }
            | Self::OrderNotPending(_)
            | Self::InvalidAmount(_)
            | Self::ValidationError { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidSignature | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PaymentAlreadyExists(_) | Self::ConcurrentModification(_) => {
                StatusCode::CONFLICT
            }
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::OrderNumberGenerationFailed(_) => "Failed to generate order number".to_string(),
            Self::GatewayError(_) => "Payment gateway unavailable".to_string(),
            Self::ValidationError { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let details = match &self {
            Self::ValidationError { fields, .. } => fields.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use validator::Validate;

    #[rstest]
    #[case(ServiceError::OrderNotFound("MC-250115-001".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::PaymentNotFound("MC-250115-001-1736900000".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::ProductNotAvailable("Matcha Latte".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InvalidStatusTransition { from: OrderStatus::Completed, to: OrderStatus::Ready }, StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InvalidAmount("55000 != 99000".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::InvalidSignature, StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::PaymentAlreadyExists("MC-250115-001".into()), StatusCode::CONFLICT)]
    #[case(ServiceError::GatewayError("timeout".into()), StatusCode::BAD_GATEWAY)]
    #[case(ServiceError::OrderNumberGenerationFailed("locked".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_errors_to_status(#[case] error: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[derive(Validate)]
    struct Line {
        #[validate(range(min = 1, max = 100))]
        quantity: i32,
    }

    #[derive(Validate)]
    struct Cart {
        #[validate(length(min = 2))]
        customer_name: String,
        #[validate]
        items: Vec<Line>,
    }

    #[test]
    fn validation_errors_are_flattened_by_path() {
        let cart = Cart {
            customer_name: "A".into(),
            items: vec![Line { quantity: 1 }, Line { quantity: 0 }],
        };
        let err: ServiceError = cart.validate().unwrap_err().into();

        match err {
            ServiceError::ValidationError { fields: Some(fields), .. } => {
                assert!(fields.contains_key("customer_name"));
                assert!(fields.contains_key("items[1].quantity"));
                assert!(!fields.contains_key("items[0].quantity"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
