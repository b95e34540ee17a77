use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::payments::{GatewayNotification, PaymentTokenResponse};
use crate::{ApiResponse, AppState};

/// Acknowledgement body returned to the payment gateway
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    /// `success` or `error`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message),
        }
    }
}

/// Status the gateway sees for a failed notification
fn webhook_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidSignature => StatusCode::UNAUTHORIZED,
        ServiceError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidAmount(_) | ServiceError::ValidationError { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Request a hosted payment session for a pending order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "Public order id")),
    responses(
        (status = 201, description = "Payment session created", body = ApiResponse<PaymentTokenResponse>),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentTokenResponse>>), ServiceError> {
    let token = state.services.payments.create_payment_token(id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(token))))
}

/// Payment notification endpoint called by Midtrans
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/midtrans",
    request_body(content = String, description = "Midtrans HTTP notification JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Notification processed", body = WebhookAck),
        (status = 400, description = "Malformed notification or amount mismatch", body = WebhookAck),
        (status = 401, description = "Invalid signature", body = WebhookAck),
        (status = 404, description = "Unknown payment", body = WebhookAck),
        (status = 500, description = "Processing failed, gateway should retry", body = WebhookAck)
    ),
    tag = "Payments"
)]
pub async fn midtrans_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let result = match GatewayNotification::from_slice(&body) {
        Ok(notification) => {
            state
                .services
                .payments
                .process_webhook_notification(notification)
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(outcome) => {
            info!(
                payment_id = %outcome.payment_id,
                order_status = %outcome.order_status,
                order_changed = outcome.order_changed,
                "payment notification processed"
            );
            (StatusCode::OK, Json(WebhookAck::success()))
        }
        Err(err) => {
            let status = webhook_status(&err);
            if status.is_server_error() {
                error!(error = %err, "payment notification failed");
            } else {
                warn!(error = %err, "payment notification rejected");
            }
            (status, Json(WebhookAck::error(err.response_message())))
        }
    }
}
