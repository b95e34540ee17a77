use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cafe Ordering API",
        version = "1.0.0",
        description = r#"
# Cafe Ordering API

Ordering backend for the cafe counter, kiosks and the member app.

## Authentication

Member, kiosk and staff endpoints take an HS256 access token issued by the
identity provider:

```
Authorization: Bearer <your-jwt-token>
```

Guest ordering, order tracking, payment session creation and the gateway
notification endpoint are public.

## Money

Amounts are whole Rupiah, serialized as decimal strings. Tax is applied to the
order subtotal and rounded half away from zero.

## Error Handling

```json
{
  "success": false,
  "error": "Bad Request",
  "message": "Product Matcha Latte is not available",
  "timestamp": "2025-01-15T10:30:00+00:00"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order placement, tracking and status management"),
        (name = "Payments", description = "Payment sessions and gateway notifications"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_guest_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::track_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order_status,

        // Payments
        crate::handlers::payments::create_payment_token,
        crate::handlers::payments::midtrans_notification,

        // Health
        crate::handlers::health::health,
    ),
    components(
        schemas(
            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderUserResponse,
            crate::services::pricing::CartItem,
            crate::services::pricing::CustomizationChoice,
            crate::services::pricing::CustomizationSnapshot,
            crate::entities::order::OrderStatus,
            crate::entities::order::OrderSource,

            // Payments types
            crate::services::payments::PaymentTokenResponse,
            crate::handlers::payments::WebhookAck,

            // Health
            crate::handlers::health::HealthResponse,

            // Error types
            crate::errors::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let json = serde_json::to_string_pretty(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Cafe Ordering API"));
        for path in [
            "/api/v1/orders/guest",
            "/api/v1/orders/track/{id}",
            "/api/v1/orders/{id}/status",
            "/api/v1/orders/{id}/payment",
            "/api/v1/webhooks/midtrans",
            "/health",
        ] {
            assert!(json.contains(path), "missing {path}");
        }
        assert!(json.contains("bearer_auth"));
    }
}
