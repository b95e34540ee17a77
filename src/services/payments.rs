//! Payment token creation and gateway notification reconciliation.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha512};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::payment;
use crate::errors::ServiceError;
use crate::gateway::{
    CustomerDetails, ItemDetail, PaymentGateway, SnapTransactionRequest, TransactionDetails,
    MAX_ITEM_NAME_LEN,
};
use crate::repositories::{OrderAggregate, OrderRepository, PaymentRepository};
use crate::services::order_lifecycle::{self, TransitionOutcome, TransitionPolicy};

const GATEWAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TAX_ITEM_ID: &str = "TAX";

/// Gateway transaction status as reported in notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Settlement,
    Pending,
    Expire,
    Cancel,
    Deny,
    Other(String),
}

impl TransactionStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "settlement" => Self::Settlement,
            "pending" => Self::Pending,
            "expire" => Self::Expire,
            "cancel" => Self::Cancel,
            "deny" => Self::Deny,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Order status a notification with this transaction status drives towards
    pub fn order_target(&self) -> Option<OrderStatus> {
        match self {
            Self::Settlement => Some(OrderStatus::Preparing),
            Self::Expire | Self::Cancel | Self::Deny => Some(OrderStatus::Cancelled),
            Self::Pending | Self::Other(_) => None,
        }
    }
}

/// HTTP notification body sent by the gateway. Unknown fields are kept in `raw`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_time: Option<String>,
    pub settlement_time: Option<String>,
    pub fraud_status: Option<String>,
    pub status_message: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl GatewayNotification {
    pub fn from_slice(body: &[u8]) -> Result<Self, ServiceError> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| ServiceError::validation(format!("malformed notification: {e}")))?;
        let mut notification: GatewayNotification = serde_json::from_value(raw.clone())
            .map_err(|e| ServiceError::validation(format!("malformed notification: {e}")))?;
        notification.raw = raw;
        Ok(notification)
    }
}

/// Hex SHA-512 of `order_id + status_code + gross_amount + server_key`
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_signature(notification: &GatewayNotification, server_key: &str) -> bool {
    let expected = notification_signature(
        &notification.order_id,
        &notification.status_code,
        &notification.gross_amount,
        server_key,
    );
    constant_time_eq(
        expected.as_bytes(),
        notification.signature_key.trim().to_ascii_lowercase().as_bytes(),
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parses a gateway wall-clock timestamp in the given offset
pub fn parse_gateway_time(value: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), GATEWAY_TIME_FORMAT).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentTokenResponse {
    pub payment_id: Uuid,
    pub token: String,
    pub redirect_url: String,
}

/// What a processed notification did to the order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub payment_id: Uuid,
    pub transaction_status: TransactionStatus,
    pub order_status: OrderStatus,
    pub order_changed: bool,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    orders: OrderRepository,
    payments: PaymentRepository,
    gateway: Arc<dyn PaymentGateway>,
    server_key: String,
    business_offset: FixedOffset,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        server_key: String,
        business_offset: FixedOffset,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            payments: PaymentRepository::new(db.clone()),
            db,
            gateway,
            server_key,
            business_offset,
        }
    }

    /// Opens a gateway payment session for a pending order.
    ///
    /// The payment row is only written once the gateway has issued a token.
    #[instrument(skip(self))]
    pub async fn create_payment_token(
        &self,
        order_public_id: Uuid,
    ) -> Result<PaymentTokenResponse, ServiceError> {
        let aggregate = self
            .orders
            .find_by_public_id(order_public_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(order_public_id.to_string()))?;
        let order = &aggregate.order;

        if order.status != OrderStatus::Pending {
            return Err(ServiceError::OrderNotPending(order.order_number.clone()));
        }
        if self.payments.has_settled_payment(order.id, None).await? {
            return Err(ServiceError::PaymentAlreadyExists(order.order_number.clone()));
        }

        let now = Utc::now();
        let gateway_order_id = format!("{}-{}", order.order_number, now.timestamp());
        let request = build_snap_request(&aggregate, &gateway_order_id)?;

        // The stored amount must be what the gateway charges and later reports
        let gross_amount = Decimal::from(request.transaction_details.gross_amount);
        let token = self.gateway.create_transaction(&request).await?;

        let payment = self
            .payments
            .create(payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                gateway_order_id: Set(gateway_order_id.clone()),
                gross_amount: Set(gross_amount),
                transaction_id: Set(None),
                payment_type: Set(None),
                transaction_status: Set(None),
                transaction_time: Set(None),
                settlement_time: Set(None),
                fraud_status: Set(None),
                status_message: Set(None),
                metadata: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .await?;

        info!(
            order_number = %order.order_number,
            gateway_order_id = %gateway_order_id,
            gross_amount = %gross_amount,
            "payment session created"
        );

        Ok(PaymentTokenResponse {
            payment_id: payment.id,
            token: token.token,
            redirect_url: token.redirect_url,
        })
    }

    /// Authenticates a notification, records it on the payment and moves the order.
    ///
    /// Redelivered notifications are accepted; an order that already reached
    /// the target status is left untouched.
    #[instrument(
        skip(self, notification),
        fields(
            gateway_order_id = %notification.order_id,
            transaction_status = %notification.transaction_status
        )
    )]
    pub async fn process_webhook_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<ReconciliationOutcome, ServiceError> {
        if !verify_signature(&notification, &self.server_key) {
            warn!("rejected notification with invalid signature");
            return Err(ServiceError::InvalidSignature);
        }

        let existing = self
            .payments
            .find_by_gateway_order_id(&notification.order_id)
            .await?
            .ok_or_else(|| ServiceError::PaymentNotFound(notification.order_id.clone()))?;

        let amount = Decimal::from_str(notification.gross_amount.trim()).map_err(|_| {
            ServiceError::InvalidAmount(format!(
                "unparsable gross amount {}",
                notification.gross_amount
            ))
        })?;
        if amount != existing.gross_amount {
            warn!(expected = %existing.gross_amount, received = %amount, "gross amount mismatch");
            return Err(ServiceError::InvalidAmount(format!(
                "expected {}, received {}",
                existing.gross_amount, amount
            )));
        }

        let status = TransactionStatus::parse(&notification.transaction_status);
        let payment = self.apply_notification(existing, &notification).await?;

        let order = OrderRepository::find_model_by_id(self.db.as_ref(), payment.order_id)
            .await?
            .ok_or_else(|| ServiceError::OrderNotFound(payment.order_id.to_string()))?;

        let Some(target) = status.order_target() else {
            if let TransactionStatus::Other(value) = &status {
                warn!(
                    status = %value,
                    order_number = %order.order_number,
                    "unhandled transaction status"
                );
            }
            return Ok(ReconciliationOutcome {
                payment_id: payment.id,
                transaction_status: status,
                order_status: order.status,
                order_changed: false,
            });
        };

        if status == TransactionStatus::Settlement
            && self
                .payments
                .has_settled_payment(order.id, Some(payment.id))
                .await?
        {
            warn!(
                order_number = %order.order_number,
                "order already has another settled payment"
            );
        }

        let outcome = order_lifecycle::transition(
            self.db.as_ref(),
            order.public_id,
            target,
            TransitionPolicy::Reconcile,
        )
        .await?;
        let order_changed = matches!(outcome, TransitionOutcome::Applied(_));
        let order = outcome.into_order();

        Ok(ReconciliationOutcome {
            payment_id: payment.id,
            transaction_status: status,
            order_status: order.status,
            order_changed,
        })
    }

    async fn apply_notification(
        &self,
        payment: payment::Model,
        notification: &GatewayNotification,
    ) -> Result<payment::Model, ServiceError> {
        let received_at = Utc::now();
        let transaction_time = notification
            .transaction_time
            .as_deref()
            .and_then(|t| parse_gateway_time(t, self.business_offset))
            .unwrap_or(received_at);
        let settlement_time = notification
            .settlement_time
            .as_deref()
            .and_then(|t| parse_gateway_time(t, self.business_offset));

        let mut active: payment::ActiveModel = payment.into();
        active.transaction_id = Set(notification.transaction_id.clone());
        active.payment_type = Set(notification.payment_type.clone());
        active.transaction_status = Set(Some(notification.transaction_status.clone()));
        active.transaction_time = Set(Some(transaction_time));
        active.settlement_time = Set(settlement_time);
        active.fraud_status = Set(notification.fraud_status.clone());
        active.status_message = Set(notification.status_message.clone());
        active.metadata = Set(Some(notification.raw.clone()));

        self.payments.update(active).await
    }
}

/// Snap request for an order. Item lines plus a tax line add up to the gross amount.
pub fn build_snap_request(
    aggregate: &OrderAggregate,
    gateway_order_id: &str,
) -> Result<SnapTransactionRequest, ServiceError> {
    let order = &aggregate.order;
    let gross_amount = whole_units(order.total)?;

    let mut item_details = aggregate
        .items
        .iter()
        .map(|item| {
            Ok(ItemDetail {
                id: item
                    .product_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| item.id.to_string()),
                price: whole_units(item.unit_price)?,
                quantity: item.quantity,
                name: item.product_name.chars().take(MAX_ITEM_NAME_LEN).collect(),
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    if !order.tax.is_zero() {
        item_details.push(ItemDetail {
            id: TAX_ITEM_ID.to_string(),
            price: whole_units(order.tax)?,
            quantity: 1,
            name: "Tax".to_string(),
        });
    }

    let mut request = SnapTransactionRequest {
        transaction_details: TransactionDetails {
            order_id: gateway_order_id.to_string(),
            gross_amount,
        },
        customer_details: Some(CustomerDetails {
            first_name: order.customer_name.clone(),
            email: aggregate.user.as_ref().map(|u| u.email.clone()),
            phone: aggregate.user.as_ref().and_then(|u| u.phone.clone()),
        }),
        item_details,
    };

    // Snap rejects item lists that do not add up; fractional prices can break that
    if request.items_total() != gross_amount {
        warn!(gateway_order_id, "item details do not sum to gross amount, omitting them");
        request.item_details.clear();
    }

    Ok(request)
}

fn whole_units(amount: Decimal) -> Result<i64, ServiceError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError(format!("amount {amount} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::{self, OrderSource};
    use crate::entities::order_item;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const SERVER_KEY: &str = "SB-Mid-server-test-key";

    fn signed_notification(status: &str, gross_amount: &str) -> GatewayNotification {
        let signature =
            notification_signature("MC-250115-001-1736900000", "200", gross_amount, SERVER_KEY);
        let body = json!({
            "order_id": "MC-250115-001-1736900000",
            "status_code": "200",
            "gross_amount": gross_amount,
            "signature_key": signature,
            "transaction_status": status,
            "transaction_id": "9aed5972-5b6a-401e-894b-a32c91ed1a3a",
            "payment_type": "qris",
            "transaction_time": "2025-01-15 10:30:00",
            "settlement_time": "not a time",
            "fraud_status": "accept",
            "merchant_id": "G123456789"
        });
        GatewayNotification::from_slice(body.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn signature_is_sha512_of_concatenated_fields() {
        let signature = notification_signature("A", "200", "10000.00", "key");
        let expected = hex::encode(Sha512::digest(b"A20010000.00key"));
        assert_eq!(signature, expected);
        assert_eq!(signature.len(), 128);
    }

    #[test]
    fn valid_signature_verifies_and_tampering_fails() {
        let notification = signed_notification("settlement", "99000.00");
        assert!(verify_signature(&notification, SERVER_KEY));
        assert!(!verify_signature(&notification, "another-key"));

        let mut tampered = notification.clone();
        tampered.gross_amount = "1.00".into();
        assert!(!verify_signature(&tampered, SERVER_KEY));
    }

    #[test]
    fn notification_keeps_raw_payload() {
        let notification = signed_notification("pending", "99000.00");
        assert_eq!(notification.raw["merchant_id"], "G123456789");
        assert_eq!(notification.payment_type.as_deref(), Some("qris"));
    }

    #[test]
    fn malformed_notification_is_a_validation_error() {
        assert!(matches!(
            GatewayNotification::from_slice(b"{not json"),
            Err(ServiceError::ValidationError { .. })
        ));
        assert!(matches!(
            GatewayNotification::from_slice(br#"{"order_id":"x"}"#),
            Err(ServiceError::ValidationError { .. })
        ));
    }

    #[rstest]
    #[case("settlement", Some(OrderStatus::Preparing))]
    #[case("pending", None)]
    #[case("expire", Some(OrderStatus::Cancelled))]
    #[case("cancel", Some(OrderStatus::Cancelled))]
    #[case("deny", Some(OrderStatus::Cancelled))]
    #[case("capture", None)]
    #[case("refund", None)]
    fn transaction_status_drives_order(#[case] raw: &str, #[case] target: Option<OrderStatus>) {
        assert_eq!(TransactionStatus::parse(raw).order_target(), target);
    }

    #[test]
    fn gateway_times_are_read_in_business_offset() {
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        let parsed = parse_gateway_time("2025-01-15 10:30:00", jakarta).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 15, 3, 30, 0).unwrap());
        assert!(parse_gateway_time("15/01/2025", jakarta).is_none());
    }

    fn aggregate(unit_price: Decimal, quantity: i32, tax: Decimal) -> OrderAggregate {
        let now = Utc::now();
        let subtotal = unit_price * Decimal::from(quantity);
        OrderAggregate {
            order: order::Model {
                id: 1,
                public_id: Uuid::new_v4(),
                order_number: "MC-250115-001".into(),
                user_id: None,
                customer_name: "Rina".into(),
                status: OrderStatus::Pending,
                source: OrderSource::Guest,
                subtotal,
                tax,
                total: subtotal + tax,
                notes: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![order_item::Model {
                id: Uuid::new_v4(),
                order_id: 1,
                line_number: 1,
                product_id: Some(Uuid::new_v4()),
                product_name: "Matcha Latte with an unusually long descriptive menu name".into(),
                quantity,
                unit_price,
                subtotal,
                customizations: json!([]),
                notes: None,
                created_at: now,
            }],
            user: None,
        }
    }

    #[test]
    fn snap_request_items_sum_to_gross_amount() {
        let request =
            build_snap_request(&aggregate(dec!(45000), 2, dec!(9000)), "MC-250115-001-1").unwrap();

        assert_eq!(request.transaction_details.gross_amount, 99000);
        assert_eq!(request.items_total(), 99000);
        assert_eq!(request.item_details.last().unwrap().id, TAX_ITEM_ID);
        assert!(request.item_details[0].name.chars().count() <= MAX_ITEM_NAME_LEN);
    }

    #[test]
    fn fractional_prices_drop_item_details() {
        let request =
            build_snap_request(&aggregate(dec!(1000.50), 3, dec!(300)), "MC-250115-001-1").unwrap();
        assert!(request.item_details.is_empty());
    }

    #[test]
    fn fractional_total_rounds_half_away_from_zero() {
        let request =
            build_snap_request(&aggregate(dec!(1000.50), 1, dec!(100)), "MC-250115-001-1").unwrap();
        assert_eq!(request.transaction_details.gross_amount, 1101);
    }
}
