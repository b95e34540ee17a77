#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cafe_api::{
    auth::Role,
    config::AppConfig,
    db,
    entities::{payment, product, product_customization, user},
    gateway::{GatewayError, PaymentGateway, SnapToken, SnapTransactionRequest},
    services::payments::notification_signature,
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const SERVER_KEY: &str = "SB-Mid-server-integration-key";
const JWT_SECRET: &str = "integration_test_secret_key_0123456789abcdef";

/// Snap stand-in that records every request it receives
#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<SnapTransactionRequest>>,
    fail_with: Mutex<Option<String>>,
}

impl FakeGateway {
    pub fn requests(&self) -> Vec<SnapTransactionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reject_next(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_transaction(
        &self,
        request: &SnapTransactionRequest,
    ) -> Result<SnapToken, GatewayError> {
        if let Some(message) = self.fail_with.lock().unwrap().take() {
            return Err(GatewayError::Rejected {
                status: 400,
                message,
            });
        }
        self.requests.lock().unwrap().push(request.clone());
        let token = format!("snap-token-{}", request.transaction_details.order_id);
        Ok(SnapToken {
            redirect_url: format!("https://app.sandbox.midtrans.com/snap/v4/redirection/{token}"),
            token,
        })
    }
}

/// Menu rows every test starts with
pub struct Catalog {
    pub matcha_latte: Uuid,
    pub oat_milk: Uuid,
    pub extra_shot: Uuid,
    pub croissant: Uuid,
    pub mineral_water: Uuid,
    pub retired_scone: Uuid,
}

pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// Application over a migrated in-memory SQLite database with a seeded
/// menu, one account per role and a fake payment gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub catalog: Catalog,
    pub member: Account,
    pub kiosk: Account,
    pub barista: Account,
    pub admin: Account,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One pinned connection keeps the in-memory database alive
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.midtrans_server_key = SERVER_KEY.to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let gateway = Arc::new(FakeGateway::default());
        let state = AppState::new(Arc::new(pool), cfg, gateway.clone());

        let catalog = seed_catalog(&state).await;
        let member = seed_account(&state, "dewi@example.com", "Dewi", Role::Member).await;
        let kiosk = seed_account(&state, "kiosk-1@cafe.local", "Kiosk 1", Role::Kiosk).await;
        let barista = seed_account(&state, "rina@cafe.local", "Rina", Role::Barista).await;
        let admin = seed_account(&state, "owner@cafe.local", "Owner", Role::Admin).await;

        let router = cafe_api::build_router(state.clone());

        Self {
            router,
            state,
            gateway,
            catalog,
            member,
            kiosk,
            barista,
            admin,
        }
    }

    /// Sends a JSON request and returns the status and parsed body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// Posts raw bytes, used for gateway notifications
    pub async fn post_raw(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// Guest order for `quantity` matcha lattes, returns the order payload
    pub async fn place_guest_order(&self, quantity: i32) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/orders/guest",
                None,
                Some(json!({
                    "customer_name": "Budi",
                    "items": [{ "product_id": self.catalog.matcha_latte, "quantity": quantity }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "guest order failed: {body}");
        body["data"].clone()
    }

    /// Opens a payment session and returns the stored payment row
    pub async fn open_payment(&self, order_id: &str) -> payment::Model {
        let (status, body) = self
            .request(
                Method::POST,
                &format!("/api/v1/orders/{order_id}/payment"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "payment token failed: {body}");
        let payment_id: Uuid = body["data"]["payment_id"].as_str().unwrap().parse().unwrap();
        self.payment(payment_id).await
    }

    /// Reprices a menu item in place
    pub async fn set_base_price(&self, product_id: Uuid, price: Decimal) {
        product::ActiveModel {
            id: Set(product_id),
            base_price: Set(price),
            ..Default::default()
        }
        .update(self.state.db.as_ref())
        .await
        .expect("reprice product");
    }

    pub async fn payment(&self, id: Uuid) -> payment::Model {
        payment::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .unwrap()
            .expect("payment row")
    }

    pub async fn order_status(&self, order_id: &str) -> String {
        let (status, body) = self
            .request(
                Method::GET,
                &format!("/api/v1/orders/track/{order_id}"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["status"].as_str().unwrap().to_string()
    }

    /// Delivers a correctly signed notification
    pub async fn notify(
        &self,
        gateway_order_id: &str,
        transaction_status: &str,
        gross_amount: &str,
    ) -> (StatusCode, Value) {
        let body = signed_notification(gateway_order_id, transaction_status, gross_amount);
        self.post_raw("/api/v1/webhooks/midtrans", body.to_string())
            .await
    }
}

/// Money fields are serialized as decimal strings
pub fn money(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected a decimal string, got {value}"))
        .parse()
        .unwrap()
}

/// Notification body signed with the test server key
pub fn signed_notification(gateway_order_id: &str, transaction_status: &str, gross_amount: &str) -> Value {
    let status_code = match transaction_status {
        "settlement" | "capture" => "200",
        "pending" => "201",
        _ => "202",
    };
    json!({
        "order_id": gateway_order_id,
        "status_code": status_code,
        "gross_amount": gross_amount,
        "signature_key": notification_signature(gateway_order_id, status_code, gross_amount, SERVER_KEY),
        "transaction_status": transaction_status,
        "transaction_id": Uuid::new_v4().to_string(),
        "payment_type": "qris",
        "transaction_time": "2025-01-15 10:30:00",
        "settlement_time": "2025-01-15 10:31:05",
        "fraud_status": "accept",
        "status_message": "midtrans payment notification",
        "merchant_id": "G141532850"
    })
}

async fn seed_catalog(state: &AppState) -> Catalog {
    let db = state.db.as_ref();

    let matcha_latte = insert_product(db, "Matcha Latte", dec!(45000), true, true, None).await;
    let croissant = insert_product(db, "Butter Croissant", dec!(25000), false, false, None).await;
    let mineral_water = insert_product(db, "Mineral Water", dec!(8000), true, false, None).await;
    let retired_scone =
        insert_product(db, "Raisin Scone", dec!(20000), true, false, Some(Utc::now())).await;

    let oat_milk = insert_customization(db, matcha_latte, "milk", "Oat Milk", dec!(5000)).await;
    let extra_shot = insert_customization(db, matcha_latte, "shot", "Extra Shot", dec!(8000)).await;

    Catalog {
        matcha_latte,
        oat_milk,
        extra_shot,
        croissant,
        mineral_water,
        retired_scone,
    }
}

async fn insert_product(
    db: &sea_orm::DatabaseConnection,
    name: &str,
    price: Decimal,
    available: bool,
    customizable: bool,
    deleted_at: Option<chrono::DateTime<Utc>>,
) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    product::ActiveModel {
        id: Set(id),
        category_id: Set(None),
        name: Set(name.to_string()),
        slug: Set(name.to_lowercase().replace(' ', "-")),
        description: Set(None),
        image_url: Set(None),
        base_price: Set(price),
        is_customizable: Set(customizable),
        is_available: Set(available),
        preparation_time: Set(5),
        display_order: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(deleted_at),
    }
    .insert(db)
    .await
    .expect("seed product");
    id
}

async fn insert_customization(
    db: &sea_orm::DatabaseConnection,
    product_id: Uuid,
    kind: &str,
    option: &str,
    modifier: Decimal,
) -> Uuid {
    let id = Uuid::new_v4();
    product_customization::ActiveModel {
        id: Set(id),
        product_id: Set(product_id),
        customization_type: Set(kind.to_string()),
        option_name: Set(option.to_string()),
        price_modifier: Set(modifier),
        display_order: Set(0),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed customization");
    id
}

async fn seed_account(state: &AppState, email: &str, name: &str, role: Role) -> Account {
    let id = Uuid::new_v4();
    let now = Utc::now();
    user::ActiveModel {
        id: Set(id),
        email: Set(email.to_string()),
        full_name: Set(name.to_string()),
        phone: Set(None),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(state.db.as_ref())
    .await
    .expect("seed user");

    let token = state
        .auth
        .issue_token(id, Some(email.to_string()), role)
        .expect("issue token");

    Account {
        id,
        email: email.to_string(),
        token,
    }
}
