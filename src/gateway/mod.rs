//! Payment gateway client (Midtrans Snap).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Snap caps item names at this many characters
pub const MAX_ITEM_NAME_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected transaction ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapTransactionRequest {
    pub transaction_details: TransactionDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub item_details: Vec<ItemDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: i32,
    pub name: String,
}

impl SnapTransactionRequest {
    /// Sum of `price * quantity` over the item lines
    pub fn items_total(&self) -> i64 {
        self.item_details
            .iter()
            .map(|item| item.price * i64::from(item.quantity))
            .sum()
    }
}

/// Token and hosted payment page returned by Snap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapToken {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}

/// Creates hosted payment sessions
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        request: &SnapTransactionRequest,
    ) -> Result<SnapToken, GatewayError>;
}

/// Snap API client authenticated with the merchant server key
#[derive(Clone)]
pub struct MidtransSnapClient {
    http: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl std::fmt::Debug for MidtransSnapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransSnapClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MidtransSnapClient {
    pub fn with_base_url(
        server_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server_key: server_key.into(),
        })
    }

    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Result<Self, GatewayError> {
        Self::with_base_url(cfg.midtrans_server_key.clone(), cfg.midtrans_base_url())
    }
}

#[async_trait]
impl PaymentGateway for MidtransSnapClient {
    #[instrument(skip(self, request), fields(gateway_order_id = %request.transaction_details.order_id))]
    async fn create_transaction(
        &self,
        request: &SnapTransactionRequest,
    ) -> Result<SnapToken, GatewayError> {
        let url = format!("{}/snap/v1/transactions", self.base_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.server_key, None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<SnapErrorBody>(&body)
                .ok()
                .filter(|b| !b.error_messages.is_empty())
                .map(|b| b.error_messages.join("; "))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            warn!(status = status.as_u16(), %message, "snap transaction rejected");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: SnapToken =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;

        info!(status = status.as_u16(), "snap transaction created");
        Ok(token)
    }
}
