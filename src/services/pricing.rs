//! Cart validation and pricing.
//!
//! Turns a submitted cart into priced, snapshotted order lines. The whole cart
//! is rejected on the first failing line and nothing is written here; the
//! caller persists the result inside its own transaction.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::repositories::catalog::{CatalogLookup, IncludeDeleted};

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 100;

/// One requested line of a cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    #[validate(length(max = 200))]
    pub notes: Option<String>,
    #[serde(default)]
    pub customizations: Vec<CustomizationChoice>,
}

/// A customization selected for a cart line
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomizationChoice {
    pub customization_id: Uuid,
    /// Optional echo of the option name shown to the customer; must match the catalog when sent
    #[serde(default)]
    pub option_name: Option<String>,
}

/// Customization as recorded on an order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomizationSnapshot {
    pub customization_type: String,
    pub option_name: String,
    #[schema(value_type = String, example = "5000")]
    pub price_modifier: Decimal,
}

/// Priced line, ready to be persisted as an order item
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub customizations: Vec<CustomizationSnapshot>,
    pub notes: Option<String>,
}

/// Order level amounts. `total == subtotal + tax` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Tax is rounded half away from zero to whole currency units.
    pub fn from_subtotal(subtotal: Decimal, tax_rate: Decimal) -> Result<Self, ServiceError> {
        let tax = subtotal
            .checked_mul(tax_rate)
            .ok_or_else(|| ServiceError::validation("order subtotal is too large"))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let total = subtotal
            .checked_add(tax)
            .ok_or_else(|| ServiceError::validation("order total is too large"))?;
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub totals: OrderTotals,
}

/// Prices carts against live catalog state
#[derive(Debug, Clone, Copy)]
pub struct CartPricer {
    tax_rate: Decimal,
}

impl CartPricer {
    pub fn new(tax_rate: Decimal) -> Self {
        Self { tax_rate }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    #[instrument(skip(self, catalog, items), fields(lines = items.len()))]
    pub async fn price(
        &self,
        catalog: &dyn CatalogLookup,
        items: &[CartItem],
    ) -> Result<PricedCart, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::validation("cart must contain at least one item"));
        }

        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal = Decimal::ZERO;

        for item in items {
            let line = self.price_line(catalog, item).await?;
            subtotal = subtotal
                .checked_add(line.subtotal)
                .ok_or_else(|| ServiceError::validation("order subtotal is too large"))?;
            lines.push(line);
        }

        let totals = OrderTotals::from_subtotal(subtotal, self.tax_rate)?;
        debug!(subtotal = %totals.subtotal, tax = %totals.tax, total = %totals.total, "cart priced");

        Ok(PricedCart { lines, totals })
    }

    async fn price_line(
        &self,
        catalog: &dyn CatalogLookup,
        item: &CartItem,
    ) -> Result<PricedLine, ServiceError> {
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&item.quantity) {
            return Err(ServiceError::validation(format!(
                "quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}"
            )));
        }

        let product = catalog
            .find_product(item.product_id, IncludeDeleted::No)
            .await?
            .ok_or(ServiceError::ProductNotFound(item.product_id))?;

        if !product.is_available {
            return Err(ServiceError::ProductNotAvailable(product.name));
        }

        if !item.customizations.is_empty() && !product.is_customizable {
            return Err(ServiceError::ProductNotCustomizable(product.name));
        }

        let mut seen = HashSet::with_capacity(item.customizations.len());
        let mut unit_price = product.base_price;
        let mut snapshots = Vec::with_capacity(item.customizations.len());

        for choice in &item.customizations {
            if !seen.insert(choice.customization_id) {
                return Err(ServiceError::InvalidCustomization(format!(
                    "customization {} selected more than once",
                    choice.customization_id
                )));
            }

            let customization = catalog
                .find_customization(choice.customization_id)
                .await?
                .ok_or(ServiceError::CustomizationNotFound(choice.customization_id))?;

            if customization.product_id != product.id {
                return Err(ServiceError::InvalidCustomization(format!(
                    "customization {} does not belong to product {}",
                    customization.id, product.name
                )));
            }

            if let Some(name) = choice.option_name.as_deref() {
                if !name.trim().eq_ignore_ascii_case(&customization.option_name) {
                    return Err(ServiceError::InvalidCustomization(format!(
                        "option {name} does not match customization {}",
                        customization.id
                    )));
                }
            }

            unit_price = unit_price
                .checked_add(customization.price_modifier)
                .ok_or_else(|| ServiceError::validation("unit price is too large"))?;

            snapshots.push(CustomizationSnapshot {
                customization_type: customization.customization_type,
                option_name: customization.option_name,
                price_modifier: customization.price_modifier,
            });
        }

        if unit_price.is_sign_negative() && !unit_price.is_zero() {
            return Err(ServiceError::InvalidUnitPrice(format!(
                "customizations bring {} below zero ({unit_price})",
                product.name
            )));
        }

        let subtotal = unit_price
            .checked_mul(Decimal::from(item.quantity))
            .ok_or_else(|| ServiceError::validation("line subtotal is too large"))?;

        Ok(PricedLine {
            product_id: product.id,
            product_name: product.name,
            quantity: item.quantity,
            unit_price,
            subtotal,
            customizations: snapshots,
            notes: item.notes.clone(),
        })
    }
}
