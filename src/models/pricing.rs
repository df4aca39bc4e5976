// src/models/pricing.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::catalog::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tier_price_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    Percentage, // Vira "PERCENTAGE": value = % de desconto
    FixedTotal, // Vira "FIXED_TOTAL": value = preço TOTAL para a quantidade
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: Uuid,
    pub category_id: Uuid,
    #[schema(example = "Camisetas Lisas")]
    pub name: String,
}

// Regra de faixa ("tier rule") da subcategoria.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TierRule {
    pub id: Uuid,
    pub subcategory_id: Uuid,
    #[schema(example = 10)]
    pub quantity: i32,
    pub price_type: PriceType,
    #[schema(example = "10")]
    pub value: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTierRule {
    pub subcategory_id: Uuid,
    pub quantity: i32,
    pub price_type: PriceType,
    pub value: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TierRuleChanges {
    pub quantity: Option<i32>,
    pub price_type: Option<PriceType>,
    pub value: Option<Decimal>,
    pub is_active: Option<bool>,
}

// --- Resultados de preço ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    pub id: Uuid,
    pub quantity: i32,
    pub price_type: PriceType,
    pub value: Decimal,
}

impl From<&TierRule> for AppliedRule {
    fn from(rule: &TierRule) -> Self {
        Self {
            id: rule.id,
            quantity: rule.quantity,
            price_type: rule.price_type,
            value: rule.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceResult {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub is_wholesale: bool,
    /// Preço unitário antes de qualquer faixa.
    pub base_unit_price: Decimal,
    pub original_price: Decimal,
    pub final_price: Decimal,
    pub total_savings: Decimal,
    pub price_per_item: Decimal,
    pub applied_rule: Option<AppliedRule>,
}

// Serialize: o `length` do validator anexa a lista ao erro.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    #[schema(example = 3)]
    pub quantity: i32,
    pub variant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartLineStatus {
    Priced,
    Fallback,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLineResult {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub status: CartLineStatus,
    pub original_price: Decimal,
    pub final_price: Decimal,
    pub total_savings: Decimal,
    pub price_per_item: Decimal,
    pub applied_rule: Option<AppliedRule>,
    /// Presente apenas em linhas `FALLBACK`.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartPriceResult {
    pub lines: Vec<CartLineResult>,
    pub subtotal: Decimal,
    pub total_savings: Decimal,
    pub has_quantity_discounts: bool,
    pub priced_lines: usize,
    pub fallback_lines: usize,
}

// Listagem "produtos com oferta por quantidade" da subcategoria.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithOffers {
    #[serde(flatten)]
    pub product: Product,
    pub quantity_offers: Vec<TierRule>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuantityOffersListing {
    pub subcategory: Subcategory,
    pub quantity_offers: Vec<TierRule>,
    pub products: Vec<ProductWithOffers>,
}
