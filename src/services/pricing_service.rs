// src/services/pricing_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogStore, PricingStore},
    models::pricing::{
        CartLine, CartLineResult, CartLineStatus, CartPriceResult, PriceResult, ProductWithOffers,
        QuantityOffersListing,
    },
    services::tier_pricing,
};

pub const DEFAULT_OFFERS_LIMIT: i64 = 10;
pub const MAX_OFFERS_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct PricingService {
    catalog: Arc<dyn CatalogStore>,
    pricing: Arc<dyn PricingStore>,
}

impl PricingService {
    pub fn new(catalog: Arc<dyn CatalogStore>, pricing: Arc<dyn PricingStore>) -> Self {
        Self { catalog, pricing }
    }

    /// Melhor preço de UMA linha (produto + quantidade).
    pub async fn calculate_quantity_price(
        &self,
        product_id: Uuid,
        quantity: i32,
        variant_id: Option<Uuid>,
        is_wholesale: bool,
    ) -> Result<PriceResult, AppError> {
        if quantity < 1 {
            return Err(AppError::InvalidQuantity(quantity));
        }

        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(AppError::ProductNotFound(product_id))?;

        let variant = match variant_id {
            Some(id) => {
                let variant = self
                    .catalog
                    .find_variant(id)
                    .await?
                    .filter(|v| v.product_id == product.id)
                    .ok_or_else(|| AppError::VariantNotFound(id.to_string()))?;
                Some(variant)
            }
            None => None,
        };

        let rules = match product.subcategory_id {
            Some(subcategory_id) => {
                self.pricing
                    .list_applicable_tier_rules(subcategory_id, quantity)
                    .await?
            }
            None => Vec::new(),
        };

        tier_pricing::resolve(&product, variant.as_ref(), quantity, is_wholesale, &rules)
    }

    /// Preço do carrinho. Cada linha é isolada: uma falha vira `FALLBACK`
    /// e as demais seguem normalmente.
    pub async fn calculate_cart_prices(&self, lines: &[CartLine], is_wholesale: bool) -> CartPriceResult {
        let mut results = Vec::with_capacity(lines.len());

        for line in lines {
            let result = match self
                .calculate_quantity_price(line.product_id, line.quantity, line.variant_id, is_wholesale)
                .await
            {
                Ok(price) => CartLineResult {
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    status: CartLineStatus::Priced,
                    original_price: price.original_price,
                    final_price: price.final_price,
                    total_savings: price.total_savings,
                    price_per_item: price.price_per_item,
                    applied_rule: price.applied_rule,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Linha do carrinho (produto {}) sem preço por quantidade: {}",
                        line.product_id,
                        e
                    );
                    self.fallback_line(line, e).await
                }
            };
            results.push(result);
        }

        let subtotal: Decimal = results.iter().map(|r| r.final_price).sum();
        let total_savings: Decimal = results.iter().map(|r| r.total_savings).sum();
        let fallback_lines = results
            .iter()
            .filter(|r| r.status == CartLineStatus::Fallback)
            .count();

        CartPriceResult {
            priced_lines: results.len() - fallback_lines,
            fallback_lines,
            subtotal,
            total_savings,
            has_quantity_discounts: total_savings > Decimal::ZERO,
            lines: results,
        }
    }

    /// Produtos ativos da subcategoria, cada um com as faixas ativas.
    /// Sem faixas ativas a lista de produtos volta vazia.
    pub async fn get_products_with_quantity_offers(
        &self,
        subcategory_id: Uuid,
        limit: Option<i64>,
    ) -> Result<QuantityOffersListing, AppError> {
        let limit = limit.unwrap_or(DEFAULT_OFFERS_LIMIT);
        if !(1..=MAX_OFFERS_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "O limite deve estar entre 1 e {}.",
                MAX_OFFERS_LIMIT
            )));
        }

        let subcategory = self
            .pricing
            .find_subcategory(subcategory_id)
            .await?
            .ok_or(AppError::SubcategoryNotFound(subcategory_id))?;
        let rules = self.pricing.list_tier_rules(subcategory_id, true).await?;

        let products = if rules.is_empty() {
            Vec::new()
        } else {
            self.catalog
                .list_products_by_subcategory(subcategory_id, limit)
                .await?
                .into_iter()
                .map(|product| ProductWithOffers {
                    product,
                    quantity_offers: rules.clone(),
                })
                .collect()
        };

        Ok(QuantityOffersListing {
            subcategory,
            quantity_offers: rules,
            products,
        })
    }

    // Preço "melhor esforço": oferta ou normal do produto, sem desconto.
    async fn fallback_line(&self, line: &CartLine, error: AppError) -> CartLineResult {
        let unit_price = match self.catalog.find_product(line.product_id).await {
            Ok(Some(product)) => product.offer_price.unwrap_or(product.normal_price),
            Ok(None) => Decimal::ZERO,
            Err(e) => {
                tracing::error!("🔥 Falha ao buscar preço de fallback: {}", e);
                Decimal::ZERO
            }
        };
        let quantity = line.quantity.max(0);
        let total = unit_price * Decimal::from(quantity);

        CartLineResult {
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
            status: CartLineStatus::Fallback,
            original_price: total,
            final_price: total,
            total_savings: Decimal::ZERO,
            price_per_item: unit_price,
            applied_rule: None,
            error: Some(error.to_string()),
        }
    }
}
