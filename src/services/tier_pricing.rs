// src/services/tier_pricing.rs
//
// Resolução do melhor preço por quantidade. Funções puras: quem busca
// produto, variante e regras no banco é o PricingService.

use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    models::{
        catalog::{Product, ProductVariant},
        pricing::{AppliedRule, PriceResult, PriceType, TierRule},
    },
};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Preço unitário antes das faixas.
/// Atacado: variante (atacado) -> produto (atacado) -> normal. Nunca usa a oferta.
/// Varejo:  variante (preço)   -> produto (oferta)  -> normal.
pub fn base_unit_price(product: &Product, variant: Option<&ProductVariant>, is_wholesale: bool) -> Decimal {
    if is_wholesale {
        variant
            .and_then(|v| v.wholesale_price)
            .or(product.wholesale_price)
            .unwrap_or(product.normal_price)
    } else {
        variant
            .and_then(|v| v.price)
            .or(product.offer_price)
            .unwrap_or(product.normal_price)
    }
}

/// Total que a regra cobraria pela linha inteira.
pub fn candidate_total(rule: &TierRule, original_total: Decimal) -> Decimal {
    let total = match rule.price_type {
        PriceType::Percentage => original_total * (Decimal::ONE - rule.value / HUNDRED),
        // O valor JÁ é o total da quantidade, não um preço unitário.
        PriceType::FixedTotal => rule.value,
    };
    total.max(Decimal::ZERO)
}

/// Escolhe a regra com o menor total estritamente abaixo do original.
/// Avalia em ordem decrescente de quantidade; em empate fica a primeira.
pub fn select_best_rule<'a>(
    rules: &'a [TierRule],
    quantity: i32,
    original_total: Decimal,
) -> Option<(&'a TierRule, Decimal)> {
    let mut candidates: Vec<&TierRule> = rules
        .iter()
        .filter(|r| r.is_active && r.quantity <= quantity)
        .collect();
    // sort estável: regras com a mesma quantidade mantêm a ordem recebida
    candidates.sort_by(|a, b| b.quantity.cmp(&a.quantity));

    let mut best: Option<(&TierRule, Decimal)> = None;
    let mut best_total = original_total;
    for rule in candidates {
        let total = candidate_total(rule, original_total);
        if total < best_total {
            best_total = total;
            best = Some((rule, total));
        }
    }
    best
}

pub fn resolve(
    product: &Product,
    variant: Option<&ProductVariant>,
    quantity: i32,
    is_wholesale: bool,
    rules: &[TierRule],
) -> Result<PriceResult, AppError> {
    if quantity < 1 {
        return Err(AppError::InvalidQuantity(quantity));
    }

    let base = base_unit_price(product, variant, is_wholesale);
    let original = base * Decimal::from(quantity);

    let (final_price, applied_rule) = match select_best_rule(rules, quantity, original) {
        Some((rule, total)) => (total, Some(AppliedRule::from(rule))),
        None => (original, None),
    };

    Ok(PriceResult {
        product_id: product.id,
        variant_id: variant.map(|v| v.id),
        quantity,
        is_wholesale,
        base_unit_price: base,
        original_price: original,
        final_price,
        total_savings: original - final_price,
        price_per_item: (final_price / Decimal::from(quantity)).round_dp(2),
        applied_rule,
    })
}
