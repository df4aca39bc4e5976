// src/services/tier_rule_service.rs
//
// Administração das faixas de preço por quantidade da subcategoria.
// Regras não são apagadas: saem de uso via `is_active = false`.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::PricingStore,
    models::pricing::{NewTierRule, PriceType, TierRule, TierRuleChanges},
};

fn validate_rule(quantity: i32, price_type: PriceType, value: Decimal) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::InvalidQuantity(quantity));
    }
    match price_type {
        PriceType::Percentage if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED => Err(
            AppError::InvalidInput("O percentual deve estar entre 0 (exclusivo) e 100.".into()),
        ),
        PriceType::FixedTotal if value <= Decimal::ZERO => Err(AppError::InvalidInput(
            "O preço total fixo deve ser maior que zero.".into(),
        )),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct TierRuleService {
    pricing: Arc<dyn PricingStore>,
}

impl TierRuleService {
    pub fn new(pricing: Arc<dyn PricingStore>) -> Self {
        Self { pricing }
    }

    async fn require_subcategory(&self, id: Uuid) -> Result<(), AppError> {
        self.pricing
            .find_subcategory(id)
            .await?
            .map(|_| ())
            .ok_or(AppError::SubcategoryNotFound(id))
    }

    pub async fn create_rule(&self, rule: NewTierRule) -> Result<TierRule, AppError> {
        validate_rule(rule.quantity, rule.price_type, rule.value)?;
        self.require_subcategory(rule.subcategory_id).await?;

        let created = self.pricing.insert_tier_rule(&rule).await?;
        tracing::info!(
            "✅ Faixa criada: subcategoria {} a partir de {} unidade(s)",
            created.subcategory_id,
            created.quantity
        );
        Ok(created)
    }

    pub async fn list_rules(&self, subcategory_id: Uuid, active_only: bool) -> Result<Vec<TierRule>, AppError> {
        self.require_subcategory(subcategory_id).await?;
        self.pricing.list_tier_rules(subcategory_id, active_only).await
    }

    /// Atualização parcial; o par (tipo, valor) é validado já com as mudanças aplicadas.
    pub async fn update_rule(&self, id: Uuid, changes: TierRuleChanges) -> Result<TierRule, AppError> {
        let current = self
            .pricing
            .find_tier_rule(id)
            .await?
            .ok_or(AppError::TierRuleNotFound(id))?;

        validate_rule(
            changes.quantity.unwrap_or(current.quantity),
            changes.price_type.unwrap_or(current.price_type),
            changes.value.unwrap_or(current.value),
        )?;

        self.pricing
            .update_tier_rule(id, &changes)
            .await?
            .ok_or(AppError::TierRuleNotFound(id))
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<TierRule, AppError> {
        let changes = TierRuleChanges {
            is_active: Some(is_active),
            ..Default::default()
        };
        let rule = self.update_rule(id, changes).await?;
        tracing::info!("🔁 Faixa {} agora está {}", id, if is_active { "ativa" } else { "inativa" });
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<InMemoryStore>, TierRuleService, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let category = store.add_category("Roupas", None);
        let sub = store.add_subcategory(category.id, "Camisetas");
        let service = TierRuleService::new(store.clone());
        (store, service, sub.id)
    }

    fn new_rule(subcategory_id: Uuid, quantity: i32, price_type: PriceType, value: Decimal) -> NewTierRule {
        NewTierRule { subcategory_id, quantity, price_type, value, is_active: true }
    }

    #[tokio::test]
    async fn creates_and_lists_in_descending_quantity() {
        let (_, service, sub) = setup();
        service.create_rule(new_rule(sub, 5, PriceType::Percentage, dec!(5))).await.unwrap();
        service.create_rule(new_rule(sub, 20, PriceType::FixedTotal, dec!(800))).await.unwrap();

        let rules = service.list_rules(sub, false).await.unwrap();
        assert_eq!(rules.iter().map(|r| r.quantity).collect::<Vec<_>>(), vec![20, 5]);
    }

    #[tokio::test]
    async fn rejects_invalid_rules() {
        let (_, service, sub) = setup();
        let cases = [
            new_rule(sub, 0, PriceType::Percentage, dec!(10)),
            new_rule(sub, 10, PriceType::Percentage, dec!(0)),
            new_rule(sub, 10, PriceType::Percentage, dec!(100.5)),
            new_rule(sub, 10, PriceType::FixedTotal, dec!(-1)),
        ];
        for rule in cases {
            let err = service.create_rule(rule).await.unwrap_err();
            assert_eq!(err.kind(), "ValidationError");
        }

        let err = service
            .create_rule(new_rule(Uuid::new_v4(), 10, PriceType::Percentage, dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SubcategoryNotFound(_)));
    }

    #[tokio::test]
    async fn update_validates_against_the_merged_rule() {
        let (_, service, sub) = setup();
        let rule = service.create_rule(new_rule(sub, 10, PriceType::FixedTotal, dec!(500))).await.unwrap();

        // 500 como percentual não faz sentido.
        let err = service
            .update_rule(rule.id, TierRuleChanges { price_type: Some(PriceType::Percentage), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let updated = service
            .update_rule(
                rule.id,
                TierRuleChanges { price_type: Some(PriceType::Percentage), value: Some(dec!(15)), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_type, PriceType::Percentage);
        assert_eq!(updated.value, dec!(15));
    }

    #[tokio::test]
    async fn deactivated_rules_leave_the_active_listing() {
        let (_, service, sub) = setup();
        let rule = service.create_rule(new_rule(sub, 10, PriceType::Percentage, dec!(10))).await.unwrap();

        let rule = service.set_active(rule.id, false).await.unwrap();
        assert!(!rule.is_active);
        assert!(service.list_rules(sub, true).await.unwrap().is_empty());
        assert_eq!(service.list_rules(sub, false).await.unwrap().len(), 1);

        let err = service.set_active(Uuid::new_v4(), true).await.unwrap_err();
        assert!(matches!(err, AppError::TierRuleNotFound(_)));
    }
}
