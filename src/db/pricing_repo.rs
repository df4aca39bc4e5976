// src/db/pricing_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::PricingStore,
    models::pricing::{NewTierRule, Subcategory, TierRule, TierRuleChanges},
};

#[derive(Clone)]
pub struct PricingRepository {
    pool: PgPool,
}

impl PricingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingStore for PricingRepository {
    async fn find_subcategory(&self, id: Uuid) -> Result<Option<Subcategory>, AppError> {
        let subcategory = sqlx::query_as::<_, Subcategory>(
            "SELECT id, category_id, name FROM subcategories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subcategory)
    }

    async fn list_tier_rules(
        &self,
        subcategory_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<TierRule>, AppError> {
        let rules = sqlx::query_as::<_, TierRule>(
            r#"
            SELECT * FROM subcategory_quantity_prices
            WHERE subcategory_id = $1 AND (is_active OR NOT $2)
            ORDER BY quantity DESC, created_at ASC
            "#,
        )
        .bind(subcategory_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rules)
    }

    async fn list_applicable_tier_rules(
        &self,
        subcategory_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<TierRule>, AppError> {
        // Ordem decrescente: em empate de total, vence a faixa de quantidade maior.
        let rules = sqlx::query_as::<_, TierRule>(
            r#"
            SELECT * FROM subcategory_quantity_prices
            WHERE subcategory_id = $1 AND is_active AND quantity <= $2
            ORDER BY quantity DESC, created_at ASC
            "#,
        )
        .bind(subcategory_id)
        .bind(quantity)
        .fetch_all(&self.pool)
        .await?;
        Ok(rules)
    }

    async fn find_tier_rule(&self, id: Uuid) -> Result<Option<TierRule>, AppError> {
        let rule = sqlx::query_as::<_, TierRule>(
            "SELECT * FROM subcategory_quantity_prices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rule)
    }

    async fn insert_tier_rule(&self, rule: &NewTierRule) -> Result<TierRule, AppError> {
        let created = sqlx::query_as::<_, TierRule>(
            r#"
            INSERT INTO subcategory_quantity_prices (subcategory_id, quantity, price_type, value, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(rule.subcategory_id)
        .bind(rule.quantity)
        .bind(rule.price_type)
        .bind(rule.value)
        .bind(rule.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_tier_rule(
        &self,
        id: Uuid,
        changes: &TierRuleChanges,
    ) -> Result<Option<TierRule>, AppError> {
        let updated = sqlx::query_as::<_, TierRule>(
            r#"
            UPDATE subcategory_quantity_prices SET
                quantity = COALESCE($2, quantity),
                price_type = COALESCE($3, price_type),
                value = COALESCE($4, value),
                is_active = COALESCE($5, is_active),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.quantity)
        .bind(changes.price_type)
        .bind(changes.value)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }
}
