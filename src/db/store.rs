// src/db/store.rs
//
// Contratos do banco consumidos pelos serviços. Os serviços recebem
// `Arc<dyn CatalogStore>` / `Arc<dyn PricingStore>` no construtor, o que
// permite testá-los com fakes em memória, sem Postgres.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        catalog::{
            Category, ImageDraft, MatrixReplacement, NewProduct, Product, ProductChanges,
            ProductVariant, ProductVariantImage, SkuOwner, VariantCodeOwner, VariantDraft,
        },
        pricing::{NewTierRule, Subcategory, TierRule, TierRuleChanges},
    },
};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // --- Leitura ---
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn product_code_exists(&self, code: &str) -> Result<bool, AppError>;

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError>;

    async fn find_variant(&self, id: Uuid) -> Result<Option<ProductVariant>, AppError>;

    /// Variantes do produto, ordenadas por cor e tamanho de criação.
    async fn list_variants(&self, product_id: Uuid) -> Result<Vec<ProductVariant>, AppError>;

    /// Batch-fetch explícito das imagens de várias variantes.
    async fn list_images_for_variants(
        &self,
        variant_ids: &[Uuid],
    ) -> Result<Vec<ProductVariantImage>, AppError>;

    async fn find_sku_owners(&self, skus: &[String]) -> Result<Vec<SkuOwner>, AppError>;

    async fn find_variant_code_owners(
        &self,
        codes: &[String],
    ) -> Result<Vec<VariantCodeOwner>, AppError>;

    async fn list_products_by_subcategory(
        &self,
        subcategory_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Product>, AppError>;

    // --- Escrita (cada método é atômico) ---

    /// Cria o produto e a matriz inteira numa única transação.
    async fn insert_product_with_variants(
        &self,
        product: &NewProduct,
        variants: &[VariantDraft],
    ) -> Result<Product, AppError>;

    /// Atualiza o produto e, se `matrix` vier, substitui a matriz inteira
    /// (delete + create many) na mesma transação. A substituição só acontece
    /// se a matriz atual ainda for `matrix.expected`; senão `StaleMatrix`.
    async fn update_product(
        &self,
        id: Uuid,
        changes: &ProductChanges,
        matrix: Option<MatrixReplacement<'_>>,
    ) -> Result<Product, AppError>;

    async fn set_variant_stock(&self, variant_id: Uuid, stock: i32)
        -> Result<ProductVariant, AppError>;

    async fn insert_variant(
        &self,
        product_id: Uuid,
        draft: &VariantDraft,
    ) -> Result<ProductVariant, AppError>;

    /// Grava os mesmos códigos em todas as variantes da cor.
    async fn set_color_variant_codes(
        &self,
        product_id: Uuid,
        color: &str,
        codes: &[String],
    ) -> Result<Vec<ProductVariant>, AppError>;

    /// Anexa as imagens a todas as variantes da cor.
    async fn add_color_images(
        &self,
        product_id: Uuid,
        color: &str,
        images: &[ImageDraft],
    ) -> Result<(), AppError>;

    /// Remove a imagem de todas as variantes da cor e, se ela era a principal,
    /// promove a próxima. Retorna o número de linhas removidas.
    async fn remove_color_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_public_id: &str,
    ) -> Result<u64, AppError>;

    /// Marca a imagem como principal em todas as variantes da cor.
    async fn set_color_primary_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_public_id: &str,
    ) -> Result<u64, AppError>;
}

#[async_trait]
pub trait PricingStore: Send + Sync {
    async fn find_subcategory(&self, id: Uuid) -> Result<Option<Subcategory>, AppError>;

    /// Regras da subcategoria em ordem DECRESCENTE de quantidade.
    async fn list_tier_rules(
        &self,
        subcategory_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<TierRule>, AppError>;

    /// Regras ativas com `quantity <= quantity`, em ordem decrescente de quantidade.
    async fn list_applicable_tier_rules(
        &self,
        subcategory_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<TierRule>, AppError>;

    async fn find_tier_rule(&self, id: Uuid) -> Result<Option<TierRule>, AppError>;

    async fn insert_tier_rule(&self, rule: &NewTierRule) -> Result<TierRule, AppError>;

    async fn update_tier_rule(
        &self,
        id: Uuid,
        changes: &TierRuleChanges,
    ) -> Result<Option<TierRule>, AppError>;
}
