// src/db/memory.rs
//
// Implementação em memória dos contratos do banco, usada pelos testes dos
// serviços. Replica as constraints de unicidade do schema.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{CatalogStore, PricingStore},
    models::{
        catalog::{
            Category, ImageDraft, MatrixReplacement, MatrixVersion, NewProduct, Product,
            ProductChanges, ProductStatus, ProductVariant, ProductVariantImage, SkuOwner,
            VariantCodeOwner, VariantDraft,
        },
        pricing::{NewTierRule, PriceType, Subcategory, TierRule, TierRuleChanges},
    },
    services::variant_keys::{color_key, VariantKey},
};

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    products: Vec<Product>,
    variants: Vec<ProductVariant>,
    images: Vec<ProductVariantImage>,
    rules: Vec<TierRule>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

// Mesma regra do `lower(color)` do Postgres.
fn same_color(a: &str, b: &str) -> bool {
    color_key(a) == color_key(b)
}

impl State {
    fn check_matrix(&self, product_id: Uuid, drafts: &[VariantDraft]) -> Result<(), AppError> {
        let mut keys = HashSet::new();
        let mut skus = HashSet::new();
        for d in drafts {
            if !keys.insert(VariantKey::new(&d.color, &d.size)) {
                return Err(AppError::DuplicateVariant {
                    color: d.color.clone(),
                    size: d.size.clone(),
                });
            }
            if let Some(sku) = &d.sku {
                let taken = self.variants.iter().any(|v| {
                    v.product_id != product_id && v.sku.as_deref() == Some(sku.as_str())
                });
                if !skus.insert(sku.clone()) || taken {
                    return Err(AppError::DuplicateSku(sku.clone()));
                }
            }
        }
        Ok(())
    }

    fn matrix_version(&self, product_id: Uuid) -> MatrixVersion {
        let variants: Vec<_> = self
            .variants
            .iter()
            .filter(|v| v.product_id == product_id)
            .map(|v| (v.id, v.updated_at))
            .collect();
        let images = self
            .images
            .iter()
            .filter(|i| variants.iter().any(|(id, _)| *id == i.variant_id))
            .map(|i| (i.id, i.is_primary))
            .collect();
        MatrixVersion::new(variants, images)
    }

    fn insert_matrix(
        &mut self,
        product_id: Uuid,
        drafts: &[VariantDraft],
    ) -> Vec<ProductVariant> {
        let now = Utc::now();
        let mut created = Vec::new();
        for d in drafts {
            let variant = ProductVariant {
                id: Uuid::new_v4(),
                product_id,
                color: d.color.clone(),
                size: d.size.clone(),
                stock: d.stock,
                sku: d.sku.clone(),
                variant_codes: d.variant_codes.clone(),
                price: d.price,
                wholesale_price: d.wholesale_price,
                created_at: now,
                updated_at: now,
            };
            for (position, image) in d.images.iter().enumerate() {
                self.push_image(variant.id, &variant.color, image, position as i32);
            }
            self.variants.push(variant.clone());
            created.push(variant);
        }
        created
    }

    fn push_image(&mut self, variant_id: Uuid, color: &str, image: &ImageDraft, position: i32) {
        self.images.push(ProductVariantImage {
            id: Uuid::new_v4(),
            variant_id,
            image_url: image.image_url.clone(),
            image_public_id: image.image_public_id.clone(),
            is_primary: image.is_primary,
            color: color.to_string(),
            position,
        });
    }

    fn color_variant_ids(&self, product_id: Uuid, color: &str) -> Vec<Uuid> {
        self.variants
            .iter()
            .filter(|v| v.product_id == product_id && same_color(&v.color, color))
            .map(|v| v.id)
            .collect()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_category(&self, name: &str, code: Option<&str>) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.map(Into::into),
        };
        self.state.lock().unwrap().categories.push(category.clone());
        category
    }

    pub fn add_subcategory(&self, category_id: Uuid, name: &str) -> Subcategory {
        let sub = Subcategory {
            id: Uuid::new_v4(),
            category_id,
            name: name.into(),
        };
        self.state.lock().unwrap().subcategories.push(sub.clone());
        sub
    }

    pub fn add_product(
        &self,
        code: &str,
        normal_price: Decimal,
        subcategory_id: Option<Uuid>,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            code: code.into(),
            name: format!("Produto {}", code),
            description: None,
            normal_price,
            offer_price: None,
            wholesale_price: None,
            category_id: None,
            subcategory_id,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().products.push(product.clone());
        product
    }

    /// Substitui um produto já semeado (ex.: para definir preço de oferta).
    pub fn put_product(&self, product: Product) {
        let mut state = self.state.lock().unwrap();
        state.products.retain(|p| p.id != product.id);
        state.products.push(product);
    }

    pub fn add_variant(&self, product_id: Uuid, draft: VariantDraft) -> ProductVariant {
        let mut state = self.state.lock().unwrap();
        state.insert_matrix(product_id, std::slice::from_ref(&draft)).remove(0)
    }

    pub fn add_rule(
        &self,
        subcategory_id: Uuid,
        quantity: i32,
        price_type: PriceType,
        value: Decimal,
        is_active: bool,
    ) -> TierRule {
        let now = Utc::now();
        let rule = TierRule {
            id: Uuid::new_v4(),
            subcategory_id,
            quantity,
            price_type,
            value,
            is_active,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().rules.push(rule.clone());
        rule
    }

    pub fn variants_of(&self, product_id: Uuid) -> Vec<ProductVariant> {
        let state = self.state.lock().unwrap();
        state
            .variants
            .iter()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect()
    }

    pub fn images_of(&self, variant_id: Uuid) -> Vec<ProductVariantImage> {
        let state = self.state.lock().unwrap();
        let mut images: Vec<_> = state
            .images
            .iter()
            .filter(|i| i.variant_id == variant_id)
            .cloned()
            .collect();
        images.sort_by_key(|i| i.position);
        images
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn product_code_exists(&self, code: &str) -> Result<bool, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.products.iter().any(|p| p.code == code))
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<ProductVariant>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.variants.iter().find(|v| v.id == id).cloned())
    }

    async fn list_variants(&self, product_id: Uuid) -> Result<Vec<ProductVariant>, AppError> {
        Ok(self.variants_of(product_id))
    }

    async fn list_images_for_variants(
        &self,
        variant_ids: &[Uuid],
    ) -> Result<Vec<ProductVariantImage>, AppError> {
        let state = self.state.lock().unwrap();
        let mut images: Vec<_> = state
            .images
            .iter()
            .filter(|i| variant_ids.contains(&i.variant_id))
            .cloned()
            .collect();
        images.sort_by_key(|i| (i.variant_id, i.position));
        Ok(images)
    }

    async fn find_sku_owners(&self, skus: &[String]) -> Result<Vec<SkuOwner>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .variants
            .iter()
            .filter_map(|v| {
                let sku = v.sku.as_ref()?;
                skus.contains(sku).then(|| SkuOwner {
                    sku: sku.clone(),
                    product_id: v.product_id,
                })
            })
            .collect())
    }

    async fn find_variant_code_owners(
        &self,
        codes: &[String],
    ) -> Result<Vec<VariantCodeOwner>, AppError> {
        let state = self.state.lock().unwrap();
        let mut owners = Vec::new();
        for v in &state.variants {
            for code in &v.variant_codes {
                if codes.contains(code) {
                    owners.push(VariantCodeOwner {
                        code: code.clone(),
                        product_id: v.product_id,
                    });
                }
            }
        }
        Ok(owners)
    }

    async fn list_products_by_subcategory(
        &self,
        subcategory_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Product>, AppError> {
        let state = self.state.lock().unwrap();
        let mut products: Vec<_> = state
            .products
            .iter()
            .filter(|p| {
                p.subcategory_id == Some(subcategory_id) && p.status == ProductStatus::Active
            })
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products.truncate(limit.max(0) as usize);
        Ok(products)
    }

    async fn insert_product_with_variants(
        &self,
        product: &NewProduct,
        variants: &[VariantDraft],
    ) -> Result<Product, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.products.iter().any(|p| p.code == product.code) {
            return Err(AppError::DuplicateProductCode(product.code.clone()));
        }
        let id = Uuid::new_v4();
        state.check_matrix(id, variants)?;

        let now = Utc::now();
        let created = Product {
            id,
            code: product.code.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            normal_price: product.normal_price,
            offer_price: product.offer_price,
            wholesale_price: product.wholesale_price,
            category_id: product.category_id,
            subcategory_id: product.subcategory_id,
            status: product.status,
            created_at: now,
            updated_at: now,
        };
        state.products.push(created.clone());
        state.insert_matrix(id, variants);
        Ok(created)
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: &ProductChanges,
        matrix: Option<MatrixReplacement<'_>>,
    ) -> Result<Product, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state.products.iter().position(|p| p.id == id) else {
            return Err(AppError::ProductNotFound(id));
        };
        if let Some(code) = &changes.code {
            if state.products.iter().any(|p| p.id != id && &p.code == code) {
                return Err(AppError::DuplicateProductCode(code.clone()));
            }
        }
        if let Some(replacement) = matrix {
            if &state.matrix_version(id) != replacement.expected {
                return Err(AppError::StaleMatrix(id));
            }
            state.check_matrix(id, replacement.variants)?;
        }

        let product = &mut state.products[index];
        if let Some(v) = &changes.code {
            product.code = v.clone();
        }
        if let Some(v) = &changes.name {
            product.name = v.clone();
        }
        if let Some(v) = &changes.description {
            product.description = Some(v.clone());
        }
        if let Some(v) = changes.normal_price {
            product.normal_price = v;
        }
        if let Some(v) = changes.offer_price {
            product.offer_price = Some(v);
        }
        if let Some(v) = changes.wholesale_price {
            product.wholesale_price = Some(v);
        }
        if let Some(v) = changes.category_id {
            product.category_id = Some(v);
        }
        if let Some(v) = changes.subcategory_id {
            product.subcategory_id = Some(v);
        }
        if let Some(v) = changes.status {
            product.status = v;
        }
        product.updated_at = Utc::now();
        let updated = product.clone();

        if let Some(replacement) = matrix {
            let old: HashSet<Uuid> = state
                .variants
                .iter()
                .filter(|v| v.product_id == id)
                .map(|v| v.id)
                .collect();
            state.variants.retain(|v| !old.contains(&v.id));
            state.images.retain(|i| !old.contains(&i.variant_id));
            state.insert_matrix(id, replacement.variants);
        }
        Ok(updated)
    }

    async fn set_variant_stock(
        &self,
        variant_id: Uuid,
        stock: i32,
    ) -> Result<ProductVariant, AppError> {
        let mut state = self.state.lock().unwrap();
        let variant = state
            .variants
            .iter_mut()
            .find(|v| v.id == variant_id)
            .ok_or_else(|| AppError::VariantNotFound(variant_id.to_string()))?;
        variant.stock = stock;
        variant.updated_at = Utc::now();
        Ok(variant.clone())
    }

    async fn insert_variant(
        &self,
        product_id: Uuid,
        draft: &VariantDraft,
    ) -> Result<ProductVariant, AppError> {
        let mut state = self.state.lock().unwrap();
        let key = VariantKey::new(&draft.color, &draft.size);
        if state
            .variants
            .iter()
            .any(|v| v.product_id == product_id && VariantKey::new(&v.color, &v.size) == key)
        {
            return Err(AppError::DuplicateVariant {
                color: draft.color.clone(),
                size: draft.size.clone(),
            });
        }
        if let Some(sku) = &draft.sku {
            if state.variants.iter().any(|v| v.sku.as_deref() == Some(sku.as_str())) {
                return Err(AppError::DuplicateSku(sku.clone()));
            }
        }
        Ok(state.insert_matrix(product_id, std::slice::from_ref(draft)).remove(0))
    }

    async fn set_color_variant_codes(
        &self,
        product_id: Uuid,
        color: &str,
        codes: &[String],
    ) -> Result<Vec<ProductVariant>, AppError> {
        let mut state = self.state.lock().unwrap();
        let mut updated = Vec::new();
        for v in state
            .variants
            .iter_mut()
            .filter(|v| v.product_id == product_id && same_color(&v.color, color))
        {
            v.variant_codes = codes.to_vec();
            v.updated_at = Utc::now();
            updated.push(v.clone());
        }
        Ok(updated)
    }

    async fn add_color_images(
        &self,
        product_id: Uuid,
        color: &str,
        images: &[ImageDraft],
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let ids = state.color_variant_ids(product_id, color);
        let next = state
            .images
            .iter()
            .filter(|i| ids.contains(&i.variant_id))
            .map(|i| i.position + 1)
            .max()
            .unwrap_or(0);
        let targets: Vec<(Uuid, String)> = state
            .variants
            .iter()
            .filter(|v| ids.contains(&v.id))
            .map(|v| (v.id, v.color.clone()))
            .collect();
        for (variant_id, variant_color) in targets {
            for (offset, image) in images.iter().enumerate() {
                state.push_image(variant_id, &variant_color, image, next + offset as i32);
            }
        }
        Ok(())
    }

    async fn remove_color_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_public_id: &str,
    ) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let ids = state.color_variant_ids(product_id, color);
        let before = state.images.len();
        let removed_primary = state.images.iter().any(|i| {
            ids.contains(&i.variant_id) && i.image_public_id == image_public_id && i.is_primary
        });
        state
            .images
            .retain(|i| !(ids.contains(&i.variant_id) && i.image_public_id == image_public_id));
        let removed = (before - state.images.len()) as u64;

        if removed_primary {
            for variant_id in &ids {
                if let Some(first) = state
                    .images
                    .iter_mut()
                    .filter(|i| i.variant_id == *variant_id)
                    .min_by_key(|i| i.position)
                {
                    first.is_primary = true;
                }
            }
        }
        Ok(removed)
    }

    async fn set_color_primary_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_public_id: &str,
    ) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let ids = state.color_variant_ids(product_id, color);
        let matches = state
            .images
            .iter()
            .filter(|i| ids.contains(&i.variant_id) && i.image_public_id == image_public_id)
            .count() as u64;
        if matches == 0 {
            return Ok(0);
        }
        for image in state.images.iter_mut().filter(|i| ids.contains(&i.variant_id)) {
            image.is_primary = image.image_public_id == image_public_id;
        }
        Ok(matches)
    }
}

#[async_trait]
impl PricingStore for InMemoryStore {
    async fn find_subcategory(&self, id: Uuid) -> Result<Option<Subcategory>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.subcategories.iter().find(|s| s.id == id).cloned())
    }

    async fn list_tier_rules(
        &self,
        subcategory_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<TierRule>, AppError> {
        let state = self.state.lock().unwrap();
        let mut rules: Vec<_> = state
            .rules
            .iter()
            .filter(|r| r.subcategory_id == subcategory_id && (r.is_active || !active_only))
            .cloned()
            .collect();
        // sort estável: empates mantêm a ordem de criação
        rules.sort_by(|a, b| b.quantity.cmp(&a.quantity));
        Ok(rules)
    }

    async fn list_applicable_tier_rules(
        &self,
        subcategory_id: Uuid,
        quantity: i32,
    ) -> Result<Vec<TierRule>, AppError> {
        let rules = self.list_tier_rules(subcategory_id, true).await?;
        Ok(rules.into_iter().filter(|r| r.quantity <= quantity).collect())
    }

    async fn find_tier_rule(&self, id: Uuid) -> Result<Option<TierRule>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.rules.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_tier_rule(&self, rule: &NewTierRule) -> Result<TierRule, AppError> {
        Ok(self.add_rule(
            rule.subcategory_id,
            rule.quantity,
            rule.price_type,
            rule.value,
            rule.is_active,
        ))
    }

    async fn update_tier_rule(
        &self,
        id: Uuid,
        changes: &TierRuleChanges,
    ) -> Result<Option<TierRule>, AppError> {
        let mut state = self.state.lock().unwrap();
        let Some(rule) = state.rules.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.quantity {
            rule.quantity = v;
        }
        if let Some(v) = changes.price_type {
            rule.price_type = v;
        }
        if let Some(v) = changes.value {
            rule.value = v;
        }
        if let Some(v) = changes.is_active {
            rule.is_active = v;
        }
        rule.updated_at = Utc::now();
        Ok(Some(rule.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn variant(color: &str, size: &str) -> VariantDraft {
        VariantDraft {
            color: color.into(),
            size: size.into(),
            stock: 1,
            sku: None,
            variant_codes: vec![],
            price: None,
            wholesale_price: None,
            images: vec![],
        }
    }

    #[tokio::test]
    async fn color_lookup_folds_non_ascii_case_like_the_identity_key() {
        let store = InMemoryStore::new();
        let product = store.add_product("TS01", dec!(10), None);
        store.add_variant(product.id, variant("Ébano", "M"));
        store.add_variant(product.id, variant("Ébano", "G"));

        let updated = store
            .set_color_variant_codes(product.id, " ÉBANO ", &["EAN-9".into()])
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);

        let err = store
            .insert_variant(product.id, &variant("ébano", "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateVariant { .. }));
    }
}
