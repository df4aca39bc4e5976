// src/services/catalog_service.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::CatalogStore,
    models::{
        catalog::{
            ImageDraft, MatrixReplacement, MatrixVersion, NewProduct, Product, ProductData,
            ProductDetail, ProductVariant, ProductVariantImage, SavedProduct, VariantDraft,
            VariantWithImages,
        },
        variants::UploadedFile,
    },
    services::{
        variant_keys::{
            color_key, derive_sku, ensure_skus_available, ensure_variant_codes_available,
            identity_key, next_free_sku, normalize_codes,
        },
        variant_matrix::{ensure_single_primary, MatrixTarget, VariantMatrixBuilder},
    },
    storage::{delete_quietly, slugify, ObjectStorage},
};

const CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    storage: Arc<dyn ObjectStorage>,
    matrix: VariantMatrixBuilder,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        let matrix = VariantMatrixBuilder::new(store.clone(), storage.clone());
        Self { store, storage, matrix }
    }

    async fn require_product(&self, id: Uuid) -> Result<Product, AppError> {
        self.store
            .find_product(id)
            .await?
            .ok_or(AppError::ProductNotFound(id))
    }

    // `PRD-XXXXXXXX`, tentando de novo em caso (raro) de colisão.
    async fn generate_product_code(&self) -> Result<String, AppError> {
        for _ in 0..CODE_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
            let code = format!("PRD-{}", suffix);
            if !self.store.product_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(anyhow::anyhow!("não foi possível gerar um código de produto único").into())
    }

    // --- CREATE ---
    pub async fn create_product(
        &self,
        data: ProductData,
        files: Vec<UploadedFile>,
        color_map: Option<Vec<String>>,
    ) -> Result<SavedProduct, AppError> {
        data.validate()?;

        let name = data
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::InvalidInput("O nome do produto é obrigatório.".into()))?;
        let normal_price = data
            .normal_price
            .ok_or_else(|| AppError::InvalidInput("O preço normal é obrigatório.".into()))?;

        // 1. Código do produto (informado ou gerado)
        let code = match data.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                if self.store.product_code_exists(code).await? {
                    return Err(AppError::DuplicateProductCode(code.to_string()));
                }
                code.to_string()
            }
            None => self.generate_product_code().await?,
        };

        // 2. Matriz (upload das imagens incluso)
        let groups = data.variants.clone().unwrap_or_default();
        let build = self
            .matrix
            .build(&code, data.category_id, &groups, &files, color_map.as_deref())
            .await?;

        let new_product = NewProduct {
            code,
            name: name.to_string(),
            description: data.description.clone(),
            normal_price,
            offer_price: data.offer_price,
            wholesale_price: data.wholesale_price,
            category_id: data.category_id,
            subcategory_id: data.subcategory_id,
            status: data.status.unwrap_or_default(),
        };

        // 3. Gravação atômica; se falhar, as imagens recém-enviadas saem do storage
        let product = match self
            .store
            .insert_product_with_variants(&new_product, &build.variants)
            .await
        {
            Ok(product) => product,
            Err(e) => {
                delete_quietly(self.storage.as_ref(), &build.uploaded_keys).await;
                return Err(e);
            }
        };

        tracing::info!(
            "✅ Produto {} criado com {} variante(s)",
            product.code,
            build.variants.len()
        );

        Ok(SavedProduct {
            product: self.get_product(product.id).await?,
            report: Some(build.report),
        })
    }

    // --- UPDATE ---
    pub async fn update_product(
        &self,
        id: Uuid,
        data: ProductData,
        files: Vec<UploadedFile>,
        color_map: Option<Vec<String>>,
    ) -> Result<SavedProduct, AppError> {
        data.validate()?;
        let current = self.require_product(id).await?;
        let changes = data.changes();

        if let Some(code) = changes.code.as_deref() {
            if code != current.code && self.store.product_code_exists(code).await? {
                return Err(AppError::DuplicateProductCode(code.to_string()));
            }
        }

        // Sem `variants`: a matriz atual fica exatamente como está.
        let Some(groups) = data.variants.as_deref() else {
            if !files.is_empty() {
                tracing::warn!(
                    "⚠️ {} imagem(ns) ignorada(s) no update do produto {}: nenhum grupo de variantes informado",
                    files.len(),
                    current.code
                );
            }
            self.store.update_product(id, &changes, None).await?;
            return Ok(SavedProduct {
                product: self.get_product(id).await?,
                report: None,
            });
        };

        // A versão lida aqui é conferida sob o lock na gravação: se outra
        // requisição mexer na matriz no meio tempo, este rebuild é recusado.
        let existing = self.variants_with_images(id).await?;
        let expected = MatrixVersion::of(&existing);
        let target = MatrixTarget {
            product_id: Some(id),
            product_code: changes.code.as_deref().unwrap_or(&current.code),
            category_id: changes.category_id.or(current.category_id),
        };
        let build = self
            .matrix
            .rebuild(target, &existing, groups, &files, color_map.as_deref())
            .await?;

        let replacement = MatrixReplacement {
            variants: &build.variants,
            expected: &expected,
        };
        if let Err(e) = self
            .store
            .update_product(id, &changes, Some(replacement))
            .await
        {
            delete_quietly(self.storage.as_ref(), &build.uploaded_keys).await;
            return Err(e);
        }

        // Só depois do commit: nada mais referencia estes objetos.
        delete_quietly(self.storage.as_ref(), &build.stale_keys).await;

        tracing::info!(
            "✅ Matriz do produto {} substituída: {} variante(s)",
            current.code,
            build.variants.len()
        );

        Ok(SavedProduct {
            product: self.get_product(id).await?,
            report: Some(build.report),
        })
    }

    // --- READ ---
    pub async fn get_product(&self, id: Uuid) -> Result<ProductDetail, AppError> {
        let product = self.require_product(id).await?;
        let variants = self.variants_with_images(id).await?;
        Ok(ProductDetail { product, variants })
    }

    // Variantes + imagens em duas queries (sem N+1).
    async fn variants_with_images(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<VariantWithImages>, AppError> {
        let variants = self.store.list_variants(product_id).await?;
        let ids: Vec<Uuid> = variants.iter().map(|v| v.id).collect();

        let mut images_by_variant: HashMap<Uuid, Vec<ProductVariantImage>> = HashMap::new();
        for image in self.store.list_images_for_variants(&ids).await? {
            images_by_variant.entry(image.variant_id).or_default().push(image);
        }

        Ok(variants
            .into_iter()
            .map(|variant| {
                let mut images = images_by_variant.remove(&variant.id).unwrap_or_default();
                images.sort_by_key(|i| i.position);
                VariantWithImages { variant, images }
            })
            .collect())
    }

    async fn color_variants(
        &self,
        product_id: Uuid,
        color: &str,
    ) -> Result<Vec<VariantWithImages>, AppError> {
        let key = color_key(color);
        Ok(self
            .variants_with_images(product_id)
            .await?
            .into_iter()
            .filter(|v| color_key(&v.variant.color) == key)
            .collect())
    }

    // --- ESTOQUE ---

    /// Atualiza o estoque de (cor, tamanho); se a variante não existir, ela é
    /// criada herdando as imagens e os códigos da cor.
    pub async fn update_variant_stock(
        &self,
        product_id: Uuid,
        color: &str,
        size: &str,
        stock: i32,
    ) -> Result<ProductVariant, AppError> {
        let (color, size) = (color.trim(), size.trim());
        if color.is_empty() || size.is_empty() {
            return Err(AppError::InvalidInput("Cor e tamanho são obrigatórios.".into()));
        }
        if stock < 0 {
            return Err(AppError::InvalidInput("O estoque não pode ser negativo.".into()));
        }

        let product = self.require_product(product_id).await?;
        let wanted = identity_key(product_id, color, size);

        let variants = self.store.list_variants(product_id).await?;
        if let Some(existing) = variants
            .iter()
            .find(|v| identity_key(v.product_id, &v.color, &v.size) == wanted)
        {
            let updated = self.store.set_variant_stock(existing.id, stock).await?;
            tracing::info!("📦 Estoque de {} / {} ({}) = {}", color, size, product.code, stock);
            return Ok(updated);
        }

        // Variante nova: SKU derivado + imagens e códigos das irmãs de cor
        let category_code = match product.category_id {
            Some(id) => self.store.find_category(id).await?.and_then(|c| c.code),
            None => None,
        };
        // SKU derivado já usado (aqui ou em outro produto) ganha sufixo.
        let base = derive_sku(&product.code, category_code.as_deref(), color, size);
        let mut taken: HashSet<String> = variants.iter().filter_map(|v| v.sku.clone()).collect();
        taken.extend(
            self.store
                .find_sku_owners(std::slice::from_ref(&base))
                .await?
                .into_iter()
                .map(|o| o.sku),
        );
        let sku = loop {
            let candidate = next_free_sku(&base, &mut taken);
            let owners = self.store.find_sku_owners(std::slice::from_ref(&candidate)).await?;
            if ensure_skus_available(std::slice::from_ref(&candidate), &owners, Some(product_id))
                .is_ok()
            {
                break candidate;
            }
        };

        let siblings = self.color_variants(product_id, color).await?;
        let variant_codes = siblings
            .first()
            .map(|s| s.variant.variant_codes.clone())
            .unwrap_or_default();
        let mut images: Vec<ImageDraft> = siblings
            .iter()
            .find(|s| !s.images.is_empty())
            .map(|s| {
                s.images
                    .iter()
                    .map(|i| ImageDraft {
                        image_url: i.image_url.clone(),
                        image_public_id: i.image_public_id.clone(),
                        is_primary: i.is_primary,
                    })
                    .collect()
            })
            .unwrap_or_default();
        ensure_single_primary(&mut images);

        let draft = VariantDraft {
            // Mesma grafia das irmãs, para manter o agrupamento por cor.
            color: siblings
                .first()
                .map(|s| s.variant.color.clone())
                .unwrap_or_else(|| color.to_string()),
            size: size.to_string(),
            stock,
            sku: Some(sku),
            variant_codes,
            price: None,
            wholesale_price: None,
            images,
        };
        let created = self.store.insert_variant(product_id, &draft).await?;
        tracing::info!(
            "✅ Variante {} / {} criada no produto {} (estoque {})",
            color,
            size,
            product.code,
            stock
        );
        Ok(created)
    }

    // --- CÓDIGOS POR COR ---
    pub async fn update_variant_codes(
        &self,
        product_id: Uuid,
        color: &str,
        codes: &[String],
    ) -> Result<Vec<ProductVariant>, AppError> {
        self.require_product(product_id).await?;
        let codes = normalize_codes(codes);

        let owners = self.store.find_variant_code_owners(&codes).await?;
        ensure_variant_codes_available(&owners, Some(product_id))?;

        let updated = self
            .store
            .set_color_variant_codes(product_id, color.trim(), &codes)
            .await?;
        if updated.is_empty() {
            return Err(AppError::VariantNotFound(format!("cor '{}'", color.trim())));
        }
        Ok(updated)
    }

    // --- IMAGENS POR COR ---

    /// Imagens atuais da cor (o conjunto é o mesmo em todos os tamanhos).
    async fn color_images(
        &self,
        product_id: Uuid,
        color: &str,
    ) -> Result<Vec<ProductVariantImage>, AppError> {
        Ok(self
            .color_variants(product_id, color)
            .await?
            .into_iter()
            .next()
            .map(|v| v.images)
            .unwrap_or_default())
    }

    pub async fn add_color_images(
        &self,
        product_id: Uuid,
        color: &str,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<ProductVariantImage>, AppError> {
        if files.is_empty() {
            return Err(AppError::InvalidInput("Envie pelo menos uma imagem.".into()));
        }
        let product = self.require_product(product_id).await?;
        let siblings = self.color_variants(product_id, color).await?;
        let Some(first) = siblings.first() else {
            return Err(AppError::VariantNotFound(format!("cor '{}'", color.trim())));
        };
        let has_images = siblings.iter().any(|s| !s.images.is_empty());

        let prefix = format!("products/{}/{}", product.code, slugify(&first.variant.color));
        let stored = self
            .storage
            .upload_many(&files, &prefix)
            .await
            .map_err(AppError::UploadError)?;

        let drafts: Vec<ImageDraft> = stored
            .iter()
            .enumerate()
            .map(|(index, object)| ImageDraft {
                image_url: object.url.clone(),
                image_public_id: object.key.clone(),
                // Cor sem imagens: a primeira nova vira a principal.
                is_primary: !has_images && index == 0,
            })
            .collect();

        if let Err(e) = self
            .store
            .add_color_images(product_id, &first.variant.color, &drafts)
            .await
        {
            let keys: Vec<String> = stored.into_iter().map(|o| o.key).collect();
            delete_quietly(self.storage.as_ref(), &keys).await;
            return Err(e);
        }

        tracing::info!("🖼️ {} imagem(ns) adicionada(s) à cor '{}'", drafts.len(), color);
        self.color_images(product_id, color).await
    }

    pub async fn remove_color_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_key: &str,
    ) -> Result<Vec<ProductVariantImage>, AppError> {
        self.require_product(product_id).await?;
        let removed = self
            .store
            .remove_color_image(product_id, color.trim(), image_key)
            .await?;
        if removed == 0 {
            return Err(AppError::ImageNotFound(image_key.to_string()));
        }

        // O objeto só existe para esta cor: pode sair do storage.
        delete_quietly(self.storage.as_ref(), &[image_key.to_string()]).await;
        self.color_images(product_id, color).await
    }

    pub async fn set_primary_color_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_key: &str,
    ) -> Result<Vec<ProductVariantImage>, AppError> {
        self.require_product(product_id).await?;
        let updated = self
            .store
            .set_color_primary_image(product_id, color.trim(), image_key)
            .await?;
        if updated == 0 {
            return Err(AppError::ImageNotFound(image_key.to_string()));
        }
        self.color_images(product_id, color).await
    }
}
