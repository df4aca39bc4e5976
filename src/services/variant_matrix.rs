// src/services/variant_matrix.rs
//
// Monta a matriz de variantes (cor x tamanho) de um produto: valida os grupos,
// distribui as imagens por cor, envia as imagens ao storage, define os SKUs e,
// no update, carrega para frente o que a requisição omitiu.
//
// O builder NÃO grava no banco: devolve as linhas prontas (`VariantDraft`) e
// as chaves de storage envolvidas, e o CatalogService grava tudo numa transação.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CatalogStore,
    models::{
        catalog::{ImageDraft, ProductVariant, VariantDraft, VariantWithImages},
        variants::{MatrixReport, SkippedEntry, UploadedFile, VariantGroupInput},
    },
    services::{
        image_grouping::group_images,
        variant_keys::{
            color_key, derive_sku, disambiguate_derived_skus, ensure_skus_available,
            ensure_variant_codes_available, normalize_codes, VariantKey,
        },
    },
    storage::{delete_quietly, slugify, ObjectStorage},
};

/// Resultado da montagem, pronto para a gravação atômica.
#[derive(Debug)]
pub struct MatrixBuild {
    pub variants: Vec<VariantDraft>,
    /// Objetos enviados nesta chamada (remover se a gravação falhar).
    pub uploaded_keys: Vec<String>,
    /// Objetos antigos que deixam de ser referenciados (remover após o commit).
    pub stale_keys: Vec<String>,
    pub report: MatrixReport,
}

/// Produto alvo da montagem.
#[derive(Debug, Clone, Copy)]
pub struct MatrixTarget<'a> {
    /// `None` na criação (o produto ainda não existe).
    pub product_id: Option<Uuid>,
    pub product_code: &'a str,
    pub category_id: Option<Uuid>,
}

// --- Planejamento (puro) ---

#[derive(Debug)]
struct PlannedSize {
    size: String,
    stock: Option<i32>,
    sku: Option<String>,
    price: Option<Decimal>,
    wholesale_price: Option<Decimal>,
}

#[derive(Debug)]
struct PlannedColor {
    color: String,
    codes: Option<Vec<String>>,
    sizes: Vec<PlannedSize>,
}

#[derive(Debug)]
struct MatrixPlan {
    colors: Vec<PlannedColor>,
    // Todas as cores não vazias declaradas, inclusive as sem tamanho válido.
    declared_colors: Vec<String>,
    skipped: Vec<SkippedEntry>,
}

impl MatrixPlan {
    fn variant_count(&self) -> usize {
        self.colors.iter().map(|c| c.sizes.len()).sum()
    }
}

fn plan_matrix(groups: &[VariantGroupInput]) -> Result<MatrixPlan, AppError> {
    let mut plan = MatrixPlan {
        colors: Vec::new(),
        declared_colors: Vec::new(),
        skipped: Vec::new(),
    };
    let mut seen: HashSet<VariantKey> = HashSet::new();

    for group in groups {
        let color = group.color.trim();
        if color.is_empty() {
            plan.skipped.push(SkippedEntry {
                color: String::new(),
                size_index: None,
                reason: "cor em branco".into(),
            });
            continue;
        }
        if !plan.declared_colors.iter().any(|c| color_key(c) == color_key(color)) {
            plan.declared_colors.push(color.to_string());
        }

        let mut sizes = Vec::new();
        for (index, entry) in group.sizes.iter().enumerate() {
            let size = entry.size.trim();
            if size.is_empty() {
                plan.skipped.push(SkippedEntry {
                    color: color.to_string(),
                    size_index: Some(index),
                    reason: "tamanho em branco".into(),
                });
                continue;
            }
            if let Some(stock) = entry.stock {
                if stock < 0 {
                    return Err(AppError::InvalidInput(format!(
                        "Estoque negativo para {} / {}",
                        color, size
                    )));
                }
            }
            if !seen.insert(VariantKey::new(color, size)) {
                return Err(AppError::DuplicateVariant {
                    color: color.to_string(),
                    size: size.to_string(),
                });
            }
            sizes.push(PlannedSize {
                size: size.to_string(),
                stock: entry.stock,
                sku: entry
                    .sku
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                price: entry.price,
                wholesale_price: entry.wholesale_price,
            });
        }

        if sizes.is_empty() {
            plan.skipped.push(SkippedEntry {
                color: color.to_string(),
                size_index: None,
                reason: "nenhum tamanho válido".into(),
            });
            continue;
        }

        let codes = group.variant_codes.as_deref().map(normalize_codes);

        // A mesma cor em dois grupos vira uma cor só.
        match plan.colors.iter_mut().find(|c| color_key(&c.color) == color_key(color)) {
            Some(existing) => {
                existing.sizes.extend(sizes);
                if codes.is_some() {
                    existing.codes = codes;
                }
            }
            None => plan.colors.push(PlannedColor {
                color: color.to_string(),
                codes,
                sizes,
            }),
        }
    }

    Ok(plan)
}

// --- Estado anterior (rebuild) ---

#[derive(Default)]
struct PriorMatrix<'a> {
    by_key: HashMap<VariantKey, &'a ProductVariant>,
    images_by_color: HashMap<String, Vec<ImageDraft>>,
    keys_by_color: HashMap<String, Vec<String>>,
    codes_by_color: HashMap<String, Vec<String>>,
}

impl<'a> PriorMatrix<'a> {
    fn from_existing(existing: &'a [VariantWithImages]) -> Self {
        let mut prior = PriorMatrix::default();

        for entry in existing {
            let variant = &entry.variant;
            let color = color_key(&variant.color);
            prior.by_key.insert(VariantKey::new(&variant.color, &variant.size), variant);

            if !variant.variant_codes.is_empty() {
                prior
                    .codes_by_color
                    .entry(color.clone())
                    .or_insert_with(|| variant.variant_codes.clone());
            }

            let keys = prior.keys_by_color.entry(color.clone()).or_default();
            for image in &entry.images {
                if !keys.contains(&image.image_public_id) {
                    keys.push(image.image_public_id.clone());
                }
            }

            // O conjunto é compartilhado entre os tamanhos: basta o do primeiro.
            if !entry.images.is_empty() && !prior.images_by_color.contains_key(&color) {
                let mut images = entry.images.clone();
                images.sort_by_key(|i| i.position);
                let mut drafts: Vec<ImageDraft> = images
                    .into_iter()
                    .map(|i| ImageDraft {
                        image_url: i.image_url,
                        image_public_id: i.image_public_id,
                        is_primary: i.is_primary,
                    })
                    .collect();
                ensure_single_primary(&mut drafts);
                prior.images_by_color.insert(color, drafts);
            }
        }
        prior
    }
}

/// Exatamente uma imagem principal sempre que houver imagens.
pub(crate) fn ensure_single_primary(images: &mut [ImageDraft]) {
    let primary = images.iter().position(|i| i.is_primary).unwrap_or(0);
    for (index, image) in images.iter_mut().enumerate() {
        image.is_primary = index == primary;
    }
}

// --- Builder ---

#[derive(Clone)]
pub struct VariantMatrixBuilder {
    store: Arc<dyn CatalogStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl VariantMatrixBuilder {
    pub fn new(store: Arc<dyn CatalogStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    /// Criação: nenhum estado anterior.
    pub async fn build(
        &self,
        product_code: &str,
        category_id: Option<Uuid>,
        groups: &[VariantGroupInput],
        files: &[UploadedFile],
        color_map: Option<&[String]>,
    ) -> Result<MatrixBuild, AppError> {
        let target = MatrixTarget {
            product_id: None,
            product_code,
            category_id,
        };
        self.assemble(target, &[], groups, files, color_map).await
    }

    /// Update com grupos informados: substitui a matriz, preservando o que
    /// a requisição omitiu (imagens, estoque, SKU e códigos por cor).
    pub async fn rebuild(
        &self,
        target: MatrixTarget<'_>,
        existing: &[VariantWithImages],
        groups: &[VariantGroupInput],
        files: &[UploadedFile],
        color_map: Option<&[String]>,
    ) -> Result<MatrixBuild, AppError> {
        self.assemble(target, existing, groups, files, color_map).await
    }

    async fn category_code(&self, category_id: Option<Uuid>) -> Result<Option<String>, AppError> {
        let Some(id) = category_id else {
            return Ok(None);
        };
        let category = self
            .store
            .find_category(id)
            .await?
            .ok_or(AppError::CategoryNotFound(id))?;
        Ok(category.code)
    }

    async fn assemble(
        &self,
        target: MatrixTarget<'_>,
        existing: &[VariantWithImages],
        groups: &[VariantGroupInput],
        files: &[UploadedFile],
        color_map: Option<&[String]>,
    ) -> Result<MatrixBuild, AppError> {
        if groups.is_empty() {
            return Err(AppError::InvalidInput(
                "Informe pelo menos um grupo de variantes (cor + tamanhos).".into(),
            ));
        }

        // 1. Validação dos grupos
        let plan = plan_matrix(groups)?;
        if plan.variant_count() == 0 {
            return Err(AppError::NoValidVariants);
        }

        let prior = PriorMatrix::from_existing(existing);
        let category_code = self.category_code(target.category_id).await?;

        // 2. SKUs e códigos por cor (herdando do estado anterior quando omitidos)
        let mut rows: Vec<VariantDraft> = Vec::with_capacity(plan.variant_count());
        let mut skus: Vec<String> = Vec::with_capacity(plan.variant_count());
        let mut derived: Vec<bool> = Vec::with_capacity(plan.variant_count());
        for planned in &plan.colors {
            let ckey = color_key(&planned.color);
            let codes = planned
                .codes
                .clone()
                .or_else(|| prior.codes_by_color.get(&ckey).cloned())
                .unwrap_or_default();

            for size in &planned.sizes {
                let previous = prior.by_key.get(&VariantKey::new(&planned.color, &size.size));
                match size.sku.clone().or_else(|| previous.and_then(|p| p.sku.clone())) {
                    Some(sku) => {
                        skus.push(sku);
                        derived.push(false);
                    }
                    None => {
                        skus.push(derive_sku(
                            target.product_code,
                            category_code.as_deref(),
                            &planned.color,
                            &size.size,
                        ));
                        derived.push(true);
                    }
                }

                rows.push(VariantDraft {
                    color: planned.color.clone(),
                    size: size.size.clone(),
                    stock: size.stock.or(previous.map(|p| p.stock)).unwrap_or(0),
                    sku: None,
                    variant_codes: codes.clone(),
                    price: size.price.or(previous.and_then(|p| p.price)),
                    wholesale_price: size
                        .wholesale_price
                        .or(previous.and_then(|p| p.wholesale_price)),
                    images: Vec::new(),
                });
            }
        }

        // Conflitos antes de qualquer upload. SKU derivado que colide ganha
        // sufixo; só os informados pelo cliente viram conflito.
        let owners = self.store.find_sku_owners(&skus).await?;
        let foreign: HashSet<String> = owners
            .iter()
            .filter(|o| Some(o.product_id) != target.product_id)
            .map(|o| o.sku.clone())
            .collect();
        let requested = skus.clone();
        disambiguate_derived_skus(&mut skus, &derived, &foreign);
        let owners = if skus == requested {
            owners
        } else {
            self.store.find_sku_owners(&skus).await?
        };
        ensure_skus_available(&skus, &owners, target.product_id)?;
        for (row, sku) in rows.iter_mut().zip(skus) {
            row.sku = Some(sku);
        }

        let mut all_codes: Vec<String> = rows.iter().flat_map(|r| r.variant_codes.clone()).collect();
        all_codes.sort();
        all_codes.dedup();
        let code_owners = self.store.find_variant_code_owners(&all_codes).await?;
        ensure_variant_codes_available(&code_owners, target.product_id)?;

        // 3. Imagens por cor
        let grouping = group_images(files, &plan.declared_colors, color_map);
        let mut report = MatrixReport {
            skipped: plan.skipped.clone(),
            warnings: grouping.warnings.clone(),
        };
        for color in grouping.colors_with_files() {
            if !plan.colors.iter().any(|c| color_key(&c.color) == color_key(color)) {
                report.warnings.push(format!(
                    "{} imagem(ns) da cor '{}' ignorada(s): a cor não tem tamanhos válidos",
                    grouping.files_for(color).len(),
                    color
                ));
            }
        }

        let mut uploaded_keys: Vec<String> = Vec::new();
        let mut images_by_color: HashMap<String, Vec<ImageDraft>> = HashMap::new();
        let mut replaced_colors: HashSet<String> = HashSet::new();

        for planned in &plan.colors {
            let ckey = color_key(&planned.color);
            let color_files = grouping.files_for(&planned.color);

            if color_files.is_empty() {
                // Sem arquivos novos: o conjunto anterior segue intacto.
                if let Some(previous) = prior.images_by_color.get(&ckey) {
                    images_by_color.insert(ckey, previous.clone());
                }
                continue;
            }

            let batch: Vec<UploadedFile> = color_files.iter().map(|f| (*f).clone()).collect();
            let prefix = format!("products/{}/{}", target.product_code, slugify(&planned.color));
            let stored = match self.storage.upload_many(&batch, &prefix).await {
                Ok(stored) => stored,
                Err(e) => {
                    // Nada de variante sem as imagens declaradas: desfaz e aborta.
                    delete_quietly(self.storage.as_ref(), &uploaded_keys).await;
                    return Err(AppError::UploadError(e));
                }
            };

            tracing::info!(
                "🖼️ {} imagem(ns) enviada(s) para a cor '{}' ({})",
                stored.len(),
                planned.color,
                prefix
            );

            let drafts: Vec<ImageDraft> = stored
                .iter()
                .enumerate()
                .map(|(index, object)| ImageDraft {
                    image_url: object.url.clone(),
                    image_public_id: object.key.clone(),
                    is_primary: index == 0,
                })
                .collect();
            uploaded_keys.extend(stored.into_iter().map(|o| o.key));
            replaced_colors.insert(ckey.clone());
            images_by_color.insert(ckey, drafts);
        }

        // 4. O mesmo conjunto de imagens em todos os tamanhos da cor
        for row in &mut rows {
            if let Some(images) = images_by_color.get(&color_key(&row.color)) {
                row.images = images.clone();
            }
        }

        // Objetos antigos: só os das cores que receberam imagens novas.
        let mut stale_keys: Vec<String> = Vec::new();
        for (color, keys) in &prior.keys_by_color {
            if replaced_colors.contains(color) {
                stale_keys.extend(keys.iter().cloned());
            }
        }
        stale_keys.sort();
        stale_keys.dedup();

        if !report.skipped.is_empty() {
            tracing::warn!(
                "⚠️ {} entrada(s) da matriz ignorada(s) para o produto {}",
                report.skipped.len(),
                target.product_code
            );
        }

        Ok(MatrixBuild {
            variants: rows,
            uploaded_keys,
            stale_keys,
            report,
        })
    }
}
