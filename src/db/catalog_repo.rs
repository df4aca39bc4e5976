// src/db/catalog_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::CatalogStore,
    models::catalog::{
        Category, ImageDraft, MatrixReplacement, MatrixVersion, NewProduct, Product,
        ProductChanges, ProductVariant, ProductVariantImage, SkuOwner, VariantCodeOwner,
        VariantDraft,
    },
    services::variant_keys::VariantKey,
};

// Subquery reaproveitada por todas as operações "por cor".
const COLOR_VARIANT_IDS: &str =
    "SELECT id FROM product_variants WHERE product_id = $1 AND lower(color) = lower($2)";

// Limite de parâmetros ($n) de um statement no Postgres.
const PG_BIND_LIMIT: usize = 65_535;
const VARIANT_COLUMNS: usize = 8;
const IMAGE_COLUMNS: usize = 6;

/// Quantas linhas cabem num único INSERT sem estourar o limite de binds.
fn rows_per_insert(columns: usize) -> usize {
    PG_BIND_LIMIT / columns
}

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Traduz as constraints de unicidade da matriz para erros de conflito.
    fn map_variant_conflict(e: sqlx::Error) -> AppError {
        AppError::from_unique_violation(e, |constraint, value| {
            if constraint.contains("sku") {
                AppError::DuplicateSku(value)
            } else {
                // product_variants_identity_key: "(product_id, cor, tamanho)"
                let mut parts = value.split(", ").skip(1);
                AppError::DuplicateVariant {
                    color: parts.next().unwrap_or_default().to_string(),
                    size: parts.next().unwrap_or_default().to_string(),
                }
            }
        })
    }

    /// Serializa rebuilds concorrentes do mesmo produto até o fim da transação.
    async fn lock_product<'e, E>(executor: E, product_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(product_id.to_string())
            .execute(executor)
            .await?;
        Ok(())
    }

    // Mesmo lock, agora a partir de uma variante.
    async fn lock_product_of_variant(
        conn: &mut PgConnection,
        variant_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "SELECT pg_advisory_xact_lock(hashtextextended(product_id::text, 0)) \
             FROM product_variants WHERE id = $1",
        )
        .bind(variant_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Estado atual da matriz; chamar com o lock do produto já adquirido.
    async fn matrix_version(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<MatrixVersion, AppError> {
        let variants: Vec<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, updated_at FROM product_variants WHERE product_id = $1")
                .bind(product_id)
                .fetch_all(&mut *conn)
                .await?;

        let images: Vec<(Uuid, bool)> = sqlx::query_as(
            r#"
            SELECT i.id, i.is_primary
            FROM product_variant_images i
            JOIN product_variants v ON v.id = i.variant_id
            WHERE v.product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(MatrixVersion::new(variants, images))
    }

    /// "Create many" da matriz: variantes e imagens em INSERTs em lote.
    async fn insert_matrix(
        conn: &mut PgConnection,
        product_id: Uuid,
        variants: &[VariantDraft],
    ) -> Result<Vec<ProductVariant>, AppError> {
        if variants.is_empty() {
            return Ok(Vec::new());
        }

        let mut created: Vec<ProductVariant> = Vec::with_capacity(variants.len());
        for chunk in variants.chunks(rows_per_insert(VARIANT_COLUMNS)) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO product_variants \
                 (product_id, color, size, stock, sku, variant_codes, price, wholesale_price) ",
            );
            qb.push_values(chunk, |mut row, v| {
                row.push_bind(product_id)
                    .push_bind(v.color.clone())
                    .push_bind(v.size.clone())
                    .push_bind(v.stock)
                    .push_bind(v.sku.clone())
                    .push_bind(v.variant_codes.clone())
                    .push_bind(v.price)
                    .push_bind(v.wholesale_price);
            });
            qb.push(" RETURNING *");

            let rows: Vec<ProductVariant> = qb
                .build_query_as()
                .fetch_all(&mut *conn)
                .await
                .map_err(Self::map_variant_conflict)?;
            created.extend(rows);
        }

        // A ordem do RETURNING não é garantida: casamos pela identidade.
        let ids: HashMap<VariantKey, Uuid> = created
            .iter()
            .map(|v| (VariantKey::new(&v.color, &v.size), v.id))
            .collect();

        let mut image_rows: Vec<(Uuid, &str, &ImageDraft, i32)> = Vec::new();
        for draft in variants {
            let Some(variant_id) = ids.get(&VariantKey::new(&draft.color, &draft.size)) else {
                continue;
            };
            for (position, image) in draft.images.iter().enumerate() {
                image_rows.push((*variant_id, draft.color.as_str(), image, position as i32));
            }
        }
        Self::insert_images(conn, &image_rows).await?;

        Ok(created)
    }

    async fn insert_images(
        conn: &mut PgConnection,
        rows: &[(Uuid, &str, &ImageDraft, i32)],
    ) -> Result<(), AppError> {
        // Matriz grande (ex.: 1000 variantes x 12 imagens) vai em vários INSERTs.
        for chunk in rows.chunks(rows_per_insert(IMAGE_COLUMNS)) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO product_variant_images \
                 (variant_id, image_url, image_public_id, is_primary, color, position) ",
            );
            qb.push_values(chunk, |mut row, (variant_id, color, image, position)| {
                row.push_bind(*variant_id)
                    .push_bind(image.image_url.clone())
                    .push_bind(image.image_public_id.clone())
                    .push_bind(image.is_primary)
                    .push_bind(color.to_string())
                    .push_bind(*position);
            });
            qb.build().execute(&mut *conn).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    // ---
    // Funções de "Leitura"
    // ---

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn product_code_exists(&self, code: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        let category =
            sqlx::query_as::<_, Category>("SELECT id, name, code FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(category)
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<ProductVariant>, AppError> {
        let variant =
            sqlx::query_as::<_, ProductVariant>("SELECT * FROM product_variants WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(variant)
    }

    async fn list_variants(&self, product_id: Uuid) -> Result<Vec<ProductVariant>, AppError> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT * FROM product_variants
            WHERE product_id = $1
            ORDER BY created_at ASC, lower(color) ASC, lower(size) ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(variants)
    }

    async fn list_images_for_variants(
        &self,
        variant_ids: &[Uuid],
    ) -> Result<Vec<ProductVariantImage>, AppError> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let images = sqlx::query_as::<_, ProductVariantImage>(
            r#"
            SELECT * FROM product_variant_images
            WHERE variant_id = ANY($1)
            ORDER BY variant_id, position ASC
            "#,
        )
        .bind(variant_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    async fn find_sku_owners(&self, skus: &[String]) -> Result<Vec<SkuOwner>, AppError> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }
        let owners = sqlx::query_as::<_, SkuOwner>(
            "SELECT sku, product_id FROM product_variants WHERE sku = ANY($1)",
        )
        .bind(skus)
        .fetch_all(&self.pool)
        .await?;
        Ok(owners)
    }

    async fn find_variant_code_owners(
        &self,
        codes: &[String],
    ) -> Result<Vec<VariantCodeOwner>, AppError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let owners = sqlx::query_as::<_, VariantCodeOwner>(
            r#"
            SELECT DISTINCT c.code, v.product_id
            FROM product_variants v
            CROSS JOIN LATERAL unnest(v.variant_codes) AS c(code)
            WHERE v.variant_codes && $1 AND c.code = ANY($1)
            "#,
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;
        Ok(owners)
    }

    async fn list_products_by_subcategory(
        &self,
        subcategory_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE subcategory_id = $1 AND status = 'ACTIVE'
            ORDER BY name ASC
            LIMIT $2
            "#,
        )
        .bind(subcategory_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    async fn insert_product_with_variants(
        &self,
        product: &NewProduct,
        variants: &[VariantDraft],
    ) -> Result<Product, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                code, name, description, normal_price, offer_price, wholesale_price,
                category_id, subcategory_id, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.normal_price)
        .bind(product.offer_price)
        .bind(product.wholesale_price)
        .bind(product.category_id)
        .bind(product.subcategory_id)
        .bind(product.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, |_, _| {
                AppError::DuplicateProductCode(product.code.clone())
            })
        })?;

        Self::insert_matrix(&mut *tx, created.id, variants).await?;

        // Se algo falhar acima, o tx sofre rollback automático no drop.
        tx.commit().await?;
        Ok(created)
    }

    async fn update_product(
        &self,
        id: Uuid,
        changes: &ProductChanges,
        matrix: Option<MatrixReplacement<'_>>,
    ) -> Result<Product, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock + conferência da versão: quem montou a matriz sobre um estado
        // antigo não sobrescreve (nem apaga) o que outra requisição gravou.
        if let Some(replacement) = matrix {
            Self::lock_product(&mut *tx, id).await?;
            let current = Self::matrix_version(&mut *tx, id).await?;
            if &current != replacement.expected {
                tracing::warn!(
                    "⚠️ Matriz do produto {} mudou desde a leitura; rebuild recusado",
                    id
                );
                return Err(AppError::StaleMatrix(id));
            }
        }

        // COALESCE: campo ausente mantém o valor atual.
        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                normal_price = COALESCE($5, normal_price),
                offer_price = COALESCE($6, offer_price),
                wholesale_price = COALESCE($7, wholesale_price),
                category_id = COALESCE($8, category_id),
                subcategory_id = COALESCE($9, subcategory_id),
                status = COALESCE($10, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.code)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.normal_price)
        .bind(changes.offer_price)
        .bind(changes.wholesale_price)
        .bind(changes.category_id)
        .bind(changes.subcategory_id)
        .bind(changes.status)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, |_, value| AppError::DuplicateProductCode(value))
        })?
        .ok_or(AppError::ProductNotFound(id))?;

        if let Some(replacement) = matrix {
            // As imagens caem junto (ON DELETE CASCADE).
            sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            Self::insert_matrix(&mut *tx, id, replacement.variants).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn set_variant_stock(
        &self,
        variant_id: Uuid,
        stock: i32,
    ) -> Result<ProductVariant, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_product_of_variant(&mut *tx, variant_id).await?;

        let updated = sqlx::query_as::<_, ProductVariant>(
            r#"
            UPDATE product_variants SET stock = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(variant_id)
        .bind(stock)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::VariantNotFound(variant_id.to_string()))?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn insert_variant(
        &self,
        product_id: Uuid,
        draft: &VariantDraft,
    ) -> Result<ProductVariant, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_product(&mut *tx, product_id).await?;
        let mut created =
            Self::insert_matrix(&mut *tx, product_id, std::slice::from_ref(draft)).await?;
        tx.commit().await?;

        created
            .pop()
            .ok_or_else(|| AppError::VariantNotFound(format!("{} / {}", draft.color, draft.size)))
    }

    async fn set_color_variant_codes(
        &self,
        product_id: Uuid,
        color: &str,
        codes: &[String],
    ) -> Result<Vec<ProductVariant>, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_product(&mut *tx, product_id).await?;

        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            UPDATE product_variants SET variant_codes = $3, updated_at = now()
            WHERE product_id = $1 AND lower(color) = lower($2)
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(color)
        .bind(codes)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(variants)
    }

    async fn add_color_images(
        &self,
        product_id: Uuid,
        color: &str,
        images: &[ImageDraft],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_product(&mut *tx, product_id).await?;

        let variants: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, color FROM product_variants WHERE product_id = $1 AND lower(color) = lower($2)",
        )
        .bind(product_id)
        .bind(color)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<Uuid> = variants.iter().map(|(id, _)| *id).collect();
        let next_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM product_variant_images WHERE variant_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_one(&mut *tx)
        .await?;

        let mut rows = Vec::with_capacity(variants.len() * images.len());
        for (variant_id, variant_color) in &variants {
            for (offset, image) in images.iter().enumerate() {
                rows.push((
                    *variant_id,
                    variant_color.as_str(),
                    image,
                    next_position + offset as i32,
                ));
            }
        }
        Self::insert_images(&mut *tx, &rows).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_color_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_public_id: &str,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_product(&mut *tx, product_id).await?;

        let removed: Vec<bool> = sqlx::query_scalar(&format!(
            r#"
            DELETE FROM product_variant_images
            WHERE variant_id IN ({COLOR_VARIANT_IDS}) AND image_public_id = $3
            RETURNING is_primary
            "#
        ))
        .bind(product_id)
        .bind(color)
        .bind(image_public_id)
        .fetch_all(&mut *tx)
        .await?;

        // Era a principal: promove a próxima imagem (menor posição) de cada tamanho.
        if removed.iter().any(|was_primary| *was_primary) {
            sqlx::query(&format!(
                r#"
                UPDATE product_variant_images SET is_primary = true
                WHERE id IN (
                    SELECT DISTINCT ON (variant_id) id
                    FROM product_variant_images
                    WHERE variant_id IN ({COLOR_VARIANT_IDS})
                    ORDER BY variant_id, position ASC
                )
                "#
            ))
            .bind(product_id)
            .bind(color)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed.len() as u64)
    }

    async fn set_color_primary_image(
        &self,
        product_id: Uuid,
        color: &str,
        image_public_id: &str,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_product(&mut *tx, product_id).await?;

        let matches: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM product_variant_images WHERE variant_id IN ({COLOR_VARIANT_IDS}) AND image_public_id = $3"
        ))
        .bind(product_id)
        .bind(color)
        .bind(image_public_id)
        .fetch_one(&mut *tx)
        .await?;

        if matches == 0 {
            return Ok(0);
        }

        sqlx::query(&format!(
            r#"
            UPDATE product_variant_images SET is_primary = (image_public_id = $3)
            WHERE variant_id IN ({COLOR_VARIANT_IDS})
            "#
        ))
        .bind(product_id)
        .bind(color)
        .bind(image_public_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(matches as u64)
    }
}
