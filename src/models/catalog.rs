// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::variants::{MatrixReport, VariantGroupInput};

// --- Enums ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "product_status", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Draft,
}

// --- 1. Categorias ---
// Só o que o motor de variantes precisa: o código curto usado no SKU.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    #[schema(example = "Camisetas")]
    pub name: String,
    #[schema(example = "CAM")]
    pub code: Option<String>,
}

// --- 2. Produtos ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(example = "PRD-1A2B3C4D")]
    pub code: String,
    #[schema(example = "Camiseta Básica")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "500.00")]
    pub normal_price: Decimal,
    pub offer_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 3. Variantes (uma linha por par cor x tamanho) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    #[schema(example = "Red")]
    pub color: String,
    #[schema(example = "M")]
    pub size: String,
    #[schema(example = 12)]
    pub stock: i32,
    #[schema(example = "PRD-1A2B3C4D-CAM-RED-M")]
    pub sku: Option<String>,
    pub variant_codes: Vec<String>,
    pub price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 4. Imagens ---
// A cor é desnormalizada para buscas por cor sem join.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariantImage {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub image_url: String,
    pub image_public_id: String,
    pub is_primary: bool,
    pub color: String,
    pub position: i32,
}

// Resposta "achatada": variante + imagens, montada com batch-fetch explícito.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantWithImages {
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub images: Vec<ProductVariantImage>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<VariantWithImages>,
}

// Quem é o dono de um SKU / código já gravado.
#[derive(Debug, Clone, FromRow)]
pub struct SkuOwner {
    pub sku: String,
    pub product_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct VariantCodeOwner {
    pub code: String,
    pub product_id: Uuid,
}

// ---
// Structs de escrita (entrada do repositório)
// ---

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub normal_price: Decimal,
    pub offer_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub status: ProductStatus,
}

/// Alterações parciais: `None` mantém o valor atual.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub normal_price: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDraft {
    pub image_url: String,
    pub image_public_id: String,
    pub is_primary: bool,
}

/// Uma linha da matriz pronta para ser gravada (imagens já enviadas ao storage).
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDraft {
    pub color: String,
    pub size: String,
    pub stock: i32,
    pub sku: Option<String>,
    pub variant_codes: Vec<String>,
    pub price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub images: Vec<ImageDraft>,
}

/// Versão da matriz lida antes de um rebuild: variantes (id, updated_at) e
/// imagens (id, principal). A gravação compara com o estado sob o lock do
/// produto e recusa se algo mudou no meio do caminho.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixVersion {
    variants: Vec<(Uuid, DateTime<Utc>)>,
    images: Vec<(Uuid, bool)>,
}

impl MatrixVersion {
    pub fn new(mut variants: Vec<(Uuid, DateTime<Utc>)>, mut images: Vec<(Uuid, bool)>) -> Self {
        variants.sort();
        images.sort();
        Self { variants, images }
    }

    pub fn of(matrix: &[VariantWithImages]) -> Self {
        Self::new(
            matrix
                .iter()
                .map(|v| (v.variant.id, v.variant.updated_at))
                .collect(),
            matrix
                .iter()
                .flat_map(|v| v.images.iter().map(|i| (i.id, i.is_primary)))
                .collect(),
        )
    }
}

/// Matriz nova + a versão sobre a qual ela foi montada.
#[derive(Debug, Clone, Copy)]
pub struct MatrixReplacement<'a> {
    pub variants: &'a [VariantDraft],
    pub expected: &'a MatrixVersion,
}

// ---
// Entrada de criação/edição (campo `data` do multipart)
// ---

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

/// Na criação `name` e `normalPrice` são obrigatórios; no update tudo é opcional
/// e `variants` ausente deixa a matriz intocada.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    #[validate(length(min = 1, max = 64, message = "O código deve ter entre 1 e 64 caracteres."))]
    pub code: Option<String>,

    #[validate(length(min = 1, max = 200, message = "O nome deve ter entre 1 e 200 caracteres."))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(custom(function = "validate_not_negative"))]
    pub normal_price: Option<Decimal>,

    #[validate(custom(function = "validate_not_negative"))]
    pub offer_price: Option<Decimal>,

    #[validate(custom(function = "validate_not_negative"))]
    pub wholesale_price: Option<Decimal>,

    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub status: Option<ProductStatus>,

    pub variants: Option<Vec<VariantGroupInput>>,
}

impl ProductData {
    pub fn changes(&self) -> ProductChanges {
        ProductChanges {
            code: self.code.as_deref().map(str::trim).map(str::to_string),
            name: self.name.clone(),
            description: self.description.clone(),
            normal_price: self.normal_price,
            offer_price: self.offer_price,
            wholesale_price: self.wholesale_price,
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
            status: self.status,
        }
    }
}

/// Resposta de criação/edição: o produto completo + o que a matriz ignorou.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedProduct {
    #[serde(flatten)]
    pub product: ProductDetail,
    pub report: Option<MatrixReport>,
}
