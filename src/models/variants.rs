// src/models/variants.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Entrada da matriz: um grupo por cor, com N tamanhos ---
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantGroupInput {
    #[serde(default)]
    #[schema(example = "Red")]
    pub color: String,

    #[serde(default)]
    pub sizes: Vec<SizeInput>,

    // Códigos externos associados à COR (propagados para todos os tamanhos).
    pub variant_codes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SizeInput {
    #[serde(default)]
    #[schema(example = "M")]
    pub size: String,
    pub stock: Option<i32>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
}

/// Arquivo recebido via multipart, ainda não enviado ao storage.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Nome do campo do formulário (pode carregar a tag de cor).
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

// --- Relatório do montador da matriz ---

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub color: String,
    /// Posição do tamanho dentro do grupo (None = grupo inteiro ignorado).
    pub size_index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatrixReport {
    pub skipped: Vec<SkippedEntry>,
    pub warnings: Vec<String>,
}
