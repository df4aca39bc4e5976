// src/handlers/catalog.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::{
        catalog::{ProductData, ProductDetail, ProductVariant, ProductVariantImage, SavedProduct},
        variants::UploadedFile,
    },
};

// ---
// Multipart: `data` (JSON de ProductData), `colorMap` (JSON, opcional) e arquivos
// ---

/// Formato do formulário multipart (usado só na documentação).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProductUpload {
    /// JSON com os campos do produto e `variants: [{ color, sizes: [...] }]`.
    data: String,
    /// JSON com a cor de cada arquivo, na ordem de envio. Ex.: `["Red","Blue"]`.
    color_map: Option<String>,
    /// Imagens. O nome do campo pode trazer a cor (`images[color=Red]`).
    #[schema(value_type = Vec<String>, format = Binary)]
    images: Vec<Vec<u8>>,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ImagesUpload {
    #[schema(value_type = Vec<String>, format = Binary)]
    images: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct ProductForm {
    data: Option<ProductData>,
    color_map: Option<Vec<String>>,
    files: Vec<UploadedFile>,
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::InvalidInput(format!("Formulário multipart inválido: {}", e))
}

async fn read_form(mut multipart: Multipart) -> Result<ProductForm, AppError> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            // Input de arquivo vazio no formulário.
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            form.files.push(UploadedFile {
                field_name,
                file_name,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        let text = field.text().await.map_err(multipart_error)?;
        match field_name.as_str() {
            "data" => {
                let data = serde_json::from_str(&text)
                    .map_err(|e| AppError::InvalidInput(format!("Campo 'data' inválido: {}", e)))?;
                form.data = Some(data);
            }
            "colorMap" if !text.trim().is_empty() => {
                let map = serde_json::from_str(&text)
                    .map_err(|e| AppError::InvalidInput(format!("Campo 'colorMap' inválido: {}", e)))?;
                form.color_map = Some(map);
            }
            other => tracing::debug!("Campo de formulário ignorado: {}", other),
        }
    }
    Ok(form)
}

// ---
// Handler: create_product
// ---
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Catalog",
    request_body(content = ProductUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Produto criado com a matriz de variantes", body = SavedProduct),
        (status = 400, description = "Dados inválidos ou nenhuma variante válida"),
        (status = 409, description = "SKU, código ou cor/tamanho duplicado"),
        (status = 502, description = "Falha no envio das imagens")
    )
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;
    let data = form
        .data
        .ok_or_else(|| AppError::InvalidInput("O campo 'data' é obrigatório.".into()))?;

    let saved = app_state
        .catalog_service
        .create_product(data, form.files, form.color_map)
        .await?;

    Ok((StatusCode::CREATED, Json(saved)))
}

// ---
// Handler: update_product
// ---
#[utoipa::path(
    put,
    path = "/api/products/{product_id}",
    tag = "Catalog",
    request_body(content = ProductUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Produto atualizado (sem `variants`, a matriz não muda)", body = SavedProduct),
        (status = 404, description = "Produto não encontrado")
    ),
    params(("product_id" = Uuid, Path, description = "ID do Produto"))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    Path(product_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;

    let saved = app_state
        .catalog_service
        .update_product(product_id, form.data.unwrap_or_default(), form.files, form.color_map)
        .await?;

    Ok(Json(saved))
}

#[utoipa::path(
    get,
    path = "/api/products/{product_id}",
    tag = "Catalog",
    responses(
        (status = 200, description = "Produto com variantes e imagens", body = ProductDetail),
        (status = 404, description = "Produto não encontrado")
    ),
    params(("product_id" = Uuid, Path, description = "ID do Produto"))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let product = app_state.catalog_service.get_product(product_id).await?;
    Ok(Json(product))
}

// ---
// Payload: UpdateStock
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockPayload {
    #[validate(length(min = 1, message = "A cor é obrigatória."))]
    #[schema(example = "Red")]
    pub color: String,

    #[validate(length(min = 1, message = "O tamanho é obrigatório."))]
    #[schema(example = "M")]
    pub size: String,

    #[validate(range(min = 0, message = "O estoque não pode ser negativo."))]
    #[schema(example = 10)]
    pub stock: i32,
}

#[utoipa::path(
    put,
    path = "/api/products/{product_id}/variants/stock",
    tag = "Catalog",
    request_body = UpdateStockPayload,
    responses(
        (status = 200, description = "Estoque atualizado (variante criada se não existia)", body = ProductVariant),
        (status = 404, description = "Produto não encontrado")
    ),
    params(("product_id" = Uuid, Path, description = "ID do Produto"))
)]
pub async fn update_variant_stock(
    State(app_state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateStockPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let variant = app_state
        .catalog_service
        .update_variant_stock(product_id, &payload.color, &payload.size, payload.stock)
        .await?;

    Ok(Json(variant))
}

// ---
// Payload: UpdateVariantCodes
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVariantCodesPayload {
    #[validate(length(min = 1, message = "A cor é obrigatória."))]
    #[schema(example = "Red")]
    pub color: String,

    #[serde(default)]
    #[schema(example = json!(["7891234567895"]))]
    pub codes: Vec<String>,
}

#[utoipa::path(
    put,
    path = "/api/products/{product_id}/variants/codes",
    tag = "Catalog",
    request_body = UpdateVariantCodesPayload,
    responses(
        (status = 200, description = "Códigos gravados em todos os tamanhos da cor", body = Vec<ProductVariant>),
        (status = 409, description = "Código já usado por outro produto")
    ),
    params(("product_id" = Uuid, Path, description = "ID do Produto"))
)]
pub async fn update_variant_codes(
    State(app_state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateVariantCodesPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let variants = app_state
        .catalog_service
        .update_variant_codes(product_id, &payload.color, &payload.codes)
        .await?;

    Ok(Json(variants))
}

// ---
// Imagens por cor
// ---

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageKeyQuery {
    /// Chave do objeto no storage (`imagePublicId`).
    #[validate(length(min = 1, message = "Informe a chave da imagem."))]
    pub key: String,
}

#[utoipa::path(
    post,
    path = "/api/products/{product_id}/colors/{color}/images",
    tag = "Catalog",
    request_body(content = ImagesUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Imagens anexadas a todos os tamanhos da cor", body = Vec<ProductVariantImage>)
    ),
    params(
        ("product_id" = Uuid, Path, description = "ID do Produto"),
        ("color" = String, Path, description = "Cor")
    )
)]
pub async fn add_color_images(
    State(app_state): State<AppState>,
    Path((product_id, color)): Path<(Uuid, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;

    let images = app_state
        .catalog_service
        .add_color_images(product_id, &color, form.files)
        .await?;

    Ok((StatusCode::CREATED, Json(images)))
}

#[utoipa::path(
    delete,
    path = "/api/products/{product_id}/colors/{color}/images",
    tag = "Catalog",
    responses(
        (status = 200, description = "Imagem removida; imagens restantes da cor", body = Vec<ProductVariantImage>),
        (status = 404, description = "Imagem não encontrada")
    ),
    params(
        ("product_id" = Uuid, Path, description = "ID do Produto"),
        ("color" = String, Path, description = "Cor"),
        ImageKeyQuery
    )
)]
pub async fn remove_color_image(
    State(app_state): State<AppState>,
    Path((product_id, color)): Path<(Uuid, String)>,
    Query(query): Query<ImageKeyQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let images = app_state
        .catalog_service
        .remove_color_image(product_id, &color, &query.key)
        .await?;

    Ok(Json(images))
}

#[utoipa::path(
    put,
    path = "/api/products/{product_id}/colors/{color}/images/primary",
    tag = "Catalog",
    responses(
        (status = 200, description = "Imagem principal da cor atualizada", body = Vec<ProductVariantImage>),
        (status = 404, description = "Imagem não encontrada")
    ),
    params(
        ("product_id" = Uuid, Path, description = "ID do Produto"),
        ("color" = String, Path, description = "Cor"),
        ImageKeyQuery
    )
)]
pub async fn set_primary_color_image(
    State(app_state): State<AppState>,
    Path((product_id, color)): Path<(Uuid, String)>,
    Query(query): Query<ImageKeyQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let images = app_state
        .catalog_service
        .set_primary_color_image(product_id, &color, &query.key)
        .await?;

    Ok(Json(images))
}
