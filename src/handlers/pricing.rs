// src/handlers/pricing.rs

use axum::{
    extract::{Path, Query, State},
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
    models::pricing::{CartLine, CartPriceResult, PriceResult, QuantityOffersListing},
};

// Query string -> tipos já validados antes de chegar ao serviço.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct QuantityPriceQuery {
    #[validate(range(min = 1, message = "A quantidade deve ser maior ou igual a 1."))]
    pub quantity: i32,
    pub variant_id: Option<Uuid>,
    #[serde(default)]
    pub is_wholesale: bool,
}

#[utoipa::path(
    get,
    path = "/api/products/{product_id}/quantity-price",
    tag = "Pricing",
    responses(
        (status = 200, description = "Melhor preço para a quantidade", body = PriceResult),
        (status = 400, description = "Quantidade inválida"),
        (status = 404, description = "Produto ou variante não encontrado")
    ),
    params(
        ("product_id" = Uuid, Path, description = "ID do Produto"),
        QuantityPriceQuery
    )
)]
pub async fn calculate_quantity_price(
    State(app_state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<QuantityPriceQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let price = app_state
        .pricing_service
        .calculate_quantity_price(product_id, query.quantity, query.variant_id, query.is_wholesale)
        .await?;

    Ok(Json(price))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartPricesPayload {
    #[validate(length(max = 500, message = "Carrinho grande demais."))]
    pub lines: Vec<CartLine>,

    #[serde(default)]
    pub is_wholesale: bool,
}

#[utoipa::path(
    post,
    path = "/api/cart/prices",
    tag = "Pricing",
    request_body = CartPricesPayload,
    responses(
        (status = 200, description = "Preço por linha + totais. Linhas com problema vêm como FALLBACK", body = CartPriceResult)
    )
)]
pub async fn calculate_cart_prices(
    State(app_state): State<AppState>,
    Json(payload): Json<CartPricesPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let cart = app_state
        .pricing_service
        .calculate_cart_prices(&payload.lines, payload.is_wholesale)
        .await;

    Ok(Json(cart))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OffersQuery {
    /// Máximo de produtos (1 a 100, padrão 10).
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/subcategories/{subcategory_id}/quantity-offers",
    tag = "Pricing",
    responses(
        (status = 200, description = "Produtos da subcategoria com as faixas ativas", body = QuantityOffersListing),
        (status = 404, description = "Subcategoria não encontrada")
    ),
    params(
        ("subcategory_id" = Uuid, Path, description = "ID da Subcategoria"),
        OffersQuery
    )
)]
pub async fn get_products_with_quantity_offers(
    State(app_state): State<AppState>,
    Path(subcategory_id): Path<Uuid>,
    Query(query): Query<OffersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let listing = app_state
        .pricing_service
        .get_products_with_quantity_offers(subcategory_id, query.limit)
        .await?;

    Ok(Json(listing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            quantity: 2,
            variant_id: None,
        }
    }

    #[test]
    fn cart_payload_is_capped_at_500_lines() {
        let payload: CartPricesPayload = serde_json::from_value(serde_json::json!({
            "lines": [{ "productId": Uuid::new_v4(), "quantity": 3 }]
        }))
        .unwrap();
        assert!(!payload.is_wholesale);
        assert!(payload.validate().is_ok());

        let full = CartPricesPayload {
            lines: vec![line(); 500],
            is_wholesale: true,
        };
        assert!(full.validate().is_ok());

        let too_big = CartPricesPayload {
            lines: vec![line(); 501],
            is_wholesale: false,
        };
        let errors = too_big.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("lines"));
    }

    #[test]
    fn quantity_query_requires_at_least_one_unit() {
        let query = QuantityPriceQuery {
            quantity: 0,
            variant_id: None,
            is_wholesale: false,
        };
        assert!(query.validate().is_err());
    }
}
