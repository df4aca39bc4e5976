// src/handlers/tier_rules.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::pricing::{NewTierRule, PriceType, TierRule, TierRuleChanges},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTierRulePayload {
    #[validate(range(min = 1, message = "A quantidade mínima deve ser maior ou igual a 1."))]
    #[schema(example = 10)]
    pub quantity: i32,

    #[schema(example = "PERCENTAGE")]
    pub price_type: PriceType,

    // Percentual de desconto, ou o preço TOTAL da quantidade (FIXED_TOTAL).
    #[schema(example = "10")]
    pub value: Decimal,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[utoipa::path(
    post,
    path = "/api/subcategories/{subcategory_id}/quantity-prices",
    tag = "Tier Rules",
    request_body = CreateTierRulePayload,
    responses(
        (status = 201, description = "Faixa criada", body = TierRule),
        (status = 400, description = "Quantidade ou valor inválido"),
        (status = 404, description = "Subcategoria não encontrada")
    ),
    params(("subcategory_id" = Uuid, Path, description = "ID da Subcategoria"))
)]
pub async fn create_tier_rule(
    State(app_state): State<AppState>,
    Path(subcategory_id): Path<Uuid>,
    Json(payload): Json<CreateTierRulePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let rule = app_state
        .tier_rule_service
        .create_rule(NewTierRule {
            subcategory_id,
            quantity: payload.quantity,
            price_type: payload.price_type,
            value: payload.value,
            is_active: payload.is_active,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(rule)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListTierRulesQuery {
    /// Só as faixas ativas (padrão: false).
    #[serde(default)]
    pub active_only: bool,
}

#[utoipa::path(
    get,
    path = "/api/subcategories/{subcategory_id}/quantity-prices",
    tag = "Tier Rules",
    responses(
        (status = 200, description = "Faixas da subcategoria, da maior quantidade para a menor", body = Vec<TierRule>)
    ),
    params(
        ("subcategory_id" = Uuid, Path, description = "ID da Subcategoria"),
        ListTierRulesQuery
    )
)]
pub async fn list_tier_rules(
    State(app_state): State<AppState>,
    Path(subcategory_id): Path<Uuid>,
    Query(query): Query<ListTierRulesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rules = app_state
        .tier_rule_service
        .list_rules(subcategory_id, query.active_only)
        .await?;

    Ok(Json(rules))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTierRulePayload {
    #[validate(range(min = 1, message = "A quantidade mínima deve ser maior ou igual a 1."))]
    pub quantity: Option<i32>,
    pub price_type: Option<PriceType>,
    pub value: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    patch,
    path = "/api/quantity-prices/{rule_id}",
    tag = "Tier Rules",
    request_body = UpdateTierRulePayload,
    responses(
        (status = 200, description = "Faixa atualizada", body = TierRule),
        (status = 404, description = "Faixa não encontrada")
    ),
    params(("rule_id" = Uuid, Path, description = "ID da Faixa"))
)]
pub async fn update_tier_rule(
    State(app_state): State<AppState>,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateTierRulePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let service = &app_state.tier_rule_service;
    let rule = match payload {
        // Só o toggle: atalho para ativar/desativar.
        UpdateTierRulePayload {
            quantity: None,
            price_type: None,
            value: None,
            is_active: Some(is_active),
        } => service.set_active(rule_id, is_active).await?,
        payload => {
            service
                .update_rule(
                    rule_id,
                    TierRuleChanges {
                        quantity: payload.quantity,
                        price_type: payload.price_type,
                        value: payload.value,
                        is_active: payload.is_active,
                    },
                )
                .await?
        }
    };

    Ok(Json(rule))
}
