// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Catalog ---
        handlers::catalog::create_product,
        handlers::catalog::update_product,
        handlers::catalog::get_product,
        handlers::catalog::update_variant_stock,
        handlers::catalog::update_variant_codes,
        handlers::catalog::add_color_images,
        handlers::catalog::remove_color_image,
        handlers::catalog::set_primary_color_image,

        // --- Pricing ---
        handlers::pricing::calculate_quantity_price,
        handlers::pricing::calculate_cart_prices,
        handlers::pricing::get_products_with_quantity_offers,

        // --- Tier Rules ---
        handlers::tier_rules::create_tier_rule,
        handlers::tier_rules::list_tier_rules,
        handlers::tier_rules::update_tier_rule,
    ),
    components(
        schemas(
            // --- Catalog ---
            models::catalog::ProductStatus,
            models::catalog::Category,
            models::catalog::Product,
            models::catalog::ProductVariant,
            models::catalog::ProductVariantImage,
            models::catalog::VariantWithImages,
            models::catalog::ProductDetail,
            models::catalog::ProductData,
            models::catalog::SavedProduct,

            // --- Variants ---
            models::variants::VariantGroupInput,
            models::variants::SizeInput,
            models::variants::SkippedEntry,
            models::variants::MatrixReport,

            // --- Pricing ---
            models::pricing::PriceType,
            models::pricing::Subcategory,
            models::pricing::TierRule,
            models::pricing::AppliedRule,
            models::pricing::PriceResult,
            models::pricing::CartLine,
            models::pricing::CartLineStatus,
            models::pricing::CartLineResult,
            models::pricing::CartPriceResult,
            models::pricing::ProductWithOffers,
            models::pricing::QuantityOffersListing,

            // --- Payloads ---
            handlers::catalog::ProductUpload,
            handlers::catalog::ImagesUpload,
            handlers::catalog::UpdateStockPayload,
            handlers::catalog::UpdateVariantCodesPayload,
            handlers::pricing::CartPricesPayload,
            handlers::tier_rules::CreateTierRulePayload,
            handlers::tier_rules::UpdateTierRulePayload,
        )
    ),
    tags(
        (name = "Catalog", description = "Produtos, matriz de variantes (cor x tamanho) e imagens por cor"),
        (name = "Pricing", description = "Preço por quantidade e preço do carrinho"),
        (name = "Tier Rules", description = "Faixas de preço por quantidade da subcategoria")
    )
)]
pub struct ApiDoc;
