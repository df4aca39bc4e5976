//src/main.rs

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod services;
mod storage;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info".
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let product_routes = Router::new()
        .route("/", post(handlers::catalog::create_product))
        .route(
            "/{product_id}",
            get(handlers::catalog::get_product).put(handlers::catalog::update_product),
        )
        .route("/{product_id}/variants/stock", put(handlers::catalog::update_variant_stock))
        .route("/{product_id}/variants/codes", put(handlers::catalog::update_variant_codes))
        .route(
            "/{product_id}/colors/{color}/images",
            post(handlers::catalog::add_color_images).delete(handlers::catalog::remove_color_image),
        )
        .route(
            "/{product_id}/colors/{color}/images/primary",
            put(handlers::catalog::set_primary_color_image),
        )
        .route(
            "/{product_id}/quantity-price",
            get(handlers::pricing::calculate_quantity_price),
        );

    let subcategory_routes = Router::new()
        .route(
            "/{subcategory_id}/quantity-offers",
            get(handlers::pricing::get_products_with_quantity_offers),
        )
        .route(
            "/{subcategory_id}/quantity-prices",
            post(handlers::tier_rules::create_tier_rule).get(handlers::tier_rules::list_tier_rules),
        );

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/products", product_routes)
        .nest("/api/subcategories", subcategory_routes)
        .route("/api/cart/prices", post(handlers::pricing::calculate_cart_prices))
        .route("/api/quantity-prices/{rule_id}", patch(handlers::tier_rules::update_tier_rule))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
