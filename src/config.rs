// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{CatalogRepository, PricingRepository},
    services::{CatalogService, PricingService, TierRuleService},
    storage::LocalObjectStorage,
};

/// Configuração lida do ambiente (`.env` incluso).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Em produção as variáveis vêm do ambiente; o .env é opcional.
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let db_max_connections = var_or("DB_MAX_CONNECTIONS", "5")
            .parse()
            .context("DB_MAX_CONNECTIONS deve ser um número")?;
        let max_upload_bytes = var_or("MAX_UPLOAD_BYTES", "20971520")
            .parse()
            .context("MAX_UPLOAD_BYTES deve ser um número")?;

        Ok(Self {
            database_url,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            db_max_connections,
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "./uploads")),
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000/uploads"),
            max_upload_bytes,
        })
    }
}

// O estado compartilhado por todos os handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub catalog_service: CatalogService,
    pub pricing_service: PricingService,
    pub tier_rule_service: TierRuleService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let catalog_repo = Arc::new(CatalogRepository::new(db_pool.clone()));
        let pricing_repo = Arc::new(PricingRepository::new(db_pool.clone()));
        let storage = Arc::new(LocalObjectStorage::new(
            config.upload_dir.clone(),
            &config.public_base_url,
        ));

        let catalog_service = CatalogService::new(catalog_repo.clone(), storage);
        let pricing_service = PricingService::new(catalog_repo, pricing_repo.clone());
        let tier_rule_service = TierRuleService::new(pricing_repo);

        Ok(Self {
            db_pool,
            catalog_service,
            pricing_service,
            tier_rule_service,
        })
    }
}
