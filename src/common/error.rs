use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Validação (entrada do cliente) ---
    #[error("Um ou mais campos são inválidos")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("A quantidade deve ser maior ou igual a 1 (recebido: {0})")]
    InvalidQuantity(i32),

    // --- Não encontrado ---
    #[error("Produto {0} não encontrado")]
    ProductNotFound(Uuid),

    #[error("Variante não encontrada: {0}")]
    VariantNotFound(String),

    #[error("Subcategoria {0} não encontrada")]
    SubcategoryNotFound(Uuid),

    #[error("Categoria {0} não encontrada")]
    CategoryNotFound(Uuid),

    #[error("Regra de preço por quantidade {0} não encontrada")]
    TierRuleNotFound(Uuid),

    #[error("Imagem '{0}' não encontrada")]
    ImageNotFound(String),

    // --- Conflitos ---
    #[error("O SKU '{0}' já está em uso")]
    DuplicateSku(String),

    #[error("O código de variante '{0}' já está em uso por outro produto")]
    DuplicateVariantCode(String),

    #[error("Combinação cor/tamanho duplicada: {color} / {size}")]
    DuplicateVariant { color: String, size: String },

    #[error("O código de produto '{0}' já existe")]
    DuplicateProductCode(String),

    #[error("A matriz do produto {0} foi alterada por outra requisição; recarregue e tente de novo")]
    StaleMatrix(Uuid),

    // --- Storage / matriz ---
    #[error("Falha no envio das imagens: {0}")]
    UploadError(#[source] StorageError),

    #[error("Nenhuma variante válida foi informada")]
    NoValidVariants,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Categoria estável exposta ao cliente no campo `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidInput(_)
            | AppError::InvalidQuantity(_) => "ValidationError",
            AppError::ProductNotFound(_)
            | AppError::VariantNotFound(_)
            | AppError::SubcategoryNotFound(_)
            | AppError::CategoryNotFound(_)
            | AppError::TierRuleNotFound(_)
            | AppError::ImageNotFound(_) => "NotFoundError",
            AppError::DuplicateSku(_)
            | AppError::DuplicateVariantCode(_)
            | AppError::DuplicateVariant { .. }
            | AppError::DuplicateProductCode(_)
            | AppError::StaleMatrix(_) => "ConflictError",
            AppError::UploadError(_) => "UploadError",
            AppError::NoValidVariants => "NoValidVariantsError",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            "ValidationError" | "NoValidVariantsError" => StatusCode::BAD_REQUEST,
            "NotFoundError" => StatusCode::NOT_FOUND,
            "ConflictError" => StatusCode::CONFLICT,
            "UploadError" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte uma violação de unicidade do Postgres no conflito correspondente.
    /// O closure recebe o nome da constraint e o valor duplicado (quando o
    /// Postgres informa). Qualquer outro erro segue como `DatabaseError`.
    pub fn from_unique_violation(
        e: sqlx::Error,
        conflict: impl FnOnce(&str, String) -> AppError,
    ) -> AppError {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or_default().to_string();
                let value = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .and_then(duplicated_value)
                    .unwrap_or_default();
                return conflict(&constraint, value);
            }
        }
        e.into()
    }
}

// "Key (sku)=(ABC-1) already exists." -> "ABC-1"
fn duplicated_value(detail: &str) -> Option<String> {
    let start = detail.find(")=(")? + 3;
    let end = detail.rfind(')')?;
    (end > start).then(|| detail[start..end].to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        if let AppError::ValidationError(errors) = &self {
            // Retorna todos os detalhes da validação.
            let mut details = std::collections::HashMap::new();
            for (field, field_errors) in errors.field_errors() {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                details.insert(field.to_string(), messages);
            }
            let body = Json(json!({
                "kind": kind,
                "message": "Um ou mais campos são inválidos.",
                "details": details,
            }));
            return (status, body).into_response();
        }

        // Erros internos: loga o detalhe, mas não vaza para o cliente.
        let message = match &self {
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                tracing::error!("🔥 Erro Interno do Servidor: {:?}", self);
                "Ocorreu um erro inesperado.".to_string()
            }
            AppError::UploadError(e) => {
                tracing::error!("🔥 Falha no storage de objetos: {}", e);
                "Falha no envio das imagens.".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "kind": kind, "message": message }));
        (status, body).into_response()
    }
}
