// src/storage.rs
//
// Contrato do storage de objetos (imagens das variantes) e a implementação
// em disco local usada pelo binário.

pub mod local_disk;
pub use local_disk::LocalObjectStorage;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::variants::UploadedFile;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Erro de I/O no storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arquivo inválido: {0}")]
    InvalidFile(String),

    #[error("Erro do backend de storage: {0}")]
    Backend(String),
}

/// Objeto gravado: URL pública + chave usada para remover depois.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Envia os arquivos na ordem recebida. Tudo ou nada do ponto de vista do chamador.
    async fn upload_many(
        &self,
        files: &[UploadedFile],
        path_prefix: &str,
    ) -> Result<Vec<StoredObject>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn delete_many(&self, keys: &[String]) -> Result<(), StorageError>;
}

/// Limpeza "melhor esforço": falhas de remoção são logadas e engolidas.
pub async fn delete_quietly(storage: &dyn ObjectStorage, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    match storage.delete_many(keys).await {
        Ok(()) => tracing::info!("🧹 {} objeto(s) removido(s) do storage.", keys.len()),
        Err(e) => tracing::warn!(
            "⚠️ Falha ao remover {} objeto(s) do storage (ignorado): {}",
            keys.len(),
            e
        ),
    }
}

/// "Dark Blue" -> "dark-blue". Usado nos prefixos de caminho.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_dash = true;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("default");
    }
    slug
}
