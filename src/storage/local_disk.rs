// src/storage/local_disk.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::{slugify, ObjectStorage, StorageError, StoredObject};
use crate::models::variants::UploadedFile;

/// Storage em disco: grava em `root/<prefixo>/<uuid>-<nome>` e expõe a URL
/// `public_base_url/<chave>`. Serve para desenvolvimento e instalações pequenas.
#[derive(Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    // Chaves nunca podem escapar do diretório raiz.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !is_safe || key.is_empty() {
            return Err(StorageError::InvalidFile(format!("chave inválida: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn file_key(path_prefix: &str, file: &UploadedFile) -> String {
        let (stem, ext) = match file.file_name.rsplit_once('.') {
            Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext.to_ascii_lowercase())),
            _ => (file.file_name.as_str(), None),
        };
        let prefix = path_prefix
            .split('/')
            .filter(|p| !p.is_empty())
            .map(slugify)
            .collect::<Vec<_>>()
            .join("/");
        let name = match ext {
            Some(ext) => format!("{}-{}.{}", Uuid::new_v4().simple(), slugify(stem), slugify(&ext)),
            None => format!("{}-{}", Uuid::new_v4().simple(), slugify(stem)),
        };
        if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload_many(
        &self,
        files: &[UploadedFile],
        path_prefix: &str,
    ) -> Result<Vec<StoredObject>, StorageError> {
        let mut stored: Vec<StoredObject> = Vec::with_capacity(files.len());

        for file in files {
            if file.data.is_empty() {
                // Desfaz o que já foi gravado nesta chamada.
                self.delete_many(&stored.iter().map(|o| o.key.clone()).collect::<Vec<_>>())
                    .await
                    .ok();
                return Err(StorageError::InvalidFile(format!(
                    "arquivo '{}' está vazio",
                    file.file_name
                )));
            }

            let key = Self::file_key(path_prefix, file);
            let path = self.path_for(&key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if let Err(e) = tokio::fs::write(&path, &file.data).await {
                self.delete_many(&stored.iter().map(|o| o.key.clone()).collect::<Vec<_>>())
                    .await
                    .ok();
                return Err(e.into());
            }

            stored.push(StoredObject {
                url: format!("{}/{}", self.public_base_url, key),
                key,
            });
        }

        Ok(stored)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Já removido: nada a fazer.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.delete(key).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
