use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs, sync::Mutex};

use crate::error::AppError;

/// A record persisted in one of the JSON collections under the data root.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync {
    const FILE: &'static str;

    fn id(&self) -> &str;
}

/// Flat-file document store: one JSON file per collection, whole-collection
/// reads and writes. Mutations take the store lock for the full
/// read-modify-write cycle so concurrent updates cannot drop each other.
#[derive(Clone)]
pub struct DocumentStore {
    root: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    pub async fn list<T: Document>(&self) -> Result<Vec<T>, AppError> {
        self.read_collection().await
    }

    pub async fn find<T: Document>(&self, id: &str) -> Result<T, AppError> {
        let items: Vec<T> = self.read_collection().await?;
        items
            .into_iter()
            .find(|item| item.id() == id)
            .ok_or(AppError::NotFound)
    }

    pub async fn insert<T: Document>(&self, item: T) -> Result<T, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.read_collection().await?;
        items.push(item.clone());
        self.write_collection(&items).await?;
        Ok(item)
    }

    /// Loads the document, applies `apply`, and persists the collection only
    /// if `apply` succeeds. Returns the updated document.
    pub async fn update<T, F>(&self, id: &str, apply: F) -> Result<T, AppError>
    where
        T: Document,
        F: FnOnce(&mut T) -> Result<(), AppError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut items: Vec<T> = self.read_collection().await?;
        let item = items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or(AppError::NotFound)?;
        apply(item)?;
        let updated = item.clone();
        self.write_collection(&items).await?;
        Ok(updated)
    }

    async fn read_collection<T: Document>(&self) -> Result<Vec<T>, AppError> {
        let path = self.root().join(T::FILE);
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let items: Vec<T> =
            serde_json::from_slice(&raw).map_err(|err| AppError::Other(err.into()))?;
        Ok(items)
    }

    async fn write_collection<T: Document>(&self, items: &[T]) -> Result<(), AppError> {
        let path = self.root().join(T::FILE);
        let data = serde_json::to_vec_pretty(items).map_err(|err| AppError::Other(err.into()))?;
        fs::write(path, data).await?;
        Ok(())
    }
}
