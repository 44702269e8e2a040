use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Document, Guard, Mutation, Store};
use crate::error::AppError;
use crate::geo::{self, NearbyQuery};

/// Process-local store used for development and tests. Proximity queries scan every
/// document; the data set is expected to be small.
pub struct MemoryStore<T: Document> {
    docs: RwLock<HashMap<Uuid, T>>,
}

impl<T: Document> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Document> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }
}

#[async_trait]
impl<T: Document> Store<T> for MemoryStore<T> {
    async fn list(&self, filter: &T::Filter) -> Result<Vec<T>, AppError> {
        let docs = self.docs.read().await;
        let mut matching: Vec<T> = docs.values().filter(|d| d.matches(filter)).cloned().collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(matching)
    }

    async fn get(&self, id: Uuid) -> Result<Option<T>, AppError> {
        Ok(self.docs.read().await.get(&id).cloned())
    }

    async fn insert(&self, doc: T) -> Result<T, AppError> {
        let mut docs = self.docs.write().await;
        if docs.contains_key(&doc.id()) {
            return Err(AppError::Internal(format!(
                "duplicate {} id {}",
                T::LABEL,
                doc.id()
            )));
        }
        docs.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    async fn modify(&self, id: Uuid, mutation: Mutation<T>) -> Result<Option<T>, AppError> {
        // Write lock spans the check and the write.
        let mut docs = self.docs.write().await;
        let Some(current) = docs.get(&id).cloned() else {
            return Ok(None);
        };

        let updated = mutation(current)?;
        docs.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn remove(&self, id: Uuid, guard: Guard<T>) -> Result<Option<T>, AppError> {
        let mut docs = self.docs.write().await;
        let Some(current) = docs.get(&id) else {
            return Ok(None);
        };

        guard(current)?;
        Ok(docs.remove(&id))
    }

    async fn find_within(&self, query: &NearbyQuery) -> Result<Vec<T>, AppError> {
        let docs = self.docs.read().await;
        Ok(geo::within(docs.values().cloned(), query, |d| d.point()))
    }
}
