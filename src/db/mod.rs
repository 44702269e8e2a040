use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{GeoPoint, NearbyQuery};

pub mod memory;
pub mod postgres;
pub mod queries;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Creates the PostGIS extension, tables and indexes if they are missing.
pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    for statement in queries::SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}

/// A record kept in the entity store.
pub trait Document: Clone + Send + Sync + 'static {
    type Filter: Send + Sync;

    /// Human readable name used in error messages ("Alert not found").
    const LABEL: &'static str;

    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    fn created_by(&self) -> &str;
    fn point(&self) -> GeoPoint;
    fn matches(&self, filter: &Self::Filter) -> bool;
}

/// Runs against the current copy while the store holds it locked. Returning an error
/// aborts the write and leaves the record untouched.
pub type Mutation<T> = Box<dyn FnOnce(T) -> Result<T, AppError> + Send>;

/// Same contract as [`Mutation`] for deletes.
pub type Guard<T> = Box<dyn FnOnce(&T) -> Result<(), AppError> + Send>;

/// The single source of truth for documents of type `T`.
///
/// `modify` and `remove` are conditional writes: the check and the write happen
/// atomically with respect to other writers of the same id. `Ok(None)` means the id
/// does not resolve.
#[async_trait]
pub trait Store<T: Document>: Send + Sync {
    /// Newest first.
    async fn list(&self, filter: &T::Filter) -> Result<Vec<T>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<T>, AppError>;

    async fn insert(&self, doc: T) -> Result<T, AppError>;

    async fn modify(&self, id: Uuid, mutation: Mutation<T>) -> Result<Option<T>, AppError>;

    async fn remove(&self, id: Uuid, guard: Guard<T>) -> Result<Option<T>, AppError>;

    /// Documents whose point lies within the query radius, nearest first.
    async fn find_within(&self, query: &NearbyQuery) -> Result<Vec<T>, AppError>;
}
