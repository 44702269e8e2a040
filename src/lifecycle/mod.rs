//! The only writers of the entity store.
//!
//! Every mutation is expressed as a conditional write against the store so the
//! authorization check, validation and the write itself see the same copy of the record.

pub mod alerts;
pub mod reports;
pub mod resources;

pub use alerts::AlertManager;
pub use reports::ReportManager;
pub use resources::ResourceManager;

use uuid::Uuid;

use crate::db::Document;
use crate::error::AppError;

pub(crate) fn not_found<T: Document>() -> AppError {
    AppError::NotFound(format!("{} not found", T::LABEL))
}

/// Path ids that are not UUIDs cannot resolve to anything.
pub fn parse_id<T: Document>(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| not_found::<T>())
}
