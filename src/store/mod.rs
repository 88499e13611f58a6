//! Store collaborator: the data operations a CRUD pipeline needs, over JSON rows.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::error::StoreError;
use crate::record::RecordId;
use crate::sql::Query;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// One row as a JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// Result of an upsert: the row as stored, and how many rows changed.
#[derive(Clone, Debug)]
pub struct SavedRow {
    pub row: Row,
    pub rows_affected: u64,
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Rows matching the query, honoring its orders, offset and limit.
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError>;

    async fn find_by_id(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError>;

    /// Number of rows matching the query's conditions.
    async fn count(&self, table: &str, query: &Query) -> Result<u64, StoreError>;

    /// Update the row whose id matches `row["id"]`, or insert when there is none.
    /// The store assigns ids and maintains `created_at`/`updated_at`.
    async fn save(&self, table: &str, row: Row) -> Result<SavedRow, StoreError>;

    /// Physically remove a row. Returns rows affected.
    async fn delete(&self, table: &str, id: RecordId) -> Result<u64, StoreError>;

    /// Set `deleted_at` on a row that is not yet marked. Returns rows affected.
    async fn mark_deleted(&self, table: &str, id: RecordId, at: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Connectivity check used by the readiness route.
    async fn ping(&self) -> Result<(), StoreError>;
}
