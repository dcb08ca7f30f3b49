use async_trait::async_trait;
use client_console_schemas::{generate_record_id, Collection, Row};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::query::{ReadQuery, RowSet};

/// Capability exposed by the external record store.
///
/// Every call is a single statement; no multi-statement transactions are
/// required by the console.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Filtered, ordered, windowed read
    async fn read(&self, query: &ReadQuery) -> Result<RowSet>;

    /// At most one row by identity
    async fn read_by_key(&self, collection: Collection, key: &str) -> Result<Option<Row>>;

    /// Insert a row, assigning an identity when the row carries none
    async fn insert(&self, collection: Collection, row: Row) -> Result<Row>;

    /// Overwrite the given fields of an existing row
    async fn update_by_key(&self, collection: Collection, key: &str, row: Row) -> Result<Row>;

    /// Insert when the key is absent or unknown, update otherwise
    async fn upsert_by_key(
        &self,
        collection: Collection,
        key: Option<&str>,
        row: Row,
    ) -> Result<Row>;

    /// Remove a row; removing an unknown key succeeds
    async fn delete_by_key(&self, collection: Collection, key: &str) -> Result<()>;
}

/// Ensure the row carries a string `id`, generating one if absent
pub(crate) fn with_identity(collection: Collection, mut row: Row) -> Result<(String, Row)> {
    let id = match row.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        None | Some(Value::Null) => generate_record_id(collection),
        Some(other) => {
            return Err(StoreError::Constraint(format!(
                "{} id must be a string, got {}",
                collection, other
            )))
        }
    };
    row.insert("id".to_string(), Value::String(id.clone()));
    Ok((id, row))
}

/// Overlay `patch` onto `existing`; the identity column never changes
pub(crate) fn merge_row(existing: &mut Row, patch: Row) {
    for (field, value) in patch {
        if field != "id" {
            existing.insert(field, value);
        }
    }
}
