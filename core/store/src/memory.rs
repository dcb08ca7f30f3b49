use async_trait::async_trait;
use client_console_schemas::{Collection, Row};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::adapter::{merge_row, with_identity, RemoteStore};
use crate::error::{Result, StoreError};
use crate::query::{ReadQuery, RowSet};

type LatencyFn = Arc<dyn Fn(&ReadQuery) -> Duration + Send + Sync>;

#[derive(Default)]
struct Faults {
    reads: HashMap<Collection, usize>,
    writes: usize,
}

/// Store held entirely in memory.
///
/// Rows keep insertion order, which is the natural order used to break sort
/// ties. Faults and read latency can be injected to exercise the console's
/// failure and ordering paths.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<Collection, Vec<Row>>>,
    faults: Mutex<Faults>,
    read_latency: Mutex<Option<LatencyFn>>,
    read_calls: AtomicUsize,
    key_reads: AtomicUsize,
    write_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rows directly, bypassing counters and faults
    pub fn seed(&self, collection: Collection, rows: impl IntoIterator<Item = Row>) {
        let mut tables = lock(&self.tables);
        tables.entry(collection).or_default().extend(rows);
    }

    /// Current contents of a collection in natural order
    pub fn rows(&self, collection: Collection) -> Vec<Row> {
        lock(&self.tables)
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Fail the next `count` reads (filtered or by key) against `collection`
    pub fn fail_next_reads(&self, collection: Collection, count: usize) {
        lock(&self.faults).reads.insert(collection, count);
    }

    /// Fail the next `count` writes against any collection
    pub fn fail_next_writes(&self, count: usize) {
        lock(&self.faults).writes = count;
    }

    /// Delay filtered reads. The result is computed before the delay, so a
    /// slow read reports the state of the store when it was issued.
    pub fn set_read_latency<F>(&self, latency: F)
    where
        F: Fn(&ReadQuery) -> Duration + Send + Sync + 'static,
    {
        *lock(&self.read_latency) = Some(Arc::new(latency));
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn key_reads(&self) -> usize {
        self.key_reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn take_read_fault(&self, collection: Collection) -> Result<()> {
        let mut faults = lock(&self.faults);
        match faults.reads.get_mut(&collection) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Backend(format!(
                    "injected read failure on {}",
                    collection
                )))
            }
            _ => Ok(()),
        }
    }

    fn take_write_fault(&self) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut faults = lock(&self.faults);
        if faults.writes > 0 {
            faults.writes -= 1;
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }

    fn position(rows: &[Row], key: &str) -> Option<usize> {
        rows.iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(key))
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn read(&self, query: &ReadQuery) -> Result<RowSet> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.take_read_fault(query.collection)?;

        let result = {
            let tables = lock(&self.tables);
            let mut matching: Vec<&Row> = tables
                .get(&query.collection)
                .map(|rows| rows.iter().filter(|row| query.filter.matches(row)).collect())
                .unwrap_or_default();

            if let Some(order) = query.order {
                matching.sort_by(|a, b| order.compare(a, b));
            }

            let total = matching.len() as u64;
            let rows = matching
                .into_iter()
                .skip(query.range.start as usize)
                .take(query.range.len() as usize)
                .cloned()
                .collect();
            RowSet { rows, total }
        };

        let latency = lock(&self.read_latency).clone();
        if let Some(latency) = latency {
            let delay = latency(query);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        debug!(
            "In-memory read on {}: {} of {} rows",
            query.collection,
            result.rows.len(),
            result.total
        );
        Ok(result)
    }

    async fn read_by_key(&self, collection: Collection, key: &str) -> Result<Option<Row>> {
        self.key_reads.fetch_add(1, Ordering::SeqCst);
        self.take_read_fault(collection)?;

        let tables = lock(&self.tables);
        Ok(tables
            .get(&collection)
            .and_then(|rows| Self::position(rows, key).map(|index| rows[index].clone())))
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row> {
        self.take_write_fault()?;
        let (id, row) = with_identity(collection, row)?;

        let mut tables = lock(&self.tables);
        let rows = tables.entry(collection).or_default();
        if Self::position(rows, &id).is_some() {
            return Err(StoreError::Constraint(format!(
                "duplicate key {} in {}",
                id, collection
            )));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update_by_key(&self, collection: Collection, key: &str, row: Row) -> Result<Row> {
        self.take_write_fault()?;

        let mut tables = lock(&self.tables);
        let rows = tables.entry(collection).or_default();
        let index = Self::position(rows, key).ok_or_else(|| StoreError::MissingRow {
            collection,
            key: key.to_string(),
        })?;
        merge_row(&mut rows[index], row);
        Ok(rows[index].clone())
    }

    async fn upsert_by_key(
        &self,
        collection: Collection,
        key: Option<&str>,
        mut row: Row,
    ) -> Result<Row> {
        self.take_write_fault()?;
        if let Some(key) = key {
            row.insert("id".to_string(), Value::String(key.to_string()));
        }
        let (id, row) = with_identity(collection, row)?;

        let mut tables = lock(&self.tables);
        let rows = tables.entry(collection).or_default();
        match Self::position(rows, &id) {
            Some(index) => {
                merge_row(&mut rows[index], row);
                Ok(rows[index].clone())
            }
            None => {
                rows.push(row.clone());
                Ok(row)
            }
        }
    }

    async fn delete_by_key(&self, collection: Collection, key: &str) -> Result<()> {
        self.take_write_fault()?;

        let mut tables = lock(&self.tables);
        if let Some(rows) = tables.get_mut(&collection) {
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, Order, RowRange};
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn clients_query(filter: Filter, order: Option<Order>, range: RowRange) -> ReadQuery {
        ReadQuery {
            collection: Collection::Clients,
            filter,
            order,
            range,
        }
    }

    #[tokio::test]
    async fn test_read_filters_orders_and_windows() {
        let store = InMemoryStore::new();
        store.seed(
            Collection::Clients,
            vec![
                row(json!({"id": "a", "name": "Charlie"})),
                row(json!({"id": "b", "name": "alpha"})),
                row(json!({"id": "c", "name": "Bravo"})),
            ],
        );

        let result = store
            .read(&clients_query(
                Filter::All,
                Some(Order::asc("name")),
                RowRange::new(0, 1),
            ))
            .await
            .unwrap();

        assert_eq!(result.total, 3);
        let names: Vec<_> = result.rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("Bravo"), json!("Charlie")]);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryStore::new();
        store.seed(
            Collection::Clients,
            vec![
                row(json!({"id": "first", "status": "active"})),
                row(json!({"id": "second", "status": "active"})),
            ],
        );

        let result = store
            .read(&clients_query(
                Filter::All,
                Some(Order::asc("status")),
                RowRange::new(0, 9),
            ))
            .await
            .unwrap();
        assert_eq!(result.rows[0]["id"], json!("first"));
        assert_eq!(result.rows[1]["id"], json!("second"));
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_empty() {
        let store = InMemoryStore::new();
        store.seed(Collection::Clients, vec![row(json!({"id": "a"}))]);

        let result = store
            .read(&clients_query(Filter::All, None, RowRange::new(10, 19)))
            .await
            .unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_write_paths() {
        let store = InMemoryStore::new();

        let inserted = store
            .insert(Collection::Clients, row(json!({"id": "k1", "name": "Acme"})))
            .await
            .unwrap();
        assert_eq!(inserted["name"], json!("Acme"));

        let duplicate = store
            .insert(Collection::Clients, row(json!({"id": "k1"})))
            .await;
        assert!(matches!(duplicate, Err(StoreError::Constraint(_))));

        let updated = store
            .update_by_key(Collection::Clients, "k1", row(json!({"name": "Acme Corp"})))
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("Acme Corp"));

        let missing = store
            .update_by_key(Collection::Clients, "nope", row(json!({"name": "x"})))
            .await;
        assert!(matches!(missing, Err(StoreError::MissingRow { .. })));

        store
            .upsert_by_key(Collection::Clients, Some("k2"), row(json!({"name": "Beta"})))
            .await
            .unwrap();
        store
            .upsert_by_key(Collection::Clients, Some("k2"), row(json!({"name": "Beta LLC"})))
            .await
            .unwrap();
        let k2 = store
            .read_by_key(Collection::Clients, "k2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(k2["name"], json!("Beta LLC"));
        assert_eq!(store.rows(Collection::Clients).len(), 2);

        store.delete_by_key(Collection::Clients, "k1").await.unwrap();
        store.delete_by_key(Collection::Clients, "k1").await.unwrap();
        assert!(store
            .read_by_key(Collection::Clients, "k1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_injected_faults_are_consumed() {
        let store = InMemoryStore::new();
        store.fail_next_reads(Collection::ErrorLogs, 1);
        store.fail_next_writes(1);

        let query = ReadQuery {
            collection: Collection::ErrorLogs,
            filter: Filter::All,
            order: None,
            range: RowRange::new(0, 4),
        };
        assert!(store.read(&query).await.is_err());
        assert!(store.read(&query).await.is_ok());

        assert!(store
            .insert(Collection::Clients, row(json!({"name": "x"})))
            .await
            .is_err());
        assert!(store
            .insert(Collection::Clients, row(json!({"name": "x"})))
            .await
            .is_ok());
        assert_eq!(store.read_calls(), 2);
        assert_eq!(store.write_calls(), 2);
    }
}
