use async_trait::async_trait;
use client_console_schemas::{Collection, Row};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::adapter::{merge_row, with_identity, RemoteStore};
use crate::error::{Result, StoreError};
use crate::query::{Filter, Order, ReadQuery, RowSet, SortDirection};

/// Local SQLite-backed store.
///
/// Each collection is a table of JSON documents keyed by `id`. Filters and
/// ordering are evaluated with `json_extract`, and `rowid` provides the
/// natural order that breaks sort ties.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and initialize its schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Private in-memory database, mostly useful for tests and demos
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Count rows in a collection
    pub async fn count(&self, collection: Collection) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// `fold_case(text)` lowercases with full Unicode rules; SQLite's own
/// `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                _ => None,
            })
        },
    )?;
    Ok(())
}

/// Create one document table per collection
fn init_schema(conn: &Connection) -> Result<()> {
    for collection in Collection::ALL {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                )",
                collection.as_str()
            ),
            [],
        )?;
    }

    // Dependent collections are always read by owner
    for collection in [
        Collection::ClientActivities,
        Collection::CommonQueries,
        Collection::ErrorLogs,
    ] {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{0}_client ON {0}(json_extract(body, '$.client_id'))",
                collection.as_str()
            ),
            [],
        )?;
    }

    debug!("SQLite schema initialized");
    Ok(())
}

fn column(field: &str) -> Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::Backend(format!("unsupported field name: {}", field)));
    }
    Ok(format!("json_extract(body, '$.{}')", field))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(*flag as i64),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or(0.0)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
    match filter {
        Filter::All => Ok("1 = 1".to_string()),
        Filter::Eq { field, value } => {
            params.push(to_sql(value));
            Ok(format!("{} = ?{}", column(field)?, params.len()))
        }
        Filter::ContainsAny { fields, needle } => {
            if fields.is_empty() {
                return Ok("1 = 0".to_string());
            }
            params.push(SqlValue::Text(needle.to_lowercase()));
            let index = params.len();
            let terms = fields
                .iter()
                .map(|field| Ok(format!("instr(fold_case({}), ?{}) > 0", column(field)?, index)))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", terms.join(" OR ")))
        }
    }
}

fn order_clause(order: Option<Order>) -> Result<String> {
    let Some(order) = order else {
        return Ok("rowid ASC".to_string());
    };
    let column = column(order.field)?;
    Ok(match order.direction {
        SortDirection::Ascending => format!("({0} IS NULL) ASC, {0} ASC, rowid ASC", column),
        SortDirection::Descending => format!("({0} IS NULL) DESC, {0} DESC, rowid ASC", column),
    })
}

fn decode_body(body: &str) -> Result<Row> {
    match serde_json::from_str(body)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected an object, got {}", other))),
    }
}

fn find_body(conn: &Connection, collection: Collection, key: &str) -> Result<Option<String>> {
    let body = conn
        .query_row(
            &format!("SELECT body FROM {} WHERE id = ?1", collection.as_str()),
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(body)
}

fn write_body(conn: &Connection, collection: Collection, key: &str, row: &Row) -> Result<()> {
    conn.execute(
        &format!("UPDATE {} SET body = ?1 WHERE id = ?2", collection.as_str()),
        params![serde_json::to_string(row)?, key],
    )?;
    Ok(())
}

fn insert_body(conn: &Connection, collection: Collection, key: &str, row: &Row) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", collection.as_str()),
        params![key, serde_json::to_string(row)?],
    )?;
    Ok(())
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn read(&self, query: &ReadQuery) -> Result<RowSet> {
        let table = query.collection.as_str();
        let mut params = Vec::new();
        let filter_sql = where_clause(&query.filter, &mut params)?;
        let order_sql = order_clause(query.order)?;

        let conn = self.conn.lock().await;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {}", table, filter_sql),
            params_from_iter(params.iter()),
            |row| row.get(0),
        )?;

        // SQLite integers are signed; a window starting past i64::MAX is empty
        let Ok(offset) = i64::try_from(query.range.start) else {
            debug!("Window past end of {} ({} rows)", table, total);
            return Ok(RowSet {
                rows: Vec::new(),
                total: total as u64,
            });
        };
        let limit = i64::try_from(query.range.len()).unwrap_or(i64::MAX);

        let limit_index = params.len() + 1;
        params.push(SqlValue::Integer(limit));
        params.push(SqlValue::Integer(offset));

        let mut stmt = conn.prepare(&format!(
            "SELECT body FROM {} WHERE {} ORDER BY {} LIMIT ?{} OFFSET ?{}",
            table,
            filter_sql,
            order_sql,
            limit_index,
            limit_index + 1
        ))?;

        let bodies = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let rows = bodies
            .iter()
            .map(|body| decode_body(body))
            .collect::<Result<Vec<_>>>()?;

        debug!("Read {} of {} rows from {}", rows.len(), total, table);
        Ok(RowSet {
            rows,
            total: total as u64,
        })
    }

    async fn read_by_key(&self, collection: Collection, key: &str) -> Result<Option<Row>> {
        let conn = self.conn.lock().await;
        find_body(&conn, collection, key)?
            .map(|body| decode_body(&body))
            .transpose()
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row> {
        let (id, row) = with_identity(collection, row)?;
        let conn = self.conn.lock().await;
        insert_body(&conn, collection, &id, &row)?;

        debug!("Inserted {} row: {}", collection, id);
        Ok(row)
    }

    async fn update_by_key(&self, collection: Collection, key: &str, row: Row) -> Result<Row> {
        let conn = self.conn.lock().await;
        let body = find_body(&conn, collection, key)?.ok_or_else(|| StoreError::MissingRow {
            collection,
            key: key.to_string(),
        })?;

        let mut existing = decode_body(&body)?;
        merge_row(&mut existing, row);
        write_body(&conn, collection, key, &existing)?;

        debug!("Updated {} row: {}", collection, key);
        Ok(existing)
    }

    async fn upsert_by_key(
        &self,
        collection: Collection,
        key: Option<&str>,
        mut row: Row,
    ) -> Result<Row> {
        if let Some(key) = key {
            row.insert("id".to_string(), Value::String(key.to_string()));
        }
        let (id, row) = with_identity(collection, row)?;

        let conn = self.conn.lock().await;
        match find_body(&conn, collection, &id)? {
            Some(body) => {
                let mut existing = decode_body(&body)?;
                merge_row(&mut existing, row);
                write_body(&conn, collection, &id, &existing)?;
                debug!("Upserted (update) {} row: {}", collection, id);
                Ok(existing)
            }
            None => {
                insert_body(&conn, collection, &id, &row)?;
                debug!("Upserted (insert) {} row: {}", collection, id);
                Ok(row)
            }
        }
    }

    async fn delete_by_key(&self, collection: Collection, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.as_str()),
            params![key],
        )?;

        debug!("Deleted {} {} row(s) with key {}", removed, collection, key);
        Ok(())
    }
}
