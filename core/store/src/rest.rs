use async_trait::async_trait;
use client_console_schemas::{Collection, Row};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{with_identity, RemoteStore};
use crate::error::{Result, StoreError};
use crate::query::{Filter, ReadQuery, RowSet};

/// Adapter for a PostgREST-compatible HTTP endpoint (e.g. Supabase).
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.as_str())
    }

    fn request(&self, method: Method, collection: Collection) -> RequestBuilder {
        let mut request = self.client.request(method, self.endpoint(collection));
        if let Some(ref key) = self.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }
        request
    }

    async fn rows(response: Response) -> Result<Vec<Row>> {
        let response = ensure_success(response).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!("Store request failed with {}: {}", status, message);
    Err(StoreError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Query-string parameters for a filtered, ordered read
pub fn query_params(query: &ReadQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];

    match &query.filter {
        Filter::All => {}
        Filter::Eq { field, value } => {
            params.push((field.to_string(), format!("eq.{}", literal(value))));
        }
        Filter::ContainsAny { fields, needle } => {
            let operand = ilike_operand(needle);
            let terms: Vec<String> = fields
                .iter()
                .map(|field| format!("{}.ilike.{}", field, operand))
                .collect();
            params.push(("or".to_string(), format!("({})", terms.join(","))));
        }
    }

    if let Some(order) = query.order {
        params.push((
            "order".to_string(),
            format!("{}.{}", order.field, order.direction.as_str()),
        ));
    }

    params
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Quoted `*needle*` pattern with LIKE metacharacters escaped, so user
/// input is matched literally and cannot break the `or=(...)` syntax.
pub fn ilike_operand(needle: &str) -> String {
    let mut pattern = String::from("*");
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');

    let mut quoted = String::from("\"");
    for ch in pattern.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Total row count from a `Content-Range` header such as `0-9/42` or `*/0`
pub fn total_from_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn key_filter(key: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{}", key))]
}

fn first_row(rows: Vec<Row>, what: &str) -> Result<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Decode(format!("{} returned no representation", what)))
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn read(&self, query: &ReadQuery) -> Result<RowSet> {
        let response = self
            .request(Method::GET, query.collection)
            .query(&query_params(query))
            .header("Range-Unit", "items")
            .header("Range", format!("{}-{}", query.range.start, query.range.end))
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(total_from_content_range);

        // Past the last row PostgREST answers 416 with `*/total`
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!("Range past end of {}", query.collection);
            return Ok(RowSet {
                rows: Vec::new(),
                total: total.unwrap_or(0),
            });
        }

        let rows = Self::rows(response).await?;
        let total = total.unwrap_or(rows.len() as u64);
        debug!(
            "REST read on {}: {} of {} rows",
            query.collection,
            rows.len(),
            total
        );
        Ok(RowSet { rows, total })
    }

    async fn read_by_key(&self, collection: Collection, key: &str) -> Result<Option<Row>> {
        let response = self
            .request(Method::GET, collection)
            .query(&[("select", "*")])
            .query(&key_filter(key))
            .send()
            .await?;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<Row> {
        let (id, row) = with_identity(collection, row)?;
        debug!("Inserting {} row: {}", collection, id);
        let response = self
            .request(Method::POST, collection)
            .header("Prefer", "return=representation")
            .json(&vec![row])
            .send()
            .await?;
        first_row(Self::rows(response).await?, "insert")
    }

    async fn update_by_key(&self, collection: Collection, key: &str, mut row: Row) -> Result<Row> {
        row.remove("id");
        let response = self
            .request(Method::PATCH, collection)
            .query(&key_filter(key))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::MissingRow {
                collection,
                key: key.to_string(),
            })
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
        let (_, row) = with_identity(collection, row)?;
        let response = self
            .request(Method::POST, collection)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&vec![row])
            .send()
            .await?;
        first_row(Self::rows(response).await?, "upsert")
    }

    async fn delete_by_key(&self, collection: Collection, key: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, collection)
            .query(&key_filter(key))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
