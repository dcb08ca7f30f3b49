use client_console_schemas::{
    Activity, Client, ClientId, ClientStatus, Collection, CommonQuery, ErrorLog, Record,
};
use client_console_store::{ReadQuery, RemoteStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::error::ConsoleError;
use crate::query::{self, ListRequest};

/// One directory page as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientPage {
    pub request: ListRequest,
    pub rows: Vec<Client>,
    /// Clients matching the request's search, across all pages
    pub total: u64,
}

impl ClientPage {
    pub fn has_next_page(&self) -> bool {
        self.request.has_next_page(self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
}

fn decode<R: Record>(row: client_console_schemas::Row) -> Result<R, StoreError> {
    R::from_row(row).map_err(StoreError::from)
}

/// Reads and writes clients through a remote store.
///
/// All writes go through here, and every successful write invalidates the
/// cached directory pages so no view can serve a result predating it.
pub struct ClientRepository {
    store: Arc<dyn RemoteStore>,
    cache: Arc<ResultCache<ClientPage>>,
}

impl ClientRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_cache(store, Arc::new(ResultCache::new()))
    }

    pub fn with_cache(store: Arc<dyn RemoteStore>, cache: Arc<ResultCache<ClientPage>>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<ResultCache<ClientPage>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Directory page for `request`, served from cache when fresh
    pub async fn list(&self, request: &ListRequest) -> Result<Arc<ClientPage>, ConsoleError> {
        let key = CacheKey::new(Collection::Clients, request.clone());
        let request = key.request.clone();
        let store = Arc::clone(&self.store);

        let page = self
            .cache
            .get_or_fetch(key, || async move {
                let set = store.read(&query::list_query(&request)).await?;
                let rows = set
                    .rows
                    .into_iter()
                    .map(decode::<Client>)
                    .collect::<Result<Vec<_>, _>>()?;
                debug!(
                    "Fetched clients page {} ({} of {})",
                    request.page,
                    rows.len(),
                    set.total
                );
                Ok(ClientPage {
                    request,
                    rows,
                    total: set.total,
                })
            })
            .await?;
        Ok(page)
    }

    pub async fn get(&self, id: &ClientId) -> Result<Client, ConsoleError> {
        let row = self
            .store
            .read_by_key(Collection::Clients, id.as_str())
            .await?
            .ok_or_else(|| ConsoleError::client_not_found(id))?;
        Ok(decode(row)?)
    }

    pub async fn insert(&self, client: &Client) -> Result<Client, ConsoleError> {
        let row = client.to_row().map_err(StoreError::from)?;
        let stored = self.store.insert(Collection::Clients, row).await?;
        self.cache.invalidate_collection(Collection::Clients);

        let client: Client = decode(stored)?;
        info!("Created client: {} ({})", client.name, client.id);
        Ok(client)
    }

    /// Overwrite every editable field of an existing client. Identity and
    /// creation time are never rewritten.
    pub async fn update(&self, id: &ClientId, client: &Client) -> Result<Client, ConsoleError> {
        let mut row = client.to_row().map_err(StoreError::from)?;
        row.remove("id");
        row.remove("created_at");

        let stored = self
            .store
            .update_by_key(Collection::Clients, id.as_str(), row)
            .await?;
        self.cache.invalidate_collection(Collection::Clients);

        let client: Client = decode(stored)?;
        info!("Updated client: {} ({})", client.name, client.id);
        Ok(client)
    }

    /// Remove a client row. Dependent records are left in place.
    pub async fn delete(&self, id: &ClientId) -> Result<(), ConsoleError> {
        self.store
            .delete_by_key(Collection::Clients, id.as_str())
            .await?;
        self.cache.invalidate_collection(Collection::Clients);
        info!("Deleted client: {}", id);
        Ok(())
    }

    async fn dependents<R: Record>(&self, query: ReadQuery) -> Result<Vec<R>, ConsoleError> {
        let set = self.store.read(&query).await?;
        let records = set
            .rows
            .into_iter()
            .map(decode::<R>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub async fn activities(&self, id: &ClientId) -> Result<Vec<Activity>, ConsoleError> {
        self.dependents(query::activities_query(id)).await
    }

    pub async fn common_queries(&self, id: &ClientId) -> Result<Vec<CommonQuery>, ConsoleError> {
        self.dependents(query::common_queries_query(id)).await
    }

    pub async fn error_logs(&self, id: &ClientId) -> Result<Vec<ErrorLog>, ConsoleError> {
        self.dependents(query::error_logs_query(id)).await
    }

    async fn count(&self, status: Option<ClientStatus>) -> Result<u64, ConsoleError> {
        Ok(self.store.read(&query::count_query(status)).await?.total)
    }

    /// Dashboard counters, read straight from the store
    pub async fn stats(&self) -> Result<DirectoryStats, ConsoleError> {
        let (total, active, inactive) = tokio::try_join!(
            self.count(None),
            self.count(Some(ClientStatus::Active)),
            self.count(Some(ClientStatus::Inactive)),
        )?;
        Ok(DirectoryStats {
            total,
            active,
            inactive,
        })
    }
}
