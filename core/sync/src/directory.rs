use client_console_schemas::{Client, ClientId};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::query::{ListRequest, SortField};
use crate::repository::{ClientPage, ClientRepository};
use crate::Navigation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Closed; no read will change the view again
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// What happened to the result of a view read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The result became the view's state
    Applied,
    /// A newer read was started first; the result was dropped
    Superseded,
    /// The view was closed; the result was dropped
    Discarded,
}

/// First step of a delete. Only a confirmed intent reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteIntent {
    id: ClientId,
}

impl DeleteIntent {
    pub(crate) fn new(id: ClientId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }
}

/// Point-in-time copy of a directory view
#[derive(Debug, Clone, Serialize)]
pub struct DirectorySnapshot {
    /// Parameters of the latest read, which may still be loading
    pub request: ListRequest,
    pub status: LoadStatus,
    /// Last page that was applied. While a new read is loading this is still
    /// the previous result.
    pub page: Option<Arc<ClientPage>>,
    /// Failure of the last delete, if any
    pub notice: Option<String>,
    pub pending_delete: Option<ClientId>,
}

impl DirectorySnapshot {
    pub fn rows(&self) -> &[Client] {
        self.page.as_ref().map(|page| page.rows.as_slice()).unwrap_or(&[])
    }

    pub fn total(&self) -> u64 {
        self.page.as_ref().map(|page| page.total).unwrap_or(0)
    }

    pub fn has_next_page(&self) -> bool {
        self.page.as_ref().is_some_and(|page| page.has_next_page())
    }

    pub fn has_prev_page(&self) -> bool {
        self.request.page > 1
    }
}

struct DirectoryState {
    request: ListRequest,
    status: LoadStatus,
    page: Option<Arc<ClientPage>>,
    notice: Option<String>,
    pending_delete: Option<ClientId>,
    ticket: u64,
    mounted: bool,
}

/// Paginated, sorted, searchable list of clients.
///
/// Every parameter change starts a new read. Only the most recent read may
/// change what the view shows; older ones are dropped when they finish, as
/// is anything that finishes after [`DirectoryView::close`].
pub struct DirectoryView {
    repository: Arc<ClientRepository>,
    state: Mutex<DirectoryState>,
}

impl DirectoryView {
    /// A view in `Loading` with default parameters (empty search, most
    /// recently updated first, page 1). The host starts the first read with
    /// [`DirectoryView::load`].
    pub fn new(repository: Arc<ClientRepository>, page_size: u32) -> Self {
        Self {
            repository,
            state: Mutex::new(DirectoryState {
                request: ListRequest::with_page_size(page_size),
                status: LoadStatus::Loading,
                page: None,
                notice: None,
                pending_delete: None,
                ticket: 0,
                mounted: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        let state = self.lock();
        DirectorySnapshot {
            request: state.request.clone(),
            status: state.status.clone(),
            page: state.page.clone(),
            notice: state.notice.clone(),
            pending_delete: state.pending_delete.clone(),
        }
    }

    /// Apply `update` to the request and claim a new ticket for it
    fn begin(&self, update: impl FnOnce(&mut ListRequest)) -> Option<(u64, ListRequest)> {
        let mut state = self.lock();
        if !state.mounted {
            return None;
        }
        update(&mut state.request);
        let request = state.request.clone().normalized();
        state.request = request.clone();
        state.ticket += 1;
        state.status = LoadStatus::Loading;
        Some((state.ticket, request))
    }

    async fn run(&self, update: impl FnOnce(&mut ListRequest)) -> ReadOutcome {
        let Some((ticket, request)) = self.begin(update) else {
            return ReadOutcome::Discarded;
        };

        let result = self.repository.list(&request).await;

        let mut state = self.lock();
        if !state.mounted {
            debug!("Directory closed, dropping page {} result", request.page);
            return ReadOutcome::Discarded;
        }
        if state.ticket != ticket {
            debug!(
                "Directory read {} superseded by {}, dropping result",
                ticket, state.ticket
            );
            return ReadOutcome::Superseded;
        }

        match result {
            Ok(page) => {
                state.page = Some(page);
                state.status = LoadStatus::Loaded;
            }
            Err(err) => {
                warn!("Directory read failed: {}", err);
                state.status = LoadStatus::Error(err.to_string());
            }
        }
        ReadOutcome::Applied
    }

    /// Read the current request again
    pub async fn load(&self) -> ReadOutcome {
        self.run(|_| {}).await
    }

    pub async fn set_search(&self, text: impl Into<String>) -> ReadOutcome {
        let text = text.into();
        self.run(move |request| {
            request.search_text = text;
            request.page = 1;
        })
        .await
    }

    pub async fn set_sort(&self, field: SortField) -> ReadOutcome {
        self.run(move |request| {
            request.sort_field = field;
            request.page = 1;
        })
        .await
    }

    pub async fn set_page(&self, page: u32) -> ReadOutcome {
        self.run(move |request| request.page = page).await
    }

    /// Advance one page. `None` when the last loaded page is the final one.
    pub async fn next_page(&self) -> Option<ReadOutcome> {
        if !self.snapshot().has_next_page() {
            return None;
        }
        Some(self.run(|request| request.page += 1).await)
    }

    pub async fn prev_page(&self) -> Option<ReadOutcome> {
        if !self.snapshot().has_prev_page() {
            return None;
        }
        Some(self.run(|request| request.page -= 1).await)
    }

    pub fn request_delete(&self, id: ClientId) -> DeleteIntent {
        self.lock().pending_delete = Some(id.clone());
        DeleteIntent::new(id)
    }

    pub fn cancel_delete(&self) {
        self.lock().pending_delete = None;
    }

    /// Delete the client and reload the current page. On failure the visible
    /// rows stay as they were and a notice is recorded.
    pub async fn confirm_delete(&self, intent: DeleteIntent) -> Result<ReadOutcome, ConsoleError> {
        let result = self.repository.delete(&intent.id).await;
        {
            let mut state = self.lock();
            if state.pending_delete.as_ref() == Some(&intent.id) {
                state.pending_delete = None;
            }
            match &result {
                Ok(()) => state.notice = None,
                Err(err) => {
                    warn!("Failed to delete client {}: {}", intent.id, err);
                    state.notice = Some(format!("Failed to delete client: {}", err));
                }
            }
        }
        result?;

        info!("Client {} removed from directory", intent.id);
        Ok(self.load().await)
    }

    pub fn dismiss_notice(&self) {
        self.lock().notice = None;
    }

    pub fn create(&self) -> Navigation {
        Navigation::Create
    }

    pub fn edit(&self, id: ClientId) -> Navigation {
        Navigation::Edit(id)
    }

    pub fn view(&self, id: ClientId) -> Navigation {
        Navigation::Detail(id)
    }

    /// Stop applying results. Reads still in flight finish but change nothing.
    pub fn close(&self) {
        let mut state = self.lock();
        state.mounted = false;
        state.status = LoadStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_console_schemas::{Collection, Row};
    use client_console_store::{Filter, InMemoryStore, ReadQuery};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn client_row(index: usize) -> Row {
        match json!({
            "id": format!("cli_{:02}", index),
            "name": format!("Client {:02}", index),
            "agent_name": "Bot",
            "company": if index % 2 == 0 { "Even Corp" } else { "Odd Corp" },
            "created_at": "2025-01-01T00:00:00.000Z",
            "updated_at": format!("2025-01-01T00:00:{:02}.000Z", index)
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn setup(count: usize) -> (Arc<InMemoryStore>, Arc<DirectoryView>) {
        let store = Arc::new(InMemoryStore::new());
        store.seed(Collection::Clients, (0..count).map(client_row));
        let repository = Arc::new(ClientRepository::new(store.clone()));
        (store, Arc::new(DirectoryView::new(repository, 10)))
    }

    fn searching(query: &ReadQuery, text: &str) -> bool {
        matches!(&query.filter, Filter::ContainsAny { needle, .. } if needle == text)
    }

    #[tokio::test]
    async fn test_initial_load_uses_defaults() {
        let (_store, view) = setup(12);
        let initial = view.snapshot();
        assert_eq!(initial.status, LoadStatus::Loading);
        assert_eq!(initial.request, ListRequest::default());
        assert!(initial.page.is_none());

        assert_eq!(view.load().await, ReadOutcome::Applied);
        let snapshot = view.snapshot();
        assert_eq!(snapshot.status, LoadStatus::Loaded);
        assert_eq!(snapshot.request, ListRequest::default());
        assert_eq!(snapshot.rows().len(), 10);
        assert_eq!(snapshot.rows()[0].name, "Client 11");
        assert_eq!(snapshot.total(), 12);
        assert!(snapshot.has_next_page());
    }

    #[tokio::test]
    async fn test_search_resets_to_first_page() {
        let (_store, view) = setup(25);
        view.load().await;
        view.next_page().await.unwrap();
        assert_eq!(view.snapshot().request.page, 2);

        view.set_search("even").await;
        let snapshot = view.snapshot();
        assert_eq!(snapshot.request.page, 1);
        assert_eq!(snapshot.total(), 13);
        assert!(snapshot
            .rows()
            .iter()
            .all(|client| client.company.as_deref() == Some("Even Corp")));
    }

    #[tokio::test]
    async fn test_paging_stops_at_bounds() {
        let (_store, view) = setup(15);
        view.load().await;
        assert!(view.prev_page().await.is_none());

        assert_eq!(view.next_page().await, Some(ReadOutcome::Applied));
        assert_eq!(view.snapshot().rows().len(), 5);
        assert!(view.next_page().await.is_none());

        assert_eq!(view.prev_page().await, Some(ReadOutcome::Applied));
        assert_eq!(view.snapshot().request.page, 1);
    }

    #[tokio::test]
    async fn test_latest_request_wins() {
        let (store, view) = setup(12);
        store.set_read_latency(|query| {
            if searching(query, "Client 0") {
                Duration::from_millis(150)
            } else {
                Duration::ZERO
            }
        });

        let slow = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.set_search("Client 0").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(view.set_search("Client 1").await, ReadOutcome::Applied);

        assert_eq!(slow.await.unwrap(), ReadOutcome::Superseded);
        let snapshot = view.snapshot();
        assert_eq!(snapshot.request.search_text, "Client 1");
        assert!(snapshot.rows().iter().all(|c| c.name.starts_with("Client 1")));
    }

    #[tokio::test]
    async fn test_previous_rows_stay_visible_while_loading() {
        let (store, view) = setup(12);
        view.load().await;
        store.set_read_latency(|query| {
            if query.range.start > 0 {
                Duration::from_millis(100)
            } else {
                Duration::ZERO
            }
        });

        let pending = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.set_page(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = view.snapshot();
        assert_eq!(snapshot.status, LoadStatus::Loading);
        assert_eq!(snapshot.request.page, 2);
        assert_eq!(snapshot.rows().len(), 10);

        pending.await.unwrap();
        assert_eq!(view.snapshot().rows().len(), 2);
    }

    #[tokio::test]
    async fn test_results_after_close_are_discarded() {
        let (store, view) = setup(3);
        store.set_read_latency(|_| Duration::from_millis(50));

        let pending = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.load().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        view.close();

        assert_eq!(pending.await.unwrap(), ReadOutcome::Discarded);
        assert!(view.snapshot().page.is_none());
        assert_eq!(view.load().await, ReadOutcome::Discarded);
        assert_eq!(view.snapshot().status, LoadStatus::Idle);
    }

    #[tokio::test]
    async fn test_read_failure_keeps_previous_rows() {
        let (store, view) = setup(3);
        view.load().await;

        store.fail_next_reads(Collection::Clients, 1);
        view.set_search("Client").await;

        let snapshot = view.snapshot();
        assert!(matches!(snapshot.status, LoadStatus::Error(_)));
        assert_eq!(snapshot.rows().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_rows_and_sets_notice() {
        let (store, view) = setup(3);
        view.load().await;

        let intent = view.request_delete(ClientId("cli_01".to_string()));
        assert_eq!(view.snapshot().pending_delete, Some(ClientId("cli_01".to_string())));

        store.fail_next_writes(1);
        assert!(view.confirm_delete(intent).await.is_err());

        let snapshot = view.snapshot();
        assert_eq!(snapshot.rows().len(), 3);
        assert!(snapshot.notice.is_some());
        assert!(snapshot.pending_delete.is_none());
        assert_eq!(store.rows(Collection::Clients).len(), 3);

        view.dismiss_notice();
        assert!(view.snapshot().notice.is_none());
    }

    #[tokio::test]
    async fn test_navigation_intents() {
        let (_store, view) = setup(0);
        let id = ClientId("cli_01".to_string());
        assert_eq!(view.create(), Navigation::Create);
        assert_eq!(view.edit(id.clone()), Navigation::Edit(id.clone()));
        assert_eq!(view.view(id.clone()), Navigation::Detail(id));
    }
}
