use client_console_schemas::{Activity, Client, ClientId, CommonQuery, ErrorLog};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::directory::DeleteIntent;
use crate::error::ConsoleError;
use crate::repository::ClientRepository;
use crate::Navigation;

/// One dependent list on the detail page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Loading,
    Loaded(Vec<T>),
    Failed(String),
}

impl<T> Section<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Section::Loaded(items) => items,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum ClientSection {
    Loading,
    Loaded(Client),
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailSnapshot {
    pub client: ClientSection,
    pub activities: Section<Activity>,
    pub common_queries: Section<CommonQuery>,
    pub error_logs: Section<ErrorLog>,
    pub pending_delete: bool,
    pub notice: Option<String>,
}

impl DetailSnapshot {
    fn loading() -> Self {
        Self {
            client: ClientSection::Loading,
            activities: Section::Loading,
            common_queries: Section::Loading,
            error_logs: Section::Loading,
            pending_delete: false,
            notice: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.client == ClientSection::NotFound
    }
}

struct DetailState {
    snapshot: DetailSnapshot,
    ticket: u64,
    mounted: bool,
}

fn section<T>(result: Result<Vec<T>, ConsoleError>, what: &str, id: &ClientId) -> Section<T> {
    match result {
        Ok(items) => Section::Loaded(items),
        Err(err) => {
            warn!("Failed to load {} for client {}: {}", what, id, err);
            Section::Failed(err.to_string())
        }
    }
}

/// A client plus its recent activity, frequent queries and errors.
///
/// The four reads run concurrently and each section is filled in as soon as
/// its own read finishes. If the client itself is missing the page shows
/// not-found and the dependent lists stay empty.
pub struct DetailView {
    repository: Arc<ClientRepository>,
    id: ClientId,
    state: Mutex<DetailState>,
}

impl DetailView {
    pub fn new(repository: Arc<ClientRepository>, id: ClientId) -> Self {
        Self {
            repository,
            id,
            state: Mutex::new(DetailState {
                snapshot: DetailSnapshot::loading(),
                ticket: 0,
                mounted: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DetailState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn snapshot(&self) -> DetailSnapshot {
        self.lock().snapshot.clone()
    }

    fn begin(&self) -> Option<u64> {
        let mut state = self.lock();
        if !state.mounted {
            return None;
        }
        state.ticket += 1;
        let (pending_delete, notice) = (
            state.snapshot.pending_delete,
            state.snapshot.notice.take(),
        );
        state.snapshot = DetailSnapshot {
            pending_delete,
            notice,
            ..DetailSnapshot::loading()
        };
        Some(state.ticket)
    }

    /// Apply a finished read if it still belongs to the current load
    fn apply(&self, ticket: u64, what: &str, update: impl FnOnce(&mut DetailSnapshot)) {
        let mut state = self.lock();
        if !state.mounted || state.ticket != ticket {
            debug!("Dropping stale {} result for client {}", what, self.id);
            return;
        }
        update(&mut state.snapshot);
    }

    fn apply_dependent(&self, ticket: u64, what: &str, update: impl FnOnce(&mut DetailSnapshot)) {
        self.apply(ticket, what, |snapshot| {
            if snapshot.is_not_found() {
                debug!("Client {} not found, dropping {}", self.id, what);
            } else {
                update(snapshot);
            }
        });
    }

    /// Run all four reads. Returns once every section has settled.
    pub async fn load(&self) {
        let Some(ticket) = self.begin() else {
            return;
        };
        let id = &self.id;

        let primary = async {
            let result = self.repository.get(id).await;
            self.apply(ticket, "client", |snapshot| match result {
                Ok(client) => snapshot.client = ClientSection::Loaded(client),
                Err(err) if err.is_not_found() => {
                    warn!("Client {} not found", id);
                    snapshot.client = ClientSection::NotFound;
                    snapshot.activities = Section::Loaded(Vec::new());
                    snapshot.common_queries = Section::Loaded(Vec::new());
                    snapshot.error_logs = Section::Loaded(Vec::new());
                }
                Err(err) => {
                    warn!("Failed to load client {}: {}", id, err);
                    snapshot.client = ClientSection::Failed(err.to_string());
                }
            });
        };

        let activities = async {
            let result = self.repository.activities(id).await;
            self.apply_dependent(ticket, "activities", |snapshot| {
                snapshot.activities = section(result, "activities", id)
            });
        };

        let common_queries = async {
            let result = self.repository.common_queries(id).await;
            self.apply_dependent(ticket, "common queries", |snapshot| {
                snapshot.common_queries = section(result, "common queries", id)
            });
        };

        let error_logs = async {
            let result = self.repository.error_logs(id).await;
            self.apply_dependent(ticket, "error logs", |snapshot| {
                snapshot.error_logs = section(result, "error logs", id)
            });
        };

        tokio::join!(primary, activities, common_queries, error_logs);
    }

    /// Start a delete. `None` unless the client is loaded.
    pub fn request_delete(&self) -> Option<DeleteIntent> {
        let mut state = self.lock();
        if !matches!(state.snapshot.client, ClientSection::Loaded(_)) {
            return None;
        }
        state.snapshot.pending_delete = true;
        Some(DeleteIntent::new(self.id.clone()))
    }

    pub fn cancel_delete(&self) {
        self.lock().snapshot.pending_delete = false;
    }

    pub async fn confirm_delete(&self, intent: DeleteIntent) -> Result<Navigation, ConsoleError> {
        let result = self.repository.delete(intent.id()).await;
        {
            let mut state = self.lock();
            state.snapshot.pending_delete = false;
            if let Err(err) = &result {
                warn!("Failed to delete client {}: {}", intent.id(), err);
                state.snapshot.notice = Some(format!("Failed to delete client: {}", err));
            }
        }
        result?;

        info!("Client {} deleted from detail view", intent.id());
        Ok(Navigation::Directory)
    }

    pub fn edit(&self) -> Navigation {
        Navigation::Edit(self.id.clone())
    }

    pub fn back(&self) -> Navigation {
        Navigation::Directory
    }

    pub fn close(&self) {
        self.lock().mounted = false;
    }
}
