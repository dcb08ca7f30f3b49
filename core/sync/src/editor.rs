use client_console_schemas::{generate_client_id, Client, ClientId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::draft::ClientDraft;
use crate::error::{ConsoleError, ValidationErrors};
use crate::repository::ClientRepository;
use crate::{timestamp_now, Navigation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit(ClientId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    /// Waiting for the record; fields are disabled
    Loading,
    Ready,
    /// The record does not exist; submitting is blocked
    NotFound,
    LoadFailed(String),
    /// Last submit failed; the draft is intact and may be resubmitted
    Failed(String),
    Saved,
}

impl EditorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorState::Loading => "loading",
            EditorState::Ready => "ready",
            EditorState::NotFound => "not_found",
            EditorState::LoadFailed(_) => "load_failed",
            EditorState::Failed(_) => "failed",
            EditorState::Saved => "saved",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, EditorState::Ready | EditorState::Failed(_))
    }
}

/// Create/edit form for a single client
pub struct RecordEditor {
    repository: Arc<ClientRepository>,
    mode: EditorMode,
    state: EditorState,
    draft: ClientDraft,
    loaded: Option<Client>,
    errors: ValidationErrors,
    saved: Option<Client>,
}

impl RecordEditor {
    /// Empty form, ready for input
    pub fn create(repository: Arc<ClientRepository>) -> Self {
        Self::with_mode(repository, EditorMode::Create, EditorState::Ready)
    }

    /// Form for an existing client. Call [`RecordEditor::load`] before editing.
    pub fn edit(repository: Arc<ClientRepository>, id: ClientId) -> Self {
        Self::with_mode(repository, EditorMode::Edit(id), EditorState::Loading)
    }

    fn with_mode(repository: Arc<ClientRepository>, mode: EditorMode, state: EditorState) -> Self {
        Self {
            repository,
            mode,
            state,
            draft: ClientDraft::default(),
            loaded: None,
            errors: ValidationErrors::default(),
            saved: None,
        }
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn draft(&self) -> &ClientDraft {
        &self.draft
    }

    /// Mutable draft, or `None` while the form is not accepting input
    pub fn draft_mut(&mut self) -> Option<&mut ClientDraft> {
        if self.state.is_editable() {
            Some(&mut self.draft)
        } else {
            None
        }
    }

    /// Problems found by the last submit attempt
    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Record as stored by the last successful submit
    pub fn saved(&self) -> Option<&Client> {
        self.saved.as_ref()
    }

    /// Fetch the record being edited. Does nothing in create mode. May be
    /// called again after a failed load.
    pub async fn load(&mut self) -> &EditorState {
        let EditorMode::Edit(ref id) = self.mode else {
            return &self.state;
        };

        self.state = EditorState::Loading;
        match self.repository.get(id).await {
            Ok(client) => {
                debug!("Loaded client {} for editing", client.id);
                self.draft = ClientDraft::from_client(&client);
                self.loaded = Some(client);
                self.state = EditorState::Ready;
            }
            Err(err) if err.is_not_found() => {
                warn!("Client {} not found for editing", id);
                self.state = EditorState::NotFound;
            }
            Err(err) => {
                warn!("Failed to load client {}: {}", id, err);
                self.state = EditorState::LoadFailed(err.to_string());
            }
        }
        &self.state
    }

    /// Validate and save the draft. On success the directory pages are
    /// invalidated and the caller is sent back to the directory.
    pub async fn submit(&mut self) -> Result<Navigation, ConsoleError> {
        match (&self.state, &self.mode) {
            (state, _) if state.is_editable() => {}
            (EditorState::NotFound, EditorMode::Edit(id)) => {
                return Err(ConsoleError::client_not_found(id))
            }
            (state, _) => return Err(ConsoleError::NotEditable(state.as_str())),
        }

        if let Err(errors) = self.draft.validate() {
            debug!("Client form rejected: {}", errors);
            self.errors = errors.clone();
            return Err(errors.into());
        }
        self.errors = ValidationErrors::default();

        let now = timestamp_now();
        let result = match &self.mode {
            EditorMode::Create => {
                let client = self.draft.to_client(generate_client_id(), now.clone(), now);
                self.repository.insert(&client).await
            }
            EditorMode::Edit(id) => {
                let created_at = self
                    .loaded
                    .as_ref()
                    .map(|client| client.created_at.clone())
                    .unwrap_or_else(|| now.clone());
                let client = self.draft.to_client(id.clone(), created_at, now);
                self.repository.update(id, &client).await
            }
        };

        match result {
            Ok(client) => {
                self.saved = Some(client);
                self.state = EditorState::Saved;
                Ok(Navigation::Directory)
            }
            Err(err) => {
                warn!("Failed to save client: {}", err);
                self.state = if err.is_not_found() {
                    EditorState::NotFound
                } else {
                    EditorState::Failed(err.to_string())
                };
                Err(err)
            }
        }
    }

    /// Drop local edits without touching the store
    pub fn cancel(&mut self) -> Navigation {
        self.draft = ClientDraft::default();
        self.errors = ValidationErrors::default();
        Navigation::Directory
    }
}
