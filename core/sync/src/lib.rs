//! Client directory synchronization core.
//!
//! Views read through a shared [`ResultCache`] owned by the
//! [`ClientRepository`]; every write goes through the repository and drops
//! the cached pages of the collection it touched.

pub mod cache;
pub mod detail;
pub mod directory;
pub mod draft;
pub mod editor;
pub mod error;
pub mod query;
pub mod repository;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use detail::{ClientSection, DetailSnapshot, DetailView, Section};
pub use directory::{DeleteIntent, DirectorySnapshot, DirectoryView, LoadStatus, ReadOutcome};
pub use draft::{ClientDraft, LinkList};
pub use editor::{EditorMode, EditorState, RecordEditor};
pub use error::{ConsoleError, DraftField, FieldError, FieldProblem, ValidationErrors};
pub use query::{ListRequest, SortField, DEFAULT_PAGE_SIZE, DETAIL_LIMIT};
pub use repository::{ClientPage, ClientRepository, DirectoryStats};

use chrono::{SecondsFormat, Utc};
use client_console_schemas::ClientId;
use serde::Serialize;

/// Screen the host should show next. The core never routes by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", content = "id", rename_all = "snake_case")]
pub enum Navigation {
    Directory,
    Create,
    Edit(ClientId),
    Detail(ClientId),
}

/// Current time as RFC3339 UTC with millisecond precision, e.g.
/// `2025-11-02T18:04:05.123Z`
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
