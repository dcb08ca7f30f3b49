//! Translation of directory requests into store reads.

use client_console_schemas::{ClientId, ClientStatus, Collection};
use client_console_store::{Filter, Order, ReadQuery, RowRange, SortDirection};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Rows shown per dependent section of the detail view
pub const DETAIL_LIMIT: u64 = 5;

/// Client fields matched by the directory search box
pub const SEARCH_FIELDS: [&str; 3] = ["name", "email", "company"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "agentName", alias = "agent_name")]
    AgentName,
    #[serde(rename = "status")]
    Status,
    #[default]
    #[serde(rename = "updatedAt", alias = "updated_at")]
    UpdatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::AgentName => "agentName",
            SortField::Status => "status",
            SortField::UpdatedAt => "updatedAt",
        }
    }

    /// Store column backing the field
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::AgentName => "agent_name",
            SortField::Status => "status",
            SortField::UpdatedAt => "updated_at",
        }
    }

    /// Recency sorts newest first; everything else is alphabetical
    pub fn direction(&self) -> SortDirection {
        match self {
            SortField::UpdatedAt => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }

    pub fn order(&self) -> Order {
        Order {
            field: self.column(),
            direction: self.direction(),
        }
    }
}

/// Directory read parameters. Doubles as the cache key, so two requests
/// that normalize equal share one cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub sort_field: SortField,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            sort_field: SortField::UpdatedAt,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListRequest {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
        .normalized()
    }

    /// Clamp page and page size to at least 1
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.page_size = self.page_size.max(1);
        self
    }

    /// Inclusive row window `[(page-1)*size, page*size - 1]`
    pub fn range(&self) -> RowRange {
        let page = u64::from(self.page.max(1));
        let size = u64::from(self.page_size.max(1));
        RowRange::new((page - 1) * size, page * size - 1)
    }

    pub fn filter(&self) -> Filter {
        if self.search_text.is_empty() {
            Filter::All
        } else {
            Filter::ContainsAny {
                fields: SEARCH_FIELDS.to_vec(),
                needle: self.search_text.clone(),
            }
        }
    }

    /// Whether rows exist past this page given the total match count
    pub fn has_next_page(&self, total: u64) -> bool {
        self.range().end + 1 < total
    }
}

/// Directory page read
pub fn list_query(request: &ListRequest) -> ReadQuery {
    ReadQuery {
        collection: Collection::Clients,
        filter: request.filter(),
        order: Some(request.sort_field.order()),
        range: request.range(),
    }
}

fn dependent_query(collection: Collection, client: &ClientId, order: Order) -> ReadQuery {
    ReadQuery {
        collection,
        filter: Filter::eq("client_id", client.0.clone()),
        order: Some(order),
        range: RowRange::new(0, DETAIL_LIMIT - 1),
    }
}

/// Most recent activities of a client
pub fn activities_query(client: &ClientId) -> ReadQuery {
    dependent_query(Collection::ClientActivities, client, Order::desc("created_at"))
}

/// Most frequently asked queries of a client
pub fn common_queries_query(client: &ClientId) -> ReadQuery {
    dependent_query(Collection::CommonQueries, client, Order::desc("frequency"))
}

/// Most recent errors of a client
pub fn error_logs_query(client: &ClientId) -> ReadQuery {
    dependent_query(Collection::ErrorLogs, client, Order::desc("created_at"))
}

/// Single-row window whose `total` is the number of matching clients
pub fn count_query(status: Option<ClientStatus>) -> ReadQuery {
    ReadQuery {
        collection: Collection::Clients,
        filter: match status {
            Some(status) => Filter::eq("status", status.as_str()),
            None => Filter::All,
        },
        order: None,
        range: RowRange::new(0, 0),
    }
}
