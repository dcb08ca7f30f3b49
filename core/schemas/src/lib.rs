use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Untyped record as exchanged with a remote store.
pub type Row = serde_json::Map<String, Value>;

// ============================================================================
// ULID and ID Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorLogId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ErrorLogId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Collections
// ============================================================================

/// Named record sets in the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "clients")]
    Clients,
    #[serde(rename = "client_activities")]
    ClientActivities,
    #[serde(rename = "common_queries")]
    CommonQueries,
    #[serde(rename = "error_logs")]
    ErrorLogs,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Clients,
        Collection::ClientActivities,
        Collection::CommonQueries,
        Collection::ErrorLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::ClientActivities => "client_activities",
            Collection::CommonQueries => "common_queries",
            Collection::ErrorLogs => "error_logs",
        }
    }

    /// Prefix used for identities generated for this collection
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Collection::Clients => "cli",
            Collection::ClientActivities => "act",
            Collection::CommonQueries => "qry",
            Collection::ErrorLogs => "err",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Client Schema
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientStatus {
    #[default]
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Inactive => "inactive",
        }
    }
}

/// Canonical client shape. Older revisions of the `clients` table stored
/// `null` for empty link lists and status, and carried extra columns such as
/// `google_drive_links_added_at`; those decode into this one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agent_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub google_drive_links: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub website_urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ClientStatus,
    pub created_at: String, // RFC3339
    pub updated_at: String, // RFC3339
}

// ============================================================================
// Dependent Schemas (read-only for the console)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub client_id: ClientId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub created_at: String, // RFC3339
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonQuery {
    pub id: QueryId,
    pub client_id: ClientId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frequency: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub id: ErrorLogId,
    pub client_id: ClientId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub error_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    pub created_at: String, // RFC3339
}

// ============================================================================
// Row Mapping
// ============================================================================

/// A typed record stored in a known collection
pub trait Record: Sized + Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn from_row(row: Row) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(row))
    }

    fn to_row(&self) -> serde_json::Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "{} record serialized to a non-object: {}",
                Self::COLLECTION,
                other
            ))),
        }
    }
}

impl Record for Client {
    const COLLECTION: Collection = Collection::Clients;
}

impl Record for Activity {
    const COLLECTION: Collection = Collection::ClientActivities;
}

impl Record for CommonQuery {
    const COLLECTION: Collection = Collection::CommonQueries;
}

impl Record for ErrorLog {
    const COLLECTION: Collection = Collection::ErrorLogs;
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Helper Functions
// ============================================================================

pub fn generate_client_id() -> ClientId {
    ClientId(generate_record_id(Collection::Clients))
}

/// Generate an identity for any collection, e.g. `act_01J...`
pub fn generate_record_id(collection: Collection) -> String {
    format!("{}_{}", collection.id_prefix(), ulid::Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_id_generation() {
        let client_id = generate_client_id();
        assert!(client_id.0.starts_with("cli_"));
        assert_eq!(client_id.0.len(), 30); // "cli_" + 26 chars

        let activity_id = generate_record_id(Collection::ClientActivities);
        assert!(activity_id.starts_with("act_"));
    }

    #[test]
    fn test_client_row_round_trip() {
        let client = Client {
            id: generate_client_id(),
            name: "Acme".to_string(),
            agent_name: "Bot1".to_string(),
            full_name: None,
            email: Some("ops@acme.test".to_string()),
            company: Some("Acme Corp".to_string()),
            website: None,
            description: None,
            google_drive_links: vec!["https://drive.test/a".into(), "https://drive.test/a".into()],
            website_urls: vec![],
            status: ClientStatus::Active,
            created_at: "2025-11-02T18:00:00.000Z".to_string(),
            updated_at: "2025-11-02T18:00:00.000Z".to_string(),
        };

        let encoded = client.to_row().unwrap();
        assert_eq!(encoded.get("status"), Some(&json!("active")));

        let decoded = Client::from_row(encoded).unwrap();
        assert_eq!(decoded, client);
    }

    #[test]
    fn test_legacy_client_row_decodes() {
        let legacy = row(json!({
            "id": "6f1c2a",
            "name": "Beta LLC",
            "agent_name": "Helper",
            "email": null,
            "google_drive_links": null,
            "google_drive_links_added_at": ["2024-01-01T00:00:00Z"],
            "status": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }));

        let client = Client::from_row(legacy).unwrap();
        assert_eq!(client.id, ClientId("6f1c2a".to_string()));
        assert!(client.google_drive_links.is_empty());
        assert!(client.website_urls.is_empty());
        assert_eq!(client.status, ClientStatus::Active);
        assert_eq!(client.email, None);

        let unnamed = Client::from_row(row(json!({
            "id": "7a2d3b",
            "name": null,
            "agent_name": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        })))
        .unwrap();
        assert_eq!(unnamed.name, "");
        assert_eq!(unnamed.agent_name, "");
    }

    #[test]
    fn test_dependent_rows_decode() {
        let query = CommonQuery::from_row(row(json!({
            "id": "q1",
            "client_id": "c1",
            "query_text": "opening hours?",
            "frequency": null
        })))
        .unwrap();
        assert_eq!(query.frequency, 0);

        let log = ErrorLog::from_row(row(json!({
            "id": "e1",
            "client_id": "c1",
            "error_type": "Timeout",
            "message": "upstream timed out",
            "created_at": "2025-01-01T00:00:00Z"
        })))
        .unwrap();
        assert_eq!(log.error_type, "Timeout");
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Clients.as_str(), "clients");
        assert_eq!(
            serde_json::to_string(&Collection::CommonQueries).unwrap(),
            "\"common_queries\""
        );
    }
}
