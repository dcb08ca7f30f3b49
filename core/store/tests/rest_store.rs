//! `RestStore` against a `wiremock` PostgREST stand-in.
//!
//! Each mock only matches the exact request the adapter is expected to send,
//! so a missing header or parameter surfaces as wiremock's default 404.

use client_console_schemas::{Collection, Row};
use client_console_store::{Filter, Order, ReadQuery, RemoteStore, RestStore, RowRange, StoreError};
use serde_json::{json, Value};
use wiremock::matchers::{
    body_string_contains, header, header_exists, headers, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn clients_query(range: RowRange) -> ReadQuery {
    ReadQuery {
        collection: Collection::Clients,
        filter: Filter::All,
        order: Some(Order::asc("name")),
        range,
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Reads send the window as a `Range` header and take the total from
/// `Content-Range`, with both credential headers attached.
#[tokio::test]
async fn test_read_sends_window_and_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("select", "*"))
        .and(query_param("order", "name.asc"))
        .and(header("range-unit", "items"))
        .and(header("range", "10-11"))
        .and(header("prefer", "count=exact"))
        .and(header("apikey", "secret"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "10-11/42")
                .set_body_json(json!([{"id": "cli_a"}, {"id": "cli_b"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), Some("secret".to_string()));
    let result = store
        .read(&clients_query(RowRange::new(10, 11)))
        .await
        .expect("read should succeed");

    assert_eq!(result.total, 42);
    let ids: Vec<_> = result.rows.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("cli_a"), json!("cli_b")]);
}

/// Without a key no credential headers are sent.
#[tokio::test]
async fn test_read_without_key_sends_no_credentials() {
    let server = MockServer::start().await;

    Mock::given(header_exists("apikey"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let result = store
        .read(&clients_query(RowRange::new(0, 9)))
        .await
        .expect("read should succeed");

    assert!(result.rows.is_empty());
    assert_eq!(result.total, 0);
}

/// A window past the last row is answered with 416 and `*/total`, which
/// reads as an empty page rather than an error.
#[tokio::test]
async fn test_range_past_end_is_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(header("range", "90-99"))
        .respond_with(ResponseTemplate::new(416).insert_header("Content-Range", "*/3"))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let result = store
        .read(&clients_query(RowRange::new(90, 99)))
        .await
        .expect("416 should read as an empty page");

    assert!(result.rows.is_empty());
    assert_eq!(result.total, 3);
}

/// Keyed reads filter on `id=eq.<key>` and map an empty answer to `None`.
#[tokio::test]
async fn test_read_by_key_filters_on_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", "eq.cli_a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "cli_a"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", "eq.cli_gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let found = store
        .read_by_key(Collection::Clients, "cli_a")
        .await
        .unwrap();
    assert_eq!(found.map(|r| r["id"].clone()), Some(json!("cli_a")));

    let missing = store
        .read_by_key(Collection::Clients, "cli_gone")
        .await
        .unwrap();
    assert!(missing.is_none());
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts without an id get one before the row is sent.
#[tokio::test]
async fn test_insert_assigns_identity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/clients"))
        .and(header("prefer", "return=representation"))
        .and(body_string_contains("\"id\":\"cli_"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([{"id": "cli_01J0", "name": "Acme Corp"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let created = store
        .insert(Collection::Clients, row(json!({"name": "Acme Corp"})))
        .await
        .expect("insert should succeed");

    assert_eq!(created["name"], json!("Acme Corp"));

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent[0]["id"].as_str().unwrap().starts_with("cli_"));
}

/// A PATCH that matches nothing comes back as an empty representation.
#[tokio::test]
async fn test_update_of_missing_row_is_missing_row() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", "eq.cli_gone"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let result = store
        .update_by_key(Collection::Clients, "cli_gone", row(json!({"name": "Renamed"})))
        .await;

    assert_eq!(
        result,
        Err(StoreError::MissingRow {
            collection: Collection::Clients,
            key: "cli_gone".to_string(),
        })
    );
}

/// Upserts ask PostgREST to merge on the primary key.
#[tokio::test]
async fn test_upsert_merges_duplicates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/clients"))
        .and(headers(
            "prefer",
            vec!["resolution=merge-duplicates", "return=representation"],
        ))
        .and(body_string_contains("\"id\":\"cli_a\""))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{"id": "cli_a", "name": "Merged"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let merged = store
        .upsert_by_key(Collection::Clients, Some("cli_a"), row(json!({"name": "Merged"})))
        .await
        .expect("upsert should succeed");

    assert_eq!(merged["name"], json!("Merged"));
}

/// Non-success answers keep their status and body.
#[tokio::test]
async fn test_failed_delete_keeps_status() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", "eq.cli_a"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", "eq.cli_b"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let store = RestStore::new(server.uri(), None);
    let failed = store.delete_by_key(Collection::Clients, "cli_a").await;
    assert_eq!(
        failed,
        Err(StoreError::Http {
            status: 503,
            message: "maintenance".to_string(),
        })
    );

    store
        .delete_by_key(Collection::Clients, "cli_b")
        .await
        .expect("delete should succeed");
}
