use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use client_console_schemas::ClientId;
use client_console_sync::{
    ClientDraft, ClientRepository, ClientSection, ConsoleError, DetailView, EditorState,
    ListRequest, RecordEditor, SortField,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<ClientRepository>,
    pub page_size: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Log a console failure and pick the status the client sees
fn reject(context: &str, err: ConsoleError) -> (StatusCode, String) {
    let status = match err {
        ConsoleError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ConsoleError::NotFound { .. } => StatusCode::NOT_FOUND,
        ConsoleError::NotEditable(_) => StatusCode::CONFLICT,
        ConsoleError::Store(_) => StatusCode::BAD_GATEWAY,
    };
    error!("{}: {}", context, err);
    (status, err.to_string())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "client-console",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    search: Option<String>,
    sort: Option<SortField>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list_clients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = ListRequest {
        search_text: params.search.unwrap_or_default(),
        sort_field: params.sort.unwrap_or_default(),
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(state.page_size),
    }
    .normalized();

    let page = state
        .repository
        .list(&request)
        .await
        .map_err(|e| reject("Failed to list clients", e))?;

    Ok(Json(serde_json::json!({
        "clients": page.rows,
        "total": page.total,
        "page": page.request.page,
        "page_size": page.request.page_size,
        "has_next_page": page.has_next_page()
    })))
}

async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let id = ClientId(id);
    let view = DetailView::new(state.repository.clone(), id.clone());
    view.load().await;

    let snapshot = view.snapshot();
    match snapshot.client {
        ClientSection::NotFound => {
            return Err(reject("Failed to load client", ConsoleError::client_not_found(&id)))
        }
        ClientSection::Failed(ref reason) => {
            error!("Failed to load client {}: {}", id, reason);
            return Err((StatusCode::BAD_GATEWAY, reason.clone()));
        }
        _ => {}
    }
    Ok(Json(snapshot))
}

async fn create_client(
    State(state): State<AppState>,
    Json(draft): Json<ClientDraft>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut editor = RecordEditor::create(state.repository.clone());
    if let Some(current) = editor.draft_mut() {
        *current = draft;
    }

    editor
        .submit()
        .await
        .map_err(|e| reject("Failed to create client", e))?;

    let saved = editor.saved().cloned();
    info!("Client created via API");
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<ClientDraft>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let id = ClientId(id);
    let mut editor = RecordEditor::edit(state.repository.clone(), id.clone());

    match editor.load().await {
        EditorState::NotFound => {
            return Err(reject("Failed to load client", ConsoleError::client_not_found(&id)))
        }
        EditorState::LoadFailed(reason) => {
            error!("Failed to load client {}: {}", id, reason);
            return Err((StatusCode::BAD_GATEWAY, reason.clone()));
        }
        _ => {}
    }
    if let Some(current) = editor.draft_mut() {
        *current = draft;
    }

    editor
        .submit()
        .await
        .map_err(|e| reject("Failed to update client", e))?;

    Ok(Json(editor.saved().cloned()))
}

async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .repository
        .delete(&ClientId(id))
        .await
        .map_err(|e| reject("Failed to delete client", e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_stats(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let clients = state
        .repository
        .stats()
        .await
        .map_err(|e| reject("Failed to count clients", e))?;

    Ok(Json(serde_json::json!({
        "clients": clients,
        "cache": state.repository.cache_stats()
    })))
}
