use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ensure_valid, AppError, AppResult, FieldError, OptionExt};
use crate::middleware::auth::Caller;
use crate::middleware::validation::{validate_clown_data, validate_clown_update};
use crate::routes::ApiJson;
use crate::state::AppState;
use crate::types::{Clown, ClownPatch, MessageResponse, NewClown, SearchQuery};

fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound("Clown not found".to_string()))
}

fn check(state: &AppState, errors: Vec<FieldError>) -> AppResult<()> {
    if !errors.is_empty() {
        state.metrics.inc_validation_failures();
    }
    ensure_valid(errors)
}

/// Deserializes an already validated body into its typed form.
fn typed<T: serde::de::DeserializeOwned>(body: Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(format!("Malformed request body: {}", e)))
}

pub async fn list_clowns(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Clown>>> {
    let clowns = state.store.list(query.search.as_deref()).await?;
    Ok(Json(clowns))
}

pub async fn get_clown(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Clown>> {
    let id = parse_id(&id)?;
    let clown = state.store.get(id).await?.ok_or_not_found("Clown")?;
    Ok(Json(clown))
}

pub async fn add_clown(
    State(state): State<AppState>,
    Caller(admin): Caller,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<(StatusCode, Json<Clown>)> {
    check(&state, validate_clown_data(&body))?;
    let new: NewClown = typed(body)?;

    let clown = state.store.create(new).await?;
    tracing::info!(id = %clown.id, steam_id = %clown.steam_id, by = %admin.email, "Clown added");
    Ok((StatusCode::CREATED, Json(clown)))
}

pub async fn update_clown(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Clown>> {
    let id = parse_id(&id)?;
    check(&state, validate_clown_update(&body))?;
    let patch: ClownPatch = typed(body)?;

    let clown = state.store.update(id, patch).await?.ok_or_not_found("Clown")?;
    tracing::info!(id = %clown.id, by = %admin.email, "Clown updated");
    Ok(Json(clown))
}

pub async fn delete_clown(
    State(state): State<AppState>,
    Caller(admin): Caller,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    if !state.store.delete(id).await? {
        return Err(AppError::NotFound("Clown not found".to_string()));
    }
    tracing::info!(%id, by = %admin.email, "Clown removed");
    Ok(Json(MessageResponse { message: "Clown removed successfully".to_string() }))
}
