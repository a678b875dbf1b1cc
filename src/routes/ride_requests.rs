use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{
        carpool::Carpool,
        ride_request::{Note, RequestStatus, RideRequest},
        user::UserRef,
    },
    services::directory,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id/accept", put(accept))
        .route("/:id/unaccept", put(unaccept))
        .route("/:id/cancel", put(cancel))
        .route("/:id/notes", post(add_note))
        .route("/:id/fulfill", post(fulfill))
}

/// Ride request as returned to clients, with user identifiers resolved to
/// display records.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RideRequestView {
    id: String,
    event: String,
    date: DateTime<Utc>,
    start_location: String,
    end_location: String,
    requester: UserRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted_by: Option<UserRef>,
    status: RequestStatus,
    notes: Vec<Note>,
    created_at: DateTime<Utc>,
}

impl RideRequestView {
    fn build(request: RideRequest, refs: &HashMap<String, UserRef>) -> Self {
        let resolve = |id: &str| refs.get(id).cloned().unwrap_or_else(|| UserRef::unknown(id));
        Self {
            requester: resolve(&request.requester),
            accepted_by: request.accepted_by.as_deref().map(|id| resolve(id)),
            id: request.id,
            event: request.event,
            date: request.date,
            start_location: request.start_location,
            end_location: request.end_location,
            status: request.status,
            notes: request.notes,
            created_at: request.created_at,
        }
    }
}

async fn resolve_views(
    state: &AppState,
    requests: Vec<RideRequest>,
) -> Result<Vec<RideRequestView>, AppError> {
    let ids: Vec<&str> = requests
        .iter()
        .flat_map(|r| [Some(r.requester.as_str()), r.accepted_by.as_deref()])
        .flatten()
        .collect();
    let refs = directory::resolve_refs(&state.db, ids).await?;
    Ok(requests
        .into_iter()
        .map(|request| RideRequestView::build(request, &refs))
        .collect())
}

async fn resolve_view(
    state: &AppState,
    request: RideRequest,
) -> Result<RideRequestView, AppError> {
    let mut views = resolve_views(state, vec![request]).await?;
    Ok(views.remove(0))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRideRequest {
    #[serde(default)]
    event: String,
    date: DateTime<Utc>,
    #[serde(default)]
    start_location: String,
    #[serde(default)]
    end_location: String,
}

async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateRideRequest>,
) -> Result<Json<RideRequestView>, AppError> {
    let user = current.require_user()?;
    let request = RideRequest::new(
        body.event,
        body.date,
        body.start_location,
        body.end_location,
        &user.uuid,
    )?;
    let saved = state.store.insert(request).await?;
    Ok(Json(resolve_view(&state, saved).await?))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<RideRequestView>>, AppError> {
    current.require_user()?;
    let requests = state.store.list::<RideRequest>().await?;
    Ok(Json(resolve_views(&state, requests).await?))
}

async fn accept(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<RideRequestView>, AppError> {
    let caller = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |request: &mut RideRequest| request.accept(&caller))
        .await?;
    Ok(Json(resolve_view(&state, updated).await?))
}

async fn unaccept(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<RideRequestView>, AppError> {
    let caller = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |request: &mut RideRequest| request.unaccept(&caller))
        .await?;
    Ok(Json(resolve_view(&state, updated).await?))
}

async fn cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<RideRequestView>, AppError> {
    let caller = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |request: &mut RideRequest| request.cancel(&caller))
        .await?;
    Ok(Json(resolve_view(&state, updated).await?))
}

#[derive(Deserialize)]
struct NoteBody {
    #[serde(default)]
    content: String,
}

async fn add_note(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<NoteBody>,
) -> Result<Json<Vec<Note>>, AppError> {
    let caller = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |request: &mut RideRequest| {
            request.add_note(&caller, &body.content)
        })
        .await?;
    Ok(Json(updated.notes))
}

#[derive(Serialize)]
struct FulfillResponse {
    message: String,
    carpool: Carpool,
}

async fn fulfill(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<FulfillResponse>, AppError> {
    let driver = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |request: &mut RideRequest| request.fulfill())
        .await?;
    let carpool = state
        .store
        .insert(Carpool::from_request(&updated, &driver))
        .await?;
    Ok(Json(FulfillResponse {
        message: "ride request fulfilled and carpool created".to_string(),
        carpool,
    }))
}
