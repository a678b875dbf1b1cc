use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{carpool::Carpool, user::UserRef},
    services::directory,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/join/:id", put(join))
        .route("/leave/:id", put(leave))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CarpoolView {
    id: String,
    event: String,
    date: DateTime<Utc>,
    start_location: String,
    end_location: String,
    driver: UserRef,
    passengers: Vec<UserRef>,
    created_at: DateTime<Utc>,
}

impl CarpoolView {
    fn build(carpool: Carpool, refs: &HashMap<String, UserRef>) -> Self {
        let resolve = |id: &str| refs.get(id).cloned().unwrap_or_else(|| UserRef::unknown(id));
        Self {
            driver: resolve(&carpool.driver),
            passengers: carpool.passengers.iter().map(|p| resolve(p)).collect(),
            id: carpool.id,
            event: carpool.event,
            date: carpool.date,
            start_location: carpool.start_location,
            end_location: carpool.end_location,
            created_at: carpool.created_at,
        }
    }
}

async fn resolve_views(
    state: &AppState,
    carpools: Vec<Carpool>,
) -> Result<Vec<CarpoolView>, AppError> {
    let ids: Vec<&str> = carpools
        .iter()
        .flat_map(|c| {
            std::iter::once(c.driver.as_str()).chain(c.passengers.iter().map(String::as_str))
        })
        .collect();
    let refs = directory::resolve_refs(&state.db, ids).await?;
    Ok(carpools
        .into_iter()
        .map(|carpool| CarpoolView::build(carpool, &refs))
        .collect())
}

async fn resolve_view(state: &AppState, carpool: Carpool) -> Result<CarpoolView, AppError> {
    let mut views = resolve_views(state, vec![carpool]).await?;
    Ok(views.remove(0))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCarpool {
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
    Json(body): Json<CreateCarpool>,
) -> Result<Json<CarpoolView>, AppError> {
    let user = current.require_user()?;
    let carpool = Carpool::new(
        body.event,
        body.date,
        body.start_location,
        body.end_location,
        &user.uuid,
    )?;
    let saved = state.store.insert(carpool).await?;
    Ok(Json(resolve_view(&state, saved).await?))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<CarpoolView>>, AppError> {
    current.require_user()?;
    let carpools = state.store.list::<Carpool>().await?;
    Ok(Json(resolve_views(&state, carpools).await?))
}

async fn join(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<CarpoolView>, AppError> {
    let caller = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |carpool: &mut Carpool| carpool.join(&caller))
        .await?;
    Ok(Json(resolve_view(&state, updated).await?))
}

async fn leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<CarpoolView>, AppError> {
    let caller = current.require_user()?.uuid.clone();
    let updated = state
        .store
        .update(&id, |carpool: &mut Carpool| carpool.leave(&caller))
        .await?;
    Ok(Json(resolve_view(&state, updated).await?))
}
