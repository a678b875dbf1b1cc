use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    models::user::UserRef,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Serialize)]
struct SessionResponse {
    token: String,
    user: UserRef,
}

#[derive(Deserialize)]
struct RegisterBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = auth::register_user(&state, &body.name, &body.email, &body.password).await?;
    let token = auth::create_session(&state, user.id).await?;
    Ok(Json(SessionResponse {
        token,
        user: user.user_ref(),
    }))
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = auth::authenticate_user(&state, &body.email, &body.password).await?;
    let token = auth::create_session(&state, user.id).await?;
    Ok(Json(SessionResponse {
        token,
        user: user.user_ref(),
    }))
}

async fn logout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    if let Some(TypedHeader(bearer)) = bearer {
        auth::destroy_session(&state, bearer.token()).await?;
    }
    Ok(Json(json!({ "message": "logged out" })))
}

async fn me(current: CurrentUser) -> Result<Json<UserRef>, AppError> {
    let user = current.require_user()?;
    Ok(Json(user.user_ref()))
}
