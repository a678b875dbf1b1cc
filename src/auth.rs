use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        session::Session,
        user::{User, UserRef},
    },
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub email: String,
}

impl AuthenticatedUser {
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            id: self.uuid.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid,
            name: user.name,
            email: user.email,
        }
    }
}

/// The caller resolved from the `Authorization: Bearer` header, if any.
/// Handlers call [`CurrentUser::require_user`] to turn an anonymous caller
/// into a 401.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let Ok(TypedHeader(bearer)) = parts.extract::<TypedHeader<Authorization<Bearer>>>().await
        else {
            return Ok(Self(None));
        };
        Ok(Self(resolve_token(&state, bearer.token()).await?))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}

pub async fn register_user(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let name = name.trim();
    let email = email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "name, email and password are required".to_string(),
        ));
    }

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "a user with this email already exists".to_string(),
        ));
    }

    let uuid = Uuid::new_v4().to_string();
    let password_hash = hash_password(password)?;
    sqlx::query(
        "INSERT INTO users (uuid, name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&uuid)
    .bind(name)
    .bind(&email)
    .bind(&password_hash)
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE uuid = ?1")
        .bind(&uuid)
        .fetch_one(&state.db)
        .await?;
    Ok(user.into())
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let email = email.trim().to_lowercase();
    let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
    else {
        return Err(AppError::Unauthorized);
    };

    verify_password(password, &user.password_hash)?;

    sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(user.into())
}

/// Issues a fresh opaque bearer token. Only its digest is stored.
pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let token = Uuid::new_v4().simple().to_string();
    let now = Utc::now();
    let expires_at = now + Duration::hours(state.config.session_ttl_hours);
    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, created_at, last_seen_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(token_hash(&token))
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(expires_at)
    .execute(&state.db)
    .await?;
    Ok(token)
}

pub async fn resolve_token(
    state: &AppState,
    token: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let Some(session) = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = ?1")
        .bind(token_hash(token))
        .fetch_optional(&state.db)
        .await?
    else {
        return Ok(None);
    };

    if let Some(expires_at) = session.expires_at {
        if expires_at < Utc::now() {
            return Ok(None);
        }
    }

    let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
        .bind(session.user_id)
        .fetch_optional(&state.db)
        .await?
    else {
        return Ok(None);
    };

    sqlx::query("UPDATE sessions SET last_seen_at = ?1 WHERE token_hash = ?2")
        .bind(Utc::now())
        .bind(&session.token_hash)
        .execute(&state.db)
        .await?;

    Ok(Some(user.into()))
}

pub async fn destroy_session(state: &AppState, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?1")
        .bind(token_hash(token))
        .execute(&state.db)
        .await?;
    Ok(())
}

fn token_hash(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AppError::Other(anyhow::anyhow!("stored password hash invalid: {err}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized)
}
