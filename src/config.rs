use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub data_root: PathBuf,
    pub spa_root: PathBuf,
    pub session_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://carpool.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let data_root = env::var("DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let spa_root = env::var("SPA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw
                .parse()
                .map_err(|err| AppError::Config(format!("invalid SESSION_TTL_HOURS: {err}")))?,
            Err(_) => 24 * 14,
        };

        Ok(Self {
            database_url,
            listen_addr,
            data_root,
            spa_root,
            session_ttl_hours,
        })
    }
}
