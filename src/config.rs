use anyhow::{bail, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_ensure_schema: bool,
    pub jwt_secret: String,
    pub event_bus_capacity: usize,
    pub nearby_default_distance_km: f64,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => bail!("Unknown STORAGE_BACKEND '{}', expected postgres or memory", other),
        };

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "disaster_alerts".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "alerts".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "alerts".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);
        let db_ensure_schema = env::var("DB_ENSURE_SCHEMA")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);

        // Tokens are issued elsewhere; an empty secret rejects every bearer token.
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_default();

        let event_bus_capacity = env::var("EVENT_BUS_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .unwrap_or(256);
        let nearby_default_distance_km = env::var("NEARBY_DEFAULT_DISTANCE_KM")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10.0);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            port,
            storage_backend,
            database_url,
            db_max_connections,
            db_ensure_schema,
            jwt_secret,
            event_bus_capacity,
            nearby_default_distance_km,
            log_level,
        })
    }

    /// Configuration for in-process use (tests, local demos) backed by the memory store.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            port: 0,
            storage_backend: StorageBackend::Memory,
            database_url: String::new(),
            db_max_connections: 1,
            db_ensure_schema: false,
            jwt_secret: jwt_secret.to_string(),
            event_bus_capacity: 32,
            nearby_default_distance_km: 10.0,
            log_level: "debug".to_string(),
        }
    }
}
