use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::auth::TokenVerifier;
use crate::bus::FanOutBus;
use crate::config::{AppConfig, StorageBackend};
use crate::db::{self, MemoryStore, PgStore, Store};
use crate::lifecycle::{AlertManager, ReportManager, ResourceManager};
use crate::models::{Alert, Report, Resource};

struct Stores {
    alerts: Arc<dyn Store<Alert>>,
    resources: Arc<dyn Store<Resource>>,
    reports: Arc<dyn Store<Report>>,
}

impl Stores {
    fn memory() -> Self {
        Self {
            alerts: Arc::new(MemoryStore::<Alert>::new()),
            resources: Arc::new(MemoryStore::<Resource>::new()),
            reports: Arc::new(MemoryStore::<Report>::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub alerts: AlertManager,
    pub resources: ResourceManager,
    pub reports: ReportManager,
    pub tokens: Arc<TokenVerifier>,
}

impl AppState {
    /// Connects the configured storage backend and wires the managers around it.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let stores: Stores = match config.storage_backend {
            StorageBackend::Postgres => {
                let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
                info!("Connected to database");
                if config.db_ensure_schema {
                    db::ensure_schema(&pool).await?;
                }
                let store = PgStore::new(pool);
                Stores {
                    alerts: Arc::new(store.clone()),
                    resources: Arc::new(store.clone()),
                    reports: Arc::new(store),
                }
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, nothing survives a restart");
                Stores::memory()
            }
        };

        Ok(Self::from_stores(config, stores))
    }

    /// Memory-backed state; never touches the network.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_stores(config, Stores::memory())
    }

    fn from_stores(config: AppConfig, stores: Stores) -> Self {
        let bus = FanOutBus::new(config.event_bus_capacity);
        let tokens = Arc::new(TokenVerifier::new(&config.jwt_secret));
        Self {
            alerts: AlertManager::new(stores.alerts, bus),
            resources: ResourceManager::new(stores.resources),
            reports: ReportManager::new(stores.reports),
            tokens,
            config: Arc::new(config),
        }
    }

    pub fn bus(&self) -> &FanOutBus {
        self.alerts.bus()
    }
}
