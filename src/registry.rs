//! Datasource registry: one lazily opened pool per connection id.

use crate::config::ConnectionConfig;
use crate::error::{ConfigError, EngineError};
use crate::settings::Settings;
use crate::sql::DbKind;
use crate::store::MetadataStore;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

type Slot = Arc<OnceCell<AnyPool>>;

/// Pools are created on first use and live as long as the registry.
/// Concurrent first lookups of one id share a single connect attempt.
pub struct ConnectionRegistry {
    store: Arc<dyn MetadataStore>,
    max_connections: u32,
    slots: Mutex<HashMap<String, Slot>>,
    connects: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn MetadataStore>, settings: &Settings) -> Self {
        ConnectionRegistry {
            store,
            max_connections: settings.max_connections,
            slots: Mutex::new(HashMap::new()),
            connects: AtomicUsize::new(0),
        }
    }

    /// Register an already open pool under `conn_id`, replacing nothing that is already initialised.
    pub async fn inject(&self, conn_id: &str, pool: AnyPool) -> bool {
        let slot = self.slot(conn_id).await;
        slot.set(pool).is_ok()
    }

    pub async fn get(&self, conn_id: &str) -> Result<AnyPool, EngineError> {
        let slot = self.slot(conn_id).await;
        let pool = slot.get_or_try_init(|| self.open(conn_id)).await?;
        Ok(pool.clone())
    }

    /// Pools opened from descriptors so far; injected pools are not counted.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    async fn slot(&self, conn_id: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(conn_id.to_string()).or_default().clone()
    }

    async fn open(&self, conn_id: &str) -> Result<AnyPool, EngineError> {
        let desc = self
            .store
            .connection(conn_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("connection {}", conn_id)))?;
        let kind: DbKind = desc.kind.parse()?;
        let dsn = dsn(&desc, kind)?;

        sqlx::any::install_default_drivers();
        self.connects.fetch_add(1, Ordering::Relaxed);
        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&dsn)
            .await
            .map_err(|e| EngineError::execution(&format!("connect {}", conn_id), e))?;
        tracing::info!(conn = %conn_id, kind = ?kind, "datasource connected");
        Ok(pool)
    }
}

/// Connection string for a descriptor; an explicit `url` wins.
pub(crate) fn dsn(c: &ConnectionConfig, kind: DbKind) -> Result<String, ConfigError> {
    let scheme = kind
        .driver_scheme()
        .ok_or_else(|| ConfigError::UnsupportedConnectionKind(c.kind.clone()))?;
    if !c.url.is_empty() {
        return Ok(c.url.clone());
    }
    if scheme == "sqlite" {
        let path = if c.database.is_empty() { ":memory:" } else { c.database.as_str() };
        return Ok(format!("sqlite:{}", path));
    }
    let port = match (c.port, scheme) {
        (0, "postgres") => 5432,
        (0, _) => 3306,
        (p, _) => p,
    };
    let host = if c.host.is_empty() { "localhost" } else { c.host.as_str() };
    let auth = if c.user.is_empty() {
        String::new()
    } else if c.password.is_empty() {
        format!("{}@", url_encode(&c.user))
    } else {
        format!("{}:{}@", url_encode(&c.user), url_encode(&c.password))
    };
    Ok(format!("{}://{}{}:{}/{}", scheme, auth, host, port, c.database))
}

fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
