use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, IntoConnectionInfo};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Identity of a Redis target: one connection manager per (host, port, db).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl PoolKey {
    pub fn from_connection_info(info: &ConnectionInfo) -> Self {
        let (host, port) = match &info.addr {
            ConnectionAddr::Tcp(host, port) => (host.clone(), *port),
            ConnectionAddr::TcpTls { host, port, .. } => (host.clone(), *port),
            other => (format!("{:?}", other), 0),
        };
        Self {
            host,
            port,
            db: info.redis.db,
        }
    }

    /// Parse a Redis URL (scheme optional) into its pool key
    pub fn parse(redis_url: &str) -> Result<Self> {
        let info = normalize_url(redis_url)
            .into_connection_info()
            .context("failed to parse Redis connection string")?;
        Ok(Self::from_connection_info(&info))
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Prefix bare `host:port[/db]` addresses with `redis://`.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("redis://") || raw.starts_with("rediss://") || raw.starts_with("unix://") {
        raw.to_string()
    } else {
        format!("redis://{}", raw)
    }
}

/// Explicit registry of shared connection managers.
///
/// Every leaderboard pointed at the same (host, port, db) reuses one
/// connection manager. The registry is owned by the application and passed
/// to whatever builds stores; there is no process-wide pool map.
#[derive(Default)]
pub struct PoolRegistry {
    pools: Mutex<HashMap<PoolKey, SharedConnectionManager>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the manager for `redis_url`, connecting on first use
    pub async fn get_or_connect(&self, redis_url: &str) -> Result<SharedConnectionManager> {
        let info = normalize_url(redis_url)
            .into_connection_info()
            .context("failed to parse Redis connection string")?;
        let key = PoolKey::from_connection_info(&info);

        let mut pools = self.pools.lock().await;
        if let Some(manager) = pools.get(&key) {
            debug!(target_key = %key, "Reusing Redis connection manager");
            return Ok(manager.clone());
        }

        let client = Client::open(info).context("failed to construct Redis client")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;
        let manager = Arc::new(Mutex::new(manager));
        pools.insert(key.clone(), manager.clone());

        info!(target_key = %key, "Redis connection manager created");
        Ok(manager)
    }

    /// Register an existing manager under `key`, replacing any previous one
    pub async fn insert(&self, key: PoolKey, manager: SharedConnectionManager) {
        self.pools.lock().await.insert(key, manager);
    }

    pub async fn contains(&self, key: &PoolKey) -> bool {
        self.pools.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.pools.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("localhost:6379"), "redis://localhost:6379");
        assert_eq!(normalize_url(" redis://cache:6380/2 "), "redis://cache:6380/2");
        assert_eq!(normalize_url("rediss://secure:6379"), "rediss://secure:6379");
    }

    #[test]
    fn test_pool_key_parsing() {
        let key = PoolKey::parse("redis://localhost:6379/0").unwrap();
        assert_eq!(
            key,
            PoolKey {
                host: "localhost".to_string(),
                port: 6379,
                db: 0,
            }
        );

        let key = PoolKey::parse("cache.internal:6380/3").unwrap();
        assert_eq!(key.host, "cache.internal");
        assert_eq!(key.port, 6380);
        assert_eq!(key.db, 3);
        assert_eq!(key.to_string(), "cache.internal:6380/3");
    }

    #[test]
    fn test_same_target_shares_key() {
        let a = PoolKey::parse("redis://localhost:6379/1").unwrap();
        let b = PoolKey::parse("localhost:6379/1").unwrap();
        let c = PoolKey::parse("localhost:6379/2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = PoolRegistry::new();
        assert!(registry.is_empty().await);
        let key = PoolKey::parse("localhost:6379").unwrap();
        assert!(!registry.contains(&key).await);
    }

    #[tokio::test]
    async fn test_reuses_manager_when_redis_available() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            eprintln!("Skipping test: REDIS_URL not set");
            return;
        };

        let registry = PoolRegistry::new();
        let first = match registry.get_or_connect(&url).await {
            Ok(manager) => manager,
            Err(e) => {
                eprintln!("Skipping test: Redis not available: {e}");
                return;
            }
        };
        let second = registry.get_or_connect(&url).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }
}
