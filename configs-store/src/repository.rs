//! PostgreSQL persistence for config rows.
//!
//! One table, point lookups and single-statement upserts only. The upsert is
//! atomic per row; concurrent writers to one key resolve last-writer-wins.

use async_trait::async_trait;
use configs_core::{ConfigRecord, ConfigResult, StorageError, UserId};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "kheina".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CONFIGS_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("CONFIGS_DB_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("CONFIGS_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("CONFIGS_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("CONFIGS_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("CONFIGS_DB_POOL_SIZE")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.max_size),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ConfigResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|err| StorageError::Pool {
                reason: err.to_string(),
            })?;

        Ok(pool)
    }
}

// ============================================================================
// PERSISTENCE TRAIT AND POSTGRES IMPLEMENTATION
// ============================================================================

/// Persistence seam for config rows.
#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    /// Single-row point lookup.
    async fn fetch(&self, key: &str) -> ConfigResult<Option<ConfigRecord>>;

    /// Insert-or-update in one atomic statement, refreshing the audit
    /// columns on conflict.
    async fn upsert(&self, key: &str, bytes: &[u8], updated_by: UserId) -> ConfigResult<()>;
}

const FETCH_SQL: &str = "\
    SELECT key, bytes, updated_by, updated_on \
    FROM configs \
    WHERE key = $1";

const UPSERT_SQL: &str = "\
    INSERT INTO configs (key, bytes, updated_by, updated_on) \
    VALUES ($1, $2, $3, now()) \
    ON CONFLICT (key) DO UPDATE SET \
        bytes = EXCLUDED.bytes, \
        updated_by = EXCLUDED.updated_by, \
        updated_on = now()";

/// Repository over the `configs` table.
#[derive(Clone)]
pub struct PgConfigRepository {
    pool: Pool,
}

impl PgConfigRepository {
    /// Create a new repository with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new repository from configuration.
    pub fn from_config(config: &DbConfig) -> ConfigResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> ConfigResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|err| {
            StorageError::Pool {
                reason: err.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl ConfigPersistence for PgConfigRepository {
    async fn fetch(&self, key: &str) -> ConfigResult<Option<ConfigRecord>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let conn = self.get_conn().await?;
            match conn.query_opt(FETCH_SQL, &[&key]).await {
                Ok(row) => {
                    return Ok(row.map(|row| ConfigRecord {
                        key: row.get("key"),
                        bytes: row.get("bytes"),
                        updated_by: row.get("updated_by"),
                        updated_on: row.get("updated_on"),
                    }))
                }
                Err(err) if err.is_closed() && attempt < 2 => {
                    tracing::debug!(key, "config fetch hit a closed connection, retrying");
                }
                Err(err) => {
                    return Err(StorageError::Database {
                        reason: err.to_string(),
                    }
                    .into())
                }
            }
        }
    }

    async fn upsert(&self, key: &str, bytes: &[u8], updated_by: UserId) -> ConfigResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let conn = self.get_conn().await?;
            match conn.execute(UPSERT_SQL, &[&key, &bytes, &updated_by]).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_closed() && attempt < 2 => {
                    tracing::debug!(key, "config upsert hit a closed connection, retrying");
                }
                Err(err) => {
                    return Err(StorageError::Database {
                        reason: err.to_string(),
                    }
                    .into())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_db_config() {
        let config = DbConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_upsert_is_single_statement() {
        // The per-row atomicity argument rests on this being one INSERT.
        assert_eq!(UPSERT_SQL.matches("INSERT").count(), 1);
        assert!(UPSERT_SQL.contains("ON CONFLICT (key) DO UPDATE"));
    }
}
