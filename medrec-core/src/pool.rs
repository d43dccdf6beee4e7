//! Per-source connection pool lifecycle.
//!
//! One bounded MySQL pool per configured source, created independently so
//! one bad config never blocks the others. A source whose pool cannot be
//! created is logged and simply absent from subsequent operations.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tracing::{error, info};

use crate::client::{MySqlSource, SourceClient, SourcePools};
use crate::schema::{ConnectionParams, SourceConfig};

/// Maximum connections per source pool.
/// Kept low: each request checks out at most one connection per source.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Default)]
pub struct PoolManager {
    clients: HashMap<String, Arc<MySqlSource>>,
}

impl PoolManager {
    /// Create one pool per source config. Creation failures are logged and
    /// the source is skipped; this never aborts startup.
    pub async fn connect(configs: &[SourceConfig]) -> Self {
        Self::connect_with_options(configs, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Create pools with a custom per-source connection limit.
    pub async fn connect_with_options(configs: &[SourceConfig], max_connections: u32) -> Self {
        let mut clients = HashMap::new();
        for config in configs {
            if clients.contains_key(&config.source_name) {
                error!(
                    "duplicate source name '{}' in configuration, keeping first",
                    config.source_name
                );
                continue;
            }
            match create_pool(&config.connection, max_connections).await {
                Ok(pool) => {
                    info!("connection pool created for '{}'", config.source_name);
                    clients.insert(
                        config.source_name.clone(),
                        Arc::new(MySqlSource::new(&config.source_name, pool)),
                    );
                }
                Err(err) => {
                    error!("failed to create pool for '{}': {err}", config.source_name);
                }
            }
        }
        Self { clients }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.clients.contains_key(source_name)
    }
}

impl SourcePools for PoolManager {
    fn client(&self, source_name: &str) -> Option<Arc<dyn SourceClient>> {
        self.clients
            .get(source_name)
            .map(|client| client.clone() as Arc<dyn SourceClient>)
    }
}

async fn create_pool(
    params: &ConnectionParams,
    max_connections: u32,
) -> Result<sqlx::MySqlPool, sqlx::Error> {
    let options = MySqlConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .username(&params.user)
        .password(&params.password)
        .database(&params.database);

    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}
