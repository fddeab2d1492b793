//! Configuration management for the loader.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`ROWGRAPH__` prefix, e.g. `ROWGRAPH__BATCH_SIZE`)
//! 2. Config file (`<prefix>.toml`, optional)
//! 3. Defaults

use serde::Deserialize;

/// Connection and bulk-load settings for a connector.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Bolt URI of the Neo4j server.
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Target database; `None` uses the server's default database.
    #[serde(default)]
    pub database: Option<String>,

    /// Size of the driver's connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Rows pulled per round trip when streaming results.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// Rows per write batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on concurrently running parallel units.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Create lookup indexes before bulk writes.
    #[serde(default = "default_true")]
    pub create_indexes: bool,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> usize {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_batch_size() -> usize {
    10_000
}

/// `min(32, cpus + 4)`: enough workers to keep the server busy while some
/// units wait on the network.
pub fn default_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(32)
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            database: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            batch_size: default_batch_size(),
            threads: default_threads(),
            create_indexes: default_true(),
        }
    }
}

impl LoaderConfig {
    /// Load from `<file_prefix>.toml` (if present) and `ROWGRAPH__*`
    /// environment variables.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("ROWGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: LoaderConfig = cfg.try_deserialize()?;
        tracing::debug!(
            uri = %loaded.uri,
            database = ?loaded.database,
            batch_size = loaded.batch_size,
            threads = loaded.threads,
            "Loader configuration loaded"
        );
        Ok(loaded)
    }
}
