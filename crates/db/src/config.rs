use either::Either;
use serde::Deserialize;
use std::path::PathBuf;

/// Either a PostgreSQL server or an embedded store on disk.
pub type StoreConfig = Either<DbConfig, LocalConfig>;

#[derive(Deserialize, Clone)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub ssl: SslConfig,
    #[serde(default = "DbConfig::default_max_connections")]
    pub max_connections: usize,
}

impl DbConfig {
    pub fn default_max_connections() -> usize {
        16
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct SslConfig {
    #[serde(default)]
    pub enabled: bool,
    pub cert: Option<PathBuf>,
}

impl std::fmt::Display for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "host={} port={} user={} dbname={}",
            self.host, self.port, self.user, self.dbname,
        )
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: "postgres".into(),
            password: "postgres".into(),
            dbname: "coupons".into(),
            host: "127.0.0.1".into(),
            port: 5432,
            ssl: SslConfig::default(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    #[serde(default = "LocalConfig::default_path")]
    pub path: PathBuf,
}

impl LocalConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("./local_storage")
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

pub fn default_store_config() -> StoreConfig {
    Either::Right(LocalConfig::default())
}
