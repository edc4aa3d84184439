use db::config::{StoreConfig, default_store_config};
use middleware::admin_gate::AdminGate;
use serde::Deserialize;
use std::time::Duration;

pub mod api;
pub mod arbiter;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod seed;

pub use error::{Error, Result};

#[derive(Deserialize, Clone)]
pub struct Config {
    #[serde(default = "Config::default_host")]
    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    #[serde(default = "default_store_config", with = "either::serde_untagged")]
    pub db: StoreConfig,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Bearer token required on `/api/admin/*`. Unset leaves the admin routes open.
    pub admin_token: Option<String>,
    #[serde(default = "Config::default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "Config::default_claim_rounds")]
    pub claim_rounds: usize,
    #[serde(default = "Config::default_seed_count")]
    pub seed_count: usize,
    #[serde(default = "Config::default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            db: default_store_config(),
            cors_origins: Vec::new(),
            admin_token: None,
            cooldown_secs: Self::default_cooldown_secs(),
            claim_rounds: Self::default_claim_rounds(),
            seed_count: Self::default_seed_count(),
            shutdown_timeout_secs: Self::default_shutdown_timeout_secs(),
        }
    }
}

impl Config {
    pub fn default_host() -> String {
        "127.0.0.1".to_owned()
    }

    pub fn default_port() -> u16 {
        8080
    }

    pub fn default_cooldown_secs() -> u64 {
        3600
    }

    pub fn default_claim_rounds() -> usize {
        3
    }

    pub fn default_seed_count() -> usize {
        50
    }

    pub fn default_shutdown_timeout_secs() -> u64 {
        30
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Read the TOML file named by the first argument, `-` for STDIN.
    pub fn get_config() -> Self {
        match std::env::args().nth(1) {
            Some(s) => if s == "-" {
                use std::io::Read;
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|error| {
                        tracing::error!("Error reading STDIN: {}", error);
                    })
                    .map(move |_| buf)
            } else {
                std::fs::read_to_string(s).map_err(|error| {
                    tracing::error!("Error reading config: {}", error);
                })
            }
            .and_then(|s| Self::parse(&s))
            .map_err(|_| {
                tracing::warn!("Invalid config file, using default");
            })
            .unwrap_or_default(),
            None => {
                tracing::info!("No config specified, using default");
                Config::default()
            }
        }
    }

    fn parse(s: &str) -> std::result::Result<Self, ()> {
        toml::from_str(s).map_err(|error| {
            tracing::error!("Error parsing config: {}", error);
        })
    }

    /// Build a CORS middleware. `*` allows any origin.
    pub fn cors(&self) -> actix_cors::Cors {
        let mut cors = actix_cors::Cors::default()
            .allow_any_header()
            .allowed_methods(["GET", "POST"])
            .supports_credentials();
        for origin in &self.cors_origins {
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors
    }

    /// Build the middleware guarding `/api/admin/*`.
    pub fn admin_gate(&self) -> AdminGate {
        AdminGate::new(self.admin_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use either::Either;

    #[test]
    fn test_default_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cooldown(), Duration::from_secs(3600));
        assert_eq!(config.seed_count, 50);
        assert!(config.admin_token.is_none());
        assert!(matches!(config.db, Either::Right(_)));
    }

    #[test]
    fn test_parse_config() {
        let config = Config::parse(
            r#"
            port = 9000
            admin_token = "secret"
            cooldown_secs = 60
            cors_origins = ["https://coupons.example.com"]

            [db]
            user = "coupons"
            password = "pw"
            dbname = "coupons"
            host = "10.0.0.5"
            port = 5432
            ssl = { enabled = true }
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
        assert_eq!(config.cooldown_secs, 60);
        match config.db {
            Either::Left(db) => {
                assert_eq!(db.host, "10.0.0.5");
                assert!(db.ssl.enabled);
            }
            Either::Right(_) => panic!("expected postgres config"),
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::parse("port = \"eighty\"").is_err());
    }
}
