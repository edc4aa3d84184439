//! Connect to PostgreSQL with a `DbConfig` TOML file, create tables and print the coupon count.

use db::{CouponPool, pool::RealDbPool};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let Some(path) = std::env::args().nth(1) else {
        tracing::error!("usage: connect <db-config.toml>");
        return;
    };
    let config = match std::fs::read_to_string(&path)
        .map_err(|error| error.to_string())
        .and_then(|s| toml::from_str::<db::config::DbConfig>(&s).map_err(|e| e.to_string()))
    {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("invalid config {}: {}", path, error);
            return;
        }
    };
    let pool = match RealDbPool::new(&config).await {
        Ok(pool) => pool,
        Err(error) => {
            tracing::error!("{}", error);
            return;
        }
    };
    match pool.count().await {
        Ok(count) => tracing::info!("connected, {} coupons", count),
        Err(error) => tracing::error!("{}", error),
    }
    pool.close();
}
