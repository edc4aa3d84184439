use crate::{
    ClaimLedger, CouponPool, Error, LocalStorage,
    config::{DbConfig, StoreConfig},
};
use deadpool_postgres::{ClientWrapper, Hook, HookError, Metrics, Pool, PoolConfig, SslMode};
use either::Either;
use futures_util::FutureExt;
use std::time::Duration;

pub use deadpool_postgres::Object as Connection;

/// Store handle shared by every request handler.
///
/// Opened once at startup and closed on shutdown.
#[derive(Clone)]
pub enum DbPool {
    Real(RealDbPool),
    Local(LocalStorage),
}

impl DbPool {
    pub async fn new(cfg: &StoreConfig) -> crate::Result<Self> {
        match cfg {
            Either::Left(cfg) => RealDbPool::new(cfg).await.map(DbPool::Real),
            Either::Right(cfg) => LocalStorage::new(&cfg.path).map(DbPool::Local),
        }
    }

    pub fn coupons(&self) -> &dyn CouponPool {
        match self {
            DbPool::Real(pool) => pool,
            DbPool::Local(local) => local,
        }
    }

    pub fn claims(&self) -> &dyn ClaimLedger {
        match self {
            DbPool::Real(pool) => pool,
            DbPool::Local(local) => local,
        }
    }

    pub fn close(&self) {
        match self {
            DbPool::Real(pool) => pool.close(),
            DbPool::Local(local) => {
                if let Err(error) = local.flush() {
                    tracing::error!("failed to flush local storage: {}", error);
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct RealDbPool {
    pg: Pool,
}

fn read_cert(path: &std::path::Path) -> crate::Result<rustls::Certificate> {
    let cert = std::fs::read(path)?;
    let mut buf = cert.as_slice();
    let items = rustls_pemfile::read_all(&mut buf)?;

    items
        .into_iter()
        .find_map(|i| match i {
            rustls_pemfile::Item::X509Certificate(c) => Some(rustls::Certificate(c)),
            _ => None,
        })
        .ok_or(Error::NoCert)
}

fn tls_config(cfg: &DbConfig) -> crate::Result<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    if let Some(path) = cfg.ssl.cert.as_ref() {
        tracing::info!("adding certificate: {}", path.display());
        let cert = read_cert(path)?;
        roots
            .add(&cert)
            .map_err(|e| Error::AddCert(e.to_string()))?;
    }
    let certs =
        rustls_native_certs::load_native_certs().map_err(|e| Error::AddCert(e.to_string()))?;
    for cert in certs {
        roots
            .add(&rustls::Certificate(cert.0))
            .map_err(|e| Error::AddCert(e.to_string()))?;
    }
    Ok(rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

async fn conn_healthcheck(conn: &mut ClientWrapper, metric: &Metrics) -> Result<(), HookError> {
    if metric.last_used() <= Duration::from_secs(10) {
        Ok(())
    } else {
        conn.simple_query("").await.map_err(HookError::Backend)?;
        Ok(())
    }
}

impl RealDbPool {
    pub async fn new(cfg: &DbConfig) -> crate::Result<Self> {
        use deadpool_postgres::{Config, Runtime};

        let pool_cfg = Config {
            user: Some(cfg.user.clone()),
            password: Some(cfg.password.clone()),
            dbname: Some(cfg.dbname.clone()),
            host: Some(cfg.host.clone()),
            port: Some(cfg.port),
            ssl_mode: Some(if cfg.ssl.enabled {
                SslMode::Require
            } else {
                SslMode::Disable
            }),
            pool: Some(PoolConfig {
                max_size: cfg.max_connections,
                ..Default::default()
            }),
            ..Config::default()
        };
        tracing::info!("connecting to {}, SSL enabled: {}", cfg, cfg.ssl.enabled);

        let builder = if cfg.ssl.enabled {
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config(cfg)?);
            pool_cfg.builder(tls).map_err(Error::CreatePool)?
        } else {
            pool_cfg
                .builder(tokio_postgres::NoTls)
                .map_err(Error::CreatePool)?
        };

        let pg = builder
            .pre_recycle(Hook::async_fn(|c, m| conn_healthcheck(c, m).boxed()))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| Error::BuildPool(e.to_string()))?;

        let pool = Self { pg };
        pool.init_tables().await?;
        Ok(pool)
    }

    pub async fn get_conn(&self) -> crate::Result<Connection> {
        let conn = tokio::time::timeout(Duration::from_secs(30), self.pg.get())
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::GetDbConnection)?;
        Ok(conn)
    }

    /// Create the `coupons` and `claims` tables if they do not exist.
    pub async fn init_tables(&self) -> crate::Result<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(crate::connection::SCHEMA)
            .await
            .map_err(Error::InitDb)?;
        Ok(())
    }

    pub fn close(&self) {
        tracing::info!("closing database connection pool");
        self.pg.close();
    }
}
