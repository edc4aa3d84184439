use actix_web::{App, HttpServer, middleware::Logger, web};
use coupon_server::{
    Config,
    api::{self, prelude::Success},
    arbiter::ClaimArbiter,
};
use db::pool::DbPool;
use futures_util::future::ok;
use std::convert::Infallible;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::get_config();

    tracing::info!("allow CORS origins: {:?}", config.cors_origins);
    if config.admin_token.is_none() {
        tracing::warn!("admin_token is not set, /api/admin is open to anyone");
    }

    let db = match DbPool::new(&config.db).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("failed to open coupon store: {}", e);
            return;
        }
    };

    let arbiter = ClaimArbiter::new(db.clone(), config.cooldown(), config.claim_rounds);

    let host = config.host.clone();
    let port = config.port;
    let shutdown_timeout_secs = config.shutdown_timeout_secs;

    tracing::info!("listening on {:?} port {:?}", host, port);

    let app_db = db.clone();
    let server = HttpServer::new(move || {
        let healthcheck = web::resource("/healthcheck")
            .route(web::get().to(|()| ok::<_, Infallible>(web::Json(Success))));

        App::new()
            .wrap(Logger::new(r#""%r" %s %b %Dms"#).exclude("/healthcheck"))
            .app_data(web::Data::new(app_db.clone()))
            .app_data(web::Data::new(arbiter.clone()))
            .service(api::service(&config))
            .service(healthcheck)
    })
    .shutdown_timeout(shutdown_timeout_secs)
    .bind((host, port));

    let result = match server {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::error!("server error: {}", e);
    }

    db.close();
}
