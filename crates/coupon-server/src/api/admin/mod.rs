//! Admin routes, mounted under `/api/admin` behind [`crate::middleware::admin_gate::AdminGate`].

pub mod coupons;

use super::prelude::*;

pub fn service(config: &Config) -> impl HttpServiceFactory + 'static {
    web::scope("/admin")
        .wrap(config.admin_gate())
        .wrap(config.cors())
        .service(coupons::service())
}
