pub mod admin;
pub mod claim;
pub mod seed;

use prelude::*;

/// Every route under `/api`.
pub fn service(config: &Config) -> impl HttpServiceFactory + 'static {
    web::scope("/api")
        .service(claim::service(config))
        .service(seed::service(config))
        .service(admin::service(config))
}

pub mod prelude {
    pub use crate::{Config, arbiter::ClaimArbiter, error::Error, identity::Identity};
    pub use actix_web::{HttpResponse, dev::HttpServiceFactory, http::StatusCode, web};
    pub use db::{Coupon, CouponPool, InsertOutcome, pool::DbPool};
    pub use serde::{Deserialize, Serialize};

    pub struct Success;

    impl Serialize for Success {
        fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            use serde::ser::SerializeStruct;
            let mut s = s.serialize_struct("Success", 1)?;
            s.serialize_field("success", &true)?;
            s.end()
        }
    }
}

#[cfg(test)]
mod tests;
