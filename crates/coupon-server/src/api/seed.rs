use super::prelude::*;
use crate::seed::{SeedOutcome, seed_pool};

#[derive(Serialize)]
struct Output {
    success: bool,
    message: &'static str,
    count: u64,
}

pub fn service(config: &Config) -> impl HttpServiceFactory + 'static {
    let count = config.seed_count;
    web::resource("/seed").route(web::get().to(move |db: web::Data<DbPool>| seed(db, count)))
}

async fn seed(db: web::Data<DbPool>, count: usize) -> Result<web::Json<Output>, Error> {
    let SeedOutcome { seeded, count } = seed_pool(db.coupons(), count).await?;
    Ok(web::Json(Output {
        success: true,
        message: if seeded {
            "Database seeded successfully"
        } else {
            "Database already seeded with coupons"
        },
        count,
    }))
}
