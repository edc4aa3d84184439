use super::super::prelude::*;

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Serialize)]
struct AddOutput {
    success: bool,
    message: &'static str,
}

#[derive(Serialize)]
struct ListOutput {
    success: bool,
    coupons: Vec<Coupon>,
}

pub fn service() -> impl HttpServiceFactory + 'static {
    web::resource("/coupons")
        .route(web::get().to(list_coupons))
        .route(web::post().to(add_coupon))
}

async fn list_coupons(db: web::Data<DbPool>) -> Result<web::Json<ListOutput>, Error> {
    let coupons = db.coupons().list_all().await?;
    Ok(web::Json(ListOutput {
        success: true,
        coupons,
    }))
}

async fn add_coupon(
    params: web::Json<Params>,
    db: web::Data<DbPool>,
) -> Result<web::Json<AddOutput>, Error> {
    let code = params.code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(Error::MissingCode);
    }
    match db.coupons().insert(code).await? {
        InsertOutcome::Inserted(coupon) => {
            tracing::info!("added coupon {} ({})", coupon.id, coupon.code);
            Ok(web::Json(AddOutput {
                success: true,
                message: "Coupon added successfully",
            }))
        }
        InsertOutcome::Duplicate => Err(Error::DuplicateCode),
    }
}
