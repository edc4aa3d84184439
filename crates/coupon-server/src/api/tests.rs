use super::{prelude::*, service};
use crate::identity::COOKIE_NAME;
use actix_web::{
    App,
    cookie::Cookie,
    dev::ServiceResponse,
    test::{self, TestRequest},
};
use db::LocalStorage;
use serde_json::{Value, json};

struct TestApp {
    _dir: tempfile::TempDir,
    db: DbPool,
    config: Config,
}

impl TestApp {
    fn new(admin_token: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = DbPool::Local(LocalStorage::new(dir.path()).unwrap());
        let config = Config {
            admin_token: admin_token.map(str::to_owned),
            ..Config::default()
        };
        Self {
            _dir: dir,
            db,
            config,
        }
    }
}

macro_rules! init {
    ($app:expr) => {{
        let arbiter = ClaimArbiter::new(
            $app.db.clone(),
            $app.config.cooldown(),
            $app.config.claim_rounds,
        );
        test::init_service(
            App::new()
                .app_data(web::Data::new($app.db.clone()))
                .app_data(web::Data::new(arbiter))
                .service(service(&$app.config)),
        )
        .await
    }};
}

fn claim_request() -> TestRequest {
    TestRequest::post().uri("/api/claim")
}

fn identity_cookie(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.into_owned())
}

#[actix_web::test]
async fn test_claim_flow() {
    let app = TestApp::new(None);
    let svc = init!(app);

    let resp = test::call_service(&svc, TestRequest::get().uri("/api/seed").to_request()).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": true, "message": "Database seeded successfully", "count": 50})
    );

    let resp = test::call_service(&svc, claim_request().to_request()).await;
    assert!(resp.status().is_success());
    let cookie = identity_cookie(&resp).expect("identity cookie");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Coupon claimed successfully!");
    let code = body["coupon"].as_str().unwrap().to_owned();
    assert!(body.get("timeRemaining").is_none());

    let resp = test::call_service(&svc, claim_request().cookie(cookie).to_request()).await;
    assert!(resp.status().is_success());
    assert!(identity_cookie(&resp).is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "You have already claimed a coupon recently.");
    let remaining = body["timeRemaining"].as_u64().unwrap();
    assert!((3599..=3600).contains(&remaining));
    assert!(body.get("coupon").is_none());

    let coupons = app.db.coupons().list_all().await.unwrap();
    assert_eq!(coupons.len(), 50);
    let claimed = coupons.iter().filter(|c| c.claimed).collect::<Vec<_>>();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].code, code);

    // a second seed leaves the pool alone
    let resp = test::call_service(&svc, TestRequest::get().uri("/api/seed").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": true, "message": "Database already seeded with coupons", "count": 50})
    );
}

#[actix_web::test]
async fn test_claim_exhausted() {
    let app = TestApp::new(None);
    let svc = init!(app);

    let resp = test::call_service(&svc, claim_request().to_request()).await;
    assert!(identity_cookie(&resp).is_some());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "success": false,
            "message": "Sorry, there are no more coupons available at this time."
        })
    );
}

#[actix_web::test]
async fn test_add_and_list_coupons() {
    let app = TestApp::new(None);
    let svc = init!(app);

    let add = || {
        TestRequest::post()
            .uri("/api/admin/coupons")
            .set_json(json!({"code": "ABCD-1234"}))
            .to_request()
    };

    let resp = test::call_service(&svc, add()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": true, "message": "Coupon added successfully"})
    );

    let resp = test::call_service(&svc, add()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": false, "message": "Coupon code already exists"})
    );

    let resp = test::call_service(
        &svc,
        TestRequest::get().uri("/api/admin/coupons").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    let coupons = body["coupons"].as_array().unwrap();
    assert_eq!(coupons.len(), 1);
    assert_eq!(coupons[0]["code"], "ABCD-1234");
    assert_eq!(coupons[0]["claimed"], false);
    assert!(coupons[0].get("createdAt").is_some());
    assert!(coupons[0].get("claimedBy").is_none());
}

#[actix_web::test]
async fn test_add_missing_code() {
    let app = TestApp::new(None);
    let svc = init!(app);

    for payload in [json!({}), json!({"code": "   "})] {
        let resp = test::call_service(
            &svc,
            TestRequest::post()
                .uri("/api/admin/coupons")
                .set_json(payload)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Coupon code is required");
    }
    assert_eq!(app.db.coupons().count().await.unwrap(), 0);
}

#[actix_web::test]
async fn test_admin_gate() {
    let app = TestApp::new(Some("s3cret"));
    let svc = init!(app);

    let resp = test::call_service(
        &svc,
        TestRequest::get().uri("/api/admin/coupons").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": false, "message": "unauthorized"}));

    let resp = test::call_service(
        &svc,
        TestRequest::get()
            .uri("/api/admin/coupons")
            .insert_header(("authorization", "Bearer s3cret"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // the claim route stays public
    let resp = test::call_service(&svc, claim_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
