use crate::error::ErrorBody;
use actix_web::{
    Error, HttpResponse, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{StatusCode, header::AUTHORIZATION},
};
use futures_util::{
    TryFutureExt,
    future::{Either, MapOk},
};
use std::{
    future::{Ready, ready},
    rc::Rc,
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
#[error("unauthorized")]
pub struct Unauthorized;

impl ResponseError for Unauthorized {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        ErrorBody::build(self)
    }
}

fn same_bytes(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Requires `Authorization: Bearer <token>` when a token is configured.
/// Without a token every request passes.
#[derive(Clone)]
pub struct AdminGate {
    token: Option<Rc<str>>,
}

impl AdminGate {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.map(Rc::from),
        }
    }

    fn check(&self, req: &ServiceRequest) -> Result<(), Unauthorized> {
        let Some(token) = &self.token else {
            return Ok(());
        };
        let bearer = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match bearer {
            Some(bearer) if same_bytes(bearer.as_bytes(), token.as_bytes()) => Ok(()),
            _ => {
                tracing::warn!("rejected admin request: {} {}", req.method(), req.path());
                Err(Unauthorized)
            }
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AdminGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, s: S) -> Self::Future {
        ready(Ok(AdminGateMiddleware {
            s,
            gate: self.clone(),
        }))
    }
}

pub struct AdminGateMiddleware<S> {
    gate: AdminGate,
    s: S,
}

impl<S, B> Service<ServiceRequest> for AdminGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Either<
        MapOk<S::Future, fn(ServiceResponse<B>) -> Self::Response>,
        Ready<Result<Self::Response, Self::Error>>,
    >;

    forward_ready!(s);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.gate.check(&req) {
            Ok(()) => Either::Left(
                self.s
                    .call(req)
                    .map_ok(ServiceResponse::<B>::map_into_left_body),
            ),
            Err(e) => Either::Right(ready(Ok(req.error_response(e).map_into_right_body()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test, web};

    async fn status(gate: AdminGate, auth: Option<&str>) -> StatusCode {
        let app = test::init_service(
            App::new().service(
                web::resource("/admin")
                    .wrap(gate)
                    .route(web::get().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;
        let mut req = test::TestRequest::get().uri("/admin");
        if let Some(auth) = auth {
            req = req.insert_header((AUTHORIZATION, auth));
        }
        test::call_service(&app, req.to_request()).await.status()
    }

    #[actix_web::test]
    async fn test_token_required() {
        let gate = || AdminGate::new(Some("s3cret".to_owned()));
        assert_eq!(status(gate(), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(gate(), Some("Bearer wrong")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status(gate(), Some("s3cret")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status(gate(), Some("Bearer s3cret")).await, StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_open_without_token() {
        assert_eq!(status(AdminGate::new(None), None).await, StatusCode::OK);
    }
}
