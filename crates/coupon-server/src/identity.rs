//! Anonymous caller identity: an opaque token kept in the `userId` cookie,
//! plus the caller's network address as a secondary key.

use actix_web::{
    FromRequest, HttpRequest,
    cookie::{Cookie, time::Duration},
    dev::Payload,
};
use std::{
    convert::Infallible,
    future::{Ready, ready},
};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "userId";
pub const COOKIE_MAX_AGE_DAYS: i64 = 30;
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// 128 random bits, base58 encoded.
pub fn new_token() -> String {
    bs58::encode(Uuid::new_v4().as_bytes()).into_string()
}

/// Returns the existing token unchanged, or a fresh one with `true`
/// meaning the caller has to persist it.
pub fn resolve_identity(existing: Option<&str>) -> (String, bool) {
    match existing {
        Some(token) if !token.is_empty() => (token.to_owned(), false),
        _ => (new_token(), true),
    }
}

pub fn identity_cookie(token: String) -> Cookie<'static> {
    Cookie::build(COOKIE_NAME, token)
        .http_only(true)
        .path("/")
        .max_age(Duration::days(COOKIE_MAX_AGE_DAYS))
        .finish()
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub is_new: bool,
    pub source_address: String,
}

impl Identity {
    /// Cookie to set on the response, only for newly created identities.
    pub fn cookie(&self) -> Option<Cookie<'static>> {
        self.is_new.then(|| identity_cookie(self.id.clone()))
    }
}

fn source_address(req: &HttpRequest) -> String {
    let info = req.connection_info();
    // differs from the peer address only when taken from Forwarded / X-Forwarded-For
    if let Some(real) = info.realip_remote_addr()
        && info.peer_addr() != Some(real)
    {
        return real.to_owned();
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_owned())
}

impl FromRequest for Identity {
    type Error = Infallible;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let cookie = req.cookie(COOKIE_NAME);
        let (id, is_new) = resolve_identity(cookie.as_ref().map(|c| c.value()));
        ready(Ok(Self {
            id,
            is_new,
            source_address: source_address(req),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_resolve_existing() {
        assert_eq!(
            resolve_identity(Some("abc")),
            ("abc".to_owned(), false)
        );
    }

    #[test]
    fn test_resolve_new() {
        let (a, new_a) = resolve_identity(None);
        let (b, new_b) = resolve_identity(Some(""));
        assert!(new_a && new_b);
        assert_ne!(a, b);
        assert_eq!(bs58::decode(&a).into_vec().unwrap().len(), 16);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = identity_cookie("token".to_owned());
        assert_eq!(cookie.name(), "userId");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(30)));
    }

    #[actix_web::test]
    async fn test_extract_existing_cookie() {
        let req = TestRequest::default()
            .cookie(Cookie::new(COOKIE_NAME, "returning"))
            .peer_addr("10.1.2.3:40000".parse().unwrap())
            .to_http_request();
        let identity = Identity::extract(&req).await.unwrap();
        assert_eq!(identity.id, "returning");
        assert!(!identity.is_new);
        assert!(identity.cookie().is_none());
        assert_eq!(identity.source_address, "10.1.2.3");
    }

    #[actix_web::test]
    async fn test_extract_new_forwarded() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.9"))
            .peer_addr("10.1.2.3:40000".parse().unwrap())
            .to_http_request();
        let identity = Identity::extract(&req).await.unwrap();
        assert!(identity.is_new);
        assert_eq!(identity.cookie().unwrap().value(), identity.id);
        assert_eq!(identity.source_address, "203.0.113.9");
    }

    #[actix_web::test]
    async fn test_extract_unknown_address() {
        let req = TestRequest::default().to_http_request();
        let identity = Identity::extract(&req).await.unwrap();
        assert_eq!(identity.source_address, UNKNOWN_ADDRESS);
    }
}
