use std::future::{ready, Ready};
use std::ops::Deref;
use std::sync::Arc;

use actix_service::{forward_ready, Service, Transform};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use uuid::Uuid;

use crate::claims::user::UserClaim;
use crate::errors::ApiError;
use crate::helpers::tokens::SessionManager;

pub const ACCESS_COOKIE: &str = "accessToken";

/// Decodes the access token, if one is presented, and stores its claim in the
/// request extensions. Requests are never rejected here; handlers decide
/// through [`AuthUser`] or [`Viewer`] whether a session is required.
pub struct CheckLogin {
    pub sessions: Arc<SessionManager>,
}

impl<S, B> Transform<S, ServiceRequest> for CheckLogin
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CheckLoginMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CheckLoginMiddleware {
            service,
            sessions: self.sessions.clone(),
        }))
    }
}

pub struct CheckLoginMiddleware<S> {
    service: S,
    sessions: Arc<SessionManager>,
}

impl<S, B> Service<ServiceRequest> for CheckLoginMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = S::Future;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = presented_token(&req) {
            match self.sessions.verify(&token) {
                Ok(claim) => {
                    req.extensions_mut().insert(claim);
                }
                Err(_) => {
                    tracing::debug!(path = req.path(), "ignoring unusable access token");
                }
            }
        }

        self.service.call(req)
    }
}

/// Cookie first, then `Authorization: Bearer`.
fn presented_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// A request that must carry a valid access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserClaim);

impl Deref for AuthUser {
    type Target = UserClaim;

    fn deref(&self) -> &UserClaim {
        &self.0
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserClaim>()
                .cloned()
                .map(AuthUser)
                .ok_or_else(|| ApiError::unauthorized("Unauthorized request")),
        )
    }
}

/// The caller's session when there is one; anonymous otherwise.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<UserClaim>);

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|claim| claim.id)
    }
}

impl FromRequest for Viewer {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Viewer(req.extensions().get::<UserClaim>().cloned())))
    }
}
