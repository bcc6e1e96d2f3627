//! Request authorization.
//!
//! Handlers receive the caller's [`Identity`] as an extractor argument, so a
//! handler that needs an identity cannot run before the token check. The
//! verified identity is cached in request extensions and reused by later
//! extractors on the same request.

use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::{
    auth::{
        claims::{Identity, TokenVerdict},
        jwt::JwtKeys,
        repo_types::Role,
    },
    error::error_response,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("Access token is required")]
    MissingToken,
    #[error("Your session has expired. Please login again.")]
    TokenExpired,
    #[error("Token is invalid or malformed")]
    InvalidToken,
    #[error("Insufficient permissions")]
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, category) = match self {
            AuthRejection::MissingToken => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthRejection::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthRejection::InvalidToken => (StatusCode::FORBIDDEN, "invalid_token"),
            AuthRejection::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
        };
        error_response(status, category, self.to_string())
    }
}

/// Token from `Authorization: Bearer <token>`. Any other scheme counts as no token.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

fn authenticate(parts: &mut Parts, keys: &JwtKeys) -> Result<Identity, AuthRejection> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
        return Ok(identity.clone());
    }
    let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;
    let identity = match keys.verify(token) {
        TokenVerdict::Valid(claims) => Identity::from(claims),
        TokenVerdict::Expired => return Err(AuthRejection::TokenExpired),
        TokenVerdict::Invalid => {
            warn!(uri = %parts.uri, "invalid bearer token");
            return Err(AuthRejection::InvalidToken);
        }
    };
    parts.extensions.insert(identity.clone());
    Ok(identity)
}

/// Mandatory authentication.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authenticate(parts, &keys).map(AuthUser)
    }
}

/// Optional authentication: a missing or unusable token yields `None`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeAuthUser(authenticate(parts, &keys).ok()))
    }
}

/// Set of roles admitted by an [`Authorized`] extractor.
pub trait RoleGate: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;

impl RoleGate for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<(), AuthRejection> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        warn!(user_id = %identity.user_id, role = %identity.role, "role not permitted");
        Err(AuthRejection::Forbidden)
    }
}

/// Authentication followed by a role check against `G::ALLOWED`.
pub struct Authorized<G: RoleGate>(pub Identity, pub PhantomData<G>);

#[async_trait]
impl<S, G> FromRequestParts<S> for Authorized<G>
where
    S: Send + Sync,
    G: RoleGate,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        require_role(&identity, G::ALLOWED)?;
        Ok(Authorized(identity, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Request;
    use uuid::Uuid;

    use super::*;
    use crate::testing::test_config;

    fn keys() -> JwtKeys {
        JwtKeys::new(&test_config().jwt).unwrap()
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/portal/profile");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "a@b.com".into(),
            role,
        }
    }

    #[test]
    fn missing_or_foreign_scheme_is_missing_token() {
        let keys = keys();
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer   ")] {
            let mut parts = parts_with(header);
            assert_eq!(authenticate(&mut parts, &keys), Err(AuthRejection::MissingToken));
        }
    }

    #[test]
    fn expired_and_invalid_are_distinct_rejections() {
        let keys = keys();
        let expired = keys
            .sign_with_ttl(Uuid::new_v4(), "a@b.com", Role::Investor, Duration::ZERO)
            .unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {expired}")));
        assert_eq!(authenticate(&mut parts, &keys), Err(AuthRejection::TokenExpired));

        let mut parts = parts_with(Some("Bearer not.a.jwt"));
        assert_eq!(authenticate(&mut parts, &keys), Err(AuthRejection::InvalidToken));

        assert_eq!(
            AuthRejection::TokenExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::InvalidToken.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn valid_token_populates_identity_context() {
        let keys = keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, "boss@b.com", Role::Admin).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let identity = authenticate(&mut parts, &keys).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(parts.extensions.get::<Identity>(), Some(&identity));
    }

    #[test]
    fn role_gate_admits_only_listed_roles() {
        assert_eq!(
            require_role(&identity(Role::Investor), AdminOnly::ALLOWED),
            Err(AuthRejection::Forbidden)
        );
        assert!(require_role(&identity(Role::Admin), AdminOnly::ALLOWED).is_ok());
        assert!(require_role(&identity(Role::Investor), &[Role::Investor, Role::Admin]).is_ok());
    }
}
