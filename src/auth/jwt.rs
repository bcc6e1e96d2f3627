use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        claims::{Claims, TokenVerdict},
        repo_types::Role,
    },
    config::JwtConfig,
};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.ttl()?,
        })
    }

    /// Signs a session token with the configured lifetime.
    pub fn sign(&self, user_id: Uuid, email: &str, role: Role) -> anyhow::Result<String> {
        self.sign_with_ttl(user_id, email, role, self.ttl)
    }

    pub fn sign_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = TimeDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .context("token lifetime out of range")?;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, issuer and audience first; expiry is judged only
    /// for tokens that are otherwise genuine. A token is expired once
    /// `now >= exp`, with no leeway.
    pub fn verify(&self, token: &str) -> TokenVerdict {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                    return TokenVerdict::Expired;
                }
                debug!(error = %e, "jwt rejected");
                return TokenVerdict::Invalid;
            }
        };

        if OffsetDateTime::now_utc().unix_timestamp() >= claims.exp {
            debug!(user_id = %claims.sub, "jwt expired");
            return TokenVerdict::Expired;
        }
        debug!(user_id = %claims.sub, "jwt verified");
        TokenVerdict::Valid(claims)
    }
}
