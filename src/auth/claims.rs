use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::Role;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,     // user ID
    pub email: String, // email at issuance
    pub role: Role,    // role at issuance
    pub iat: i64,      // issued at (unix timestamp)
    pub exp: i64,      // expires at (unix timestamp)
    pub iss: String,   // issuer
    pub aud: String,   // audience
    pub jti: Uuid,     // unique per token
}

/// Outcome of checking a token. Expiry and invalidity stay distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerdict {
    Valid(Claims),
    Expired,
    Invalid,
}

/// Identity context handed to handlers once a token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            user_id: c.sub,
            email: c.email,
            role: c.role,
        }
    }
}
