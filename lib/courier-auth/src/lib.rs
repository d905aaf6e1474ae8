use std::convert::Infallible;
use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use courier_messenger::authorization::TokenVerifier;
use courier_messenger::{Role, UserId};

/// Payload of the access tokens issued by the platform's auth service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub exp: i64,
}

#[derive(Error, Debug)]
pub enum TokenIssueError {
    #[error("Couldn't encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// HS256 verifier over a shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    keys: Arc<Keys>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        JwtVerifier {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
            }),
        }
    }

    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.keys.decoding, &self.keys.validation).map(|data| data.claims)
    }

    /// Signs a token for `user_id` valid for `ttl`. Used by tooling and tests;
    /// production tokens come from the auth service.
    pub fn issue(&self, user_id: UserId, email: Option<String>, role: Option<Role>, ttl: Duration) -> Result<String, TokenIssueError> {
        let claims = Claims { id: user_id, email, role, exp: (Utc::now() + ttl).timestamp() };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)?)
    }
}

impl TokenVerifier for JwtVerifier {
    type Error = Infallible;

    async fn verify(&self, token: &str) -> Result<Option<UserId>, Self::Error> {
        match self.decode(token) {
            Ok(claims) => Ok(Some(claims.id)),
            Err(e) => {
                tracing::debug!(error = %e, "token rejected");
                Ok(None)
            }
        }
    }
}
