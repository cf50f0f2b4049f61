/// Bearer-token identity for write endpoints
///
/// Tokens are HS256 JWTs issued elsewhere; the `sub` claim carries the
/// numeric user id.
use crate::error::AppError;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verifies bearer tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolve a token to the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<i64, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| AppError::AuthenticationRequired("invalid or expired token".into()))?;

        data.claims
            .sub
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::AuthenticationRequired("invalid user id".into()))
    }
}

/// Caller identity, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

fn unauthenticated(reason: &str) -> AppError {
    AppError::AuthenticationRequired(reason.into())
}

impl AuthenticatedUser {
    fn from_request_sync(req: &HttpRequest) -> Result<Self, AppError> {
        let verifier = req
            .app_data::<web::Data<TokenVerifier>>()
            .ok_or_else(|| unauthenticated("token verification unavailable"))?;

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| unauthenticated("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthenticated("invalid Authorization scheme"))?;

        verifier.verify(token).map(AuthenticatedUser)
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::from_request_sync(req))
    }
}
