//! Bearer token authentication.
//!
//! The `authenticate` middleware only attaches an [`Identity`] when a valid
//! token is presented; it never rejects. Protected routes add [`require_auth`]
//! as a route layer and their handlers take the [`AuthenticatedUser`]
//! extractor.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::problem::ApiError;
use super::state::AppState;
use crate::config::JwtConfig;
use crate::error::Result;

/// Subject and email placed in development tokens.
pub const DEVELOPMENT_SUBJECT: &str = "testuser@example.com";

/// Claims carried by PingyThingy bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Name identifier; the per-identity rate limiter keys on this claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
}

/// The verified caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name_id: Option<String>,
    pub subject: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    /// The claim used as the per-identity partition key.
    pub fn partition_claim(&self) -> Option<&str> {
        self.name_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(self.subject.as_deref())
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            name_id: claims.nameid,
            subject: claims.sub,
            email: claims.email,
        }
    }
}

/// Verifies and issues HS512 bearer tokens.
pub struct JwtAuthenticator {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Create an authenticator validating issuer, audience and lifetime.
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);

        Self {
            encoding: EncodingKey::from_secret(config.key.as_bytes()),
            decoding: DecodingKey::from_secret(config.key.as_bytes()),
            validation,
            config,
        }
    }

    /// Verify a raw token and extract the caller's identity.
    pub fn verify(
        &self,
        token: &str,
    ) -> std::result::Result<Identity, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims.into())
    }

    /// Sign arbitrary claims with the configured key.
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS512), claims, &self.encoding)?)
    }

    /// Whether issuer, audience and key are all set.
    pub fn is_configured(&self) -> bool {
        !self.config.issuer.is_empty()
            && !self.config.audience.is_empty()
            && !self.config.key.is_empty()
    }

    /// Issue a short-lived token for a fresh development identity.
    pub fn issue_development_token(&self) -> Result<String> {
        let expires = Utc::now() + ChronoDuration::minutes(self.config.token_lifetime_mins);
        let claims = Claims {
            id: Some(Uuid::new_v4().to_string()),
            sub: Some(DEVELOPMENT_SUBJECT.to_string()),
            email: Some(DEVELOPMENT_SUBJECT.to_string()),
            nameid: Some(Uuid::new_v4().to_string()),
            jti: Some(Uuid::new_v4().to_string()),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: expires.timestamp(),
        };
        self.sign(&claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Attach the caller's identity to the request when a valid token is present.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = bearer_token(request.headers()).and_then(|token| {
        state
            .authenticator
            .verify(token)
            .map_err(|e| debug!(error = %e, "Bearer token rejected"))
            .ok()
    });

    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
    }

    next.run(request).await
}

/// Refuse requests that carry no verified identity.
///
/// Layered outside admission control on protected routes, so anonymous
/// callers are answered 401 without spending any permits.
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<Identity>().is_none() {
        debug!(path = %request.uri().path(), "Unauthenticated request to protected route");
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// Extractor for handlers that require an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(ApiError::Unauthorized)
    }
}
