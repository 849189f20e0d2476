//! Identity resolution.
//!
//! Sign-in itself happens at an external OAuth provider, which issues an
//! HS256 session token. This module only turns that token into a
//! [`Principal`] or treats the caller as anonymous.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod extract;

pub use extract::{MaybePrincipal, RequirePrincipal};

pub const SESSION_COOKIE: &str = "session_token";

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl Principal {
    /// Emails are compared case-insensitively, so they are stored lowercased.
    pub fn new(email: &str, name: Option<String>, image: Option<String>) -> Self {
        Self {
            email: normalize_email(email),
            name,
            image,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Session token claims as issued by the sign-in provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct IdentityResolver {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    sign_in_url: String,
}

impl IdentityResolver {
    pub fn new(secret: &str, issuer: impl Into<String>, sign_in_url: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            sign_in_url: sign_in_url.into(),
        }
    }

    /// Resolves the caller from `Authorization: Bearer` or the session
    /// cookie. Anything that does not verify is anonymous.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers).or_else(|| session_cookie(headers))?;
        self.verify(token)
    }

    pub fn verify(&self, token: &str) -> Option<Principal> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                return None;
            }
        };

        let email = claims.email.filter(|e| !e.trim().is_empty())?;
        Some(Principal::new(&email, claims.name, claims.picture))
    }

    /// Issues a session token the way the sign-in provider does. Used by
    /// local tooling and tests.
    pub fn issue_token(
        &self,
        principal: &Principal,
        ttl: chrono::Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.email.clone(),
            email: Some(principal.email.clone()),
            name: principal.name.clone(),
            picture: principal.image.clone(),
            iss: self.issuer.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Where an anonymous caller should go to sign in before retrying
    /// `callback`.
    pub fn sign_in_url(&self, callback: &str) -> String {
        format!(
            "{}?callbackUrl={}",
            self.sign_in_url,
            urlencoding::encode(callback)
        )
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}
