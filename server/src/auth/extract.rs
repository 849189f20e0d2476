use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::{IdentityResolver, Principal};
use crate::utils::error::AppError;

/// The caller's identity, if any. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybePrincipal
where
    Arc<IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Arc::<IdentityResolver>::from_ref(state);
        Ok(Self(identity.resolve(&parts.headers)))
    }
}

/// The caller's identity. Anonymous callers get a 401 that points at the
/// external sign-in page with a callback to the original path.
#[derive(Debug, Clone)]
pub struct RequirePrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequirePrincipal
where
    Arc<IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Arc::<IdentityResolver>::from_ref(state);
        match identity.resolve(&parts.headers) {
            Some(principal) => Ok(Self(principal)),
            None => {
                let callback = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(AppError::SignInRequired {
                    sign_in_url: identity.sign_in_url(callback),
                })
            }
        }
    }
}
