//! Request extractors.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::identity::{Identity, IdentityResolver};

impl<S> FromRequestParts<S> for Identity
where
    IdentityResolver: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(IdentityResolver::from_ref(state).resolve(&parts.headers))
    }
}
