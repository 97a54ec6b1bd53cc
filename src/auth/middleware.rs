//! Axum integration for the authentication gate.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::errors::{ApiAuthError, RejectReason};
use super::gate::{Credentials, Gate};
use super::state::HasAuthBackend;
use crate::jwt::Claims;

/// Middleware that runs the gate before the wrapped routes.
///
/// On acceptance the verified [`Claims`] are stored in the request extensions
/// and, when the access token was renewed, the new cookie is appended to the
/// response. On rejection the inner handler never runs.
pub async fn require_auth<S>(State(state): State<S>, request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    // The body is not Sync, so only the parts are borrowed across the lookup.
    let (mut parts, body) = request.into_parts();

    let outcome = {
        let store = state.revocations();
        let credentials = Credentials::from_headers(&parts.headers);
        Gate::new(state.issuer(), &store, state.auth_settings())
            .evaluate(credentials)
            .await
    };

    let admission = match outcome {
        Ok(admission) => admission,
        Err(reason) => return ApiAuthError::from(reason).into_response(),
    };

    parts.extensions.insert(admission.claims);
    let mut response = next.run(Request::from_parts(parts, body)).await;

    if let Some(cookie) = admission.renewed_access_cookie {
        match cookie.to_header_value() {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!(error = %e, "Renewed access cookie is not a valid header value"),
        }
    }

    response
}

/// Extractor for the claims of an authenticated request.
/// Only available on routes wrapped by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiAuthError::from(RejectReason::MissingCredentials))
    }
}
