//! Shared-secret API key check for participant routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::{debug, info};

use crate::{
    config::{API_KEY_HEADER, AuthConfig},
    error::ApiError,
    state::AppState,
};

pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match check_api_key(&state.config.auth, req.method(), req.headers()) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            info!(
                "event=auth_rejected module=middleware status=rejected path={} reason={}",
                req.uri().path(),
                err
            );
            err.into_response()
        }
    }
}

/// Accepts the request when auth is off, for preflights, for trusted
/// frontend origins, or when `X-API-Key` is one of the configured keys.
pub fn check_api_key(
    auth: &AuthConfig,
    method: &Method,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    if !auth.require_auth || *method == Method::OPTIONS {
        return Ok(());
    }

    let origin = header_str(headers, header::ORIGIN.as_str());
    let referer = header_str(headers, header::REFERER.as_str());
    // Origin and Referer are client-controlled; this bypass is not a security boundary.
    if auth.is_trusted_origin(origin, referer) {
        debug!(
            "event=auth_bypass module=middleware status=ok origin={} referer={}",
            origin.unwrap_or("-"),
            referer.unwrap_or("-")
        );
        return Ok(());
    }

    let Some(key) = header_str(headers, API_KEY_HEADER) else {
        return Err(ApiError::Unauthorized {
            error: "Authentication required",
            message: "Missing X-API-Key header",
        });
    };

    if auth.allowed_keys.iter().any(|allowed| allowed == key) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized {
            error: "Authentication failed",
            message: "Invalid API key",
        })
    }
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
