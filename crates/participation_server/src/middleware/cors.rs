//! CORS header injection and preflight handling.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::Environment, state::AppState};

pub const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "OPTIONS"];
pub const ALLOWED_HEADERS: &[&str] = &[
    "Content-Type",
    "Authorization",
    "X-Requested-With",
    "Accept",
    "Origin",
    "X-API-Key",
    "X-RateLimit-Limit",
    "X-RateLimit-Remaining",
    "X-RateLimit-Reset",
];
pub const EXPOSED_HEADERS: &[&str] = &[
    "X-RateLimit-Limit",
    "X-RateLimit-Remaining",
    "X-RateLimit-Reset",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.iter().any(|allowed| allowed == origin),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub origins: AllowedOrigins,
    pub credentials: bool,
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    /// Permissive outside production, strict allow-list in production.
    pub fn for_environment(environment: Environment, allowed_origins: Vec<String>) -> Self {
        match environment {
            Environment::Production => Self {
                origins: AllowedOrigins::List(allowed_origins),
                credentials: true,
                max_age_secs: Some(60 * 60),
            },
            Environment::Development | Environment::Test => Self {
                origins: AllowedOrigins::Any,
                credentials: false,
                max_age_secs: Some(24 * 60 * 60),
            },
        }
    }

    /// Value for `Access-Control-Allow-Origin`, if any.
    pub fn allow_origin_for(&self, origin: Option<&str>) -> Option<String> {
        if let Some(origin) = origin.filter(|value| self.origins.allows(value)) {
            return Some(origin.to_string());
        }
        match &self.origins {
            AllowedOrigins::Any => Some("*".to_string()),
            AllowedOrigins::List(origins) => origins.first().cloned(),
        }
    }
}

pub async fn cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::OK.into_response();
        apply_cors_headers(resp.headers_mut(), origin.as_deref(), &state.config.cors);
        return resp;
    }

    let mut resp = next.run(req).await;
    apply_cors_headers(resp.headers_mut(), origin.as_deref(), &state.config.cors);
    resp
}

pub fn apply_cors_headers(headers: &mut HeaderMap, origin: Option<&str>, config: &CorsConfig) {
    if let Some(value) = config
        .allow_origin_for(origin)
        .and_then(|allowed| HeaderValue::from_str(&allowed).ok())
    {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    insert_list(headers, header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS);
    insert_list(headers, header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS);
    insert_list(headers, header::ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSED_HEADERS);

    if config.credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }

    if let Some(max_age) = config.max_age_secs {
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
    }
}

fn insert_list(headers: &mut HeaderMap, name: header::HeaderName, values: &[&str]) {
    if let Ok(value) = HeaderValue::from_str(&values.join(", ")) {
        headers.insert(name, value);
    }
}
