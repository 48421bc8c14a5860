use axum::{
    body::Body,
    http::{
        header::{self, HeaderValue},
        HeaderMap, Method, Request, Response, StatusCode,
    },
    middleware::Next,
};
use tracing::debug;

use crate::app_config::AppConfig;

/// Origin to echo back, if any. With a wildcard outside production the
/// request origin is reflected so that credentials still work.
pub fn resolve_allowed_origin(config: &AppConfig, origin: Option<&str>) -> Option<String> {
    let origins = &config.security.cors_allowed_origins;
    let has_wildcard = origins.iter().any(|o| o == "*");

    if has_wildcard && !config.is_production() {
        debug!("CORS: Reflecting origin for development: {:?}", origin);
        return origin.map(String::from);
    }

    origin.and_then(|req_origin| {
        if origins.iter().any(|o| o == req_origin) {
            Some(req_origin.to_string())
        } else {
            debug!("CORS: Origin not in whitelist: {}", req_origin);
            None
        }
    })
}

fn insert_origin_headers(headers: &mut HeaderMap, allowed: &str) {
    if let Ok(value) = HeaderValue::from_str(allowed) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
}

/// Dynamic CORS middleware driven by `CORS_ALLOWED_ORIGINS`
pub async fn dynamic_cors_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let config = crate::app_config::config();

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let allowed_origin = resolve_allowed_origin(config, origin.as_deref());

    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());

        if let Some(allowed) = allowed_origin {
            let headers = response.headers_mut();
            insert_origin_headers(headers, &allowed);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(
                    "content-type, authorization, accept, origin, x-requested-with",
                ),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("3600"),
            );
        }

        *response.status_mut() = StatusCode::OK;
        return Ok(response);
    }

    let mut response = next.run(req).await;

    if let Some(allowed) = allowed_origin {
        insert_origin_headers(response.headers_mut(), &allowed);
    }

    Ok(response)
}
