use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{verify_session_token, SessionClaims};
use crate::config;
use crate::error::ApiError;

/// How the request authenticated: a tenant owner's session cookie, or the
/// static staff bearer token used by operator tooling.
#[derive(Clone, Debug)]
pub enum AuthContext {
    Session(SessionClaims),
    Staff,
}

impl AuthContext {
    pub fn session(&self) -> Option<&SessionClaims> {
        match self {
            AuthContext::Session(claims) => Some(claims),
            AuthContext::Staff => None,
        }
    }
}

/// Authentication middleware for the protected tier. Accepts a valid
/// session cookie or the configured staff token; everything else is 401.
pub async fn auth_middleware(
    jar: CookieJar,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = authenticate(&jar, &headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn authenticate(jar: &CookieJar, headers: &HeaderMap) -> Option<AuthContext> {
    if let Some(token) = bearer_token(headers) {
        if let Some(staff_token) = &config::config().session.staff_token {
            if token == staff_token {
                return Some(AuthContext::Staff);
            }
        }
    }

    let cookie_name = &config::config().session.cookie_name;
    let cookie = jar.get(cookie_name)?;
    let claims = verify_session_token(cookie.value()).ok()?;
    Some(AuthContext::Session(claims))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn rejects_non_bearer_and_empty_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
