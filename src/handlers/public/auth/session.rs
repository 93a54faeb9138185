use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::auth::{clear_session_cookie, verify_session_token};
use crate::config::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantService;

/// GET /api/auth/session - current session identity plus tenant summary
pub async fn get_session(jar: CookieJar) -> ApiResult<serde_json::Value> {
    let cookie = jar
        .get(&config().session.cookie_name)
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;
    let claims = verify_session_token(cookie.value())
        .map_err(|_| ApiError::unauthorized("Not signed in"))?;

    let service = TenantService::new().await?;
    let tenant = service.get_by_slug(&claims.tenant_slug).await?;

    Ok(ApiResponse::success(json!({
        "email": claims.email,
        "tenant_slug": claims.tenant_slug,
        "business_name": claims.business_name,
        "expires_at": claims.exp,
        "tenant": tenant.map(|t| t.summary()),
    })))
}

/// DELETE /api/auth/session - sign out
pub async fn delete_session(jar: CookieJar) -> (CookieJar, ApiResponse<serde_json::Value>) {
    let response = ApiResponse::success(json!({ "message": "Signed out" }));
    (jar.add(clear_session_cookie()), response)
}
