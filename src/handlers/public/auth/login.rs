use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::MagicTokenType;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantService;

use super::{issue_magic_token, maybe_echo_token};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
}

/// POST /api/auth/login - request a login link.
///
/// The response is identical whether or not the email belongs to a
/// tenant, so the endpoint cannot be used to enumerate accounts.
pub async fn login(Json(body): Json<LoginRequest>) -> ApiResult<serde_json::Value> {
    let email = body.email.as_deref().map(str::trim).unwrap_or("");
    if email.is_empty() {
        return Err(ApiError::bad_request("Email is required"));
    }

    let service = TenantService::new().await?;
    let mut echoed_token = None;

    if let Some(tenant) = service.get_by_owner_email(email).await? {
        let token = issue_magic_token(
            service.pool(),
            &tenant.owner_email,
            &tenant.slug,
            MagicTokenType::Login,
        )
        .await?;
        info!(slug = %tenant.slug, "Login token issued");
        echoed_token = maybe_echo_token(token);
    }

    Ok(ApiResponse::success(json!({
        "message": "If that email is registered, a login link has been sent",
        "login_token": echoed_token,
    })))
}
