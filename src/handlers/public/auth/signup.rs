use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::MagicTokenType;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::tenant_service::{
    derive_slug, validate_slug, CreateTenantInput, TenantService, VALID_TRADE_TYPES,
};

use super::{is_valid_email, issue_magic_token, maybe_echo_token};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    #[serde(rename = "businessName", alias = "business_name")]
    pub business_name: Option<String>,
    #[serde(rename = "tradeType", alias = "trade_type")]
    pub trade_type: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "ownerName", alias = "owner_name")]
    pub owner_name: Option<String>,
    pub phone: Option<String>,
}

/// POST /api/auth/signup - provision a tenant and issue a verification token
pub async fn signup(Json(body): Json<SignupRequest>) -> ApiResult<serde_json::Value> {
    let email = body.email.as_deref().map(str::trim).unwrap_or("");
    let business_name = body.business_name.as_deref().map(str::trim).unwrap_or("");

    if email.is_empty() || business_name.is_empty() {
        return Err(ApiError::bad_request("Email and business name are required"));
    }
    if !is_valid_email(email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let trade_type = body.trade_type.as_deref().unwrap_or("general").trim();
    if !VALID_TRADE_TYPES.contains(&trade_type) {
        return Err(ApiError::bad_request(format!(
            "Unknown trade type '{}'",
            trade_type
        )));
    }

    let slug = match body.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => {
            validate_slug(explicit)?;
            explicit.to_string()
        }
        None => {
            let derived = derive_slug(business_name);
            validate_slug(&derived)?;
            derived
        }
    };

    let service = TenantService::new().await?;
    if !service.slug_available(&slug).await? {
        return Err(ApiError::conflict(format!(
            "The name '{}' is already taken",
            slug
        )));
    }

    let tenant = service
        .create_tenant(CreateTenantInput {
            slug: Some(slug),
            business_name: business_name.to_string(),
            trade_type: trade_type.to_string(),
            owner_email: email.to_lowercase(),
            owner_name: body.owner_name,
            phone: body.phone,
        })
        .await?;

    let token = issue_magic_token(
        service.pool(),
        &tenant.owner_email,
        &tenant.slug,
        MagicTokenType::Verification,
    )
    .await?;

    info!(slug = %tenant.slug, "Tenant signed up");

    Ok(ApiResponse::created(json!({
        "tenant": tenant.summary(),
        "message": "Check your email to verify your account",
        "verification_token": maybe_echo_token(token),
    })))
}
