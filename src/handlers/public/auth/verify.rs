use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::auth::{
    generate_session_token, hash_magic_token, session_cookie, MagicTokenType, SessionClaims,
};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::TenantService;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct MagicTokenRow {
    email: String,
    tenant_slug: Option<String>,
    token_type: String,
}

/// POST /api/auth/verify - consume a magic token and start a session
pub async fn verify(
    jar: CookieJar,
    Json(body): Json<VerifyRequest>,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>), ApiError> {
    let token = body.token.as_deref().map(str::trim).unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::bad_request("Token is required"));
    }

    let service = TenantService::new().await?;

    // The token is burned in a transaction that only commits once the
    // tenant behind it is confirmed to exist; a lookup failure rolls the
    // consumption back instead of wasting the token.
    let mut tx = service.pool().begin().await?;
    let row = consume_token(&mut tx, token).await?;

    let slug = row
        .tenant_slug
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;
    let tenant = service
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    if matches!(MagicTokenType::parse(&row.token_type), Some(MagicTokenType::Verification)) {
        service.mark_email_verified(&tenant.slug).await?;
    }

    tx.commit().await?;

    let claims = SessionClaims::new(
        row.email.clone(),
        tenant.slug.clone(),
        tenant.business_name.clone(),
    );
    let session_token = generate_session_token(&claims)?;

    info!(slug = %tenant.slug, "Session started");

    let response = ApiResponse::success(json!({
        "email": row.email,
        "tenant": tenant.summary(),
    }));
    Ok((jar.add(session_cookie(session_token)), response))
}

/// Atomically mark an unexpired, unused token as used and return it.
async fn consume_token(
    tx: &mut Transaction<'_, Postgres>,
    token: &str,
) -> Result<MagicTokenRow, ApiError> {
    sqlx::query_as::<_, MagicTokenRow>(
        r#"
        UPDATE public.magic_tokens
        SET used = true
        WHERE token_hash = $1 AND used = false AND expires_at > NOW()
        RETURNING email, tenant_slug, token_type
        "#,
    )
    .bind(hash_magic_token(token))
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
}
