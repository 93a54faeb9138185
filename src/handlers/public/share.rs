use axum::extract::Path;
use serde_json::json;

use crate::database::models::{BusinessSettings, DamageAssessment, Estimate, Invoice};
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::share_service::ShareKind;
use crate::services::tenant_service::TenantService;
use crate::services::documents::fetch_line_items;

#[derive(Debug, sqlx::FromRow)]
struct ShareLookup {
    tenant_slug: String,
    tenant_schema: String,
}

/// GET /share/:doctype/:token - public view of a shared document.
///
/// No authentication; possession of the token is the credential. The
/// lookup table maps the token to the owning tenant's schema.
pub async fn view_shared_document(
    Path((doctype, token)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    let kind = ShareKind::parse(&doctype)
        .ok_or_else(|| ApiError::not_found("Unknown document type"))?;

    let service = TenantService::new().await?;
    let lookup = sqlx::query_as::<_, ShareLookup>(
        r#"
        SELECT tenant_slug, tenant_schema FROM public.share_token_lookup
        WHERE share_token = $1 AND document_type = $2
        "#,
    )
    .bind(&token)
    .bind(kind.doc_type())
    .fetch_optional(service.pool())
    .await?
    .ok_or_else(|| ApiError::not_found("This link is no longer valid"))?;

    let tenant = service
        .get_by_slug(&lookup.tenant_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("This link is no longer valid"))?;

    let db = TenantDb::new(&lookup.tenant_schema)?;
    let mut tx = db.begin().await?;

    let branding = json!({
        "business_name": tenant.business_name,
        "trade_type": tenant.trade_type,
        "primary_color": tenant.primary_color,
        "phone": tenant.phone,
    });

    let document = match kind {
        ShareKind::Estimate => {
            let estimate = sqlx::query_as::<_, Estimate>(
                "SELECT * FROM estimates WHERE share_token = $1",
            )
            .bind(&token)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("This link is no longer valid"))?;
            let line_items = fetch_line_items(&mut tx, "estimate", estimate.id).await?;
            let settings = business_settings(&mut tx).await?;
            json!({
                "estimate": estimate,
                "line_items": line_items,
                "business_settings": settings,
            })
        }
        ShareKind::Invoice => {
            let invoice = sqlx::query_as::<_, Invoice>(
                "SELECT * FROM invoices WHERE share_token = $1",
            )
            .bind(&token)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("This link is no longer valid"))?;
            let line_items = fetch_line_items(&mut tx, "invoice", invoice.id).await?;
            let settings = business_settings(&mut tx).await?;
            json!({
                "invoice": invoice,
                "line_items": line_items,
                "business_settings": settings,
            })
        }
        ShareKind::Assessment => {
            let assessment = sqlx::query_as::<_, DamageAssessment>(
                "SELECT * FROM damage_assessments WHERE share_token = $1",
            )
            .bind(&token)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("This link is no longer valid"))?;
            json!({ "assessment": assessment })
        }
    };

    tx.commit().await?;

    let mut payload = document;
    payload["business"] = branding;
    Ok(ApiResponse::success(payload))
}

async fn business_settings(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Option<BusinessSettings>, sqlx::Error> {
    sqlx::query_as::<_, BusinessSettings>("SELECT * FROM business_settings LIMIT 1")
        .fetch_optional(&mut **tx)
        .await
}
