use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::database::models::{Estimate, Tenant};
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::documents::{
    compute_totals, fetch_line_items, fetch_line_items_for, next_document_number,
    replace_line_items, LineItemInput,
};
use crate::services::share_service::{ensure_share_token, ShareKind, ShareLink};

use super::{attach_line_items, group_line_items, DocPath, ListQuery};

#[derive(Debug, Deserialize)]
pub struct CreateEstimateRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub notes: Option<String>,
    pub vat_rate: Option<Decimal>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

/// POST .../estimates
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(body): Json<CreateEstimateRequest>,
) -> ApiResult<Value> {
    let client_name = body
        .client_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("client_name is required"))?;

    let vat_rate = body.vat_rate.unwrap_or_else(|| Decimal::from(20));
    let totals = compute_totals(&body.line_items, vat_rate);

    let mut tx = db.begin().await?;
    let number = next_document_number(&mut tx, "estimates", "estimate_number", "EST").await?;

    let estimate = sqlx::query_as::<_, Estimate>(
        r#"
        INSERT INTO estimates (
            estimate_number, estimate_date, client_name, client_email, client_address,
            client_phone, vehicle_make, vehicle_model, vehicle_reg, notes,
            subtotal, vat_rate, vat_amount, total
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(&number)
    .bind(Utc::now().date_naive())
    .bind(client_name)
    .bind(body.client_email.as_deref())
    .bind(body.client_address.as_deref())
    .bind(body.client_phone.as_deref())
    .bind(body.vehicle_make.as_deref())
    .bind(body.vehicle_model.as_deref())
    .bind(body.vehicle_reg.as_deref())
    .bind(body.notes.as_deref())
    .bind(totals.subtotal)
    .bind(vat_rate)
    .bind(totals.vat_amount)
    .bind(totals.total)
    .fetch_one(&mut *tx)
    .await?;

    let line_items = replace_line_items(&mut tx, "estimate", estimate.id, &body.line_items).await?;
    tx.commit().await?;

    Ok(ApiResponse::created(attach_line_items(&estimate, line_items)?))
}

/// GET .../estimates - newest first, paginated, line items per row
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Value> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut tx = db.begin().await?;

    #[derive(sqlx::FromRow)]
    struct Counted {
        total_count: i64,
        #[sqlx(flatten)]
        estimate: Estimate,
    }

    let rows = sqlx::query_as::<_, Counted>(
        r#"
        SELECT COUNT(*) OVER() AS total_count, *
        FROM estimates
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY estimate_date DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(query.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    let estimates: Vec<Estimate> = rows.into_iter().map(|r| r.estimate).collect();

    let ids: Vec<i32> = estimates.iter().map(|e| e.id).collect();
    let items = fetch_line_items_for(&mut tx, "estimate", &ids).await?;
    tx.commit().await?;

    let mut grouped = group_line_items(items);
    let estimates: Vec<Value> = estimates
        .iter()
        .map(|e| attach_line_items(e, grouped.remove(&e.id).unwrap_or_default()))
        .collect::<Result<_, _>>()?;

    Ok(ApiResponse::success(json!({
        "estimates": estimates,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

/// GET .../estimates/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    let estimate = fetch_estimate(&mut tx, id).await?;
    let line_items = fetch_line_items(&mut tx, "estimate", id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(attach_line_items(&estimate, line_items)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateEstimateRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub notes: Option<String>,
    pub vat_rate: Option<Decimal>,
    pub status: Option<String>,
    pub signature_data: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

impl UpdateEstimateRequest {
    fn text_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("client_name", &self.client_name),
            ("client_email", &self.client_email),
            ("client_address", &self.client_address),
            ("client_phone", &self.client_phone),
            ("vehicle_make", &self.vehicle_make),
            ("vehicle_model", &self.vehicle_model),
            ("vehicle_reg", &self.vehicle_reg),
            ("notes", &self.notes),
            ("status", &self.status),
            ("signature_data", &self.signature_data),
        ]
        .into_iter()
        .filter_map(|(col, value)| value.as_deref().map(|v| (col, v)))
        .collect()
    }

    fn is_empty(&self) -> bool {
        self.text_fields().is_empty() && self.vat_rate.is_none() && self.line_items.is_none()
    }
}

/// PUT .../estimates/:id - whitelisted field update; a supplied
/// `line_items` array replaces the set wholesale and recalculates
/// totals, all in one transaction.
pub async fn update(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
    Json(body): Json<UpdateEstimateRequest>,
) -> ApiResult<Value> {
    if body.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let mut tx = db.begin().await?;
    let existing = fetch_estimate(&mut tx, id).await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE estimates SET ");
    let mut fields = builder.separated(", ");
    for (col, value) in body.text_fields() {
        fields.push(format!("{} = ", col));
        fields.push_bind_unseparated(value.to_string());
    }
    if let Some(vat_rate) = body.vat_rate {
        fields.push("vat_rate = ");
        fields.push_bind_unseparated(vat_rate);
    }
    fields.push("updated_at = NOW()");
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let mut estimate = builder
        .build_query_as::<Estimate>()
        .fetch_one(&mut *tx)
        .await?;

    let line_items = match body.line_items {
        Some(items) => {
            let vat_rate = body.vat_rate.unwrap_or(existing.vat_rate);
            let totals = compute_totals(&items, vat_rate);
            let saved = replace_line_items(&mut tx, "estimate", id, &items).await?;
            estimate = sqlx::query_as::<_, Estimate>(
                r#"
                UPDATE estimates
                SET subtotal = $2, vat_amount = $3, total = $4, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(totals.subtotal)
            .bind(totals.vat_amount)
            .bind(totals.total)
            .fetch_one(&mut *tx)
            .await?;
            saved
        }
        None => fetch_line_items(&mut tx, "estimate", id).await?,
    };

    tx.commit().await?;
    Ok(ApiResponse::success(attach_line_items(&estimate, line_items)?))
}

/// DELETE .../estimates/:id - estimate, line items and photos go together
pub async fn delete(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM line_items WHERE document_type = 'estimate' AND document_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM document_photos WHERE document_type = 'estimate' AND document_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM estimates WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Estimate not found"));
    }
    tx.commit().await?;
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

/// POST .../estimates/:id/share - reuse or mint the share token
pub async fn share(
    Extension(db): Extension<TenantDb>,
    Extension(tenant): Extension<Tenant>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<ShareLink> {
    let mut tx = db.begin().await?;
    let link = ensure_share_token(&mut tx, ShareKind::Estimate, id, &tenant, false).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(link))
}

async fn fetch_estimate(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: i32,
) -> Result<Estimate, ApiError> {
    sqlx::query_as::<_, Estimate>("SELECT * FROM estimates WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Estimate not found"))
}
