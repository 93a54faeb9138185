use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::database::models::{DamageAssessment, Tenant};
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::documents::next_document_number;
use crate::services::share_service::{ensure_share_token, ShareKind, ShareLink};

use super::{DocPath, ListQuery};

#[derive(Debug, Deserialize)]
pub struct CreateAssessmentRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub vehicle_year: Option<String>,
    pub vehicle_colour: Option<String>,
    pub mileage: Option<i32>,
    pub damage_description: Option<String>,
    pub damage_locations: Option<Value>,
    pub repair_notes: Option<String>,
    pub photos: Option<Value>,
    pub estimated_cost: Option<Decimal>,
}

/// POST .../assessments
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(body): Json<CreateAssessmentRequest>,
) -> ApiResult<DamageAssessment> {
    let client_name = body
        .client_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("client_name is required"))?;
    let vehicle_reg = body
        .vehicle_reg
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("vehicle_reg is required"))?;

    let mut tx = db.begin().await?;
    let number =
        next_document_number(&mut tx, "damage_assessments", "assessment_number", "DMG").await?;

    let assessment = sqlx::query_as::<_, DamageAssessment>(
        r#"
        INSERT INTO damage_assessments (
            assessment_number, assessment_date, client_name, client_email, client_phone,
            vehicle_make, vehicle_model, vehicle_reg, vehicle_year, vehicle_colour,
            mileage, damage_description, damage_locations, repair_notes, photos, estimated_cost
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(&number)
    .bind(Utc::now().date_naive())
    .bind(client_name)
    .bind(body.client_email.as_deref())
    .bind(body.client_phone.as_deref())
    .bind(body.vehicle_make.as_deref())
    .bind(body.vehicle_model.as_deref())
    .bind(vehicle_reg.to_uppercase())
    .bind(body.vehicle_year.as_deref())
    .bind(body.vehicle_colour.as_deref())
    .bind(body.mileage)
    .bind(body.damage_description.as_deref())
    .bind(body.damage_locations)
    .bind(body.repair_notes.as_deref())
    .bind(body.photos)
    .bind(body.estimated_cost)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ApiResponse::created(assessment))
}

/// GET .../assessments
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
        assessment: DamageAssessment,
    }

    let rows = sqlx::query_as::<_, Counted>(
        r#"
        SELECT COUNT(*) OVER() AS total_count, *
        FROM damage_assessments
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY assessment_date DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(query.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    let assessments: Vec<DamageAssessment> = rows.into_iter().map(|r| r.assessment).collect();

    Ok(ApiResponse::success(json!({
        "assessments": assessments,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

/// GET .../assessments/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<DamageAssessment> {
    let mut tx = db.begin().await?;
    let assessment = fetch_assessment(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(assessment))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssessmentRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub vehicle_year: Option<String>,
    pub vehicle_colour: Option<String>,
    pub mileage: Option<i32>,
    pub damage_description: Option<String>,
    pub damage_locations: Option<Value>,
    pub repair_notes: Option<String>,
    pub photos: Option<Value>,
    pub estimated_cost: Option<Decimal>,
    pub status: Option<String>,
}

impl UpdateAssessmentRequest {
    fn text_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("client_name", &self.client_name),
            ("client_email", &self.client_email),
            ("client_phone", &self.client_phone),
            ("vehicle_make", &self.vehicle_make),
            ("vehicle_model", &self.vehicle_model),
            ("vehicle_reg", &self.vehicle_reg),
            ("vehicle_year", &self.vehicle_year),
            ("vehicle_colour", &self.vehicle_colour),
            ("damage_description", &self.damage_description),
            ("repair_notes", &self.repair_notes),
            ("status", &self.status),
        ]
        .into_iter()
        .filter_map(|(col, value)| value.as_deref().map(|v| (col, v)))
        .collect()
    }

    fn is_empty(&self) -> bool {
        self.text_fields().is_empty()
            && self.mileage.is_none()
            && self.damage_locations.is_none()
            && self.photos.is_none()
            && self.estimated_cost.is_none()
    }
}

/// PUT .../assessments/:id
pub async fn update(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
    Json(body): Json<UpdateAssessmentRequest>,
) -> ApiResult<DamageAssessment> {
    if body.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let mut tx = db.begin().await?;
    fetch_assessment(&mut tx, id).await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE damage_assessments SET ");
    let mut fields = builder.separated(", ");
    for (col, value) in body.text_fields() {
        fields.push(format!("{} = ", col));
        fields.push_bind_unseparated(value.to_string());
    }
    if let Some(mileage) = body.mileage {
        fields.push("mileage = ");
        fields.push_bind_unseparated(mileage);
    }
    if let Some(locations) = body.damage_locations {
        fields.push("damage_locations = ");
        fields.push_bind_unseparated(locations);
    }
    if let Some(photos) = body.photos {
        fields.push("photos = ");
        fields.push_bind_unseparated(photos);
    }
    if let Some(cost) = body.estimated_cost {
        fields.push("estimated_cost = ");
        fields.push_bind_unseparated(cost);
    }
    fields.push("updated_at = NOW()");
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let assessment = builder
        .build_query_as::<DamageAssessment>()
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::success(assessment))
}

/// DELETE .../assessments/:id
pub async fn delete(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    let deleted = sqlx::query("DELETE FROM damage_assessments WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Assessment not found"));
    }
    tx.commit().await?;
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

/// POST .../assessments/:id/share - rotates the token on every call
pub async fn share(
    Extension(db): Extension<TenantDb>,
    Extension(tenant): Extension<Tenant>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<ShareLink> {
    let mut tx = db.begin().await?;
    let link = ensure_share_token(&mut tx, ShareKind::Assessment, id, &tenant, true).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(link))
}

async fn fetch_assessment(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: i32,
) -> Result<DamageAssessment, ApiError> {
    sqlx::query_as::<_, DamageAssessment>("SELECT * FROM damage_assessments WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Assessment not found"))
}
