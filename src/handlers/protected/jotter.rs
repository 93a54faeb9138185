use axum::extract::{Extension, Path, Query};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::database::models::JotterNote;
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

use super::DocPath;

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub vehicle_year: Option<String>,
    pub issue_description: Option<String>,
    pub notes: Option<String>,
    pub raw_input: Option<String>,
    pub confidence_score: Option<Decimal>,
}

impl CreateNoteRequest {
    fn has_content(&self) -> bool {
        [
            &self.customer_name,
            &self.customer_phone,
            &self.customer_email,
            &self.vehicle_make,
            &self.vehicle_model,
            &self.vehicle_reg,
            &self.issue_description,
            &self.notes,
            &self.raw_input,
        ]
        .iter()
        .any(|f| f.as_deref().map(str::trim).is_some_and(|s| !s.is_empty()))
    }
}

/// POST .../jotter - quick-capture note; needs at least one real field
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(body): Json<CreateNoteRequest>,
) -> ApiResult<JotterNote> {
    if !body.has_content() {
        return Err(ApiError::bad_request("Note is empty"));
    }

    let mut tx = db.begin().await?;
    let note = sqlx::query_as::<_, JotterNote>(
        r#"
        INSERT INTO jotter_notes (
            customer_name, customer_phone, customer_email,
            vehicle_make, vehicle_model, vehicle_reg, vehicle_year,
            issue_description, notes, raw_input, confidence_score, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'new')
        RETURNING *
        "#,
    )
    .bind(body.customer_name.as_deref())
    .bind(body.customer_phone.as_deref())
    .bind(body.customer_email.as_deref())
    .bind(body.vehicle_make.as_deref())
    .bind(body.vehicle_model.as_deref())
    .bind(body.vehicle_reg.as_deref())
    .bind(body.vehicle_year.as_deref())
    .bind(body.issue_description.as_deref())
    .bind(body.notes.as_deref())
    .bind(body.raw_input.as_deref())
    .bind(body.confidence_score)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(ApiResponse::created(note))
}

#[derive(Debug, Deserialize)]
pub struct ListNotesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET .../jotter - newest first; `status=all` disables the filter
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<ListNotesQuery>,
) -> ApiResult<Value> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let status = query.status.as_deref().filter(|s| *s != "all");

    let mut tx = db.begin().await?;

    #[derive(sqlx::FromRow)]
    struct Counted {
        total_count: i64,
        #[sqlx(flatten)]
        note: JotterNote,
    }

    let rows = sqlx::query_as::<_, Counted>(
        r#"
        SELECT COUNT(*) OVER() AS total_count, *
        FROM jotter_notes
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    let notes: Vec<JotterNote> = rows.into_iter().map(|r| r.note).collect();

    Ok(ApiResponse::success(json!({
        "notes": notes,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub vehicle_year: Option<String>,
    pub issue_description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

impl UpdateNoteRequest {
    fn text_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("customer_name", &self.customer_name),
            ("customer_phone", &self.customer_phone),
            ("customer_email", &self.customer_email),
            ("vehicle_make", &self.vehicle_make),
            ("vehicle_model", &self.vehicle_model),
            ("vehicle_reg", &self.vehicle_reg),
            ("vehicle_year", &self.vehicle_year),
            ("issue_description", &self.issue_description),
            ("notes", &self.notes),
            ("status", &self.status),
        ]
        .into_iter()
        .filter_map(|(col, value)| value.as_deref().map(|v| (col, v)))
        .collect()
    }
}

/// PUT .../jotter/:id
pub async fn update(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
    Json(body): Json<UpdateNoteRequest>,
) -> ApiResult<JotterNote> {
    let fields = body.text_fields();
    if fields.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let mut tx = db.begin().await?;
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE jotter_notes SET ");
    let mut set = builder.separated(", ");
    for (col, value) in fields {
        set.push(format!("{} = ", col));
        set.push_bind_unseparated(value.to_string());
    }
    set.push("updated_at = NOW()");
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let note = builder
        .build_query_as::<JotterNote>()
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Note not found"))?;
    tx.commit().await?;

    Ok(ApiResponse::success(note))
}

/// DELETE .../jotter/:id
pub async fn delete(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    let deleted = sqlx::query("DELETE FROM jotter_notes WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Note not found"));
    }
    tx.commit().await?;
    Ok(ApiResponse::success(json!({ "deleted": true })))
}
