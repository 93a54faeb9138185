use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::database::models::{Receipt, Tenant};
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::documents::next_receipt_number;
use crate::services::receipt_store::{ReceiptStore, StoreError};

use super::DocPath;

#[derive(Debug, Deserialize)]
pub struct CreateReceiptRequest {
    pub image_data: Option<String>,
    pub supplier: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub receipt_date: Option<NaiveDate>,
}

/// POST .../receipts - store the image, then the row
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Extension(tenant): Extension<Tenant>,
    Json(body): Json<CreateReceiptRequest>,
) -> ApiResult<Receipt> {
    let image_data = body
        .image_data
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("image_data is required"))?;
    let supplier = body
        .supplier
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("supplier is required"))?;
    let amount = body
        .amount
        .ok_or_else(|| ApiError::bad_request("amount is required"))?;

    let receipt_date = body.receipt_date.unwrap_or_else(|| Utc::now().date_naive());

    let mut tx = db.begin().await?;
    let number = next_receipt_number(&mut tx, receipt_date).await?;

    let stored = ReceiptStore::new()
        .save(&tenant.slug, &number, receipt_date, image_data)
        .await
        .map_err(|e| match e {
            StoreError::InvalidImage(msg) => {
                ApiError::bad_request(format!("Invalid image data: {}", msg))
            }
            other => ApiError::internal_server_error(other.to_string()),
        })?;

    let receipt = sqlx::query_as::<_, Receipt>(
        r#"
        INSERT INTO receipts (
            receipt_number, receipt_date, supplier, description, amount, category,
            status, storage_file_id, storage_file_url, storage_folder_path
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(&number)
    .bind(receipt_date)
    .bind(supplier)
    .bind(body.description.as_deref())
    .bind(amount)
    .bind(body.category.as_deref())
    .bind(&stored.file_id)
    .bind(&stored.url)
    .bind(&stored.folder_path)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ApiResponse::created(receipt))
}

#[derive(Debug, Deserialize)]
pub struct ListReceiptsQuery {
    /// YYYY-MM
    pub month: Option<String>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Parse a `YYYY-MM` filter into its first day.
fn parse_month(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok()
}

/// GET .../receipts - filtered list plus running stats
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<ListReceiptsQuery>,
) -> ApiResult<Value> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let month_start = match query.month.as_deref() {
        Some(month) => Some(
            parse_month(month).ok_or_else(|| ApiError::bad_request("month must be YYYY-MM"))?,
        ),
        None => None,
    };
    let month_end = month_start.map(|start| {
        // first day of the following month
        let (year, month) = if start.month() == 12 {
            (start.year() + 1, 1)
        } else {
            (start.year(), start.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(start)
    });

    let mut tx = db.begin().await?;

    #[derive(sqlx::FromRow)]
    struct Counted {
        total_count: i64,
        #[sqlx(flatten)]
        receipt: Receipt,
    }

    let rows = sqlx::query_as::<_, Counted>(
        r#"
        SELECT COUNT(*) OVER() AS total_count, *
        FROM receipts
        WHERE ($1::date IS NULL OR (receipt_date >= $1 AND receipt_date < $2))
          AND ($3::text IS NULL OR supplier ILIKE '%' || $3 || '%')
          AND ($4::text IS NULL OR category = $4)
          AND ($5::text IS NULL OR status = $5)
        ORDER BY receipt_date DESC, id DESC
        LIMIT $6 OFFSET $7
        "#,
    )
    .bind(month_start)
    .bind(month_end)
    .bind(query.supplier.as_deref())
    .bind(query.category.as_deref())
    .bind(query.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    let (total_amount, month_count): (Option<Decimal>, i64) = sqlx::query_as(
        r#"
        SELECT SUM(amount),
               COUNT(*) FILTER (WHERE date_trunc('month', receipt_date) = date_trunc('month', CURRENT_DATE))
        FROM receipts
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;

    let (grand_total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM receipts")
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    let receipts: Vec<Receipt> = rows.into_iter().map(|r| r.receipt).collect();

    Ok(ApiResponse::success(json!({
        "receipts": receipts,
        "total": total,
        "limit": limit,
        "offset": offset,
        "stats": {
            "total_receipts": grand_total,
            "total_amount": total_amount.unwrap_or_default(),
            "current_month_count": month_count,
        },
    })))
}

/// GET .../receipts/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Receipt> {
    let mut tx = db.begin().await?;
    let receipt = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Receipt not found"))?;
    tx.commit().await?;
    Ok(ApiResponse::success(receipt))
}

/// DELETE .../receipts/:id - removes the stored image first (best
/// effort), then the row
pub async fn delete(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    let receipt = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Receipt not found"))?;

    let mut file_deleted = false;
    if let Some(file_id) = &receipt.storage_file_id {
        match ReceiptStore::new().delete(file_id).await {
            Ok(()) => file_deleted = true,
            Err(e) => warn!(receipt = %receipt.receipt_number, "Image delete failed: {}", e),
        }
    }

    sqlx::query("DELETE FROM receipts WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(ApiResponse::success(json!({
        "deleted": true,
        "file_deleted": file_deleted,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_filters() {
        assert_eq!(parse_month("2026-08"), NaiveDate::from_ymd_opt(2026, 8, 1));
        assert_eq!(parse_month("2026-13"), None);
        assert_eq!(parse_month("august"), None);
    }
}
