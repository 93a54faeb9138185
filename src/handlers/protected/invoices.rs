use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::database::models::{BusinessSettings, DocumentPhoto, Invoice, Tenant};
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
pub struct CreateInvoiceRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub vat_rate: Option<Decimal>,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

/// POST .../invoices
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(body): Json<CreateInvoiceRequest>,
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
    let number = next_document_number(&mut tx, "invoices", "invoice_number", "INV").await?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            invoice_number, invoice_date, due_date, client_name, client_email,
            client_address, client_phone, vehicle_make, vehicle_model, vehicle_reg,
            notes, subtotal, vat_rate, vat_amount, total, amount_paid, balance_due
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 0, $15)
        RETURNING *
        "#,
    )
    .bind(&number)
    .bind(Utc::now().date_naive())
    .bind(body.due_date)
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

    let line_items = replace_line_items(&mut tx, "invoice", invoice.id, &body.line_items).await?;
    tx.commit().await?;

    Ok(ApiResponse::created(attach_line_items(&invoice, line_items)?))
}

/// GET .../invoices
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
        invoice: Invoice,
    }

    let rows = sqlx::query_as::<_, Counted>(
        r#"
        SELECT COUNT(*) OVER() AS total_count, *
        FROM invoices
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY invoice_date DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(query.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    let total = rows.first().map(|r| r.total_count).unwrap_or(0);
    let invoices: Vec<Invoice> = rows.into_iter().map(|r| r.invoice).collect();

    let ids: Vec<i32> = invoices.iter().map(|i| i.id).collect();
    let items = fetch_line_items_for(&mut tx, "invoice", &ids).await?;
    tx.commit().await?;

    let mut grouped = group_line_items(items);
    let invoices: Vec<Value> = invoices
        .iter()
        .map(|i| attach_line_items(i, grouped.remove(&i.id).unwrap_or_default()))
        .collect::<Result<_, _>>()?;

    Ok(ApiResponse::success(json!({
        "invoices": invoices,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}

/// GET .../invoices/:id - invoice plus everything a client render needs
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    let invoice = fetch_invoice(&mut tx, id).await?;
    let line_items = fetch_line_items(&mut tx, "invoice", id).await?;
    let photos = sqlx::query_as::<_, DocumentPhoto>(
        r#"
        SELECT * FROM document_photos
        WHERE document_type = 'invoice' AND document_id = $1
        ORDER BY sort_order
        "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;
    let settings =
        sqlx::query_as::<_, BusinessSettings>("SELECT * FROM business_settings LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;
    tx.commit().await?;

    let mut value = attach_line_items(&invoice, line_items)?;
    value["photos"] = serde_json::to_value(photos)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    value["business_settings"] = serde_json::to_value(settings)
        .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    Ok(ApiResponse::success(value))
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub vat_rate: Option<Decimal>,
    pub status: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

impl UpdateInvoiceRequest {
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
        ]
        .into_iter()
        .filter_map(|(col, value)| value.as_deref().map(|v| (col, v)))
        .collect()
    }

    fn is_empty(&self) -> bool {
        self.text_fields().is_empty()
            && self.due_date.is_none()
            && self.vat_rate.is_none()
            && self.line_items.is_none()
    }
}

/// PUT .../invoices/:id
pub async fn update(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
    Json(body): Json<UpdateInvoiceRequest>,
) -> ApiResult<Value> {
    if body.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let mut tx = db.begin().await?;
    let existing = fetch_invoice(&mut tx, id).await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE invoices SET ");
    let mut fields = builder.separated(", ");
    for (col, value) in body.text_fields() {
        fields.push(format!("{} = ", col));
        fields.push_bind_unseparated(value.to_string());
    }
    if let Some(due_date) = body.due_date {
        fields.push("due_date = ");
        fields.push_bind_unseparated(due_date);
    }
    if let Some(vat_rate) = body.vat_rate {
        fields.push("vat_rate = ");
        fields.push_bind_unseparated(vat_rate);
    }
    fields.push("updated_at = NOW()");
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let mut invoice = builder
        .build_query_as::<Invoice>()
        .fetch_one(&mut *tx)
        .await?;

    let line_items = match body.line_items {
        Some(items) => {
            let vat_rate = body.vat_rate.unwrap_or(existing.vat_rate);
            let totals = compute_totals(&items, vat_rate);
            let saved = replace_line_items(&mut tx, "invoice", id, &items).await?;
            invoice = sqlx::query_as::<_, Invoice>(
                r#"
                UPDATE invoices
                SET subtotal = $2, vat_amount = $3, total = $4,
                    balance_due = $4 - amount_paid, updated_at = NOW()
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
        None => fetch_line_items(&mut tx, "invoice", id).await?,
    };

    tx.commit().await?;
    Ok(ApiResponse::success(attach_line_items(&invoice, line_items)?))
}

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub amount: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
}

/// POST .../invoices/:id/mark-paid
pub async fn mark_paid(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
    body: Option<Json<MarkPaidRequest>>,
) -> ApiResult<Invoice> {
    let body = body.map(|Json(b)| b).unwrap_or(MarkPaidRequest {
        amount: None,
        payment_date: None,
    });

    let mut tx = db.begin().await?;
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices
        SET status = 'paid',
            amount_paid = COALESCE($2, total),
            balance_due = 0,
            payment_date = COALESCE($3, CURRENT_DATE),
            paid_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(body.amount)
    .bind(body.payment_date)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Invoice not found"))?;
    tx.commit().await?;

    Ok(ApiResponse::success(invoice))
}

/// DELETE .../invoices/:id
pub async fn delete(
    Extension(db): Extension<TenantDb>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM line_items WHERE document_type = 'invoice' AND document_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM document_photos WHERE document_type = 'invoice' AND document_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Invoice not found"));
    }
    tx.commit().await?;
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

/// POST .../invoices/:id/share
pub async fn share(
    Extension(db): Extension<TenantDb>,
    Extension(tenant): Extension<Tenant>,
    Path(DocPath { id }): Path<DocPath>,
) -> ApiResult<ShareLink> {
    let mut tx = db.begin().await?;
    let link = ensure_share_token(&mut tx, ShareKind::Invoice, id, &tenant, false).await?;
    tx.commit().await?;
    Ok(ApiResponse::success(link))
}

async fn fetch_invoice(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: i32,
) -> Result<Invoice, ApiError> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice not found"))
}
