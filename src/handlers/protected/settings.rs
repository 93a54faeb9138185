use axum::extract::Extension;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::database::models::{BusinessSettings, Tenant};
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::tenant_service::{trade_defaults, TenantService};

/// GET .../settings - business settings merged with tenant identity
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Extension(tenant): Extension<Tenant>,
) -> ApiResult<Value> {
    let mut tx = db.begin().await?;
    let settings =
        sqlx::query_as::<_, BusinessSettings>("SELECT * FROM business_settings LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;
    tx.commit().await?;

    Ok(ApiResponse::success(json!({
        "settings": settings,
        "tenant": tenant.summary(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub vat_registered: Option<bool>,
    pub vat_number: Option<String>,
    pub default_vat_rate: Option<Decimal>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_sort_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub payment_terms: Option<String>,
    pub invoice_footer: Option<String>,
    pub line_item_label: Option<String>,
    pub show_vehicle_fields: Option<bool>,
}

impl UpdateSettingsRequest {
    fn text_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("business_name", &self.business_name),
            ("address", &self.address),
            ("postcode", &self.postcode),
            ("phone", &self.phone),
            ("email", &self.email),
            ("website", &self.website),
            ("vat_number", &self.vat_number),
            ("bank_name", &self.bank_name),
            ("bank_account_name", &self.bank_account_name),
            ("bank_sort_code", &self.bank_sort_code),
            ("bank_account_number", &self.bank_account_number),
            ("payment_terms", &self.payment_terms),
            ("invoice_footer", &self.invoice_footer),
            ("line_item_label", &self.line_item_label),
        ]
        .into_iter()
        .filter_map(|(col, value)| value.as_deref().map(|v| (col, v)))
        .collect()
    }

    fn is_empty(&self) -> bool {
        self.text_fields().is_empty()
            && self.vat_registered.is_none()
            && self.default_vat_rate.is_none()
            && self.show_vehicle_fields.is_none()
    }
}

/// PUT .../settings - dynamic update of only the provided fields
pub async fn update(
    Extension(db): Extension<TenantDb>,
    Json(body): Json<UpdateSettingsRequest>,
) -> ApiResult<BusinessSettings> {
    if body.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let mut tx = db.begin().await?;
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE business_settings SET ");
    let mut fields = builder.separated(", ");
    for (col, value) in body.text_fields() {
        fields.push(format!("{} = ", col));
        fields.push_bind_unseparated(value.to_string());
    }
    if let Some(vat_registered) = body.vat_registered {
        fields.push("vat_registered = ");
        fields.push_bind_unseparated(vat_registered);
    }
    if let Some(rate) = body.default_vat_rate {
        fields.push("default_vat_rate = ");
        fields.push_bind_unseparated(rate);
    }
    if let Some(show) = body.show_vehicle_fields {
        fields.push("show_vehicle_fields = ");
        fields.push_bind_unseparated(show);
    }
    fields.push("updated_at = NOW()");
    builder.push(" RETURNING *");

    let settings = builder
        .build_query_as::<BusinessSettings>()
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Settings not found"))?;
    tx.commit().await?;

    Ok(ApiResponse::success(settings))
}

/// GET .../settings/defaults - the seed values for this tenant's trade
pub async fn defaults(Extension(tenant): Extension<Tenant>) -> ApiResult<Value> {
    let defaults = trade_defaults(&tenant.trade_type);
    Ok(ApiResponse::success(json!({
        "trade_type": tenant.trade_type,
        "line_item_label": defaults.line_item_label,
        "show_vehicle_fields": defaults.show_vehicle_fields,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub owner_name: Option<String>,
    pub primary_color: Option<String>,
}

/// PUT .../settings/tenant - tenant-row identity fields
pub async fn update_tenant(
    Extension(tenant): Extension<Tenant>,
    Json(body): Json<UpdateTenantRequest>,
) -> ApiResult<Value> {
    if body.business_name.is_none()
        && body.phone.is_none()
        && body.owner_name.is_none()
        && body.primary_color.is_none()
    {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let service = TenantService::new().await?;
    let updated = service
        .update_tenant(
            &tenant.slug,
            body.business_name.as_deref(),
            body.phone.as_deref(),
            body.owner_name.as_deref(),
            body.primary_color.as_deref(),
        )
        .await?;

    Ok(ApiResponse::success(updated.summary()))
}
