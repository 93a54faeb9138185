use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The single row from a tenant's `business_settings` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessSettings {
    pub id: i32,
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub vat_registered: bool,
    pub vat_number: Option<String>,
    pub default_vat_rate: Decimal,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_sort_code: Option<String>,
    pub bank_account_number: Option<String>,
    pub payment_terms: Option<String>,
    pub invoice_footer: Option<String>,
    pub line_item_label: String,
    pub show_vehicle_fields: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
