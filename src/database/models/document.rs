use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row from a tenant's `estimates` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Estimate {
    pub id: i32,
    pub estimate_number: String,
    pub estimate_date: NaiveDate,
    pub status: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub subtotal: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub signature_data: Option<String>,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from a tenant's `invoices` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: i32,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub subtotal: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from a tenant's `line_items` table. Line items attach to their
/// parent document by `(document_type, document_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LineItem {
    pub id: i32,
    pub document_type: String,
    pub document_id: i32,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
}

/// A row from a tenant's `document_photos` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentPhoto {
    pub id: i32,
    pub document_type: String,
    pub document_id: i32,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub photo_url: Option<String>,
    pub caption: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}
