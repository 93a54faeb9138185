use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row from a tenant's `receipts` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: i32,
    pub receipt_number: String,
    pub receipt_date: NaiveDate,
    pub supplier: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub category: Option<String>,
    pub status: String,
    pub storage_file_id: Option<String>,
    pub storage_file_url: Option<String>,
    pub storage_folder_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
