use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row from a tenant's `jotter_notes` table. Notes are quick-capture and
/// mostly optional; the client-side parser fills what it could extract and
/// records its confidence.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JotterNote {
    pub id: i32,
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
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
