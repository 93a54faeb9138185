use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row from a tenant's `damage_assessments` table. Damage locations and
/// photos are free-shape JSON arrays supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DamageAssessment {
    pub id: i32,
    pub assessment_number: String,
    pub assessment_date: NaiveDate,
    pub status: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: String,
    pub vehicle_year: Option<String>,
    pub vehicle_colour: Option<String>,
    pub mileage: Option<i32>,
    pub damage_description: Option<String>,
    pub damage_locations: Option<Value>,
    pub repair_notes: Option<String>,
    pub photos: Option<Value>,
    pub estimated_cost: Option<Decimal>,
    pub share_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
