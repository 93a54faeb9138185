use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A row from a tenant's `bookings` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i32,
    pub booked_by: String,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub service_type: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_reg: Option<String>,
    pub location_address: String,
    pub location_postcode: String,
    pub issue_description: String,
    pub notes: Option<String>,
    pub status: String,
    pub estimated_duration: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
