use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row from `public.tenants`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub business_name: String,
    pub trade_type: String,
    pub owner_email: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub subscription_tier: String,
    pub subscription_status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub schema_name: String,
    pub primary_color: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Compact summary for session and share-link responses.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "slug": self.slug,
            "business_name": self.business_name,
            "trade_type": self.trade_type,
            "subscription_tier": self.subscription_tier,
            "subscription_status": self.subscription_status,
            "primary_color": self.primary_color,
            "phone": self.phone,
        })
    }
}
