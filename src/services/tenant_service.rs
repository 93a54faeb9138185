use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config;
use crate::database::bootstrap::tenant_schema_statements;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::Tenant;
use crate::database::tenant::schema_name_for_slug;
use crate::error::ApiError;

pub const VALID_TRADE_TYPES: &[&str] =
    &["car_mechanic", "plumber", "electrician", "builder", "general"];

/// Slugs that collide with routing or operator surfaces.
const RESERVED_SLUGS: &[&str] = &["www", "app", "api", "admin", "share"];

const DEFAULT_PRIMARY_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, Copy)]
pub struct TradeDefaults {
    pub line_item_label: &'static str,
    pub show_vehicle_fields: bool,
}

/// Per-trade seed values for a new tenant's business settings.
pub fn trade_defaults(trade_type: &str) -> TradeDefaults {
    match trade_type {
        "car_mechanic" => TradeDefaults {
            line_item_label: "Parts",
            show_vehicle_fields: true,
        },
        "plumber" => TradeDefaults {
            line_item_label: "Materials",
            show_vehicle_fields: false,
        },
        "electrician" => TradeDefaults {
            line_item_label: "Components",
            show_vehicle_fields: false,
        },
        "builder" => TradeDefaults {
            line_item_label: "Supplies",
            show_vehicle_fields: false,
        },
        _ => TradeDefaults {
            line_item_label: "Items",
            show_vehicle_fields: false,
        },
    }
}

/// Derive a URL-safe slug from a business name: lowercase, strip special
/// characters, spaces to hyphens, collapse repeats, cap at 50 chars.
pub fn derive_slug(business_name: &str) -> String {
    let lowered = business_name.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ' || *c == '-')
        .collect();

    let mut slug = String::with_capacity(stripped.len());
    let mut last_hyphen = true; // trims leading hyphens
    for c in stripped.chars() {
        let c = if c == ' ' { '-' } else { c };
        if c == '-' {
            if !last_hyphen {
                slug.push('-');
            }
            last_hyphen = true;
        } else {
            slug.push(c);
            last_hyphen = false;
        }
    }

    let slug = slug.trim_end_matches('-');
    slug.chars().take(50).collect()
}

/// Validate an explicitly chosen slug.
pub fn validate_slug(slug: &str) -> Result<(), TenantError> {
    let len = slug.len();
    if !(2..=50).contains(&len) {
        return Err(TenantError::InvalidSlug(
            "Slug must be between 2 and 50 characters".into(),
        ));
    }

    let bytes = slug.as_bytes();
    let valid_edge = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !valid_edge(bytes[0]) || !valid_edge(bytes[len - 1]) {
        return Err(TenantError::InvalidSlug(
            "Slug must start and end with a letter or digit".into(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(TenantError::InvalidSlug(
            "Slug may only contain lowercase letters, digits and hyphens".into(),
        ));
    }
    if RESERVED_SLUGS.contains(&slug) {
        return Err(TenantError::InvalidSlug(format!(
            "'{}' is a reserved name",
            slug
        )));
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenantInput {
    pub slug: Option<String>,
    pub business_name: String,
    pub trade_type: String,
    pub owner_email: String,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidSlug(String),
    #[error("Invalid trade type: {0}")]
    InvalidTradeType(String),
    #[error(transparent)]
    DatabaseManager(#[from] DatabaseError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::AlreadyExists(msg) => ApiError::conflict(msg),
            TenantError::NotFound(msg) => ApiError::not_found(msg),
            TenantError::InvalidSlug(msg) => ApiError::bad_request(msg),
            TenantError::InvalidTradeType(msg) => ApiError::bad_request(msg),
            TenantError::DatabaseManager(e) => e.into(),
            TenantError::Database(e) => e.into(),
        }
    }
}

/// Shared-table operations plus tenant provisioning. Provisioning runs the
/// tenants-row insert, schema DDL and settings seed in one transaction so a
/// failed signup never leaves a half-built tenant behind.
pub struct TenantService {
    pool: PgPool,
}

impl TenantService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Tenant>, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM public.tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    pub async fn get_by_owner_email(&self, email: &str) -> Result<Option<Tenant>, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM public.tenants WHERE LOWER(owner_email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, TenantError> {
        let tenants =
            sqlx::query_as::<_, Tenant>("SELECT * FROM public.tenants ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(tenants)
    }

    pub async fn slug_available(&self, slug: &str) -> Result<bool, TenantError> {
        let existing: Option<(uuid::Uuid,)> =
            sqlx::query_as("SELECT id FROM public.tenants WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(existing.is_none())
    }

    /// Provision a new tenant: tenants row, schema with all tables, seeded
    /// business settings.
    pub async fn create_tenant(&self, input: CreateTenantInput) -> Result<Tenant, TenantError> {
        if !VALID_TRADE_TYPES.contains(&input.trade_type.as_str()) {
            return Err(TenantError::InvalidTradeType(input.trade_type.clone()));
        }

        let slug = match &input.slug {
            Some(slug) => slug.clone(),
            None => derive_slug(&input.business_name),
        };
        validate_slug(&slug)?;

        let schema_name = schema_name_for_slug(&slug);
        let defaults = trade_defaults(&input.trade_type);
        let trial_ends_at = Utc::now() + Duration::days(config::config().tenancy.trial_days);

        let mut tx = self.pool.begin().await?;

        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO public.tenants (
                slug, business_name, trade_type, owner_email, owner_name, phone,
                subscription_tier, subscription_status, trial_ends_at,
                schema_name, primary_color
            ) VALUES ($1, $2, $3, $4, $5, $6, 'trial', 'trial', $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&slug)
        .bind(&input.business_name)
        .bind(&input.trade_type)
        .bind(&input.owner_email)
        .bind(&input.owner_name)
        .bind(&input.phone)
        .bind(trial_ends_at)
        .bind(&schema_name)
        .bind(DEFAULT_PRIMARY_COLOR)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            true => TenantError::AlreadyExists(
                "A tenant with this slug or email already exists".into(),
            ),
            false => TenantError::Database(e),
        })?;

        for statement in tenant_schema_statements(&schema_name) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        let seed = format!(
            r#"
            INSERT INTO {}.business_settings
                (id, business_name, phone, email, line_item_label, show_vehicle_fields)
            VALUES (1, $1, $2, $3, $4, $5)
            "#,
            crate::database::tenant::quote_identifier(&schema_name)
        );
        sqlx::query(&seed)
            .bind(&input.business_name)
            .bind(&input.phone)
            .bind(&input.owner_email)
            .bind(defaults.line_item_label)
            .bind(defaults.show_vehicle_fields)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(slug = %tenant.slug, schema = %schema_name, "Provisioned tenant");
        Ok(tenant)
    }

    /// Drop a tenant's schema and remove its shared rows.
    pub async fn delete_tenant(&self, slug: &str) -> Result<(), TenantError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT schema_name FROM public.tenants WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&mut *tx)
                .await?;
        let schema_name = row
            .ok_or_else(|| TenantError::NotFound(slug.to_string()))?
            .0;

        if !crate::database::tenant::is_valid_schema_name(&schema_name) {
            return Err(TenantError::DatabaseManager(
                DatabaseError::InvalidSchemaName(schema_name),
            ));
        }

        let drop = format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            crate::database::tenant::quote_identifier(&schema_name)
        );
        sqlx::query(&drop).execute(&mut *tx).await?;

        sqlx::query("DELETE FROM public.share_token_lookup WHERE tenant_slug = $1")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM public.tenants WHERE slug = $1")
            .bind(slug)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(slug = %slug, schema = %schema_name, "Deleted tenant");
        Ok(())
    }

    /// Update the whitelisted tenant-row fields, returning the fresh row.
    pub async fn update_tenant(
        &self,
        slug: &str,
        business_name: Option<&str>,
        phone: Option<&str>,
        owner_name: Option<&str>,
        primary_color: Option<&str>,
    ) -> Result<Tenant, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE public.tenants
            SET business_name = COALESCE($2, business_name),
                phone = COALESCE($3, phone),
                owner_name = COALESCE($4, owner_name),
                primary_color = COALESCE($5, primary_color),
                updated_at = NOW()
            WHERE slug = $1
            RETURNING *
            "#,
        )
        .bind(slug)
        .bind(business_name)
        .bind(phone)
        .bind(owner_name)
        .bind(primary_color)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TenantError::NotFound(slug.to_string()))?;

        Ok(tenant)
    }

    pub async fn mark_email_verified(&self, slug: &str) -> Result<(), TenantError> {
        sqlx::query(
            "UPDATE public.tenants SET email_verified = true, updated_at = NOW() WHERE slug = $1",
        )
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_slugs() {
        assert_eq!(derive_slug("Aces Garage"), "aces-garage");
        assert_eq!(derive_slug("Bob's Plumbing & Heating"), "bobs-plumbing-heating");
        assert_eq!(derive_slug("  --Dashes--  "), "dashes");
        assert_eq!(derive_slug("A  B   C"), "a-b-c");
        assert_eq!(derive_slug(&"x".repeat(80)).len(), 50);
    }

    #[test]
    fn validates_slugs() {
        assert!(validate_slug("aces-garage").is_ok());
        assert!(validate_slug("a2").is_ok());
        assert!(validate_slug("x").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("trailing-").is_err());
        assert!(validate_slug("UPPER").is_err());
        assert!(validate_slug("spa ce").is_err());
        assert!(validate_slug(&"a".repeat(51)).is_err());
        for reserved in ["www", "app", "api", "admin", "share"] {
            assert!(validate_slug(reserved).is_err(), "{}", reserved);
        }
    }

    #[test]
    fn trade_defaults_per_trade() {
        assert_eq!(trade_defaults("car_mechanic").line_item_label, "Parts");
        assert!(trade_defaults("car_mechanic").show_vehicle_fields);
        assert_eq!(trade_defaults("plumber").line_item_label, "Materials");
        assert!(!trade_defaults("plumber").show_vehicle_fields);
        assert_eq!(trade_defaults("electrician").line_item_label, "Components");
        assert_eq!(trade_defaults("builder").line_item_label, "Supplies");
        assert_eq!(trade_defaults("general").line_item_label, "Items");
        assert_eq!(trade_defaults("unknown").line_item_label, "Items");
    }

    #[test]
    fn derived_slug_always_validates_when_long_enough() {
        for name in ["Aces Garage", "Bob & Sons", "A1 Electrics Ltd."] {
            let slug = derive_slug(name);
            assert!(validate_slug(&slug).is_ok(), "{} -> {}", name, slug);
        }
    }
}
