use sqlx::{Postgres, Transaction};

use super::manager::{DatabaseError, DatabaseManager};

/// Maximum schema name length: "tenant_" plus a 50 char slug.
const MAX_SCHEMA_NAME_LEN: usize = 57;

/// Derive the schema name for a tenant slug: `tenant_` prefix with every
/// non-alphanumeric character replaced by an underscore.
pub fn schema_name_for_slug(slug: &str) -> String {
    let safe: String = slug
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("tenant_{}", safe)
}

/// Validate a schema name before it is ever interpolated into SQL.
/// Accepts only `tenant_` followed by lowercase alphanumerics/underscores.
pub fn is_valid_schema_name(name: &str) -> bool {
    if name.len() > MAX_SCHEMA_NAME_LEN {
        return false;
    }
    match name.strip_prefix("tenant_") {
        Some(rest) => {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

/// Quote a SQL identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Cheap handle carrying a validated tenant schema name. All handler SQL
/// runs inside transactions opened through [`TenantDb::begin`], which pins
/// the search path to the tenant's schema for the life of the transaction.
#[derive(Clone, Debug)]
pub struct TenantDb {
    schema: String,
}

impl TenantDb {
    pub fn new(schema_name: &str) -> Result<Self, DatabaseError> {
        if !is_valid_schema_name(schema_name) {
            return Err(DatabaseError::InvalidSchemaName(schema_name.to_string()));
        }
        Ok(Self {
            schema: schema_name.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Open a transaction scoped to this tenant's schema. `SET LOCAL`
    /// dies with the transaction, so the connection returns to the pool
    /// with a clean search path.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        let pool = DatabaseManager::pool().await?;
        let mut tx = pool.begin().await?;

        let set_path = format!(
            "SET LOCAL search_path TO {}, public",
            quote_identifier(&self.schema)
        );
        sqlx::query(&set_path).execute(&mut *tx).await?;

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_schema_name_from_slug() {
        assert_eq!(schema_name_for_slug("aces-garage"), "tenant_aces_garage");
        assert_eq!(schema_name_for_slug("smiths"), "tenant_smiths");
        assert_eq!(schema_name_for_slug("A.B c"), "tenant_a_b_c");
    }

    #[test]
    fn validates_schema_names() {
        assert!(is_valid_schema_name("tenant_aces_garage"));
        assert!(is_valid_schema_name("tenant_42"));
        assert!(!is_valid_schema_name("tenant_"));
        assert!(!is_valid_schema_name("public"));
        assert!(!is_valid_schema_name("tenant_Aces"));
        assert!(!is_valid_schema_name("tenant_a; DROP SCHEMA public"));
        assert!(!is_valid_schema_name(&format!("tenant_{}", "a".repeat(60))));
    }

    #[test]
    fn derived_names_always_validate() {
        for slug in ["aces-garage", "bob", "a-2-z-plumbing", "x".repeat(50).as_str()] {
            assert!(is_valid_schema_name(&schema_name_for_slug(slug)), "{}", slug);
        }
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_identifier("tenant_abc"), "\"tenant_abc\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn rejects_invalid_schema_on_construction() {
        assert!(TenantDb::new("tenant_good").is_ok());
        assert!(TenantDb::new("bad_schema").is_err());
    }
}
