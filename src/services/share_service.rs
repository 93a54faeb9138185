//! Share-token issuance and the public lookup table that maps a token
//! back to the owning tenant's schema.

use serde::Serialize;
use sqlx::{Postgres, Transaction};

use crate::auth::random_token;
use crate::config::config;
use crate::database::models::Tenant;
use crate::error::ApiError;

/// Document kinds that can be shared publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Estimate,
    Invoice,
    Assessment,
}

impl ShareKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Estimate => "estimates",
            Self::Invoice => "invoices",
            Self::Assessment => "damage_assessments",
        }
    }

    pub fn doc_type(&self) -> &'static str {
        match self {
            Self::Estimate => "estimate",
            Self::Invoice => "invoice",
            Self::Assessment => "assessment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "estimate" => Some(Self::Estimate),
            "invoice" => Some(Self::Invoice),
            "assessment" => Some(Self::Assessment),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareLink {
    pub share_token: String,
    pub share_url: String,
}

/// Issue (or reuse) a share token for a tenant document and record it
/// in `public.share_token_lookup`. Estimates and invoices keep an
/// existing token; assessments pass `regenerate` to rotate it.
pub async fn ensure_share_token(
    tx: &mut Transaction<'_, Postgres>,
    kind: ShareKind,
    document_id: i32,
    tenant: &Tenant,
    regenerate: bool,
) -> Result<ShareLink, ApiError> {
    let sql = format!("SELECT share_token FROM {} WHERE id = $1", kind.table());
    let existing: Option<(Option<String>,)> = sqlx::query_as(&sql)
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await?;

    let current = match existing {
        Some((token,)) => token,
        None => {
            return Err(ApiError::not_found(format!(
                "{} not found",
                capitalize(kind.doc_type())
            )))
        }
    };

    let token = match current {
        Some(token) if !regenerate => token,
        old => {
            let token = random_token();
            let sql = format!("UPDATE {} SET share_token = $1 WHERE id = $2", kind.table());
            sqlx::query(&sql)
                .bind(&token)
                .bind(document_id)
                .execute(&mut **tx)
                .await?;
            if let Some(old) = old {
                sqlx::query("DELETE FROM public.share_token_lookup WHERE share_token = $1")
                    .bind(&old)
                    .execute(&mut **tx)
                    .await?;
            }
            token
        }
    };

    sqlx::query(
        r#"
        INSERT INTO public.share_token_lookup (share_token, tenant_slug, tenant_schema, document_type)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (share_token) DO NOTHING
        "#,
    )
    .bind(&token)
    .bind(&tenant.slug)
    .bind(&tenant.schema_name)
    .bind(kind.doc_type())
    .execute(&mut **tx)
    .await?;

    Ok(ShareLink {
        share_url: format!("{}/share/{}/{}", config().server.base_url, kind.doc_type(), token),
        share_token: token,
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_share_kinds() {
        assert_eq!(ShareKind::parse("estimate"), Some(ShareKind::Estimate));
        assert_eq!(ShareKind::parse("invoice"), Some(ShareKind::Invoice));
        assert_eq!(ShareKind::parse("assessment"), Some(ShareKind::Assessment));
        assert_eq!(ShareKind::parse("booking"), None);
        assert_eq!(ShareKind::parse("Estimate"), None);
    }

    #[test]
    fn kind_tables_match_doc_types() {
        assert_eq!(ShareKind::Assessment.table(), "damage_assessments");
        assert_eq!(ShareKind::Assessment.doc_type(), "assessment");
    }

    #[test]
    fn capitalizes_doc_types_for_messages() {
        assert_eq!(capitalize("estimate"), "Estimate");
        assert_eq!(capitalize(""), "");
    }
}
