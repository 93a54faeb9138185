use axum::{
    extract::{OriginalUri, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::database::models::Tenant;
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::services::tenant_service::TenantService;

use super::auth::AuthContext;

const TENANT_HEADER: &str = "x-tenant-slug";

/// Middleware that resolves the tenant for every tenant-scoped route and
/// attaches a [`Tenant`] plus a schema-scoped [`TenantDb`] to the request.
///
/// Resolution order: URL segment (`/t/<slug>/api/...`), then the
/// `X-Tenant-Slug` header, then the `Host` subdomain.
pub async fn resolve_tenant_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Nested routers strip their prefix from the request URI; the
    // original path is needed to see the /t/<slug>/ segment.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let slug = candidate_slug(&path, &headers).ok_or_else(|| {
        ApiError::bad_request(
            "Tenant required: use a /t/<slug>/ URL, the X-Tenant-Slug header, or a tenant subdomain",
        )
    })?;

    let service = TenantService::new().await?;
    let tenant = service
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Unknown tenant '{}'", slug)))?;

    check_subscription(&tenant)?;

    // A session is bound to one tenant; staff tokens work across tenants.
    if let Some(AuthContext::Session(claims)) = request.extensions().get::<AuthContext>() {
        if claims.tenant_slug != tenant.slug {
            tracing::warn!(
                session_tenant = %claims.tenant_slug,
                resolved_tenant = %tenant.slug,
                "Session attempted cross-tenant access"
            );
            return Err(ApiError::forbidden("Session does not belong to this tenant"));
        }
    }

    let db = TenantDb::new(&tenant.schema_name)?;
    request.extensions_mut().insert(tenant);
    request.extensions_mut().insert(db);

    Ok(next.run(request).await)
}

/// Pick the candidate slug from the request. Path beats header beats
/// subdomain.
fn candidate_slug(path: &str, headers: &HeaderMap) -> Option<String> {
    if let Some(slug) = slug_from_path(path) {
        return Some(slug.to_string());
    }

    if let Some(slug) = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Some(slug.to_string());
    }

    headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .and_then(slug_from_host)
        .map(str::to_string)
}

/// Extract the slug from a `/t/<slug>/...` path.
fn slug_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/t/")?;
    let slug = rest.split('/').next()?;
    (!slug.is_empty()).then_some(slug)
}

/// Extract a tenant subdomain from the Host header. Needs at least three
/// labels (sub.domain.tld); `www`/`app` are not tenants and localhost
/// never yields a subdomain.
fn slug_from_host(host: &str) -> Option<&str> {
    let hostname = host.split(':').next().unwrap_or(host);
    if hostname == "localhost" {
        return None;
    }

    let mut labels = hostname.split('.');
    let first = labels.next()?;
    if labels.count() < 2 {
        return None;
    }
    if first == "www" || first == "app" || first.is_empty() {
        return None;
    }
    Some(first)
}

/// Gate on subscription status: suspended/cancelled accounts and expired
/// trials are shut out with 403.
fn check_subscription(tenant: &Tenant) -> Result<(), ApiError> {
    match tenant.subscription_status.as_str() {
        "suspended" | "cancelled" => Err(ApiError::forbidden(format!(
            "This account is {}",
            tenant.subscription_status
        ))),
        "trial" => {
            let expired = tenant
                .trial_ends_at
                .map(|ends| ends < Utc::now())
                .unwrap_or(false);
            if expired {
                Err(ApiError::forbidden("Trial period has ended"))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;
    use uuid::Uuid;

    fn tenant_with_status(status: &str, trial_ends_at: Option<chrono::DateTime<Utc>>) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            slug: "aces-garage".into(),
            business_name: "Aces Garage".into(),
            trade_type: "car_mechanic".into(),
            owner_email: "owner@acesgarage.co.uk".into(),
            owner_name: None,
            phone: None,
            subscription_tier: "trial".into(),
            subscription_status: status.into(),
            trial_ends_at,
            schema_name: "tenant_aces_garage".into(),
            primary_color: "#3B82F6".into(),
            email_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn path_segment_yields_slug() {
        assert_eq!(slug_from_path("/t/aces-garage/api/bookings"), Some("aces-garage"));
        assert_eq!(slug_from_path("/t/x"), Some("x"));
        assert_eq!(slug_from_path("/api/bookings"), None);
        assert_eq!(slug_from_path("/t/"), None);
    }

    #[test]
    fn subdomain_rules() {
        assert_eq!(slug_from_host("aces-garage.graft.example.com"), Some("aces-garage"));
        assert_eq!(slug_from_host("aces.graft.co.uk:8080"), Some("aces"));
        assert_eq!(slug_from_host("www.graft.example.com"), None);
        assert_eq!(slug_from_host("app.graft.example.com"), None);
        assert_eq!(slug_from_host("graft.example"), None);
        assert_eq!(slug_from_host("localhost"), None);
        assert_eq!(slug_from_host("localhost:3000"), None);
    }

    #[test]
    fn header_beats_subdomain_and_path_beats_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("header-tenant"));
        headers.insert("host", HeaderValue::from_static("host-tenant.graft.example.com"));

        assert_eq!(
            candidate_slug("/api/bookings", &headers),
            Some("header-tenant".to_string())
        );
        assert_eq!(
            candidate_slug("/t/path-tenant/api/bookings", &headers),
            Some("path-tenant".to_string())
        );

        let mut host_only = HeaderMap::new();
        host_only.insert("host", HeaderValue::from_static("host-tenant.graft.example.com"));
        assert_eq!(
            candidate_slug("/api/bookings", &host_only),
            Some("host-tenant".to_string())
        );
    }

    #[test]
    fn no_candidate_without_any_source() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:3000"));
        assert_eq!(candidate_slug("/api/bookings", &headers), None);
    }

    #[test]
    fn subscription_gate() {
        assert!(check_subscription(&tenant_with_status("active", None)).is_ok());
        assert!(check_subscription(&tenant_with_status("suspended", None)).is_err());
        assert!(check_subscription(&tenant_with_status("cancelled", None)).is_err());

        let in_date = Some(Utc::now() + Duration::days(3));
        assert!(check_subscription(&tenant_with_status("trial", in_date)).is_ok());

        let expired = Some(Utc::now() - Duration::days(1));
        assert!(check_subscription(&tenant_with_status("trial", expired)).is_err());
    }
}
