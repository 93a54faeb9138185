use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::config;
use crate::database::{bootstrap, DatabaseManager};
use crate::handlers::{protected, public};
use crate::middleware::{auth_middleware, resolve_tenant_middleware};

/// Build the full application router.
pub fn app() -> Router {
    let tenant_api = tenant_routes()
        .layer(middleware::from_fn(resolve_tenant_middleware))
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(auth_public_routes())
        .route("/share/:doctype/:token", get(public::share::view_shared_document))
        // Tenant API is reachable both ways: header/subdomain resolution
        // under /api, explicit slug under /t/:tenant/api.
        .nest("/api", tenant_api.clone())
        .nest("/t/:tenant/api", tenant_api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router {
    use public::auth;

    Router::new()
        .route("/api/auth/signup", post(auth::signup::signup))
        .route("/api/auth/login", post(auth::login::login))
        .route("/api/auth/verify", post(auth::verify::verify))
        .route(
            "/api/auth/session",
            get(auth::session::get_session).delete(auth::session::delete_session),
        )
}

fn tenant_routes() -> Router {
    Router::new()
        // Bookings
        .route(
            "/bookings",
            get(protected::bookings::list).post(protected::bookings::create),
        )
        .route("/bookings/:id", get(protected::bookings::get))
        .route("/bookings/:id/complete", post(protected::bookings::complete))
        // Estimates
        .route(
            "/estimates",
            get(protected::estimates::list).post(protected::estimates::create),
        )
        .route(
            "/estimates/:id",
            get(protected::estimates::get)
                .put(protected::estimates::update)
                .delete(protected::estimates::delete),
        )
        .route("/estimates/:id/share", post(protected::estimates::share))
        // Invoices
        .route(
            "/invoices",
            get(protected::invoices::list).post(protected::invoices::create),
        )
        .route(
            "/invoices/:id",
            get(protected::invoices::get)
                .put(protected::invoices::update)
                .delete(protected::invoices::delete),
        )
        .route("/invoices/:id/mark-paid", post(protected::invoices::mark_paid))
        .route("/invoices/:id/share", post(protected::invoices::share))
        // Receipts
        .route(
            "/receipts",
            get(protected::receipts::list).post(protected::receipts::create),
        )
        .route(
            "/receipts/:id",
            get(protected::receipts::get).delete(protected::receipts::delete),
        )
        // Damage assessments
        .route(
            "/assessments",
            get(protected::assessments::list).post(protected::assessments::create),
        )
        .route(
            "/assessments/:id",
            get(protected::assessments::get)
                .put(protected::assessments::update)
                .delete(protected::assessments::delete),
        )
        .route("/assessments/:id/share", post(protected::assessments::share))
        // Jotter
        .route(
            "/jotter",
            get(protected::jotter::list).post(protected::jotter::create),
        )
        .route(
            "/jotter/:id",
            put(protected::jotter::update).delete(protected::jotter::delete),
        )
        // Settings
        .route(
            "/settings",
            get(protected::settings::get).put(protected::settings::update),
        )
        .route("/settings/defaults", get(protected::settings::defaults))
        .route("/settings/tenant", put(protected::settings::update_tenant))
}

/// Start the HTTP server: load env, init tracing, bootstrap shared
/// tables, bind and serve.
pub async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = config();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting graft-api in {} mode", config.environment.as_str());
    public::mark_started();

    // Shared tables are required for signup and tenant resolution; a dead
    // database at boot is survivable (health reports degraded).
    match DatabaseManager::pool().await {
        Ok(pool) => bootstrap::ensure_shared_tables(&pool).await?,
        Err(e) => warn!("Database unavailable at startup: {}", e),
    }

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("graft-api listening on http://{}", bind_addr);

    axum::serve(listener, app()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::handlers::protected::DocPath;

    async fn show(Path(DocPath { id }): Path<DocPath>) -> String {
        id.to_string()
    }

    // Mounting the same router bare and under /t/:tenant gives every
    // per-document route a second path capture on the slug mount.
    // DocPath has to extract cleanly under both.
    #[tokio::test]
    async fn doc_routes_extract_under_both_mounts() {
        let inner = Router::new().route("/bookings/:id", get(show));
        let app = Router::new()
            .nest("/api", inner.clone())
            .nest("/t/:tenant/api", inner);

        for uri in ["/api/bookings/5", "/t/aces-garage/api/bookings/5"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
            assert_eq!(&body[..], b"5", "{uri}");
        }
    }
}
