// Registry Sync - Web Server
// On-demand sync trigger plus catalog sync status for the pull worker

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use registry_sync::config::split_and_trim;
use registry_sync::{
    CatalogStatus, Config, ReconciliationEngine, RegistryClient, SqliteSellerStore,
    SyncRegistryRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

type Engine = ReconciliationEngine<SqliteSellerStore, RegistryClient>;

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    store: Arc<SqliteSellerStore>,
    default_registry_env: String,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            message: message.to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct StatusQuery {
    domain: Option<String>,
    registry_env: Option<String>,
}

#[derive(Deserialize)]
struct PendingQuery {
    domain: Option<String>,
    registry_env: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
    page: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "registry-sync", "version": registry_sync::VERSION }))
}

/// POST /v1/internal/registry-sync - Run a sync now
async fn sync_registry(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SyncRegistryRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return fail(StatusCode::BAD_REQUEST, "Invalid request body");
    };
    if !request.is_valid() {
        return fail(StatusCode::BAD_REQUEST, "registry_env and domains are required");
    }

    let response = state.engine.sync_registry(&request).await;
    ok("Registry sync completed successfully", response)
}

/// GET /v1/catalog-sync/sellers/:seller_id - Catalog sync status of one seller
async fn get_sync_status(
    State(state): State<AppState>,
    Path(seller_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let domain = query.domain.unwrap_or_default();
    if seller_id.is_empty() || domain.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "seller_id and domain are required");
    }
    let registry_env = query.registry_env.unwrap_or(state.default_registry_env);

    match state.store.get_sync_status(&seller_id, &domain, &registry_env) {
        Ok(Some(status)) => ok("Sync status retrieved successfully", status),
        Ok(None) => fail(StatusCode::NOT_FOUND, "Record not found"),
        Err(e) => {
            tracing::error!(%seller_id, %domain, error = %e, "Error getting sync status");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get sync status")
        }
    }
}

/// GET /v1/catalog-sync/pending - Sellers waiting for a catalog pull
async fn get_pending_sellers(State(state): State<AppState>, Query(query): Query<PendingQuery>) -> Response {
    let Some(domain) = query.domain.filter(|d| !d.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "domain is required");
    };
    let registry_env = query.registry_env.unwrap_or(state.default_registry_env);

    let statuses = match split_and_trim(query.status.as_deref().unwrap_or_default())
        .iter()
        .map(|s| s.parse::<CatalogStatus>())
        .collect::<registry_sync::Result<Vec<_>>>()
    {
        Ok(statuses) => statuses,
        Err(_) => return fail(StatusCode::BAD_REQUEST, "unknown status in filter"),
    };

    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let page = query.page.unwrap_or(1).max(1);

    match state
        .store
        .pending_sellers_page(&domain, &registry_env, &statuses, limit, page)
    {
        Ok(page) => ok("Pending catalog sync sellers retrieved successfully", page),
        Err(e) => {
            tracing::error!(%domain, error = %e, "Error getting pending sellers");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get pending sellers")
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    if std::path::Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env")?;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("Error loading configuration")?;
    let client = RegistryClient::from_config(&config).context("Error configuring registry client")?;
    let store = Arc::new(
        SqliteSellerStore::open(&config.database_path).context("Failed to open participant store")?,
    );

    let state = AppState {
        engine: Arc::new(ReconciliationEngine::new(store.clone(), client)),
        store,
        default_registry_env: config.registry_env.clone(),
    };

    let v1 = Router::new()
        .route("/internal/registry-sync", post(sync_registry))
        .route("/catalog-sync/sellers/:seller_id", get(get_sync_status))
        .route("/catalog-sync/pending", get(get_pending_sellers));

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down server...");
        })
        .await
        .context("Server error")?;

    Ok(())
}
