use axum::{routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use nidhi_api::database::manager::DatabaseManager;
use nidhi_api::database::requests::PgRequestStore;
use nidhi_api::{handlers, middleware};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, CLUSTER_ADMIN_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = nidhi_api::config::config();
    tracing::info!("Starting Nidhi API in {:?} mode", config.environment);

    // Bootstrap the request-store schema. The server still comes up when
    // the store is unreachable; /health reports it as degraded.
    match DatabaseManager::store_pool().await {
        Ok(pool) => {
            if let Err(e) = PgRequestStore::migrate(&pool).await {
                tracing::error!("request store schema bootstrap failed: {}", e);
            }
        }
        Err(e) => {
            tracing::warn!("request store unavailable at startup: {}", e);
        }
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("NIDHI_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("🚀 Nidhi API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Authenticated requester operations
        .merge(request_routes())
        // Admin review queue
        .merge(admin_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router {
    use axum::routing::post;
    use handlers::auth;

    Router::new().route("/api/login", post(auth::login_post))
}

fn request_routes() -> Router {
    use axum::routing::{delete, post, put};
    use handlers::requests;

    Router::new()
        .route("/api/requests", post(requests::request_create))
        .route("/api/requests/my", get(requests::request_list_mine))
        .route("/api/requests/:id", delete(requests::request_delete))
        .route("/api/requests/:id/reveal", post(requests::request_reveal))
        .route(
            "/api/requests/:id/password",
            put(requests::request_rotate_password),
        )
        .route("/api/requests/:id/size", get(requests::request_size))
        .route("/api/requests/:id/tables", post(requests::request_tables))
        .layer(axum::middleware::from_fn(middleware::require_user))
}

fn admin_routes() -> Router {
    use axum::routing::post;
    use handlers::admin;

    Router::new()
        .route(
            "/api/admin/requests/pending",
            get(admin::request_list_pending),
        )
        .route(
            "/api/admin/requests/:id/approve",
            post(admin::request_approve),
        )
        .route(
            "/api/admin/requests/:id/reject",
            post(admin::request_reject),
        )
        .layer(axum::middleware::from_fn(middleware::require_admin))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Nidhi API",
            "version": version,
            "description": "Self-service PostgreSQL database provisioning portal",
            "endpoints": {
                "home": "/ (public)",
                "login": "/api/login (public - identity service proxy)",
                "requests": "/api/requests, /api/requests/my, /api/requests/:id (authenticated)",
                "credentials": "/api/requests/:id/reveal, /api/requests/:id/password (authenticated)",
                "inspection": "/api/requests/:id/size, /api/requests/:id/tables (authenticated)",
                "admin": "/api/admin/requests/* (admin role required)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
