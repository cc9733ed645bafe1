//! Account service binary
//!
//! Configuration comes from the environment:
//!
//! | Variable             | Default       | Purpose                              |
//! |----------------------|---------------|--------------------------------------|
//! | APP_ENV              | development   | `production` tightens CORS + secrets |
//! | PORT                 | 8000          | HTTP listen port                     |
//! | DB_BACKEND           | postgres      | `postgres` or `mongo`                |
//! | DB_HOST              | localhost     | Database host                        |
//! | DB_PORT              | 5432          | Database port                        |
//! | DB_USER              | postgres      | Database user                        |
//! | DB_PASSWORD          | secret        | Database password                    |
//! | DB_NAME              | accounts      | Database name                        |
//! | DB_URL               | (unset)       | Full URI, overrides the above        |
//! | JWT_SECRET           | your-secret-key | Session token signing secret       |
//! | GOOGLE_CLIENT_ID     | (empty)       | OAuth client id                      |
//! | GOOGLE_CLIENT_SECRET | (empty)       | OAuth client secret                  |
//! | GOOGLE_REDIRECT_URI  | (empty)       | OAuth callback URL                   |

use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa_axum::router::OpenApiRouter;

use acct_common::logging::init_logging;
use acct_platform::{
    auth_router, google_router, users_router, AppState, AuthLayer, AuthState, Authenticated,
    GoogleOAuthConfig, GoogleOAuthService, PasswordService, StoreBackend, StoreConfig,
    StoreManager, TokenConfig, TokenService, UsersState,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn page1(_auth: Authenticated) -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Page1" }))
}

async fn page2(_auth: Authenticated) -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Page2" }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "NOT_FOUND", "message": "Route not found" })),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("acct-server");

    let app_env = env_or("APP_ENV", "development");
    let port: u16 = env_or_parse("PORT", 8000);

    let jwt_secret = env_or("JWT_SECRET", "your-secret-key");
    if app_env == "production" && (jwt_secret.is_empty() || jwt_secret == "your-secret-key") {
        anyhow::bail!("JWT_SECRET must be set to a real secret in production");
    }

    let backend_name = env_or("DB_BACKEND", "postgres");
    let backend = StoreBackend::parse(&backend_name)
        .ok_or_else(|| anyhow::anyhow!("unknown DB_BACKEND: {backend_name}"))?;

    let store_config = StoreConfig {
        backend,
        host: env_or("DB_HOST", "localhost"),
        port: env_or_parse("DB_PORT", 5432),
        user: env_or("DB_USER", "postgres"),
        password: env_or("DB_PASSWORD", "secret"),
        database: env_or("DB_NAME", "accounts"),
        connection_string: std::env::var("DB_URL").ok(),
        ..Default::default()
    };

    let manager = StoreManager::new(store_config);
    let store = manager.get().await?;

    let token_service = Arc::new(TokenService::new(TokenConfig {
        secret: jwt_secret,
        ..Default::default()
    }));
    let password_service = Arc::new(PasswordService::default());
    let oauth = Arc::new(GoogleOAuthService::new(GoogleOAuthConfig::new(
        env_or("GOOGLE_CLIENT_ID", ""),
        env_or("GOOGLE_CLIENT_SECRET", ""),
        env_or("GOOGLE_REDIRECT_URI", ""),
    )));

    let auth_state = AuthState {
        store: Arc::clone(&store),
        token_service: Arc::clone(&token_service),
        password_service: Arc::clone(&password_service),
        oauth,
    };
    let users_state = UsersState {
        store: Arc::clone(&store),
        password_service,
    };
    let app_state = AppState {
        token_service: Arc::clone(&token_service),
    };

    let (api_router, _api_doc) = OpenApiRouter::new()
        .merge(auth_router(auth_state.clone()))
        .merge(users_router(users_state))
        .split_for_parts();

    let mut app = Router::new()
        .merge(api_router)
        .merge(google_router(auth_state))
        .route("/health", get(health))
        .route("/page1", get(page1))
        .route("/page2", get(page2))
        .fallback(not_found)
        .layer(AuthLayer::new(app_state))
        .layer(TraceLayer::new_for_http());

    if app_env == "development" {
        app = app.layer(CorsLayer::permissive());
        warn!("CORS is wide open (development mode)");
    }

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, env = %app_env, "Account service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = store.disconnect().await {
        warn!(error = %err, "Store disconnect failed during shutdown");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
    }
}
