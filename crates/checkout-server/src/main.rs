//! checkout HTTP Server
//!
//! Axum-based harness that hosts checkout sessions without a browser. The
//! server stands in for the transport layer: clients create sessions and then
//! post the lifecycle events a real popup or iframe would deliver.

mod handlers;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::RwLock;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{render_context, OutboundHeaders};
use checkout_runtime::{ReqwestHttpClient, RuntimeSettings};

use crate::handlers::{
    create_session, enable_render_context, get_render_context, get_session, health_check,
    session_authorize, session_cancel, session_close, session_error, session_init,
    validate_style_handler,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/style/validate", post(validate_style_handler))

        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/init", post(session_init))
        .route("/api/sessions/{id}/authorize", post(session_authorize))
        .route("/api/sessions/{id}/cancel", post(session_cancel))
        .route("/api/sessions/{id}/close", post(session_close))
        .route("/api/sessions/{id}/error", post(session_error))

        // Render context override
        .route("/api/render-context", get(get_render_context))
        .route("/api/render-context/enable", post(enable_render_context))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let settings = RuntimeSettings::from_env();
    tracing::info!("✓ Default environment: {}", settings.default_env);
    if let Some(stage) = &settings.stage {
        tracing::info!("  Stage: {}", stage);
    }
    tracing::info!("  Guest token exchange: {}", settings.guest_auth.exchange_url);

    // Shared outbound headers; the guest token exchange writes into them
    let headers = OutboundHeaders::new();
    let http = Arc::new(ReqwestHttpClient::new(&settings, headers.clone())?);

    let state = AppState {
        settings: Arc::new(settings),
        sessions: Arc::new(RwLock::new(HashMap::new())),
        render_context: render_context::global(),
        headers,
        http,
    };

    let app = router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                        - Health check");
    tracing::info!("  POST /api/style/validate            - Validate a style object");
    tracing::info!("  POST /api/sessions                  - Create a session");
    tracing::info!("  GET  /api/sessions/{{id}}             - Inspect a session");
    tracing::info!("  POST /api/sessions/{{id}}/<event>     - init | authorize | cancel | close | error");
    tracing::info!("  POST /api/render-context/enable     - Prefer iframe/lightbox for 5 minutes");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
