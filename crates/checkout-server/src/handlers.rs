//! HTTP Handlers
//!
//! The server plays the transport role: it renders nothing, but it creates
//! sessions and delivers lifecycle events to them on request.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use checkout_core::render_context::{default_contexts, dimensions, DeviceKind, Dimensions};
use checkout_core::{
    validate_style, AuthorizeData, Callbacks, CancelData, Checkout, CheckoutError, CloseReason,
    GuestAuth, InitData, PaymentTokenKind, PaymentTokenProvider, RenderContext, SessionConfig,
    SessionState, SlotStates, StyleConfig, TransportActions,
};
use checkout_runtime::{HeadlessSurface, HeadlessWindow, Navigation};

use crate::state::{AppState, EventLog, HostEvent, HostedSession};

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub default_env: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateStyleRequest {
    #[serde(default)]
    pub style: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ValidateStyleResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub commit: Option<bool>,
    #[serde(default)]
    pub client: HashMap<String, String>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub payment_token: Option<String>,
    /// Location of the hosting page
    pub page_url: String,
    /// Location of the session-scoped window, if any
    #[serde(default)]
    pub session_window: Option<String>,
    #[serde(default)]
    pub device: DeviceKind,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub env: String,
    pub url: String,
    pub base_url: String,
    pub kind: PaymentTokenKind,
    pub contexts: RenderContext,
    pub dimensions: Dimensions,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub env: String,
    pub url: String,
    pub slots: SlotStates,
    pub state: SessionState,
    pub closed: bool,
    pub current_href: String,
    pub navigations: Vec<Navigation>,
    pub events: Vec<HostEvent>,
}

impl SessionView {
    fn of(session: &HostedSession) -> Self {
        Self {
            session_id: session.checkout.id().to_string(),
            env: session.checkout.env().to_string(),
            url: session.resolved.url.clone(),
            slots: session.checkout.slot_states(),
            state: session.checkout.state(),
            closed: session.surface.is_closed(),
            current_href: session.window.current_href(),
            navigations: session.window.navigations(),
            events: session.events.snapshot(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RenderContextResponse {
    pub context: RenderContext,
    pub pending_revert: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Handler error: status plus JSON body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.into(),
            },
        }
    }

    fn not_found(id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("Session not found: {}", id),
            "SESSION_NOT_FOUND",
        )
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        let (status, code) = match &err {
            CheckoutError::Config(config) => (StatusCode::UNPROCESSABLE_ENTITY, config.code()),
            CheckoutError::UnknownEnvironment(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_ENVIRONMENT"),
            CheckoutError::UrlResolution(_) => (StatusCode::BAD_GATEWAY, "URL_RESOLUTION_FAILED"),
            CheckoutError::Callback { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CALLBACK_FAILED"),
            CheckoutError::Surface(_) => (StatusCode::BAD_GATEWAY, "SURFACE_ERROR"),
            CheckoutError::Navigation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "NAVIGATION_ERROR"),
            CheckoutError::Json(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            CheckoutError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        Self::new(status, err.to_string(), code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        default_env: state.settings.default_env.clone(),
        sessions: state.sessions.read().await.len(),
    })
}

/// Validate a style object without creating a session
pub async fn validate_style_handler(
    Json(payload): Json<ValidateStyleRequest>,
) -> Result<Json<ValidateStyleResponse>, ApiError> {
    let style = match payload.style {
        None | Some(Value::Null) => None,
        Some(value) => Some(StyleConfig::from_value(value).map_err(CheckoutError::from)?),
    };

    let response = match validate_style(style.as_ref()) {
        Ok(()) => ValidateStyleResponse {
            valid: true,
            error: None,
            code: None,
        },
        Err(err) => ValidateStyleResponse {
            valid: false,
            code: Some(err.code()),
            error: Some(err.to_string()),
        },
    };

    Ok(Json(response))
}

/// Host-side callbacks: record what happened so it can be inspected later
fn host_callbacks(events: &EventLog) -> Callbacks {
    let (init_log, authorize_log, cancel_log, close_log, error_log) = (
        events.clone(),
        events.clone(),
        events.clone(),
        events.clone(),
        events.clone(),
    );

    Callbacks::new()
        .init(move |data| {
            let log = init_log.clone();
            async move {
                log.push("init", serde_json::to_value(&data)?);
                Ok(())
            }
        })
        .on_authorize(move |data, _actions| {
            let log = authorize_log.clone();
            async move {
                log.push("onAuthorize", serde_json::to_value(&data)?);
                Ok(())
            }
        })
        .on_cancel(move |data, _actions| {
            let log = cancel_log.clone();
            async move {
                log.push("onCancel", serde_json::to_value(&data)?);
                Ok(())
            }
        })
        .on_close(move |reason| {
            let log = close_log.clone();
            async move {
                log.push("onClose", Value::String(reason.to_string()));
                Ok(())
            }
        })
        .on_error(move |message| {
            let log = error_log.clone();
            async move {
                log.push("onError", Value::String(message));
                Ok(())
            }
        })
}

/// Create a session: validate, resolve the URL, register it
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let style = match payload.style {
        None | Some(Value::Null) => StyleConfig::default(),
        Some(value) => StyleConfig::from_value(value).map_err(CheckoutError::from)?,
    };

    let events = EventLog::default();
    let mut config = SessionConfig::new()
        .style(style)
        .callbacks(host_callbacks(&events));
    config.env = payload.env;
    config.stage = payload.stage.or_else(|| state.settings.stage.clone());
    config.locale = payload.locale.or_else(|| state.settings.locale.clone());
    config.commit = payload.commit;
    config.client = payload.client;
    config.payment = payload.payment_token.map(PaymentTokenProvider::ready);

    let window = Arc::new(HeadlessWindow::new(payload.page_url));
    window.set_session_window(payload.session_window);
    let surface = Arc::new(HeadlessSurface::new());

    let checkout = Checkout::builder(config)
        .default_env(state.settings.default_env.clone())
        .surface(surface.clone())
        .window(window.clone())
        .guest_auth(GuestAuth::new(
            state.settings.guest_auth.clone(),
            Arc::clone(&state.http),
            state.headers.clone(),
        ))
        .build()?;

    let resolved = checkout.resolve_url().await?;

    let response = CreateSessionResponse {
        session_id: checkout.id().to_string(),
        env: checkout.env().to_string(),
        url: resolved.url.clone(),
        base_url: resolved.base.clone(),
        kind: resolved.kind,
        contexts: default_contexts(payload.device, state.render_context.current()),
        dimensions: dimensions(payload.device),
    };

    tracing::info!(session_id = %response.session_id, url = %response.url, "session created");

    let session = Arc::new(HostedSession {
        checkout,
        resolved,
        window,
        surface,
        events,
    });
    state
        .sessions
        .write()
        .await
        .insert(response.session_id.clone(), session);

    Ok((StatusCode::CREATED, Json(response)))
}

/// Report the session after an event, dropping it once it has ended
async fn respond(
    state: &AppState,
    session: &HostedSession,
    result: checkout_core::Result<()>,
) -> Result<Json<SessionView>, ApiError> {
    let view = SessionView::of(session);

    if session.is_finished() {
        state.sessions.write().await.remove(&view.session_id);
        tracing::info!(session_id = %view.session_id, "session ended");
    }

    result?;
    Ok(Json(view))
}

async fn find_session(state: &AppState, id: &str) -> Result<Arc<HostedSession>, ApiError> {
    state
        .sessions
        .read()
        .await
        .get(id)
        .cloned()
        .ok_or_else(|| ApiError::not_found(id))
}

/// Inspect a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(SessionView::of(&session)))
}

/// Deliver `init`
pub async fn session_init(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<InitData>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let result = session.checkout.init(data).await;
    respond(&state, &session, result).await
}

/// Deliver `onAuthorize`
pub async fn session_authorize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<AuthorizeData>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let result = session
        .checkout
        .on_authorize(data, TransportActions::none())
        .await;
    respond(&state, &session, result).await
}

/// Deliver `onCancel`
pub async fn session_cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<CancelData>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let result = session
        .checkout
        .on_cancel(data, TransportActions::none())
        .await;
    respond(&state, &session, result).await
}

/// Deliver `onClose`
pub async fn session_close(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CloseRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let result = session
        .checkout
        .on_close(CloseReason::parse(&payload.reason))
        .await;
    respond(&state, &session, result).await
}

/// Deliver `onError`
pub async fn session_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ErrorRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let result = session.checkout.on_error(payload.message).await;
    respond(&state, &session, result).await
}

/// Current render context
pub async fn get_render_context(State(state): State<AppState>) -> Json<RenderContextResponse> {
    Json(RenderContextResponse {
        context: state.render_context.current(),
        pending_revert: state.render_context.has_pending_revert(),
    })
}

/// Turn on the iframe/lightbox override for the next five minutes
pub async fn enable_render_context(State(state): State<AppState>) -> Json<RenderContextResponse> {
    state.render_context.enable();
    tracing::info!("render context override enabled");
    get_render_context(State(state)).await
}
