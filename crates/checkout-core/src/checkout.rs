//! Checkout Controller
//!
//! Decorates the host's lifecycle callbacks for one session.
//!
//! ```text
//!  transport ──▶ init ──▶ record SessionState ──▶ user init
//!
//!  transport ──▶ on_authorize ─┬─▶ return-url diagnostic (best effort)
//!                              ├─▶ guest auth header   (best effort)
//!                              ├─▶ user on_authorize(data, Actions)
//!                              └─▶ close surface       (always)
//!
//!  transport ──▶ on_cancel ────┬─▶ user on_cancel(data, Actions)
//!                              └─▶ close surface       (always)
//!
//!  transport ──▶ on_close ─────┬─▶ user on_close(reason)
//!                              └─▶ synthetic on_cancel when closed externally
//!                                  before authorize/cancel ran
//! ```
//!
//! Every slot fires its user body at most once. A user failure is returned
//! only after the surface close has run.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actions::{Actions, Teardown};
use crate::diagnostics::{log_return_url_domain, DiagnosticSink, TracingSink};
use crate::error::{CheckoutError, Result};
use crate::guest_auth::GuestAuth;
use crate::host::{Surface, TransportActions, WindowHost};
use crate::lifecycle::{
    run_user_callback, AuthorizeData, CancelData, CloseReason, InitData, OnceSlot, SlotState,
};
use crate::resolver::{build_session_url, PaymentTokenKind, UrlResolver, UrlTable, DEFAULT_ENV};
use crate::session::{SessionConfig, SessionId, SessionState};

/// URL the surface should be rendered at
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedUrl {
    /// Environment base URL picked for the token
    pub base: String,

    /// Base URL with session query parameters
    pub url: String,

    pub token: String,

    pub kind: PaymentTokenKind,
}

/// Once-guards for every callback slot
#[derive(Debug)]
struct Slots {
    init: OnceSlot,
    authorize: OnceSlot,
    cancel: OnceSlot,
    close: OnceSlot,
    error: OnceSlot,
}

impl Slots {
    fn new() -> Self {
        Self {
            init: OnceSlot::new("init"),
            authorize: OnceSlot::new("onAuthorize"),
            cancel: OnceSlot::new("onCancel"),
            close: OnceSlot::new("onClose"),
            error: OnceSlot::new("onError"),
        }
    }
}

/// Snapshot of every slot's state
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SlotStates {
    pub init: SlotState,
    pub authorize: SlotState,
    pub cancel: SlotState,
    pub close: SlotState,
    pub error: SlotState,
}

/// Lifecycle controller for one checkout session
pub struct Checkout {
    id: SessionId,
    config: SessionConfig,
    env: String,
    resolver: UrlResolver,
    state: Mutex<SessionState>,
    slots: Slots,
    teardown: Arc<Teardown>,
    window: Arc<dyn WindowHost>,
    sink: Arc<dyn DiagnosticSink>,
    guest_auth: Option<GuestAuth>,
    production_domain: String,
    created_at: DateTime<Utc>,
}

impl Checkout {
    pub fn builder(config: SessionConfig) -> CheckoutBuilder {
        CheckoutBuilder::new(config)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Effective environment name
    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the state recorded by `init`
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn slot_states(&self) -> SlotStates {
        SlotStates {
            init: self.slots.init.state(),
            authorize: self.slots.authorize.state(),
            cancel: self.slots.cancel.state(),
            close: self.slots.close.state(),
            error: self.slots.error.state(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.teardown.is_closed()
    }

    /// Await the payment token and work out where to render.
    pub async fn resolve_url(&self) -> Result<ResolvedUrl> {
        let provider = self.config.payment.as_ref().ok_or_else(|| {
            CheckoutError::UrlResolution("no payment token provider configured".into())
        })?;

        let (base, token) = self.resolver.resolve(&self.env, provider.fetch()).await?;
        let url = build_session_url(
            &base,
            &token,
            self.config.commit.unwrap_or(false),
            self.config.locale.as_deref(),
        )?;

        tracing::info!(session_id = %self.id, env = %self.env, url = %url, "resolved checkout url");

        Ok(ResolvedUrl {
            base,
            url,
            kind: PaymentTokenKind::classify(&token),
            token,
        })
    }

    fn actions(&self, transport: TransportActions, default_url: Option<String>) -> Actions {
        Actions::new(
            transport,
            Arc::clone(&self.teardown),
            Arc::clone(&self.window),
            Arc::clone(&self.sink),
            default_url,
        )
    }

    /// Close the surface after a user callback settled, keeping the user's
    /// error ahead of any close error.
    async fn settle(&self, callback: &'static str, result: anyhow::Result<()>) -> Result<()> {
        let closed = self.teardown.close().await;

        match result {
            Err(e) => {
                if let Err(close_err) = closed {
                    tracing::warn!(session_id = %self.id, error = %close_err, "close after failed {} also failed", callback);
                }
                tracing::warn!(session_id = %self.id, error = %e, "{} callback failed", callback);
                Err(CheckoutError::callback(callback, &e))
            }
            Ok(()) => closed,
        }
    }

    fn ignored(&self, slot: &OnceSlot) -> Result<()> {
        tracing::debug!(session_id = %self.id, callback = slot.name(), "callback already fired; ignoring");
        Ok(())
    }

    /// Surface loaded: remember the token and cancel url, then run user init.
    pub async fn init(&self, data: InitData) -> Result<()> {
        let Some(_firing) = self.slots.init.begin() else {
            return self.ignored(&self.slots.init);
        };

        {
            let mut state = self.lock_state();
            state.payment_token = data.payment_token.clone();
            state.cancel_url = data.cancel_url.clone();
        }

        match &self.config.callbacks.init {
            Some(handler) => run_user_callback(|| handler(data))
                .await
                .map_err(|e| CheckoutError::callback("init", &e)),
            None => Ok(()),
        }
    }

    /// Buyer approved the payment.
    pub async fn on_authorize(&self, data: AuthorizeData, transport: TransportActions) -> Result<()> {
        let Some(_firing) = self.slots.authorize.begin() else {
            return self.ignored(&self.slots.authorize);
        };

        let actions = self.actions(transport, data.return_url.clone());

        self.log_return_url(data.return_url.as_deref());
        if let Some(guest_auth) = &self.guest_auth {
            guest_auth.apply(self.window.as_ref(), self.sink.as_ref()).await;
        }

        let result = match &self.config.callbacks.on_authorize {
            Some(handler) => run_user_callback(|| handler(data, actions)).await,
            None => Ok(()),
        };

        self.settle("onAuthorize", result).await
    }

    /// Buyer cancelled inside the surface.
    pub async fn on_cancel(&self, data: CancelData, transport: TransportActions) -> Result<()> {
        let Some(_firing) = self.slots.cancel.begin() else {
            return self.ignored(&self.slots.cancel);
        };

        let actions = self.actions(transport, data.cancel_url.clone());

        let result = match &self.config.callbacks.on_cancel {
            Some(handler) => run_user_callback(|| handler(data, actions)).await,
            None => Ok(()),
        };

        self.settle("onCancel", result).await
    }

    /// Surface closed. An external close with a known token and cancel url is
    /// turned into a cancel.
    pub async fn on_close(&self, reason: CloseReason) -> Result<()> {
        let Some(_firing) = self.slots.close.begin() else {
            return self.ignored(&self.slots.close);
        };

        tracing::info!(session_id = %self.id, reason = %reason, "checkout surface closed");

        let user_result = match &self.config.callbacks.on_close {
            Some(handler) => run_user_callback(|| handler(reason.clone())).await,
            None => Ok(()),
        };

        // Authorize or cancel already took (or is taking) the session down
        let settled_elsewhere = self.slots.authorize.state() != SlotState::Armed
            || self.slots.cancel.state() != SlotState::Armed;

        if self.config.callbacks.has_on_cancel() && reason.is_external() && !settled_elsewhere {
            let target = self.lock_state().cancel_target();
            match target {
                Some((payment_token, cancel_url)) => {
                    self.sink.info(
                        "close_trigger_cancel",
                        serde_json::json!({ "reason": reason.as_str() }),
                    );
                    self.on_cancel(CancelData::new(payment_token, cancel_url), TransportActions::none())
                        .await?;
                }
                None => self.sink.warn(
                    "close_no_token_cancelurl",
                    serde_json::json!({ "reason": reason.as_str() }),
                ),
            }
        }

        user_result.map_err(|e| CheckoutError::callback("onClose", &e))
    }

    /// Transport reported an error; close the surface and notify the host.
    pub async fn on_error(&self, error: impl Into<String>) -> Result<()> {
        let Some(_firing) = self.slots.error.begin() else {
            return self.ignored(&self.slots.error);
        };

        let error = error.into();
        tracing::warn!(session_id = %self.id, error = %error, "checkout error reported");

        let result = match &self.config.callbacks.on_error {
            Some(handler) => run_user_callback(|| handler(error)).await,
            None => Ok(()),
        };

        self.settle("onError", result).await
    }

    fn log_return_url(&self, return_url: Option<&str>) {
        let (Some(return_url), Some(current)) = (return_url, self.window.current_location()) else {
            return;
        };
        log_return_url_domain(self.sink.as_ref(), return_url, &current, &self.production_domain);
    }
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("id", &self.id)
            .field("env", &self.env)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Checkout`]
pub struct CheckoutBuilder {
    config: SessionConfig,
    urls: UrlTable,
    default_env: String,
    surface: Option<Arc<dyn Surface>>,
    window: Option<Arc<dyn WindowHost>>,
    sink: Arc<dyn DiagnosticSink>,
    guest_auth: Option<GuestAuth>,
    id: Option<SessionId>,
}

impl CheckoutBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            urls: UrlTable::default(),
            default_env: DEFAULT_ENV.into(),
            surface: None,
            window: None,
            sink: Arc::new(TracingSink),
            guest_auth: None,
            id: None,
        }
    }

    pub fn urls(mut self, urls: UrlTable) -> Self {
        self.urls = urls;
        self
    }

    pub fn default_env(mut self, env: impl Into<String>) -> Self {
        self.default_env = env.into();
        self
    }

    pub fn surface(mut self, surface: Arc<dyn Surface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn window(mut self, window: Arc<dyn WindowHost>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn guest_auth(mut self, guest_auth: GuestAuth) -> Self {
        self.guest_auth = Some(guest_auth);
        self
    }

    pub fn id(mut self, id: SessionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Validate the configuration and build the controller.
    pub fn build(self) -> Result<Checkout> {
        self.config.validate(&self.urls, &self.default_env)?;

        let surface = self
            .surface
            .ok_or_else(|| CheckoutError::Other("a surface handle is required".into()))?;
        let window = self
            .window
            .ok_or_else(|| CheckoutError::Other("a window host is required".into()))?;

        let env = self.config.environment(&self.default_env).to_string();
        let production_domain = self.urls.production_domain();
        let resolver = UrlResolver::new(self.urls, Arc::clone(&self.sink))
            .with_stage(self.config.stage.clone());
        let id = self.id.unwrap_or_default();

        tracing::debug!(session_id = %id, env = %env, "checkout session created");

        Ok(Checkout {
            id,
            env,
            resolver,
            state: Mutex::new(SessionState::default()),
            slots: Slots::new(),
            teardown: Arc::new(Teardown::new(surface)),
            window,
            sink: self.sink,
            guest_auth: self.guest_auth,
            production_domain,
            created_at: Utc::now(),
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::error::ConfigError;
    use crate::guest_auth::GuestAuthConfig;
    use crate::host::{OutboundHeaders, WindowTarget};
    use crate::lifecycle::Callbacks;
    use crate::resolver::PaymentTokenProvider;
    use crate::style::StyleConfig;
    use crate::testing::{CannedHttp, RecordingSurface, RecordingWindow};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Harness {
        checkout: Checkout,
        surface: Arc<RecordingSurface>,
        window: Arc<RecordingWindow>,
        sink: Arc<MemorySink>,
    }

    fn harness(config: SessionConfig) -> Harness {
        harness_with(config, RecordingSurface::new(), RecordingWindow::at("https://shop.com/cart"))
    }

    fn harness_with(config: SessionConfig, surface: RecordingSurface, window: RecordingWindow) -> Harness {
        let surface = Arc::new(surface);
        let window = Arc::new(window);
        let sink = Arc::new(MemorySink::new());
        let checkout = Checkout::builder(config)
            .surface(surface.clone())
            .window(window.clone())
            .sink(sink.clone())
            .build()
            .unwrap();
        Harness {
            checkout,
            surface,
            window,
            sink,
        }
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn authorize_data() -> AuthorizeData {
        AuthorizeData {
            payment_token: Some("EC-1".into()),
            return_url: Some("https://shop.com/return".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_rejects_bad_style() {
        let config = SessionConfig::new().style(StyleConfig::fixed_installments(0));
        let err = Checkout::builder(config)
            .surface(Arc::new(RecordingSurface::new()))
            .window(Arc::new(RecordingWindow::at("https://shop.com")))
            .build()
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Config(ConfigError::TermOutOfRange(_))));
    }

    #[tokio::test]
    async fn test_resolve_url_with_query() {
        let config = SessionConfig::new()
            .env("sandbox")
            .commit(true)
            .payment(PaymentTokenProvider::ready("EC-123"));
        let h = harness(config);

        let resolved = h.checkout.resolve_url().await.unwrap();
        assert_eq!(resolved.base, "https://www.sandbox.paypal.com/checkoutnow");
        assert_eq!(
            resolved.url,
            "https://www.sandbox.paypal.com/checkoutnow?token=EC-123&useraction=commit"
        );
        assert_eq!(resolved.kind, PaymentTokenKind::ExpressCheckout);
        assert!(h.sink.contains("url_checkout"));
    }

    #[tokio::test]
    async fn test_resolve_url_without_provider() {
        let h = harness(SessionConfig::new());
        assert!(matches!(
            h.checkout.resolve_url().await,
            Err(CheckoutError::UrlResolution(_))
        ));
    }

    #[tokio::test]
    async fn test_init_records_state_once() {
        let calls = counter();
        let seen = calls.clone();
        let callbacks = Callbacks::new().init(move |_| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        let data: InitData = serde_json::from_value(json!({
            "paymentToken": "T1",
            "cancelUrl": "https://x/cancel"
        }))
        .unwrap();
        h.checkout.init(data).await.unwrap();
        h.checkout
            .init(InitData {
                payment_token: Some("T2".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.checkout.state().payment_token.as_deref(), Some("T1"));
        assert_eq!(h.checkout.state().cancel_url.as_deref(), Some("https://x/cancel"));
        assert_eq!(h.checkout.slot_states().init, SlotState::Fired);
    }

    #[tokio::test]
    async fn test_authorize_fires_once_and_closes() {
        let calls = counter();
        let seen = calls.clone();
        let callbacks = Callbacks::new().on_authorize(move |_, _| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout.on_authorize(authorize_data(), TransportActions::none()).await.unwrap();
        h.checkout.on_authorize(authorize_data(), TransportActions::none()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.surface.closes(), 1);
        assert!(h.checkout.is_closed());
    }

    #[tokio::test]
    async fn test_authorize_failure_closes_before_propagating() {
        let surface = Arc::new(RecordingSurface::new());
        let observed = surface.clone();
        let closes_seen_by_callback = counter();
        let record = closes_seen_by_callback.clone();
        let callbacks = Callbacks::new().on_authorize(move |_, _| {
            let observed = observed.clone();
            let record = record.clone();
            async move {
                record.store(observed.closes(), Ordering::SeqCst);
                anyhow::bail!("capture failed")
            }
        });

        let sink = Arc::new(MemorySink::new());
        let checkout = Checkout::builder(SessionConfig::new().callbacks(callbacks))
            .surface(surface.clone())
            .window(Arc::new(RecordingWindow::at("https://shop.com/cart")))
            .sink(sink)
            .build()
            .unwrap();

        let err = checkout
            .on_authorize(authorize_data(), TransportActions::none())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Callback { callback: "onAuthorize", .. }));
        assert!(err.to_string().contains("capture failed"));
        assert_eq!(closes_seen_by_callback.load(Ordering::SeqCst), 0);
        assert_eq!(surface.closes(), 1);
        assert_eq!(checkout.slot_states().authorize, SlotState::Fired);

        // Still spent after a failure
        checkout.on_authorize(authorize_data(), TransportActions::none()).await.unwrap();
        assert_eq!(surface.closes(), 1);
    }

    #[tokio::test]
    async fn test_authorize_panic_still_closes() {
        let callbacks = Callbacks::new().on_authorize(|_, _| async {
            let fail = true;
            if fail {
                panic!("handler bug");
            }
            Ok(())
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        let err = h
            .checkout
            .on_authorize(authorize_data(), TransportActions::none())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("handler bug"));
        assert_eq!(h.surface.closes(), 1);
    }

    #[tokio::test]
    async fn test_user_close_inside_authorize_closes_once() {
        let transport_closes = counter();
        let seen = transport_closes.clone();
        let transport = TransportActions::with_close(move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let callbacks = Callbacks::new().on_authorize(|_, actions| async move {
            actions.close().await?;
            Ok(())
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout.on_authorize(authorize_data(), transport).await.unwrap();

        assert_eq!(transport_closes.load(Ordering::SeqCst), 1);
        assert_eq!(h.surface.closes(), 1);
    }

    #[tokio::test]
    async fn test_authorize_close_failure_surfaces() {
        let h = harness_with(
            SessionConfig::new(),
            RecordingSurface::failing(),
            RecordingWindow::at("https://shop.com/cart"),
        );

        let err = h
            .checkout
            .on_authorize(authorize_data(), TransportActions::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Surface(_)));
    }

    #[tokio::test]
    async fn test_authorize_logs_return_url_domain_first() {
        let sink = Arc::new(MemorySink::new());
        let tags_seen = Arc::new(Mutex::new(Vec::new()));
        let (view, record) = (sink.clone(), tags_seen.clone());
        let callbacks = Callbacks::new().on_authorize(move |_, _| {
            let (view, record) = (view.clone(), record.clone());
            async move {
                *record.lock().unwrap() = view.tags();
                Ok(())
            }
        });
        let checkout = Checkout::builder(SessionConfig::new().callbacks(callbacks))
            .surface(Arc::new(RecordingSurface::new()))
            .window(Arc::new(RecordingWindow::at("https://shop.com/cart")))
            .sink(sink)
            .build()
            .unwrap();

        checkout.on_authorize(authorize_data(), TransportActions::none()).await.unwrap();

        assert_eq!(
            *tags_seen.lock().unwrap(),
            vec!["return_url_domain_match", "return_url_host_match", "return_url_tld_match"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorize_redirect_defaults_to_return_url() {
        let callbacks = Callbacks::new().on_authorize(|_, actions| async move {
            actions.redirect(None, None).await?;
            Ok(())
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            h.checkout.on_authorize(authorize_data(), TransportActions::none()),
        )
        .await;

        // Full page navigation: the chain is left pending on purpose
        assert!(outcome.is_err());
        assert_eq!(
            h.window.navigations(),
            vec![(WindowTarget::Top, "https://shop.com/return".to_string())]
        );
        assert_eq!(h.surface.closes(), 1);
        assert_eq!(h.checkout.slot_states().authorize, SlotState::Fired);
    }

    #[tokio::test]
    async fn test_guest_auth_runs_before_user_callback() {
        let headers = OutboundHeaders::new();
        let seen_header = Arc::new(Mutex::new(None));
        let record = seen_header.clone();
        let header_view = headers.clone();
        let callbacks = Callbacks::new().on_authorize(move |_, _| {
            let record = record.clone();
            let header_view = header_view.clone();
            async move {
                *record.lock().unwrap() = header_view.get("x-paypal-internal-euat");
                Ok(())
            }
        });

        let http = Arc::new(CannedHttp::ok(json!({ "data": { "access_token": "A21" } })));
        let window = RecordingWindow::at("https://www.paypal.com/checkoutnow")
            .with_session_window("https://www.paypal.com/webapps/xoonboarding");
        let checkout = Checkout::builder(SessionConfig::new().callbacks(callbacks))
            .surface(Arc::new(RecordingSurface::new()))
            .window(Arc::new(window))
            .sink(Arc::new(MemorySink::new()))
            .guest_auth(GuestAuth::new(GuestAuthConfig::default(), http, headers))
            .build()
            .unwrap();

        checkout.on_authorize(authorize_data(), TransportActions::none()).await.unwrap();

        assert_eq!(seen_header.lock().unwrap().as_deref(), Some("A21"));
    }

    #[tokio::test]
    async fn test_guest_auth_failure_does_not_block() {
        let calls = counter();
        let seen = calls.clone();
        let callbacks = Callbacks::new().on_authorize(move |_, _| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let window = RecordingWindow::at("https://www.paypal.com/checkoutnow")
            .with_session_window("https://www.paypal.com/webapps/xoonboarding");
        let checkout = Checkout::builder(SessionConfig::new().callbacks(callbacks))
            .surface(Arc::new(RecordingSurface::new()))
            .window(Arc::new(window))
            .sink(Arc::new(MemorySink::new()))
            .guest_auth(GuestAuth::new(
                GuestAuthConfig::default(),
                Arc::new(CannedHttp::failing()),
                OutboundHeaders::new(),
            ))
            .build()
            .unwrap();

        checkout.on_authorize(authorize_data(), TransportActions::none()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_fires_once_with_cancel_url_default() {
        let urls = Arc::new(Mutex::new(Vec::new()));
        let record = urls.clone();
        let callbacks = Callbacks::new().on_cancel(move |_, actions| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(actions.default_url().map(String::from));
                Ok(())
            }
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        let data = CancelData::new("EC-1", "https://shop.com/cancel");
        h.checkout.on_cancel(data.clone(), TransportActions::none()).await.unwrap();
        h.checkout.on_cancel(data, TransportActions::none()).await.unwrap();

        assert_eq!(
            *urls.lock().unwrap(),
            vec![Some("https://shop.com/cancel".to_string())]
        );
        assert_eq!(h.surface.closes(), 1);
        assert!(h.sink.tags().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_failure_closes_first() {
        let callbacks = Callbacks::new().on_cancel(|_, _| async { anyhow::bail!("nope") });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        let err = h
            .checkout
            .on_cancel(CancelData::default(), TransportActions::none())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Callback { callback: "onCancel", .. }));
        assert_eq!(h.surface.closes(), 1);
    }

    fn cancel_recorder() -> (Callbacks, Arc<Mutex<Vec<CancelData>>>) {
        let cancels = Arc::new(Mutex::new(Vec::new()));
        let record = cancels.clone();
        let callbacks = Callbacks::new().on_cancel(move |data, _| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(data);
                Ok(())
            }
        });
        (callbacks, cancels)
    }

    #[tokio::test]
    async fn test_user_close_triggers_synthetic_cancel() {
        let (callbacks, cancels) = cancel_recorder();
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                cancel_url: Some("https://x/cancel".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.checkout.on_close(CloseReason::parse("user_closed")).await.unwrap();

        assert_eq!(*cancels.lock().unwrap(), vec![CancelData::new("T1", "https://x/cancel")]);
        assert!(h.sink.contains("close_trigger_cancel"));
        assert_eq!(h.surface.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_without_state_does_not_cancel() {
        let (callbacks, cancels) = cancel_recorder();
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.checkout.on_close(CloseReason::CloseDetected).await.unwrap();

        assert!(cancels.lock().unwrap().is_empty());
        assert!(h.sink.contains("close_no_token_cancelurl"));
    }

    #[tokio::test]
    async fn test_internal_close_reason_does_not_cancel() {
        let (callbacks, cancels) = cancel_recorder();
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                cancel_url: Some("https://x/cancel".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.checkout.on_close(CloseReason::ParentCall).await.unwrap();

        assert!(cancels.lock().unwrap().is_empty());
        assert!(h.sink.tags().is_empty());
    }

    #[tokio::test]
    async fn test_close_after_cancel_does_not_cancel_twice() {
        let (callbacks, cancels) = cancel_recorder();
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                cancel_url: Some("https://x/cancel".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.checkout
            .on_cancel(CancelData::new("T1", "https://x/cancel"), TransportActions::none())
            .await
            .unwrap();
        h.checkout.on_close(CloseReason::UserClosed).await.unwrap();

        assert_eq!(cancels.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_close_after_authorize_does_not_cancel() {
        let (callbacks, cancels) = cancel_recorder();
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                cancel_url: Some("https://x/cancel".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.checkout
            .on_authorize(authorize_data(), TransportActions::none())
            .await
            .unwrap();
        h.checkout.on_close(CloseReason::CloseDetected).await.unwrap();

        assert!(cancels.lock().unwrap().is_empty());
        assert!(!h.sink.contains("close_trigger_cancel"));
        assert_eq!(h.checkout.slot_states().cancel, SlotState::Armed);
    }

    #[tokio::test]
    async fn test_close_while_authorizing_does_not_cancel() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Arc::new(Mutex::new(Some(release_rx)));
        let (callbacks, cancels) = cancel_recorder();
        let callbacks = callbacks.on_authorize(move |_, _| {
            let rx = release_rx.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok(())
            }
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                cancel_url: Some("https://x/cancel".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let authorize = h.checkout.on_authorize(authorize_data(), TransportActions::none());
        let close = async {
            assert_eq!(h.checkout.slot_states().authorize, SlotState::Firing);
            h.checkout.on_close(CloseReason::UserClosed).await.unwrap();
            release_tx.send(()).unwrap();
        };
        let (authorized, ()) = futures::join!(authorize, close);

        authorized.unwrap();
        assert!(cancels.lock().unwrap().is_empty());
        assert_eq!(h.surface.closes(), 1);
    }

    #[tokio::test]
    async fn test_close_without_on_cancel_only_runs_user_close() {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let record = reasons.clone();
        let callbacks = Callbacks::new().on_close(move |reason| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(reason);
                Ok(())
            }
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout
            .init(InitData {
                payment_token: Some("T1".into()),
                cancel_url: Some("https://x/cancel".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.checkout.on_close(CloseReason::UserClosed).await.unwrap();
        h.checkout.on_close(CloseReason::UserClosed).await.unwrap();

        assert_eq!(*reasons.lock().unwrap(), vec![CloseReason::UserClosed]);
        assert!(h.sink.tags().is_empty());
    }

    #[tokio::test]
    async fn test_on_close_defaults_to_noop() {
        let h = harness(SessionConfig::new());
        h.checkout.on_close(CloseReason::UserClosed).await.unwrap();
        assert_eq!(h.checkout.slot_states().close, SlotState::Fired);
    }

    #[tokio::test]
    async fn test_on_error_closes_and_fires_once() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let record = errors.clone();
        let callbacks = Callbacks::new().on_error(move |err| {
            let record = record.clone();
            async move {
                record.lock().unwrap().push(err);
                Ok(())
            }
        });
        let h = harness(SessionConfig::new().callbacks(callbacks));

        h.checkout.on_error("popup blocked").await.unwrap();
        h.checkout.on_error("again").await.unwrap();

        assert_eq!(*errors.lock().unwrap(), vec!["popup blocked".to_string()]);
        assert_eq!(h.surface.closes(), 1);
    }
}
