//! Action Set
//!
//! The `{close, redirect}` pair handed to authorize and cancel callbacks.
//! A fresh value is built for every callback firing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::diagnostics::DiagnosticSink;
use crate::error::{CheckoutError, Result};
use crate::host::{Surface, TransportActions, WindowHost, WindowTarget};

/// Delay before a redirect navigates, so the surface can start closing first
pub const REDIRECT_TICK: Duration = Duration::from_millis(1);

/// Session teardown: closes the surface exactly once.
///
/// Concurrent and repeated callers all observe the outcome of the first close.
pub struct Teardown {
    surface: Arc<dyn Surface>,
    outcome: OnceCell<std::result::Result<(), String>>,
}

impl Teardown {
    pub fn new(surface: Arc<dyn Surface>) -> Self {
        Self {
            surface,
            outcome: OnceCell::new(),
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.outcome
            .get_or_init(|| async {
                tracing::debug!("closing checkout surface");
                self.surface.close().await.map_err(|e| format!("{:#}", e))
            })
            .await
            .clone()
            .map_err(CheckoutError::Surface)
    }

    pub fn is_closed(&self) -> bool {
        self.outcome.initialized()
    }
}

/// Whether navigating to `url` unloads the current document.
///
/// Hash-only changes on the same document keep the page alive.
pub fn url_will_redirect_page(url: &str, current_href: Option<&str>) -> bool {
    if !url.contains('#') {
        return true;
    }

    if url.starts_with('#') {
        return false;
    }

    let without_hash = |s: &str| s.split('#').next().unwrap_or_default().to_string();
    match current_href {
        Some(current) => without_hash(url) != without_hash(current),
        None => true,
    }
}

/// Close and redirect helpers for one callback invocation
#[derive(Clone)]
pub struct Actions {
    transport: TransportActions,
    teardown: Arc<Teardown>,
    window: Arc<dyn WindowHost>,
    sink: Arc<dyn DiagnosticSink>,
    default_url: Option<String>,
}

impl Actions {
    pub(crate) fn new(
        transport: TransportActions,
        teardown: Arc<Teardown>,
        window: Arc<dyn WindowHost>,
        sink: Arc<dyn DiagnosticSink>,
        default_url: Option<String>,
    ) -> Self {
        Self {
            transport,
            teardown,
            window,
            sink,
            default_url,
        }
    }

    /// URL `redirect` falls back to
    pub fn default_url(&self) -> Option<&str> {
        self.default_url.as_deref()
    }

    /// Run the transport's own close (if any), then tear the session down
    pub async fn close(&self) -> Result<()> {
        self.transport
            .close()
            .await
            .map_err(|e| CheckoutError::Surface(format!("{:#}", e)))?;
        self.teardown.close().await
    }

    /// Navigate `target` (default: top window) to `url` (default: the
    /// lifecycle URL) and close the surface.
    ///
    /// When the navigation unloads the hosting page this never completes.
    pub async fn redirect(&self, target: Option<WindowTarget>, url: Option<String>) -> Result<()> {
        let url = url
            .or_else(|| self.default_url.clone())
            .ok_or_else(|| CheckoutError::Navigation("no redirect url available".into()))?;
        let target = target.unwrap_or_default();

        let current_href = self.window.current_location().map(|loc| loc.href);
        let unloads = target.is_hosting_page() && url_will_redirect_page(&url, current_href.as_deref());

        self.sink.info("redirect", serde_json::json!({ "url": url }));

        let navigate = async {
            tokio::time::sleep(REDIRECT_TICK).await;
            self.window.navigate(&target, &url)
        };
        let (navigated, closed) = futures::join!(navigate, self.close());

        navigated.map_err(|e| CheckoutError::Navigation(format!("{:#}", e)))?;
        closed?;

        if unloads {
            futures::future::pending::<()>().await;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actions")
            .field("transport", &self.transport)
            .field("default_url", &self.default_url)
            .finish_non_exhaustive()
    }
}
