//! Guest Auth Header
//!
//! When checkout runs inside the embedded guest flow, an access token is
//! exchanged and attached to later outbound calls. Everything here is best
//! effort: failures are logged at debug level and dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::diagnostics::DiagnosticSink;
use crate::host::{HttpClient, OutboundHeaders, WindowHost};

/// Upper bound on how long the exchange may hold up `on_authorize`
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Guest flow detection and exchange settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestAuthConfig {
    /// Substring looked for in the current page location
    pub current_page_marker: String,

    /// Substring looked for in the session window location
    pub session_window_marker: String,

    /// Token exchange endpoint
    pub exchange_url: String,

    /// Header the token is sent under
    pub header_name: String,
}

impl Default for GuestAuthConfig {
    fn default() -> Self {
        Self {
            current_page_marker: "paypal.com".into(),
            session_window_marker: "/webapps/xoonboarding".into(),
            exchange_url: "/webapps/hermes/api/auth".into(),
            header_name: "x-paypal-internal-euat".into(),
        }
    }
}

/// Best-effort guest token exchange
pub struct GuestAuth {
    config: GuestAuthConfig,
    http: Arc<dyn HttpClient>,
    headers: OutboundHeaders,
}

impl GuestAuth {
    pub fn new(config: GuestAuthConfig, http: Arc<dyn HttpClient>, headers: OutboundHeaders) -> Self {
        Self {
            config,
            http,
            headers,
        }
    }

    /// Both checks must hit. They look at different windows and stay separate.
    pub fn is_guest_flow(&self, window: &dyn WindowHost) -> bool {
        let current_hit = window
            .current_location()
            .is_some_and(|loc| loc.href.contains(&self.config.current_page_marker));

        let session_hit = window
            .session_window_href()
            .is_some_and(|href| href.contains(&self.config.session_window_marker));

        current_hit && session_hit
    }

    /// Exchange and install the header if this is a guest flow.
    pub async fn apply(&self, window: &dyn WindowHost, sink: &dyn DiagnosticSink) {
        if !self.is_guest_flow(window) {
            return;
        }

        match tokio::time::timeout(EXCHANGE_TIMEOUT, self.exchange()).await {
            Ok(Ok(token)) => {
                self.headers.set(self.config.header_name.clone(), token);
                sink.info(
                    "guest_auth_header_set",
                    serde_json::json!({ "header": self.config.header_name }),
                );
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "guest auth exchange failed"),
            Err(_) => tracing::debug!("guest auth exchange timed out"),
        }
    }

    async fn exchange(&self) -> anyhow::Result<String> {
        let response = self
            .http
            .post_json(&self.config.exchange_url, serde_json::json!({}))
            .await?;

        response
            .pointer("/data/access_token")
            .and_then(|v| v.as_str())
            .filter(|token| !token.is_empty())
            .map(String::from)
            .ok_or_else(|| anyhow::anyhow!("exchange response has no access token"))
    }
}
