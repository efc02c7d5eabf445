//! Runtime Settings
//!
//! Environment-driven configuration shared by the runtime collaborators.

use std::time::Duration;

use checkout_core::resolver::DEFAULT_ENV;
use checkout_core::GuestAuthConfig;

/// Runtime configuration
#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    /// Environment used when a session does not name one
    pub default_env: String,

    /// Stage host name for the `stage` environment
    pub stage: Option<String>,

    /// Default locale for sessions
    pub locale: Option<String>,

    /// Base URL relative HTTP paths are joined onto
    pub api_base: String,

    /// Timeout for outbound HTTP calls
    pub http_timeout: Duration,

    /// Guest flow token exchange settings
    pub guest_auth: GuestAuthConfig,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_env: DEFAULT_ENV.into(),
            stage: None,
            locale: None,
            api_base: "https://www.paypal.com".into(),
            http_timeout: Duration::from_secs(10),
            guest_auth: GuestAuthConfig::default(),
        }
    }
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, .env map, test fixture)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let http_timeout = lookup("CHECKOUT_HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        let mut guest_auth = defaults.guest_auth;
        if let Some(url) = lookup("CHECKOUT_GUEST_AUTH_URL") {
            guest_auth.exchange_url = url;
        }

        Self {
            default_env: lookup("CHECKOUT_ENV").unwrap_or(defaults.default_env),
            stage: lookup("CHECKOUT_STAGE").filter(|s| !s.is_empty()),
            locale: lookup("CHECKOUT_LOCALE").filter(|s| !s.is_empty()),
            api_base: lookup("CHECKOUT_API_BASE").unwrap_or(defaults.api_base),
            http_timeout,
            guest_auth,
        }
    }
}
