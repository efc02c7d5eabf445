//! Session Configuration and State
//!
//! What the host page configures a checkout with, and the little state the
//! controller keeps between `init` and `on_close`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::lifecycle::Callbacks;
use crate::resolver::{PaymentTokenProvider, UrlTable, DEFAULT_ENV};
use crate::style::{validate_style, StyleConfig};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Values recorded by `init` and read by the implicit-cancel path
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub payment_token: Option<String>,
    pub cancel_url: Option<String>,
}

impl SessionState {
    /// Both values needed to synthesize a cancel, if present
    pub fn cancel_target(&self) -> Option<(String, String)> {
        match (&self.payment_token, &self.cancel_url) {
            (Some(token), Some(url)) => Some((token.clone(), url.clone())),
            _ => None,
        }
    }
}

/// Host page configuration for one checkout
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// Environment name; falls back to the process default
    pub env: Option<String>,

    /// Stage host name for the `stage` environment
    pub stage: Option<String>,

    /// Locale, e.g. `en_US`
    pub locale: Option<String>,

    /// Client id per environment
    pub client: HashMap<String, String>,

    /// Deferred payment token
    pub payment: Option<PaymentTokenProvider>,

    /// Show "Pay Now" instead of "Continue"
    pub commit: Option<bool>,

    /// Button / installment style
    pub style: StyleConfig,

    /// Lifecycle callbacks
    pub callbacks: Callbacks,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn client(mut self, env: impl Into<String>, client_id: impl Into<String>) -> Self {
        self.client.insert(env.into(), client_id.into());
        self
    }

    pub fn payment(mut self, provider: PaymentTokenProvider) -> Self {
        self.payment = Some(provider);
        self
    }

    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = Some(commit);
        self
    }

    pub fn style(mut self, style: StyleConfig) -> Self {
        self.style = style;
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Effective environment name
    pub fn environment<'a>(&'a self, default_env: &'a str) -> &'a str {
        self.env.as_deref().unwrap_or(default_env)
    }

    /// Client id registered for the effective environment
    pub fn client_id(&self, default_env: &str) -> Option<&str> {
        self.client
            .get(self.environment(default_env))
            .map(String::as_str)
    }

    /// Validate everything that can be checked before any surface is shown
    pub fn validate(&self, urls: &UrlTable, default_env: &str) -> Result<()> {
        validate_style(Some(&self.style))?;

        // Fails with UnknownEnvironment before any token is requested
        urls.get(self.environment(default_env), self.stage.as_deref())?;

        Ok(())
    }
}
