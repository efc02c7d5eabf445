//! Host Collaborators
//!
//! Seams to everything the controller does not own: the transport's surface
//! handle, the page windows, and the HTTP client used by the guest flow.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::diagnostics::PageLocation;

/// Handle to the remote surface owned by the transport layer
#[async_trait]
pub trait Surface: Send + Sync {
    /// Close the popup / lightbox / iframe
    async fn close(&self) -> anyhow::Result<()>;
}

/// Window a redirect is aimed at
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTarget {
    /// Top-level page window
    #[default]
    Top,
    /// The window the controller runs in
    Current,
    /// Some other named window (a new tab, an opener, ...)
    Named(String),
}

impl WindowTarget {
    /// Whether navigating this target unloads the hosting page
    pub fn is_hosting_page(&self) -> bool {
        matches!(self, WindowTarget::Top | WindowTarget::Current)
    }
}

/// Page windows as seen by the controller
pub trait WindowHost: Send + Sync {
    /// Location of the page the controller runs in
    fn current_location(&self) -> Option<PageLocation>;

    /// Location of the session-scoped window, if one is open
    fn session_window_href(&self) -> Option<String>;

    /// Point a window at a URL
    fn navigate(&self, target: &WindowTarget, url: &str) -> anyhow::Result<()>;
}

/// HTTP collaborator for the guest token exchange
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST a JSON body and return the decoded JSON response
    async fn post_json(&self, url: &str, body: Value) -> anyhow::Result<Value>;
}

/// Headers attached to every subsequent outbound request
#[derive(Clone, Debug, Default)]
pub struct OutboundHeaders {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl OutboundHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

type CloseFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Actions handed to a callback by the transport layer
#[derive(Clone, Default)]
pub struct TransportActions {
    close: Option<Arc<CloseFn>>,
}

impl TransportActions {
    /// No transport-owned actions
    pub fn none() -> Self {
        Self::default()
    }

    /// Transport supplies its own close
    pub fn with_close<F, Fut>(close: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            close: Some(Arc::new(move || Box::pin(close()))),
        }
    }

    pub(crate) async fn close(&self) -> anyhow::Result<()> {
        match &self.close {
            Some(close) => close().await,
            None => Ok(()),
        }
    }

    pub fn has_close(&self) -> bool {
        self.close.is_some()
    }
}

impl std::fmt::Debug for TransportActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportActions")
            .field("close", &self.close.is_some())
            .finish()
    }
}
