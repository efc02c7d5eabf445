//! Headless Host
//!
//! Window and surface implementations that keep everything in memory. Used
//! by the server harness, where there is no real browser behind a session.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use checkout_core::{url_will_redirect_page, PageLocation, Surface, WindowHost, WindowTarget};

/// A recorded navigation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub target: WindowTarget,
    pub url: String,
}

/// In-memory window host
#[derive(Debug)]
pub struct HeadlessWindow {
    current: RwLock<String>,
    session: RwLock<Option<String>>,
    navigations: Mutex<Vec<Navigation>>,
}

impl HeadlessWindow {
    pub fn new(current_href: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(current_href.into()),
            session: RwLock::new(None),
            navigations: Mutex::new(Vec::new()),
        }
    }

    /// Point the session-scoped window somewhere
    pub fn set_session_window(&self, href: Option<String>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = href;
    }

    pub fn current_href(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn navigations(&self) -> Vec<Navigation> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WindowHost for HeadlessWindow {
    fn current_location(&self) -> Option<PageLocation> {
        PageLocation::parse(&self.current_href())
    }

    fn session_window_href(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, target: &WindowTarget, url: &str) -> anyhow::Result<()> {
        tracing::info!(target_window = ?target, url = %url, "navigate");

        if target.is_hosting_page() && url_will_redirect_page(url, Some(&self.current_href())) {
            *self.current.write().unwrap_or_else(PoisonError::into_inner) = url.to_string();
        }

        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Navigation {
                target: target.clone(),
                url: url.to_string(),
            });
        Ok(())
    }
}

/// Surface that only records that it was closed
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    closes: AtomicUsize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) > 0
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Surface for HeadlessSurface {
    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("headless surface closed");
        Ok(())
    }
}
