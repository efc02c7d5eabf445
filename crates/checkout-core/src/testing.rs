//! In-memory collaborators shared by the unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::diagnostics::PageLocation;
use crate::host::{HttpClient, Surface, WindowHost, WindowTarget};

/// Surface that counts closes
#[derive(Default)]
pub struct RecordingSurface {
    closes: AtomicUsize,
    fail: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            closes: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("surface already destroyed");
        }
        Ok(())
    }
}

/// Window host that records navigations
pub struct RecordingWindow {
    current: String,
    session: Option<String>,
    navigations: Mutex<Vec<(WindowTarget, String)>>,
}

impl RecordingWindow {
    pub fn at(current: &str) -> Self {
        Self {
            current: current.to_string(),
            session: None,
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_session_window(mut self, href: &str) -> Self {
        self.session = Some(href.to_string());
        self
    }

    pub fn navigations(&self) -> Vec<(WindowTarget, String)> {
        self.navigations.lock().unwrap().clone()
    }
}

impl WindowHost for RecordingWindow {
    fn current_location(&self) -> Option<PageLocation> {
        PageLocation::parse(&self.current)
    }

    fn session_window_href(&self) -> Option<String> {
        self.session.clone()
    }

    fn navigate(&self, target: &WindowTarget, url: &str) -> anyhow::Result<()> {
        self.navigations
            .lock()
            .unwrap()
            .push((target.clone(), url.to_string()));
        Ok(())
    }
}

/// HTTP client returning a canned response
pub struct CannedHttp {
    response: Option<Value>,
    calls: AtomicUsize,
}

impl CannedHttp {
    pub fn ok(response: Value) -> Self {
        Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for CannedHttp {
    async fn post_json(&self, _url: &str, _body: Value) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}
