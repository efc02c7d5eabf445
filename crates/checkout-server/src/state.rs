//! Application State

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

use checkout_core::{
    Checkout, HttpClient, OutboundHeaders, RenderContextToggle, ResolvedUrl, SlotState,
};
use checkout_runtime::{HeadlessSurface, HeadlessWindow, RuntimeSettings};

/// Something the host-side callbacks observed
#[derive(Clone, Debug, Serialize)]
pub struct HostEvent {
    pub callback: &'static str,
    pub data: Value,
}

/// Events recorded by the host-side callbacks of one session
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<HostEvent>>>,
}

impl EventLog {
    pub fn push(&self, callback: &'static str, data: Value) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(HostEvent { callback, data });
    }

    pub fn snapshot(&self) -> Vec<HostEvent> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A checkout session hosted by this server
pub struct HostedSession {
    pub checkout: Checkout,
    pub resolved: ResolvedUrl,
    pub window: Arc<HeadlessWindow>,
    pub surface: Arc<HeadlessSurface>,
    pub events: EventLog,
}

impl HostedSession {
    /// Surface torn down or close reported: no further event can change it
    pub fn is_finished(&self) -> bool {
        self.surface.is_closed() || self.checkout.slot_states().close == SlotState::Fired
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Runtime settings loaded at startup
    pub settings: Arc<RuntimeSettings>,

    /// Live sessions by id
    pub sessions: Arc<RwLock<HashMap<String, Arc<HostedSession>>>>,

    /// Render context override (process-wide)
    pub render_context: &'static RenderContextToggle,

    /// Headers installed by the guest token exchange
    pub headers: OutboundHeaders,

    /// HTTP client for the guest token exchange
    pub http: Arc<dyn HttpClient>,
}
