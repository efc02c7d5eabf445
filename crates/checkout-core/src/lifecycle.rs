//! Lifecycle Callbacks
//!
//! User-supplied callbacks, the data the transport passes them, and the
//! once-guard each callback slot is wrapped in.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use crate::actions::Actions;

/// State of one callback slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Not invoked yet
    Armed,
    /// First invocation in progress
    Firing,
    /// First invocation settled; later invocations are ignored
    Fired,
}

/// Once-guard for a callback slot
#[derive(Debug)]
pub struct OnceSlot {
    name: &'static str,
    state: Mutex<SlotState>,
}

impl OnceSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SlotState::Armed),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> SlotState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Armed -> Firing`. Returns `None` if the slot was already used.
    ///
    /// The guard moves the slot to `Fired` when dropped, so the slot is
    /// spent even if the body fails, panics or is abandoned mid-flight.
    pub fn begin(&self) -> Option<FiringGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SlotState::Armed {
            return None;
        }
        *state = SlotState::Firing;
        Some(FiringGuard { slot: self })
    }
}

/// Held while a slot is `Firing`
#[derive(Debug)]
pub struct FiringGuard<'a> {
    slot: &'a OnceSlot,
}

impl Drop for FiringGuard<'_> {
    fn drop(&mut self) {
        *self.slot.state.lock().unwrap_or_else(PoisonError::into_inner) = SlotState::Fired;
    }
}

/// Why the surface closed
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ParentCall,
    ChildCall,
    CloseDetected,
    UserClosed,
    ParentCloseDetected,
    #[serde(untagged)]
    Other(String),
}

impl CloseReason {
    /// Closed from outside the authorize/cancel paths
    pub fn is_external(&self) -> bool {
        matches!(self, CloseReason::CloseDetected | CloseReason::UserClosed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CloseReason::ParentCall => "parent_call",
            CloseReason::ChildCall => "child_call",
            CloseReason::CloseDetected => "close_detected",
            CloseReason::UserClosed => "user_closed",
            CloseReason::ParentCloseDetected => "parent_close_detected",
            CloseReason::Other(reason) => reason,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "parent_call" => CloseReason::ParentCall,
            "child_call" => CloseReason::ChildCall,
            "close_detected" => CloseReason::CloseDetected,
            "user_closed" => CloseReason::UserClosed,
            "parent_close_detected" => CloseReason::ParentCloseDetected,
            other => CloseReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passed to `init` when the remote surface has loaded
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    #[serde(default)]
    pub payment_token: Option<String>,

    #[serde(default)]
    pub cancel_url: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Passed to `on_authorize` once the buyer approved
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeData {
    #[serde(default)]
    pub payment_token: Option<String>,

    #[serde(default, rename = "payerID")]
    pub payer_id: Option<String>,

    #[serde(default, rename = "paymentID")]
    pub payment_id: Option<String>,

    #[serde(default)]
    pub return_url: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Passed to `on_cancel`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelData {
    #[serde(default)]
    pub payment_token: Option<String>,

    #[serde(default)]
    pub cancel_url: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl CancelData {
    pub fn new(payment_token: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            payment_token: Some(payment_token.into()),
            cancel_url: Some(cancel_url.into()),
            extra: HashMap::new(),
        }
    }
}

/// What every user callback returns
pub type CallbackFuture = BoxFuture<'static, anyhow::Result<()>>;

pub type InitHandler = Arc<dyn Fn(InitData) -> CallbackFuture + Send + Sync>;
pub type AuthorizeHandler = Arc<dyn Fn(AuthorizeData, Actions) -> CallbackFuture + Send + Sync>;
pub type CancelHandler = Arc<dyn Fn(CancelData, Actions) -> CallbackFuture + Send + Sync>;
pub type CloseHandler = Arc<dyn Fn(CloseReason) -> CallbackFuture + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(String) -> CallbackFuture + Send + Sync>;

/// User-supplied lifecycle callbacks
#[derive(Clone, Default)]
pub struct Callbacks {
    pub(crate) init: Option<InitHandler>,
    pub(crate) on_authorize: Option<AuthorizeHandler>,
    pub(crate) on_cancel: Option<CancelHandler>,
    pub(crate) on_close: Option<CloseHandler>,
    pub(crate) on_error: Option<ErrorHandler>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(InitData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |data| Box::pin(f(data))));
        self
    }

    pub fn on_authorize<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AuthorizeData, Actions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_authorize = Some(Arc::new(move |data, actions| Box::pin(f(data, actions))));
        self
    }

    pub fn on_cancel<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancelData, Actions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_cancel = Some(Arc::new(move |data, actions| Box::pin(f(data, actions))));
        self
    }

    pub fn on_close<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CloseReason) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_close = Some(Arc::new(move |reason| Box::pin(f(reason))));
        self
    }

    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |err| Box::pin(f(err))));
        self
    }

    pub fn has_on_cancel(&self) -> bool {
        self.on_cancel.is_some()
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("init", &self.init.is_some())
            .field("on_authorize", &self.on_authorize.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Run a user callback, turning panics (while building or polling the
/// future) into ordinary errors.
pub(crate) async fn run_user_callback<F>(make: F) -> anyhow::Result<()>
where
    F: FnOnce() -> CallbackFuture,
{
    let future = match std::panic::catch_unwind(AssertUnwindSafe(make)) {
        Ok(future) => future,
        Err(panic) => anyhow::bail!("callback panicked: {}", panic_message(panic.as_ref())),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => anyhow::bail!("callback panicked: {}", panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
