//! Render Context
//!
//! Which surface (iframe, lightbox, popup) the checkout is rendered in, plus
//! the process-wide override that expires on its own after five minutes.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long an `enable()` override lasts
pub const REVERT_AFTER: Duration = Duration::from_secs(5 * 60);

/// Render context selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContext {
    pub iframe: bool,
    pub lightbox: bool,
    pub popup: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            iframe: false,
            lightbox: false,
            popup: true,
        }
    }
}

struct ToggleState {
    context: RenderContext,
    revert: Option<JoinHandle<()>>,
    generation: u64,
}

fn lock(state: &Mutex<ToggleState>) -> MutexGuard<'_, ToggleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render context with a self-expiring iframe/lightbox override.
///
/// At most one revert timer is pending. Cancelling the old timer and
/// scheduling the new one happen under the same lock, and the generation
/// counter stops a timer that already woke from reverting a newer override.
pub struct RenderContextToggle {
    state: Arc<Mutex<ToggleState>>,
    revert_after: Duration,
}

impl Default for RenderContextToggle {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContextToggle {
    pub fn new() -> Self {
        Self::with_revert_after(REVERT_AFTER)
    }

    pub fn with_revert_after(revert_after: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ToggleState {
                context: RenderContext::default(),
                revert: None,
                generation: 0,
            })),
            revert_after,
        }
    }

    /// Turn on iframe and lightbox rendering, restarting the revert timer.
    ///
    /// Must be called from inside a tokio runtime; without one the override
    /// could never expire, so it is not applied.
    pub fn enable(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("render context override requested outside a runtime; ignoring");
            return;
        };

        let mut state = lock(&self.state);

        state.context.lightbox = true;
        state.context.iframe = true;

        if let Some(previous) = state.revert.take() {
            previous.abort();
        }

        state.generation += 1;
        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let delay = self.revert_after;

        state.revert = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = lock(&shared);
            if state.generation != generation {
                return;
            }
            state.context.lightbox = false;
            state.context.iframe = false;
            state.revert = None;
            tracing::debug!("render context override expired");
        }));

        tracing::debug!(generation, "render context override enabled");
    }

    /// Current selection
    pub fn current(&self) -> RenderContext {
        lock(&self.state).context
    }

    /// Whether a revert timer is outstanding
    pub fn has_pending_revert(&self) -> bool {
        lock(&self.state)
            .revert
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

static GLOBAL: LazyLock<RenderContextToggle> = LazyLock::new(RenderContextToggle::new);

/// The process-wide toggle
pub fn global() -> &'static RenderContextToggle {
    &GLOBAL
}

/// Device class of the host page
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    #[default]
    Desktop,
    Mobile,
    /// Embedded webview where popups are blocked
    InAppBrowser,
}

/// Surface size as CSS lengths
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: String,
    pub height: String,
}

/// Surface size for a device
pub fn dimensions(device: DeviceKind) -> Dimensions {
    let width = match device {
        DeviceKind::Desktop => "450px",
        DeviceKind::Mobile | DeviceKind::InAppBrowser => "100%",
    };

    Dimensions {
        width: width.into(),
        height: "535px".into(),
    }
}

/// Contexts offered to the transport at session creation
pub fn default_contexts(device: DeviceKind, overrides: RenderContext) -> RenderContext {
    RenderContext {
        iframe: overrides.iframe || device == DeviceKind::InAppBrowser,
        lightbox: overrides.lightbox,
        popup: true,
    }
}
