//! # checkout-core
//!
//! Lifecycle controller for a single-use, cross-domain checkout session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Checkout                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ SessionConfig│  │ UrlResolver  │  │  Callback slots    │  │
//! │  │ + style check│──│ (token kind) │──│  (once-guarded)    │  │
//! │  └──────────────┘  └──────────────┘  └─────────┬──────────┘  │
//! │                                                │             │
//! │            ┌───────────────┬───────────────────┤             │
//! │            ▼               ▼                   ▼             │
//! │     SessionState      Actions {close,     Diagnostics        │
//! │   (token, cancelUrl)   redirect}          (best effort)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transport layer that actually draws the popup / lightbox / iframe is
//! reached only through the [`host`] traits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_core::{Callbacks, Checkout, PaymentTokenProvider, SessionConfig};
//!
//! let config = SessionConfig::new()
//!     .env("sandbox")
//!     .payment(PaymentTokenProvider::new(|| async { create_payment().await }))
//!     .callbacks(Callbacks::new().on_authorize(|data, actions| async move {
//!         execute_payment(&data).await?;
//!         actions.redirect(None, None).await?;
//!         Ok(())
//!     }));
//!
//! let checkout = Checkout::builder(config)
//!     .surface(surface)
//!     .window(window)
//!     .build()?;
//!
//! let resolved = checkout.resolve_url().await?;
//! ```

pub mod actions;
pub mod checkout;
pub mod diagnostics;
pub mod error;
pub mod guest_auth;
pub mod host;
pub mod lifecycle;
pub mod render_context;
pub mod resolver;
pub mod session;
pub mod style;

#[cfg(test)]
mod testing;

pub use actions::{url_will_redirect_page, Actions};
pub use checkout::{Checkout, CheckoutBuilder, ResolvedUrl, SlotStates};
pub use diagnostics::{DiagnosticSink, MemorySink, PageLocation, TracingSink};
pub use error::{CheckoutError, ConfigError, Result};
pub use guest_auth::{GuestAuth, GuestAuthConfig};
pub use host::{HttpClient, OutboundHeaders, Surface, TransportActions, WindowHost, WindowTarget};
pub use lifecycle::{AuthorizeData, CallbackFuture, Callbacks, CancelData, CloseReason, InitData, SlotState};
pub use render_context::{RenderContext, RenderContextToggle};
pub use resolver::{EnvironmentUrls, PaymentTokenKind, PaymentTokenProvider, UrlResolver, UrlTable};
pub use session::{SessionConfig, SessionId, SessionState};
pub use style::{validate_style, InstallmentsStyle, StyleConfig};
