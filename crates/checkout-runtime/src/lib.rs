//! # checkout-runtime
//!
//! Concrete collaborators for checkout-core.
//!
//! ## Collaborators
//!
//! - **ReqwestHttpClient**: guest token exchange over HTTP, stamping the
//!   shared outbound headers onto every request
//! - **HeadlessWindow / HeadlessSurface**: in-memory window and surface for
//!   hosts without a browser (server harness, tests)
//! - **RuntimeSettings**: environment-driven defaults
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_runtime::{HeadlessSurface, HeadlessWindow, ReqwestHttpClient, RuntimeSettings};
//!
//! let settings = RuntimeSettings::from_env();
//! let headers = OutboundHeaders::new();
//! let http = Arc::new(ReqwestHttpClient::new(&settings, headers.clone())?);
//!
//! let checkout = Checkout::builder(config)
//!     .default_env(settings.default_env.clone())
//!     .surface(Arc::new(HeadlessSurface::new()))
//!     .window(Arc::new(HeadlessWindow::new("https://shop.com/cart")))
//!     .guest_auth(GuestAuth::new(settings.guest_auth.clone(), http, headers))
//!     .build()?;
//! ```

pub mod headless;
pub mod http;
pub mod settings;

pub use headless::{HeadlessSurface, HeadlessWindow, Navigation};
pub use http::ReqwestHttpClient;
pub use settings::RuntimeSettings;

// Re-export core types for convenience
pub use checkout_core::{
    Callbacks, Checkout, CheckoutError, OutboundHeaders, PaymentTokenProvider, Result,
    SessionConfig,
};
