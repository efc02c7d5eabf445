//! URL Resolution
//!
//! Maps a deferred payment token and an environment name to the remote
//! checkout URL.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::diagnostics::DiagnosticSink;
use crate::error::{CheckoutError, Result};

/// Default environment used when a session does not name one
pub const DEFAULT_ENV: &str = "production";

/// Placeholder substituted with the session's stage name
const STAGE_PLACEHOLDER: &str = "{stage}";

/// Fallback stage host when the `stage` environment has no stage name
const DEFAULT_STAGE: &str = "msmaster";

/// Checkout and billing URLs for one environment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentUrls {
    /// Base URL of the environment, used as the canonical domain
    pub domain: String,

    /// Checkout (payment / express checkout) entry point
    pub checkout: String,

    /// Billing agreement approval entry point
    pub billing: String,
}

impl EnvironmentUrls {
    fn for_domain(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            checkout: format!("{}/checkoutnow", domain),
            billing: format!("{}/agreements/approve", domain),
        }
    }
}

/// Environment name → URLs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTable {
    #[serde(flatten)]
    environments: HashMap<String, EnvironmentUrls>,
}

impl Default for UrlTable {
    fn default() -> Self {
        let mut environments = HashMap::new();
        environments.insert(
            "production".into(),
            EnvironmentUrls::for_domain("https://www.paypal.com"),
        );
        environments.insert(
            "sandbox".into(),
            EnvironmentUrls::for_domain("https://www.sandbox.paypal.com"),
        );
        environments.insert(
            "stage".into(),
            EnvironmentUrls::for_domain("https://www.{stage}.qa.paypal.com"),
        );
        environments.insert(
            "local".into(),
            EnvironmentUrls::for_domain("http://localhost.paypal.com:8000/webapps/hermes"),
        );
        environments.insert(
            "test".into(),
            EnvironmentUrls::for_domain("http://localhost:8000"),
        );
        Self { environments }
    }
}

impl UrlTable {
    pub fn empty() -> Self {
        Self {
            environments: HashMap::new(),
        }
    }

    /// Register or replace an environment
    pub fn insert(&mut self, env: impl Into<String>, urls: EnvironmentUrls) {
        self.environments.insert(env.into(), urls);
    }

    pub fn contains(&self, env: &str) -> bool {
        self.environments.contains_key(env)
    }

    /// URLs for an environment with the stage placeholder filled in
    pub fn get(&self, env: &str, stage: Option<&str>) -> Result<EnvironmentUrls> {
        let urls = self
            .environments
            .get(env)
            .ok_or_else(|| CheckoutError::UnknownEnvironment(env.to_string()))?;

        let stage = stage.unwrap_or(DEFAULT_STAGE);
        Ok(EnvironmentUrls {
            domain: urls.domain.replace(STAGE_PLACEHOLDER, stage),
            checkout: urls.checkout.replace(STAGE_PLACEHOLDER, stage),
            billing: urls.billing.replace(STAGE_PLACEHOLDER, stage),
        })
    }

    /// Canonical production domain, used to skip return-url diagnostics
    pub fn production_domain(&self) -> String {
        self.environments
            .get(DEFAULT_ENV)
            .map(|urls| urls.domain.clone())
            .unwrap_or_default()
    }
}

/// Kind of payment token, decided by prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTokenKind {
    BillingAgreement,
    Payment,
    ExpressCheckout,
    Other,
}

impl PaymentTokenKind {
    /// Classify a token; first matching prefix wins
    pub fn classify(token: &str) -> Self {
        if token.starts_with("BA-") {
            PaymentTokenKind::BillingAgreement
        } else if token.starts_with("PAY-") {
            PaymentTokenKind::Payment
        } else if token.starts_with("EC-") {
            PaymentTokenKind::ExpressCheckout
        } else {
            PaymentTokenKind::Other
        }
    }

    /// Diagnostic tag emitted when resolving a URL for this kind
    pub fn diagnostic_tag(&self) -> &'static str {
        match self {
            PaymentTokenKind::BillingAgreement => "url_billing",
            PaymentTokenKind::Payment => "url_payment",
            PaymentTokenKind::ExpressCheckout => "url_checkout",
            PaymentTokenKind::Other => "url_default",
        }
    }
}

type TokenFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync;

/// Deferred payment-identifier provider supplied by the host page
#[derive(Clone)]
pub struct PaymentTokenProvider {
    inner: Arc<TokenFn>,
}

impl PaymentTokenProvider {
    /// Wrap an async closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move || Box::pin(f())),
        }
    }

    /// Provider for a token that is already known
    pub fn ready(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::new(move || {
            let token = token.clone();
            async move { Ok(token) }
        })
    }

    pub fn fetch(&self) -> BoxFuture<'static, anyhow::Result<String>> {
        (self.inner)()
    }
}

impl std::fmt::Debug for PaymentTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentTokenProvider").finish_non_exhaustive()
    }
}

/// Resolves the remote URL for a session
pub struct UrlResolver {
    table: UrlTable,
    stage: Option<String>,
    sink: Arc<dyn DiagnosticSink>,
}

impl UrlResolver {
    pub fn new(table: UrlTable, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            table,
            stage: None,
            sink,
        }
    }

    pub fn with_stage(mut self, stage: Option<String>) -> Self {
        self.stage = stage;
        self
    }

    /// Await the payment token, then pick the URL for its kind.
    ///
    /// Returns the token alongside the URL so callers can build the final
    /// session URL without awaiting the provider twice.
    pub async fn resolve<F>(&self, env: &str, token: F) -> Result<(String, String)>
    where
        F: Future<Output = anyhow::Result<String>>,
    {
        let token = token
            .await
            .map_err(|e| CheckoutError::UrlResolution(format!("{:#}", e)))?;

        if token.is_empty() {
            return Err(CheckoutError::UrlResolution(
                "payment token provider returned an empty token".into(),
            ));
        }

        let kind = PaymentTokenKind::classify(&token);
        let urls = self.table.get(env, self.stage.as_deref())?;

        self.sink.info(
            kind.diagnostic_tag(),
            serde_json::json!({ "env": env, "token": token }),
        );

        let url = match kind {
            PaymentTokenKind::BillingAgreement => urls.billing,
            PaymentTokenKind::Payment
            | PaymentTokenKind::ExpressCheckout
            | PaymentTokenKind::Other => urls.checkout,
        };

        Ok((url, token))
    }

    /// Resolve using a provider
    pub async fn resolve_url(&self, env: &str, provider: &PaymentTokenProvider) -> Result<String> {
        self.resolve(env, provider.fetch()).await.map(|(url, _)| url)
    }

    pub fn table(&self) -> &UrlTable {
        &self.table
    }
}

/// Append session query parameters to a resolved base URL
pub fn build_session_url(
    base: &str,
    token: &str,
    commit: bool,
    locale: Option<&str>,
) -> Result<String> {
    let mut url = url::Url::parse(base)
        .map_err(|e| CheckoutError::UrlResolution(format!("invalid base url {}: {}", base, e)))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", token);
        if commit {
            query.append_pair("useraction", "commit");
        }
        if let Some(locale) = locale {
            query.append_pair("locale.x", locale);
        }
    }

    Ok(url.into())
}
