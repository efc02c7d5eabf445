//! Diagnostics
//!
//! Fire-and-forget diagnostic tags. Nothing in here returns a value the
//! caller can observe, and nothing in here may fail the checkout flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};

/// Diagnostic severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
}

/// Logging collaborator
///
/// Implementations must not panic and must not block.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: Level, tag: &str, data: Value);

    fn info(&self, tag: &str, data: Value) {
        self.emit(Level::Info, tag, data);
    }

    fn warn(&self, tag: &str, data: Value) {
        self.emit(Level::Warn, tag, data);
    }
}

/// Default sink: forwards tags to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, level: Level, tag: &str, data: Value) {
        match level {
            Level::Info => tracing::info!(target: "checkout::diagnostics", tag = %tag, data = %data),
            Level::Warn => tracing::warn!(target: "checkout::diagnostics", tag = %tag, data = %data),
        }
    }
}

/// A recorded diagnostic
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub tag: String,
    pub data: Value,
}

/// In-memory sink (for development/testing)
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tags in emission order
    pub fn tags(&self) -> Vec<String> {
        self.entries().into_iter().map(|d| d.tag).collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries().iter().any(|d| d.tag == tag)
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, level: Level, tag: &str, data: Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Diagnostic {
                level,
                tag: tag.to_string(),
                data,
            });
    }
}

/// Location of a page, split the way the domain diagnostic needs it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// Scheme including the colon, e.g. `https:`
    pub protocol: String,

    /// Host with optional port, e.g. `www.shop.com:8443`
    pub host: String,

    /// Full href
    pub href: String,
}

impl PageLocation {
    /// Build from an absolute URL
    pub fn parse(href: &str) -> Option<Self> {
        let parsed = url::Url::parse(href).ok()?;
        let host = parsed.host_str()?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Some(Self {
            protocol: format!("{}:", parsed.scheme()),
            host,
            href: href.to_string(),
        })
    }

    /// `protocol//host`, lowercased
    pub fn domain(&self) -> String {
        format!("{}//{}", self.protocol, self.host).to_lowercase()
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Compare a return URL against the current page and log three independent
/// match/mismatch signals: domain, host, and `www.`-less top-level domain.
///
/// Skipped entirely when the current page is the canonical production domain.
pub fn log_return_url_domain(
    sink: &dyn DiagnosticSink,
    return_url: &str,
    current: &PageLocation,
    production_domain: &str,
) {
    let current_domain = current.domain();
    if current_domain == production_domain.to_lowercase() {
        return;
    }

    let return_url = return_url.to_lowercase();
    let current_host = current.host.to_lowercase();
    let current_tld = strip_www(&current_host).to_string();

    let return_host = strip_scheme(&return_url);
    let return_tld = strip_www(return_host);

    let data = serde_json::json!({
        "returnUrl": return_url,
        "currentDomain": current_domain,
    });

    let checks = [
        ("domain", return_url.starts_with(&current_domain)),
        ("host", return_host.starts_with(&current_host)),
        ("tld", return_tld.starts_with(&current_tld)),
    ];

    for (component, matched) in checks {
        let outcome = if matched { "match" } else { "mismatch" };
        sink.info(&format!("return_url_{}_{}", component, outcome), data.clone());
    }
}
