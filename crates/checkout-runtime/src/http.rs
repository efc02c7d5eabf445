//! Reqwest HTTP Client
//!
//! Implementation of `HttpClient` that stamps every request with the shared
//! outbound headers.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use checkout_core::{HttpClient, OutboundHeaders};

use crate::settings::RuntimeSettings;

/// `HttpClient` backed by reqwest
pub struct ReqwestHttpClient {
    client: Client,
    base: Url,
    headers: OutboundHeaders,
}

impl ReqwestHttpClient {
    pub fn new(settings: &RuntimeSettings, headers: OutboundHeaders) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(settings.http_timeout).build()?;
        let base = Url::parse(&settings.api_base)?;

        Ok(Self {
            client,
            base,
            headers,
        })
    }

    /// Headers this client sends
    pub fn headers(&self) -> &OutboundHeaders {
        &self.headers
    }

    /// Absolute URLs pass through; anything else is joined onto the base
    pub fn absolute(&self, url: &str) -> anyhow::Result<Url> {
        match Url::parse(url) {
            Ok(url) => Ok(url),
            Err(_) => Ok(self.base.join(url)?),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(&self, url: &str, body: Value) -> anyhow::Result<Value> {
        let url = self.absolute(url)?;
        tracing::debug!(url = %url, "POST");

        let mut request = self.client.post(url).json(&body);
        for (name, value) in self.headers.snapshot() {
            request = request.header(name, value);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}
