//! Out-of-browser script fetching with reqwest.
//!
//! Used when an external script cannot be fetched from inside the page.
//! Sends the same extra headers and proxy as the browser, and retries on
//! 5xx with exponential backoff.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqtrack::scripts::ScriptFetcher;
use reqtrack::TrackConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// HTTP client for fallback script retrieval.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry_delay: Duration,
}

impl HttpClient {
    /// Build a client from the run configuration.
    pub fn from_config(config: &TrackConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.nav_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(true)
            .default_headers(headers);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy).context("invalid proxy URL")?);
        }

        Ok(Self {
            client: builder.build().context("failed to build HTTP client")?,
            retry_delay: RETRY_BASE_DELAY,
        })
    }

    /// Override the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// GET `url` and return its body, retrying on 5xx and transport errors.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let mut retries = 0u32;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() && retries < MAX_RETRIES {
                        retries += 1;
                        tracing::debug!(%url, %status, retries, "retrying");
                        tokio::time::sleep(self.backoff(retries)).await;
                        continue;
                    }
                    if !status.is_success() {
                        bail!("HTTP {status}");
                    }
                    return resp.text().await.context("failed to read body");
                }
                Err(e) => {
                    if retries < MAX_RETRIES {
                        retries += 1;
                        tokio::time::sleep(self.backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    fn backoff(&self, retries: u32) -> Duration {
        self.retry_delay * 2u32.pow(retries - 1)
    }
}

#[async_trait]
impl ScriptFetcher for HttpClient {
    async fn fetch_script(&self, url: &str) -> Result<String> {
        self.get_text(url).await
    }
}
