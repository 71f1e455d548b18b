//! Chromium-backed browser session using chromiumoxide.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, GetRequestPostDataParams,
    Headers, RequestId, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqtrack::browser::{BrowserSession, NetworkEvent};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Overrides the Chromium lookup.
pub const CHROMIUM_PATH_ENV: &str = "REQTRACK_CHROMIUM_PATH";

const CHROMIUM_NAMES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

/// Find the Chromium binary: `REQTRACK_CHROMIUM_PATH`, else the first
/// candidate name on `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    find_chromium_with(std::env::var_os(CHROMIUM_PATH_ENV).map(PathBuf::from))
}

fn find_chromium_with(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.exists()) {
        return Some(path);
    }
    CHROMIUM_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// A launched headless Chromium.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch headless Chromium, routing its traffic through `proxy` if set.
    pub async fn launch(proxy: Option<&str>) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Install Chrome or set REQTRACK_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-breakpad")
            .arg("--ignore-certificate-errors")
            .arg("--blink-settings=imagesEnabled=false");
        if let Some(proxy) = proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP connection
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler: {e}");
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Open a fresh page.
    pub async fn new_session(&self) -> Result<ChromiumSession> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(ChromiumSession { page })
    }

    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        self.handler.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}

/// A single Chromium page.
pub struct ChromiumSession {
    page: Page,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn enable_network(&self, extra_headers: &[(String, String)]) -> Result<()> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("Network.enable failed")?;

        if !extra_headers.is_empty() {
            let headers: serde_json::Map<String, Value> = extra_headers
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                .collect();
            self.page
                .execute(SetExtraHttpHeadersParams::new(Headers::new(Value::Object(
                    headers,
                ))))
                .await
                .context("Network.setExtraHTTPHeaders failed")?;
        }
        Ok(())
    }

    async fn subscribe_network(&self) -> Result<BoxStream<'static, NetworkEvent>> {
        let requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to listen for requests")?
            .map(|event| match serde_json::to_value(&*event) {
                Ok(value) => request_event(value),
                Err(e) => {
                    tracing::trace!("unreadable request event: {e}");
                    NetworkEvent::Other
                }
            });
        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to listen for responses")?
            .map(|event| match serde_json::to_value(&*event) {
                Ok(value) => response_event(value),
                Err(e) => {
                    tracing::trace!("unreadable response event: {e}");
                    NetworkEvent::Other
                }
            });
        Ok(stream::select(requests, responses).boxed())
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                if let Err(e) = self.page.wait_for_navigation().await {
                    tracing::trace!("navigation wait: {e}");
                }
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout:?}"),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid evaluation: {e}"))?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn request_post_data(&self, request_id: &str) -> Result<String> {
        let response = self
            .page
            .execute(GetRequestPostDataParams::new(RequestId::new(request_id)))
            .await
            .context("Network.getRequestPostData failed")?;
        Ok(response.result.post_data.clone())
    }

    async fn fetch_resource(&self, url: &str) -> Result<String> {
        let target = serde_json::to_string(url)?;
        let script = format!(
            "fetch({target}, {{credentials: 'include'}}).then(r => r.ok ? r.text() : \
             Promise.reject(new Error('HTTP ' + r.status)))"
        );
        match self.evaluate(&script).await? {
            Value::String(text) => Ok(text),
            other => bail!("unexpected fetch result: {other}"),
        }
    }
}

fn string_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn header_pairs(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// `Network.requestWillBeSent` in wire form.
fn request_event(event: Value) -> NetworkEvent {
    let Some(request) = event.get("request") else {
        return NetworkEvent::Other;
    };
    let post_data: Vec<String> = request
        .get("postDataEntries")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("bytes").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    NetworkEvent::RequestInitiated {
        request_id: string_at(&event, "/requestId").to_string(),
        method: string_at(request, "/method").to_string(),
        url: string_at(request, "/url").to_string(),
        headers: header_pairs(request.get("headers")),
        post_data,
        has_post_data: request
            .get("hasPostData")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// `Network.responseReceived` in wire form.
fn response_event(event: Value) -> NetworkEvent {
    let Some(response) = event.get("response") else {
        return NetworkEvent::Other;
    };
    NetworkEvent::ResponseReceived {
        request_id: string_at(&event, "/requestId").to_string(),
        url: string_at(response, "/url").to_string(),
        status: response
            .get("status")
            .and_then(Value::as_f64)
            .map(|s| s as u16)
            .unwrap_or_default(),
        status_text: string_at(response, "/statusText").to_string(),
        headers: header_pairs(response.get("headers")),
        mime_type: string_at(response, "/mimeType").to_string(),
    }
}
