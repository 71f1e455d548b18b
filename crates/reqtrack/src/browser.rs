//! Browser control surface.
//!
//! Defines the `BrowserSession` trait that abstracts over the browser engine
//! driving a capture. The core only depends on this trait; the Chromium
//! implementation lives in the binary crate.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// A network protocol event, reduced to the fields capture needs.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// The page is about to send a request.
    RequestInitiated {
        request_id: String,
        method: String,
        url: String,
        headers: Vec<(String, String)>,
        /// Inline body fragments, base64-encoded.
        post_data: Vec<String>,
        /// The request carries a body that may not have been inlined.
        has_post_data: bool,
    },
    /// Response headers arrived for a request.
    ResponseReceived {
        request_id: String,
        url: String,
        status: u16,
        status_text: String,
        headers: Vec<(String, String)>,
        mime_type: String,
    },
    /// Anything else on the wire. Ignored.
    Other,
}

/// A single page driven by a browser engine.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Enable network events and send `extra_headers` with every request.
    async fn enable_network(&self, extra_headers: &[(String, String)]) -> Result<()>;

    /// Stream of network events, in protocol order.
    async fn subscribe_network(&self) -> Result<BoxStream<'static, NetworkEvent>>;

    /// Load `url`, failing if it does not complete within `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate `script` in the page and return its JSON result. Promises are
    /// awaited.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Retrieve a request body that was not inlined in its event.
    async fn request_post_data(&self, request_id: &str) -> Result<String>;

    /// Fetch `url` from inside the page, keeping its cookies and headers.
    async fn fetch_resource(&self, url: &str) -> Result<String>;
}
