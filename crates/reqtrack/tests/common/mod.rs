//! Scripted in-memory browser session shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqtrack::browser::{BrowserSession, NetworkEvent};
use reqtrack::capture::{READY_PROBE, TRIGGER_SCRIPT};
use reqtrack::scripts::{ScriptFetcher, SCRIPT_LISTING};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const TARGET: &str = "https://app.example.com/dashboard";

/// Replays a fixed event script when navigated and answers evaluations from
/// canned values.
pub struct FakeSession {
    sender: UnboundedSender<NetworkEvent>,
    receiver: Mutex<Option<UnboundedReceiver<NetworkEvent>>>,
    on_navigate: Vec<NetworkEvent>,
    navigation: Result<Duration, String>,
    ready: bool,
    post_data: HashMap<String, String>,
    listing: Value,
    resources: HashMap<String, String>,
    pub evaluated: Mutex<Vec<String>>,
    pub extra_headers: Mutex<Vec<(String, String)>>,
}

impl FakeSession {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            on_navigate: Vec::new(),
            navigation: Ok(Duration::ZERO),
            ready: true,
            post_data: HashMap::new(),
            listing: json!([]),
            resources: HashMap::new(),
            evaluated: Mutex::new(Vec::new()),
            extra_headers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_events(mut self, events: Vec<NetworkEvent>) -> Self {
        self.on_navigate = events;
        self
    }

    pub fn failing_navigation(mut self, reason: &str) -> Self {
        self.navigation = Err(reason.to_string());
        self
    }

    pub fn slow_navigation(mut self, delay: Duration) -> Self {
        self.navigation = Ok(delay);
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn with_post_data(mut self, request_id: &str, body: &str) -> Self {
        self.post_data.insert(request_id.to_string(), body.to_string());
        self
    }

    pub fn with_scripts(mut self, listing: Value) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_resource(mut self, url: &str, body: &str) -> Self {
        self.resources.insert(url.to_string(), body.to_string());
        self
    }

    pub fn evaluations_of(&self, script: &str) -> usize {
        self.evaluated
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == script)
            .count()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn enable_network(&self, extra_headers: &[(String, String)]) -> anyhow::Result<()> {
        *self.extra_headers.lock().unwrap() = extra_headers.to_vec();
        Ok(())
    }

    async fn subscribe_network(&self) -> anyhow::Result<BoxStream<'static, NetworkEvent>> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("already subscribed"))?;
        Ok(receiver.boxed())
    }

    async fn navigate(&self, _url: &str, _timeout: Duration) -> anyhow::Result<()> {
        match &self.navigation {
            Err(reason) => anyhow::bail!("{reason}"),
            Ok(delay) => tokio::time::sleep(*delay).await,
        }
        for event in &self.on_navigate {
            let _ = self.sender.unbounded_send(event.clone());
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value> {
        self.evaluated.lock().unwrap().push(script.to_string());
        if script == READY_PROBE {
            Ok(Value::Bool(self.ready))
        } else if script == TRIGGER_SCRIPT {
            Ok(json!(0))
        } else if script == SCRIPT_LISTING {
            Ok(self.listing.clone())
        } else {
            Ok(Value::Null)
        }
    }

    async fn request_post_data(&self, request_id: &str) -> anyhow::Result<String> {
        self.post_data
            .get(request_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no post data for {request_id}"))
    }

    async fn fetch_resource(&self, url: &str) -> anyhow::Result<String> {
        self.resources
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("blocked by CORS"))
    }
}

/// Fallback fetcher serving a fixed map.
#[derive(Default)]
pub struct MapFetcher(pub HashMap<String, String>);

#[async_trait]
impl ScriptFetcher for MapFetcher {
    async fn fetch_script(&self, url: &str) -> anyhow::Result<String> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
    }
}

pub fn request(id: &str, method: &str, url: &str) -> NetworkEvent {
    NetworkEvent::RequestInitiated {
        request_id: id.to_string(),
        method: method.to_string(),
        url: url.to_string(),
        headers: vec![("Accept".to_string(), "*/*".to_string())],
        post_data: Vec::new(),
        has_post_data: false,
    }
}

pub fn request_with_body(
    id: &str,
    method: &str,
    url: &str,
    content_type: &str,
    post_data: Vec<String>,
    has_post_data: bool,
) -> NetworkEvent {
    NetworkEvent::RequestInitiated {
        request_id: id.to_string(),
        method: method.to_string(),
        url: url.to_string(),
        headers: vec![("Content-Type".to_string(), content_type.to_string())],
        post_data,
        has_post_data,
    }
}

pub fn response(id: &str, url: &str, status: u16) -> NetworkEvent {
    NetworkEvent::ResponseReceived {
        request_id: id.to_string(),
        url: url.to_string(),
        status,
        status_text: "OK".to_string(),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        mime_type: "application/json".to_string(),
    }
}
