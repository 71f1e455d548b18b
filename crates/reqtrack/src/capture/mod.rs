//! Dynamic capture: drive one page and rebuild request records from its
//! network events.
//!
//! Events are consumed by a recorder task that owns the [`CaptureBuffer`].
//! The controller navigates, runs the trigger heuristic, waits for the page
//! to settle, then stops the recorder and collects its buffer.

pub mod buffer;

pub use buffer::{CaptureBuffer, PostDataRequest};

use crate::aggregate::dedupe_records;
use crate::browser::{BrowserSession, NetworkEvent};
use crate::config::TrackConfig;
use crate::diagnostics::{Diagnostics, Phase};
use crate::error::{Error, Result};
use crate::model::RequestRecord;
use crate::normalize::normalize_record;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};

/// Best-effort script that provokes latent network activity: DOM events on
/// every element, form submission, and zero-argument network functions.
/// Every invocation is isolated in its own `try`.
pub const TRIGGER_SCRIPT: &str = include_str!("trigger.js");

/// Evaluates to `true` once the page has a body and finished parsing.
pub const READY_PROBE: &str = "!!document.body && document.readyState !== 'loading'";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long in-flight body retrievals may run after the settle phase.
const POST_DATA_DRAIN: Duration = Duration::from_secs(2);

/// Records gathered by one capture, plus what degraded along the way.
#[derive(Debug, Default)]
pub struct CaptureOutcome {
    pub records: Vec<RequestRecord>,
    pub diagnostics: Diagnostics,
}

type Retrieval = (usize, String, anyhow::Result<String>);

/// Capture the requests issued by `config.target_url`.
///
/// Navigation failure is fatal. Everything after navigation is best-effort:
/// the settle phase may time out, and individual body retrievals may fail,
/// without losing the records already observed.
pub async fn start_capture(
    session: Arc<dyn BrowserSession>,
    config: &TrackConfig,
) -> Result<CaptureOutcome> {
    session
        .enable_network(&config.extra_headers)
        .await
        .map_err(|e| Error::Browser(format!("enabling network events: {e:#}")))?;
    let events = session
        .subscribe_network()
        .await
        .map_err(|e| Error::Browser(format!("subscribing to network events: {e:#}")))?;

    let (stop_tx, stop_rx) = oneshot::channel();
    let recorder = tokio::spawn(record_events(events, Arc::clone(&session), stop_rx));

    if let Err(e) = navigate(session.as_ref(), config).await {
        let _ = stop_tx.send(());
        recorder.abort();
        return Err(e);
    }

    let mut diagnostics = settle(session.as_ref(), config).await;

    let _ = stop_tx.send(());
    let (buffer, recorded) = recorder
        .await
        .map_err(|e| Error::Browser(format!("capture recorder failed: {e}")))?;
    diagnostics.extend(recorded);

    let observed = buffer.len();
    let mut records = buffer.into_records();
    for record in &mut records {
        normalize_record(record, &config.base_origin);
    }
    let records = dedupe_records(records);
    tracing::info!(observed, kept = records.len(), "dynamic capture finished");

    Ok(CaptureOutcome {
        records,
        diagnostics,
    })
}

/// Load the target page within the navigation budget.
pub(crate) async fn navigate(session: &dyn BrowserSession, config: &TrackConfig) -> Result<()> {
    tracing::info!(url = %config.target_url, "navigating");
    let load = session.navigate(&config.target_url, config.nav_timeout);
    let reason = match tokio::time::timeout(config.nav_timeout, load).await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => format!("{e:#}"),
        Err(_) => format!("timed out after {:?}", config.nav_timeout),
    };
    Err(Error::Navigation {
        url: config.target_url.clone(),
        reason,
    })
}

/// Run the trigger heuristic and wait for the page to settle. A timeout here
/// is expected; it only bounds how long triggered calls get to land.
async fn settle(session: &dyn BrowserSession, config: &TrackConfig) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    let phase = async {
        match session.evaluate(TRIGGER_SCRIPT).await {
            Ok(invoked) => tracing::debug!(%invoked, "trigger heuristic ran"),
            Err(e) => diagnostics.record(Phase::Trigger, format!("trigger script failed: {e:#}")),
        }
        wait_ready(session).await;
        tokio::time::sleep(config.settle_grace).await;
    };

    if tokio::time::timeout(config.settle_timeout, phase).await.is_err() {
        diagnostics.record(
            Phase::Settle,
            format!("page did not settle within {:?}", config.settle_timeout),
        );
    }
    diagnostics
}

async fn wait_ready(session: &dyn BrowserSession) {
    loop {
        match session.evaluate(READY_PROBE).await {
            Ok(serde_json::Value::Bool(true)) => return,
            Ok(_) => {}
            Err(e) => tracing::trace!("readiness check failed: {e:#}"),
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

/// Recorder task: the only writer of the capture buffer.
async fn record_events(
    events: BoxStream<'static, NetworkEvent>,
    session: Arc<dyn BrowserSession>,
    mut stop: oneshot::Receiver<()>,
) -> (CaptureBuffer, Diagnostics) {
    let mut events = events.fuse();
    let mut buffer = CaptureBuffer::new();
    let mut diagnostics = Diagnostics::default();
    let mut pending: JoinSet<Retrieval> = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            event = events.next() => match event {
                Some(event) => {
                    if let Some(request) = buffer.apply(event) {
                        spawn_retrieval(&mut pending, &session, request);
                    }
                }
                None => break,
            },
            Some(joined) = pending.join_next(), if !pending.is_empty() => {
                finish_retrieval(&mut buffer, &mut diagnostics, joined);
            }
            _ = &mut stop => break,
        }
    }

    // Events already queued when the stop signal arrived still count.
    while let Some(Some(event)) = events.next().now_or_never() {
        if let Some(request) = buffer.apply(event) {
            spawn_retrieval(&mut pending, &session, request);
        }
    }

    let drain = async {
        while let Some(joined) = pending.join_next().await {
            finish_retrieval(&mut buffer, &mut diagnostics, joined);
        }
    };
    if tokio::time::timeout(POST_DATA_DRAIN, drain).await.is_err() {
        let abandoned = pending.len();
        pending.abort_all();
        diagnostics.record(
            Phase::PostData,
            format!("abandoned {abandoned} body retrievals still running after capture"),
        );
    }

    (buffer, diagnostics)
}

fn spawn_retrieval(
    pending: &mut JoinSet<Retrieval>,
    session: &Arc<dyn BrowserSession>,
    request: PostDataRequest,
) {
    let session = Arc::clone(session);
    pending.spawn(async move {
        let body = session.request_post_data(&request.request_id).await;
        (request.index, request.request_id, body)
    });
}

fn finish_retrieval(
    buffer: &mut CaptureBuffer,
    diagnostics: &mut Diagnostics,
    joined: std::result::Result<Retrieval, JoinError>,
) {
    match joined {
        Ok((index, _, Ok(body))) => buffer.attach_post_data(index, body),
        Ok((_, request_id, Err(e))) => diagnostics.record(
            Phase::PostData,
            format!("body of request {request_id} unavailable: {e:#}"),
        ),
        Err(e) => diagnostics.record(Phase::PostData, format!("body retrieval task failed: {e}")),
    }
}
