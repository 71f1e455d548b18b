//! Script acquisition for static analysis.
//!
//! Inline script text comes straight from the live DOM. External scripts are
//! fetched from inside the page first, so cookies, headers and the proxy
//! apply, and through a fallback fetcher when that fails.

use crate::browser::BrowserSession;
use crate::diagnostics::{Diagnostics, Phase};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;

/// Lists every `<script>` element as `{src, text}`.
pub const SCRIPT_LISTING: &str = r#"Array.from(document.scripts).map(s => ({
  src: s.src || "",
  text: s.src ? "" : (s.text || "")
}))"#;

/// External scripts fetched concurrently.
const FETCH_CONCURRENCY: usize = 4;

/// One `<script>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Inline(String),
    External(String),
}

#[derive(Debug, Deserialize)]
struct ListedScript {
    #[serde(default)]
    src: String,
    #[serde(default)]
    text: String,
}

/// Fetches script text outside the browser.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch_script(&self, url: &str) -> anyhow::Result<String>;
}

/// Turn the result of [`SCRIPT_LISTING`] into script sources, skipping
/// empty elements.
pub fn parse_listing(value: serde_json::Value) -> Result<Vec<ScriptSource>, serde_json::Error> {
    let listed: Vec<ListedScript> = serde_json::from_value(value)?;
    Ok(listed
        .into_iter()
        .filter_map(|script| {
            if !script.src.trim().is_empty() {
                Some(ScriptSource::External(script.src.trim().to_string()))
            } else if !script.text.trim().is_empty() {
                Some(ScriptSource::Inline(script.text))
            } else {
                None
            }
        })
        .collect())
}

/// List the page's scripts. A failed listing is recorded and yields none.
pub async fn list_scripts(
    session: &dyn BrowserSession,
    diagnostics: &mut Diagnostics,
) -> Vec<ScriptSource> {
    let listed = match session.evaluate(SCRIPT_LISTING).await {
        Ok(value) => parse_listing(value).map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };
    match listed {
        Ok(scripts) => scripts,
        Err(e) => {
            diagnostics.record(Phase::ScriptListing, format!("cannot list scripts: {e:#}"));
            Vec::new()
        }
    }
}

/// Collect the text of every script on the page, in document order.
///
/// External fetch failures are isolated: the failing script is skipped and
/// recorded, its siblings are unaffected.
pub async fn load_scripts(
    session: &dyn BrowserSession,
    fallback: Option<&dyn ScriptFetcher>,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let sources = list_scripts(session, diagnostics).await;
    let inline = sources
        .iter()
        .filter(|s| matches!(s, ScriptSource::Inline(_)))
        .count();
    tracing::info!(
        inline,
        external = sources.len() - inline,
        "collecting scripts"
    );

    let loaded: Vec<Result<String, String>> = stream::iter(sources)
        .map(|source| async move {
            match source {
                ScriptSource::Inline(text) => Ok(text),
                ScriptSource::External(url) => fetch_external(session, fallback, &url).await,
            }
        })
        .buffered(FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut scripts = Vec::with_capacity(loaded.len());
    for result in loaded {
        match result {
            Ok(text) if !text.trim().is_empty() => scripts.push(text),
            Ok(_) => {}
            Err(message) => diagnostics.record(Phase::ScriptFetch, message),
        }
    }
    scripts
}

async fn fetch_external(
    session: &dyn BrowserSession,
    fallback: Option<&dyn ScriptFetcher>,
    url: &str,
) -> Result<String, String> {
    let in_page = match session.fetch_resource(url).await {
        Ok(text) if !text.is_empty() => return Ok(text),
        Ok(_) => anyhow::anyhow!("empty response"),
        Err(e) => e,
    };
    tracing::debug!(%url, "in-page fetch failed, trying fallback: {in_page:#}");

    let Some(fallback) = fallback else {
        return Err(format!("fetching {url}: {in_page:#}"));
    };
    fallback
        .fetch_script(url)
        .await
        .map_err(|e| format!("fetching {url}: {in_page:#}; fallback: {e:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing() {
        let sources = parse_listing(json!([
            {"src": "https://cdn.ex.com/app.js", "text": ""},
            {"src": "", "text": "fetch('/x')"},
            {"src": "", "text": "   "},
            {"text": "var a = 1;"}
        ]))
        .unwrap();
        assert_eq!(
            sources,
            vec![
                ScriptSource::External("https://cdn.ex.com/app.js".into()),
                ScriptSource::Inline("fetch('/x')".into()),
                ScriptSource::Inline("var a = 1;".into()),
            ]
        );
    }

    #[test]
    fn test_parse_listing_rejects_non_array() {
        assert!(parse_listing(json!({"src": "x"})).is_err());
        assert!(parse_listing(serde_json::Value::Null).is_err());
    }
}
