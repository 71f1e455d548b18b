mod common;

use common::*;
use reqtrack::scripts::{load_scripts, ScriptFetcher, SCRIPT_LISTING};
use reqtrack::{track, Diagnostics, Phase, TrackConfig, TrackOptions};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const APP_JS: &str = r#"
async function loadItems() {
  const res = await fetch("/api/items?page=1");
  return res.json();
}
function save(item) {
  return axios.post("https://api.example.com/v1/items", JSON.stringify(item));
}
"#;

fn config() -> TrackConfig {
    TrackConfig::new(TARGET)
        .unwrap()
        .with_settle_grace(Duration::from_millis(10))
}

fn entry_keys(report: &reqtrack::TrackReport) -> Vec<(String, String)> {
    report
        .entries
        .iter()
        .map(|e| (e.request.method.clone(), e.request.url.clone()))
        .collect()
}

#[tokio::test]
async fn test_dynamic_then_static_entries() {
    let session = Arc::new(
        FakeSession::new()
            .with_events(vec![
                request("1", "GET", "https://app.example.com/api/items?page=1"),
                request("2", "GET", "https://app.example.com/api/me"),
            ])
            .with_scripts(json!([
                {"src": "", "text": "navigator.sendBeacon('/collect', 'e=view');"},
                {"src": "https://app.example.com/static/app.js", "text": ""}
            ]))
            .with_resource("https://app.example.com/static/app.js", APP_JS),
    );

    let report = track(session, &config(), None, TrackOptions::default())
        .await
        .unwrap();

    assert_eq!(
        entry_keys(&report),
        vec![
            ("GET".into(), "https://app.example.com/api/items?page=1".into()),
            ("GET".into(), "https://app.example.com/api/me".into()),
            ("POST".into(), "https://app.example.com/collect".into()),
            ("POST".into(), "https://api.example.com/v1/items".into()),
        ]
    );
    assert_eq!(report.dynamic_count, 2);
    assert_eq!(report.static_count, 3);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
}

#[tokio::test]
async fn test_static_only_still_navigates() {
    let session = Arc::new(
        FakeSession::new()
            .with_events(vec![request("1", "GET", "https://app.example.com/api/me")])
            .with_scripts(json!([{"src": "", "text": "fetch('/api/health')"}])),
    );
    let options = TrackOptions {
        dynamic: false,
        static_analysis: true,
    };

    let report = track(session.clone(), &config(), None, options)
        .await
        .unwrap();

    assert_eq!(
        entry_keys(&report),
        vec![("GET".into(), "https://app.example.com/api/health".into())]
    );
    assert_eq!(report.dynamic_count, 0);
    assert_eq!(session.evaluations_of(SCRIPT_LISTING), 1);
}

#[tokio::test]
async fn test_dynamic_only_skips_scripts() {
    let session = Arc::new(
        FakeSession::new()
            .with_events(vec![request("1", "GET", "https://app.example.com/api/me")])
            .with_scripts(json!([{"src": "", "text": "fetch('/api/health')"}])),
    );
    let options = TrackOptions {
        dynamic: true,
        static_analysis: false,
    };

    let report = track(session.clone(), &config(), None, options)
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(session.evaluations_of(SCRIPT_LISTING), 0);
}

#[tokio::test]
async fn test_broken_script_does_not_sink_siblings() {
    let session = Arc::new(FakeSession::new().with_scripts(json!([
        {"src": "", "text": "function ( {"},
        {"src": "", "text": "$.post('/api/login', 'user=a&pass=b');"}
    ])));

    let report = track(session, &config(), None, TrackOptions::default())
        .await
        .unwrap();

    assert_eq!(
        entry_keys(&report),
        vec![("POST".into(), "https://app.example.com/api/login".into())]
    );
    assert_eq!(report.diagnostics.count(Phase::Analysis), 1);
    let post = report.entries[0].request.post_data.as_ref().unwrap();
    assert_eq!(post.mime_type, "application/x-www-form-urlencoded");
    assert_eq!(post.params.len(), 2);
}

#[tokio::test]
async fn test_navigation_failure_aborts_static_only_run() {
    let session = Arc::new(FakeSession::new().failing_navigation("connection refused"));
    let options = TrackOptions {
        dynamic: false,
        static_analysis: true,
    };
    assert!(track(session, &config(), None, options).await.is_err());
}

#[tokio::test]
async fn test_script_fetch_falls_back() {
    let session = FakeSession::new().with_scripts(json!([
        {"src": "https://cdn.example.com/a.js", "text": ""},
        {"src": "https://cdn.example.com/b.js", "text": ""},
        {"src": "", "text": "var inline = true;"}
    ]));
    let fetcher = MapFetcher(HashMap::from([(
        "https://cdn.example.com/a.js".to_string(),
        "fetch('/a')".to_string(),
    )]));

    let mut diagnostics = Diagnostics::default();
    let scripts = load_scripts(&session, Some(&fetcher as &dyn ScriptFetcher), &mut diagnostics).await;

    assert_eq!(scripts, vec!["fetch('/a')".to_string(), "var inline = true;".to_string()]);
    assert_eq!(diagnostics.count(Phase::ScriptFetch), 1);
}
