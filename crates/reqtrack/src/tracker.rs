//! End-to-end pipeline: dynamic capture, static analysis, merge and dedup.

use crate::aggregate::{deduplicate, merge, normalize_records};
use crate::analyzer::Analyzer;
use crate::archive::ArchiveEntry;
use crate::browser::BrowserSession;
use crate::capture::{navigate, start_capture};
use crate::config::TrackConfig;
use crate::diagnostics::{Diagnostics, Phase};
use crate::error::{Error, Result};
use crate::model::RequestRecord;
use crate::scripts::{load_scripts, ScriptFetcher};
use std::sync::Arc;

/// Which producers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOptions {
    pub dynamic: bool,
    pub static_analysis: bool,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            dynamic: true,
            static_analysis: true,
        }
    }
}

/// Result of a tracking run.
#[derive(Debug, Default)]
pub struct TrackReport {
    /// Captured entries first, then statically inferred ones, deduplicated.
    pub entries: Vec<ArchiveEntry>,
    pub dynamic_count: usize,
    pub static_count: usize,
    pub diagnostics: Diagnostics,
}

/// Run the configured producers against one page.
///
/// Only navigation failure, or a browser that cannot be driven at all,
/// aborts the run.
pub async fn track(
    session: Arc<dyn BrowserSession>,
    config: &TrackConfig,
    fallback: Option<&dyn ScriptFetcher>,
    options: TrackOptions,
) -> Result<TrackReport> {
    let mut diagnostics = Diagnostics::default();

    let captured = if options.dynamic {
        let outcome = start_capture(Arc::clone(&session), config).await?;
        diagnostics.extend(outcome.diagnostics);
        outcome.records
    } else {
        if options.static_analysis {
            session
                .enable_network(&config.extra_headers)
                .await
                .map_err(|e| Error::Browser(format!("enabling network events: {e:#}")))?;
            navigate(session.as_ref(), config).await?;
        }
        Vec::new()
    };

    let scraped = if options.static_analysis {
        analyze_page(session.as_ref(), config, fallback, &mut diagnostics).await
    } else {
        Vec::new()
    };

    let dynamic_count = captured.len();
    let static_count = scraped.len();
    let entries = merge(to_entries(&captured), to_entries(&scraped));
    let entries = deduplicate(entries, &config.target_url)?;

    tracing::info!(
        dynamic = dynamic_count,
        scraped = static_count,
        entries = entries.len(),
        degraded = diagnostics.len(),
        "tracking finished"
    );

    Ok(TrackReport {
        entries,
        dynamic_count,
        static_count,
        diagnostics,
    })
}

async fn analyze_page(
    session: &dyn BrowserSession,
    config: &TrackConfig,
    fallback: Option<&dyn ScriptFetcher>,
    diagnostics: &mut Diagnostics,
) -> Vec<RequestRecord> {
    let scripts = load_scripts(session, fallback, diagnostics).await;
    if scripts.is_empty() {
        return Vec::new();
    }

    let analyzer = Analyzer::from_config(config);
    let analysis = tokio::task::spawn_blocking(move || analyzer.analyze_all(&scripts)).await;
    match analysis {
        Ok((records, analyzed)) => {
            diagnostics.extend(analyzed);
            normalize_records(records, &config.base_origin)
        }
        Err(e) => {
            diagnostics.record(Phase::Analysis, format!("analysis task failed: {e}"));
            Vec::new()
        }
    }
}

fn to_entries(records: &[RequestRecord]) -> Vec<ArchiveEntry> {
    records.iter().map(ArchiveEntry::from_record).collect()
}
