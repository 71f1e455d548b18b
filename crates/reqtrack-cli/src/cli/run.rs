//! `reqtrack -u <url>`: capture, analyze, write.

use super::{OutputFormat, TrackArgs};
use crate::browser::ChromiumBrowser;
use crate::http_client::HttpClient;
use anyhow::{bail, Context, Result};
use reqtrack::archive::ArchiveEntry;
use reqtrack::scripts::ScriptFetcher;
use reqtrack::{
    deduplicate, load_archive_file, merge, parse_header_flag, track, write_archive,
    write_archive_file, Diagnostics, Phase, RequestRecord, TrackConfig, TrackOptions,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Build the run configuration from command-line flags.
pub fn build_config(args: &TrackArgs) -> Result<TrackConfig> {
    let Some(url) = args.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        bail!("no target URL given (use -u <url>)");
    };
    let config = TrackConfig::new(url)?
        .with_extra_headers(parse_header_flag(&args.headers))
        .with_nav_timeout(Duration::from_secs(args.nav_timeout))
        .with_settle_timeout(Duration::from_secs(args.settle_timeout))
        .with_proxy(args.proxy.clone());
    Ok(config)
}

pub fn options(args: &TrackArgs) -> TrackOptions {
    TrackOptions {
        dynamic: !args.no_dynamic,
        static_analysis: !args.no_static,
    }
}

pub async fn run(args: TrackArgs) -> Result<()> {
    let config = build_config(&args)?;
    let fetcher = HttpClient::from_config(&config)?;

    let browser = ChromiumBrowser::launch(config.proxy.as_deref()).await?;
    let tracked = async {
        let session = browser.new_session().await?;
        let report = track(
            Arc::new(session),
            &config,
            Some(&fetcher as &dyn ScriptFetcher),
            options(&args),
        )
        .await?;
        anyhow::Ok(report)
    }
    .await;
    if let Err(e) = browser.close().await {
        tracing::debug!("browser shutdown: {e:#}");
    }
    let report = tracked?;

    summarize(&report.diagnostics);
    tracing::info!(
        dynamic = report.dynamic_count,
        scraped = report.static_count,
        "{} unique requests",
        report.entries.len()
    );

    let entries = if args.merge {
        merge_existing(&args, report.entries, &config.target_url)?
    } else {
        report.entries
    };
    emit(&args, &entries)
}

/// Fold freshly tracked entries into the archive already at `--output`.
fn merge_existing(
    args: &TrackArgs,
    entries: Vec<ArchiveEntry>,
    target_url: &str,
) -> Result<Vec<ArchiveEntry>> {
    let Some(path) = args.output.as_deref() else {
        return Ok(entries);
    };
    let existing = if path.exists() {
        load_archive_file(path)?
    } else {
        Vec::new()
    };
    tracing::info!(existing = existing.len(), path = %path.display(), "merging");
    Ok(deduplicate(merge(existing, entries), target_url)?)
}

/// Write `entries` in the requested format to `--output` or stdout.
pub fn emit(args: &TrackArgs, entries: &[ArchiveEntry]) -> Result<()> {
    match (args.format, args.output.as_deref()) {
        (OutputFormat::Har, Some(path)) => {
            write_archive_file(path, entries)?;
        }
        (OutputFormat::Har, None) => {
            write_archive(std::io::stdout().lock(), entries)?;
        }
        (OutputFormat::Records, output) => {
            let records: Vec<RequestRecord> = entries.iter().map(ArchiveEntry::to_record).collect();
            let mut json = serde_json::to_string_pretty(&records)?;
            json.push('\n');
            match output {
                Some(path) => std::fs::write(path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => std::io::stdout().lock().write_all(json.as_bytes())?,
            }
        }
    }
    if let Some(path) = &args.output {
        tracing::info!(path = %path.display(), entries = entries.len(), "written");
    }
    Ok(())
}

fn summarize(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    for phase in [
        Phase::Settle,
        Phase::Trigger,
        Phase::PostData,
        Phase::ScriptListing,
        Phase::ScriptFetch,
        Phase::Analysis,
    ] {
        let count = diagnostics.count(phase);
        if count > 0 {
            tracing::warn!(%phase, count, "degraded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: TrackArgs,
    }

    fn parse(argv: &[&str]) -> TrackArgs {
        TestCli::try_parse_from(std::iter::once("reqtrack").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["-u", "https://app.example.com/"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.nav_timeout, Duration::from_secs(7));
        assert_eq!(config.settle_timeout, Duration::from_secs(10));
        assert_eq!(config.extra_headers.len(), 1);
        assert_eq!(config.extra_headers[0].0, "User-Agent");
        assert!(config.extra_headers[0].1.contains("Firefox/144.0"));
        assert_eq!(options(&args), TrackOptions::default());
        assert_eq!(args.format, OutputFormat::Har);
    }

    #[test]
    fn test_flags() {
        let args = parse(&[
            "-u",
            "https://app.example.com/",
            "-H",
            "Cookie: sid=1; X-Api-Key: k",
            "-p",
            "http://127.0.0.1:8080",
            "--tnav",
            "3",
            "--no-static",
            "--format",
            "records",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.extra_headers.len(), 2);
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.nav_timeout, Duration::from_secs(3));
        assert!(!options(&args).static_analysis);
        assert_eq!(args.format, OutputFormat::Records);
    }

    #[test]
    fn test_missing_url() {
        let args = parse(&[]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_merge_requires_output() {
        let result = TestCli::try_parse_from(["reqtrack", "-u", "https://a.example/", "--merge"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_emit_records_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let mut args = parse(&["-u", "https://app.example.com/", "--format", "records"]);
        args.output = Some(path.clone());

        let record = RequestRecord::new("POST", "https://app.example.com/api");
        emit(&args, &[ArchiveEntry::from_record(&record)]).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["method"], "POST");
        assert_eq!(written[0]["url"], "https://app.example.com/api");
    }

    #[test]
    fn test_merge_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.har");
        let old = RequestRecord::new("GET", "https://app.example.com/api/a");
        write_archive_file(&path, [ArchiveEntry::from_record(&old)]).unwrap();

        let args = parse(&[
            "-u",
            "https://app.example.com/",
            "--merge",
            "-o",
            path.to_str().unwrap(),
        ]);
        let fresh = vec![
            ArchiveEntry::from_record(&RequestRecord::new("GET", "https://app.example.com/api/a")),
            ArchiveEntry::from_record(&RequestRecord::new("GET", "/api/b")),
        ];

        let merged = merge_existing(&args, fresh, "https://app.example.com/").unwrap();
        let urls: Vec<&str> = merged.iter().map(|e| e.request.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://app.example.com/api/a", "https://app.example.com/api/b"]
        );
    }
}
