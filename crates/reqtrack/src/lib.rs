// Copyright 2026 Reqtrack Contributors
// SPDX-License-Identifier: MIT

//! Discover the HTTP(S) requests a web application can issue.
//!
//! Two producers feed one catalog: the dynamic capture engine watches a live
//! browser page, and the static analyzer pattern-matches network call sites in
//! the page's JavaScript. The aggregation layer normalizes, deduplicates, and
//! streams the result into a HAR archive.

pub mod aggregate;
pub mod analyzer;
pub mod archive;
pub mod browser;
pub mod capture;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod headers;
pub mod model;
pub mod normalize;
pub mod scripts;
pub mod tracker;

pub use aggregate::{dedupe_records, deduplicate, merge};
pub use analyzer::{analyze_script, Analyzer, ScriptAnalysis};
pub use archive::{load_archive, load_archive_file, write_archive, write_archive_file, ArchiveEntry};
pub use browser::{BrowserSession, NetworkEvent};
pub use capture::{start_capture, CaptureOutcome};
pub use config::TrackConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Phase};
pub use error::{Error, Result};
pub use headers::parse_header_flag;
pub use model::{Headers, Param, PostDataEntry, RequestRecord, ResponseInfo};
pub use normalize::{guess_content_type, parse_query_params, sanitize_url};
pub use scripts::{load_scripts, ScriptFetcher, ScriptSource};
pub use tracker::{track, TrackOptions, TrackReport};
