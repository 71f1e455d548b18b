//! Run configuration, passed explicitly to every core operation.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default `-H` value.
pub const DEFAULT_HEADER: &str =
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:144.0) Gecko/20100101 Firefox/144.0";

/// Default navigation budget.
pub const DEFAULT_NAV_TIMEOUT: Duration = Duration::from_secs(7);

/// Default settle-phase budget.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle wait after the page reports ready, so triggered calls can land.
pub const DEFAULT_SETTLE_GRACE: Duration = Duration::from_secs(2);

/// Default per-script static analysis budget.
pub const DEFAULT_ANALYSIS_BUDGET: Duration = Duration::from_secs(5);

/// Scripts larger than this (4 MiB) are rejected without parsing.
pub const MAX_SCRIPT_BYTES: usize = 4 * 1024 * 1024;

/// Scripts nesting brackets or conditionals deeper than this are rejected
/// without parsing.
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Stack size of the analysis worker threads. Parsing and walking recurse
/// once per nesting level.
pub const ANALYSIS_STACK_BYTES: usize = 256 * 1024 * 1024;

/// Everything a tracking run needs to know.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub target_url: String,
    /// `scheme://host[:port]` of the target.
    pub base_origin: String,
    pub extra_headers: Vec<(String, String)>,
    pub nav_timeout: Duration,
    pub settle_timeout: Duration,
    pub settle_grace: Duration,
    pub analysis_budget: Duration,
    pub max_script_bytes: usize,
    pub proxy: Option<String>,
}

impl TrackConfig {
    /// Build a configuration for `target_url` with default budgets.
    ///
    /// Fails when the origin cannot be derived from the URL.
    pub fn new(target_url: &str) -> Result<Self> {
        Ok(Self {
            target_url: target_url.to_string(),
            base_origin: base_origin(target_url)?,
            extra_headers: Vec::new(),
            nav_timeout: DEFAULT_NAV_TIMEOUT,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            settle_grace: DEFAULT_SETTLE_GRACE,
            analysis_budget: DEFAULT_ANALYSIS_BUDGET,
            max_script_bytes: MAX_SCRIPT_BYTES,
            proxy: None,
        })
    }

    pub fn with_extra_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers;
        self
    }

    pub fn with_nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn with_settle_grace(mut self, grace: Duration) -> Self {
        self.settle_grace = grace;
        self
    }

    pub fn with_analysis_budget(mut self, budget: Duration) -> Self {
        self.analysis_budget = budget;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Derive `scheme://host[:port]` from an absolute URL.
pub fn base_origin(target_url: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidTarget {
        url: target_url.to_string(),
        reason,
    };

    let parsed = url::Url::parse(target_url).map_err(|e| invalid(e.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid("URL has no host".to_string()))?;

    Ok(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}
