//! Non-fatal failures gathered during a run.

use serde::Serialize;
use std::fmt;

/// The phase a degraded condition was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Settle,
    Trigger,
    PostData,
    ScriptListing,
    ScriptFetch,
    Analysis,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Settle => "settle",
            Phase::Trigger => "trigger",
            Phase::PostData => "post-data",
            Phase::ScriptListing => "script-listing",
            Phase::ScriptFetch => "script-fetch",
            Phase::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

/// One isolated, skipped failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
}

/// Ordered collection of [`Diagnostic`]s.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record a degraded condition and log it at `warn`.
    pub fn record(&mut self, phase: Phase, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%phase, "{message}");
        self.entries.push(Diagnostic { phase, message });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of diagnostics recorded for `phase`.
    pub fn count(&self, phase: Phase) -> usize {
        self.entries.iter().filter(|d| d.phase == phase).count()
    }
}
