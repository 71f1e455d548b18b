//! Static call-site analysis.
//!
//! Parses JavaScript into a syntax tree and pattern-matches the calls that
//! issue HTTP requests: `fetch`, `axios`, jQuery's ajax helpers,
//! `XMLHttpRequest` open/send pairs and `navigator.sendBeacon`. Only literal
//! arguments are resolved.
//!
//! The tree walk runs against a wall-clock budget. When the budget runs out
//! the walk stops and the records found so far are returned, flagged as
//! partial.
//!
//! Parsing and walking recurse once per nesting level, so both run on a
//! dedicated pool with large worker stacks, and sources nesting deeper than
//! [`MAX_NESTING_DEPTH`] are rejected up front.

mod calls;
mod literal;
mod nesting;

use crate::aggregate::dedupe_records;
use crate::config::{
    TrackConfig, ANALYSIS_STACK_BYTES, DEFAULT_ANALYSIS_BUDGET, MAX_NESTING_DEPTH, MAX_SCRIPT_BYTES,
};
use crate::diagnostics::{Diagnostics, Phase};
use crate::error::{Error, Result};
use crate::model::RequestRecord;
use boa_ast::scope::Scope;
use boa_ast::visitor::VisitWith;
use boa_ast::{Module, Script};
use boa_interner::Interner;
use boa_parser::{Parser, Source};
use calls::CallSiteVisitor;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Records recovered from one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptAnalysis {
    pub records: Vec<RequestRecord>,
    /// The walk ran out of budget; `records` is partial.
    pub timed_out: bool,
}

/// Static analyzer settings.
#[derive(Debug, Clone)]
pub struct Analyzer {
    budget: Duration,
    max_bytes: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(DEFAULT_ANALYSIS_BUDGET)
    }
}

impl Analyzer {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            max_bytes: MAX_SCRIPT_BYTES,
        }
    }

    pub fn from_config(config: &TrackConfig) -> Self {
        Self {
            budget: config.analysis_budget,
            max_bytes: config.max_script_bytes,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Analyze one script.
    ///
    /// Fails only when the script is over the size or nesting ceiling, or
    /// cannot be parsed. Records with no resolvable URL are dropped, the rest are
    /// deduplicated in source order.
    pub fn analyze(&self, source: &str) -> Result<ScriptAnalysis> {
        if source.len() > self.max_bytes {
            return Err(Error::ScriptTooLarge {
                size: source.len(),
                limit: self.max_bytes,
            });
        }

        let depth = nesting::nesting_depth(source);
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::ScriptTooDeep {
                depth,
                limit: MAX_NESTING_DEPTH,
            });
        }

        let deadline = Instant::now() + self.budget;
        let (records, timed_out) = on_analysis_stack(|| walk(source, deadline))?;
        let records = dedupe_records(records);
        if timed_out {
            tracing::warn!(
                budget = ?self.budget,
                partial = records.len(),
                "static analysis ran out of time"
            );
        }
        Ok(ScriptAnalysis { records, timed_out })
    }

    /// Analyze scripts in parallel. Output keeps script order, then source
    /// order within each script. Failing scripts are skipped and reported.
    pub fn analyze_all(&self, scripts: &[String]) -> (Vec<RequestRecord>, Diagnostics) {
        let results: Vec<Result<ScriptAnalysis>> = on_analysis_stack(|| {
            scripts.par_iter().map(|source| self.analyze(source)).collect()
        });

        let mut records = Vec::new();
        let mut diagnostics = Diagnostics::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(analysis) => {
                    if analysis.timed_out {
                        diagnostics.record(
                            Phase::Analysis,
                            format!(
                                "script #{index}: budget of {:?} exhausted, kept {} partial records",
                                self.budget,
                                analysis.records.len()
                            ),
                        );
                    }
                    records.extend(analysis.records);
                }
                Err(e) => diagnostics.record(Phase::Analysis, format!("script #{index} skipped: {e}")),
            }
        }
        tracing::info!(scripts = scripts.len(), records = records.len(), "static analysis finished");
        (records, diagnostics)
    }
}

/// Analyze one script with the default size ceiling.
pub fn analyze_script(source: &str, budget: Duration) -> Result<ScriptAnalysis> {
    Analyzer::new(budget).analyze(source)
}

fn analysis_pool() -> Option<&'static ThreadPool> {
    static POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();
    POOL.get_or_init(|| {
        match rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("reqtrack-analysis-{i}"))
            .stack_size(ANALYSIS_STACK_BYTES)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!("analysis pool unavailable, falling back to the caller's thread: {e}");
                None
            }
        }
    })
    .as_ref()
}

/// Run `f` on an analysis worker. Calls from a worker run in place.
fn on_analysis_stack<R, F>(f: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match analysis_pool() {
        Some(pool) => pool.install(f),
        None => f(),
    }
}

enum Parsed {
    Script(Script),
    Module(Module),
}

fn walk(source: &str, deadline: Instant) -> Result<(Vec<RequestRecord>, bool)> {
    let mut interner = Interner::default();
    let parsed = parse(source, &mut interner)?;

    let mut visitor = CallSiteVisitor::new(&interner, deadline);
    let _ = match &parsed {
        Parsed::Script(script) => script.visit_with(&mut visitor),
        Parsed::Module(module) => module.visit_with(&mut visitor),
    };

    let (mut records, timed_out) = visitor.finish();
    records.retain(|record| !record.url.is_empty());
    Ok((records, timed_out))
}

/// Parse as a classic script, falling back to a module for sources that use
/// `import`/`export`.
fn parse(source: &str, interner: &mut Interner) -> Result<Parsed> {
    let scope = Scope::new_global();
    let script_error = match Parser::new(Source::from_bytes(source)).parse_script(&scope, interner) {
        Ok(script) => return Ok(Parsed::Script(script)),
        Err(e) => e,
    };

    let scope = Scope::new_global();
    match Parser::new(Source::from_bytes(source)).parse_module(&scope, interner) {
        Ok(module) => Ok(Parsed::Module(module)),
        Err(_) => Err(Error::ScriptParse(script_error.to_string())),
    }
}
