//! Call-site recognition: which calls issue requests, and what their
//! arguments say about the request.

use super::literal::{
    as_object, body_property, body_value, header_property, resolve_sym, string_like,
    string_literal, string_property,
};
use crate::model::{normalize_method, PostDataEntry, RequestRecord};
use crate::normalize::{guess_content_type, parse_query_params};
use boa_ast::expression::access::{PropertyAccess, PropertyAccessField};
use boa_ast::expression::{Call, Expression};
use boa_ast::visitor::{VisitWith, Visitor};
use boa_interner::{Interner, ToInternedString};
use std::ops::ControlFlow;
use std::time::Instant;

/// Expressions visited between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 256;

const HTTP_VERBS: &[&str] = &[
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];
const AXIOS_VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];
const BODYLESS_AXIOS_VERBS: &[&str] = &["get", "delete", "head", "options"];
const JQUERY_NAMES: &[&str] = &["$", "jQuery"];

/// Methods worth resolving the receiver of.
const INTERESTING_METHODS: &[&str] = &[
    "get", "post", "put", "patch", "delete", "head", "options", "request", "ajax", "open",
    "send", "setRequestHeader", "sendBeacon",
];

/// The shape of a recognized network call.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Primitive {
    /// `fetch(url, init)`
    Fetch,
    /// `axios(config)`, `axios(url, config)`, `axios.request(config)`
    AxiosConfig,
    /// `axios.<verb>(url, ...)`, verb in lower case
    AxiosVerb(String),
    /// `$.ajax(settings)`, `$.ajax(url, settings)`
    Ajax,
    /// `$.get(url, data)`, `$.post(url, data)`
    JqueryShorthand(String),
    /// `xhr.open(method, url)`, with the receiver's source text
    XhrOpen(String),
    /// `xhr.setRequestHeader(name, value)`
    XhrHeader(String),
    /// `xhr.send(body)`
    XhrSend(String),
    /// `navigator.sendBeacon(url, data)`
    Beacon,
}

/// Fields recovered from one call site.
#[derive(Debug, Default)]
struct CallSite {
    url: String,
    method: String,
    content_type: String,
    body: String,
}

/// An `open` call whose `send` may still follow.
#[derive(Debug)]
struct PendingXhr {
    index: usize,
    /// Only calls on this same receiver pair with the `open`.
    receiver: String,
    explicit_content_type: String,
}

/// Walks a syntax tree collecting request records until its deadline passes.
pub(super) struct CallSiteVisitor<'a> {
    interner: &'a Interner,
    deadline: Instant,
    visited: usize,
    timed_out: bool,
    records: Vec<RequestRecord>,
    pending_xhr: Option<PendingXhr>,
}

impl<'a> CallSiteVisitor<'a> {
    pub(super) fn new(interner: &'a Interner, deadline: Instant) -> Self {
        Self {
            interner,
            deadline,
            visited: 0,
            timed_out: false,
            records: Vec::new(),
            pending_xhr: None,
        }
    }

    /// Records in source order, and whether the walk ran out of time.
    pub(super) fn finish(self) -> (Vec<RequestRecord>, bool) {
        (self.records, self.timed_out)
    }

    fn inspect(&mut self, call: &Call) {
        let Some(primitive) = classify(call.function(), self.interner) else {
            return;
        };
        let args = call.args();
        match primitive {
            Primitive::XhrHeader(receiver) => self.xhr_header(&receiver, args),
            Primitive::XhrSend(receiver) => self.xhr_send(&receiver, args),
            Primitive::XhrOpen(receiver) => {
                if let Some(site) = self.xhr_open(args) {
                    let index = self.push(site);
                    self.pending_xhr = Some(PendingXhr {
                        index,
                        receiver,
                        explicit_content_type: String::new(),
                    });
                }
            }
            other => {
                let site = self.extract(&other, args);
                self.push(site);
            }
        }
    }

    fn extract(&self, primitive: &Primitive, args: &[Expression]) -> CallSite {
        let interner = self.interner;
        let mut site = CallSite::default();
        match primitive {
            Primitive::Fetch => {
                if let Some(url) = args.first() {
                    site.url = string_like(url, interner);
                }
                if let Some(init) = args.get(1).and_then(as_object) {
                    site.method = string_property(init, "method", interner);
                    site.content_type = header_property(init, "Content-Type", interner);
                    site.body = body_property(init, "body", interner);
                }
            }
            Primitive::AxiosConfig => {
                let config = match args {
                    [url, config, ..] => {
                        site.url = string_like(url, interner);
                        as_object(config)
                    }
                    [only] => match as_object(only) {
                        Some(config) => {
                            site.url = string_property(config, "url", interner);
                            Some(config)
                        }
                        None => {
                            site.url = string_like(only, interner);
                            None
                        }
                    },
                    [] => None,
                };
                if let Some(config) = config {
                    site.method = string_property(config, "method", interner);
                    site.content_type = header_property(config, "Content-Type", interner);
                    site.body = body_property(config, "data", interner);
                }
            }
            Primitive::AxiosVerb(verb) => {
                site.method = verb.clone();
                if let Some(url) = args.first() {
                    site.url = string_like(url, interner);
                }
                let config = if BODYLESS_AXIOS_VERBS.contains(&verb.as_str()) {
                    args.get(1).and_then(as_object)
                } else {
                    if let Some(body) = args.get(1) {
                        site.body = body_value(body, interner);
                    }
                    args.get(2).and_then(as_object)
                };
                if let Some(config) = config {
                    site.content_type = header_property(config, "Content-Type", interner);
                    if site.body.is_empty() {
                        site.body = body_property(config, "data", interner);
                    }
                }
            }
            Primitive::Ajax => {
                let settings = match args {
                    [url, settings, ..] => {
                        site.url = string_like(url, interner);
                        as_object(settings)
                    }
                    [only] => {
                        let settings = as_object(only);
                        if settings.is_none() {
                            site.url = string_like(only, interner);
                        }
                        settings
                    }
                    [] => None,
                };
                if let Some(settings) = settings {
                    if site.url.is_empty() {
                        site.url = string_property(settings, "url", interner);
                    }
                    site.method = string_property(settings, "method", interner);
                    if site.method.is_empty() {
                        site.method = string_property(settings, "type", interner);
                    }
                    site.content_type = string_property(settings, "contentType", interner);
                    if site.content_type.is_empty() {
                        site.content_type = header_property(settings, "Content-Type", interner);
                    }
                    site.body = body_property(settings, "data", interner);
                }
            }
            Primitive::JqueryShorthand(verb) => {
                site.method = verb.clone();
                if let Some(url) = args.first() {
                    site.url = string_like(url, interner);
                }
                if let Some(data) = args.get(1) {
                    site.body = body_value(data, interner);
                }
            }
            Primitive::Beacon => {
                site.method = "POST".to_string();
                if let Some(url) = args.first() {
                    site.url = string_like(url, interner);
                }
                if let Some(data) = args.get(1) {
                    site.body = body_value(data, interner);
                }
            }
            Primitive::XhrOpen(_) | Primitive::XhrHeader(_) | Primitive::XhrSend(_) => {}
        }
        site
    }

    fn xhr_open(&self, args: &[Expression]) -> Option<CallSite> {
        let [method, url, ..] = args else {
            return None;
        };
        let method = match string_literal(method, self.interner) {
            Some(verb) if HTTP_VERBS.contains(&verb.trim().to_uppercase().as_str()) => verb,
            // `open("_blank", ...)` and friends are not requests.
            Some(_) => return None,
            None => String::new(),
        };
        Some(CallSite {
            url: string_like(url, self.interner),
            method,
            ..CallSite::default()
        })
    }

    fn xhr_header(&mut self, receiver: &str, args: &[Expression]) {
        let Some(pending) = self.pending_xhr.as_mut().filter(|p| p.receiver == receiver) else {
            return;
        };
        let [name, value, ..] = args else {
            return;
        };
        let is_content_type = string_literal(name, self.interner)
            .is_some_and(|name| name.eq_ignore_ascii_case("content-type"));
        if !is_content_type {
            return;
        }
        pending.explicit_content_type = string_like(value, self.interner);
        if let Some(record) = self.records.get_mut(pending.index) {
            record.content_type = guess_content_type(
                &pending.explicit_content_type,
                record.first_body(),
                &record.method,
            );
        }
    }

    fn xhr_send(&mut self, receiver: &str, args: &[Expression]) {
        if !self.pending_xhr.as_ref().is_some_and(|p| p.receiver == receiver) {
            return;
        }
        let Some(pending) = self.pending_xhr.take() else {
            return;
        };
        let body = args
            .first()
            .map(|body| body_value(body, self.interner))
            .unwrap_or_default();
        let Some(record) = self.records.get_mut(pending.index) else {
            return;
        };
        if body.is_empty() || !record.post_data_entries.is_empty() {
            return;
        }
        record.content_type =
            guess_content_type(&pending.explicit_content_type, &body, &record.method);
        record.post_data_entries.push(PostDataEntry::from_text(body));
    }

    fn push(&mut self, site: CallSite) -> usize {
        let method = normalize_method(&site.method);
        let mut record = RequestRecord::new(&method, site.url);
        record.content_type = guess_content_type(&site.content_type, &site.body, &method);
        if record.url.contains('?') {
            record.query_params = parse_query_params(&record.url);
        }
        if !site.body.is_empty() {
            record.post_data_entries.push(PostDataEntry::from_text(site.body));
        }
        tracing::trace!(method = %record.method, url = %record.url, "call site");
        self.records.push(record);
        self.records.len() - 1
    }
}

impl<'ast> Visitor<'ast> for CallSiteVisitor<'_> {
    type BreakTy = ();

    fn visit_expression(&mut self, node: &'ast Expression) -> ControlFlow<Self::BreakTy> {
        self.visited += 1;
        if self.visited % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            self.timed_out = true;
            return ControlFlow::Break(());
        }
        node.visit_with(self)
    }

    fn visit_call(&mut self, node: &'ast Call) -> ControlFlow<Self::BreakTy> {
        self.inspect(node);
        node.visit_with(self)
    }
}

/// Identify the network primitive a callee names, if any.
fn classify(callee: &Expression, interner: &Interner) -> Option<Primitive> {
    match callee {
        Expression::Identifier(ident) => match ident.to_interned_string(interner).as_str() {
            "fetch" => Some(Primitive::Fetch),
            "axios" => Some(Primitive::AxiosConfig),
            _ => None,
        },
        Expression::PropertyAccess(PropertyAccess::Simple(access)) => {
            let PropertyAccessField::Const(field) = access.field() else {
                return None;
            };
            let method = resolve_sym(interner, *field);
            if !INTERESTING_METHODS.contains(&method.as_str()) {
                return None;
            }
            let receiver = match access.target() {
                target @ (Expression::Identifier(_) | Expression::PropertyAccess(_)) => {
                    target.to_interned_string(interner)
                }
                _ => String::new(),
            };
            classify_method(&receiver, &method)
        }
        _ => None,
    }
}

fn classify_method(receiver: &str, method: &str) -> Option<Primitive> {
    let jquery = JQUERY_NAMES.contains(&receiver);
    match method {
        "request" if receiver == "axios" => Some(Primitive::AxiosConfig),
        verb if receiver == "axios" && AXIOS_VERBS.contains(&verb) => {
            Some(Primitive::AxiosVerb(verb.to_string()))
        }
        "ajax" if jquery => Some(Primitive::Ajax),
        "get" | "post" if jquery => Some(Primitive::JqueryShorthand(method.to_uppercase())),
        "sendBeacon" if receiver == "navigator" || receiver.ends_with(".navigator") => {
            Some(Primitive::Beacon)
        }
        "open" if !matches!(receiver, "window" | "document" | "self" | "top" | "parent") => {
            Some(Primitive::XhrOpen(receiver.to_string()))
        }
        "setRequestHeader" => Some(Primitive::XhrHeader(receiver.to_string())),
        "send" => Some(Primitive::XhrSend(receiver.to_string())),
        _ => None,
    }
}
